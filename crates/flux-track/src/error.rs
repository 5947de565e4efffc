use thiserror::Error;

/// 设备缓存错误类型
#[derive(Error, Debug)]
pub enum TrackError {
    /// 参数无效（空 ID、数组长度不一致、数位参数越界等）
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// 几何计算缺少操作数
    #[error("Null input: both device readings are required")]
    NullInput,

    /// 两次读数坐标相同，无法计算方向
    #[error("No motion: positions are identical")]
    NoMotion,

    /// 报文时间无法解析
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// 快照反序列化错误
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),

    /// 文件读写错误
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// 设备缓存结果类型
pub type Result<T> = std::result::Result<T, TrackError>;

impl TrackError {
    /// 创建参数错误
    pub fn invalid(msg: impl Into<String>) -> Self {
        TrackError::InvalidArgument(msg.into())
    }

    /// 是否为调用方参数问题
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, TrackError::InvalidArgument(_))
    }
}
