use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::sweep::SweepConfig;

/// 全局配置
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct GlobalConfig {
    pub system: SystemConfig,
    pub store: StoreConfig,
    pub sweep: SweepConfig,
    pub ingest: IngestConfig,
    pub logging: LoggingConfig,
}

/// 系统配置
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SystemConfig {
    pub name: String,
    pub version: String,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            name: "FLUX Device Tracker".to_string(),
            version: "1.0.0".to_string(),
        }
    }
}

/// 设备集合配置
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// 设备类
    pub device_class: String,
    /// 快照文件
    pub snapshot_path: PathBuf,
    /// 定时快照间隔（秒），0 表示只在退出时保存
    pub snapshot_interval_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            device_class: "device".to_string(),
            snapshot_path: PathBuf::from("./data/devices.json"),
            snapshot_interval_secs: 60,
        }
    }
}

/// 上报写入配置
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IngestConfig {
    /// 本地时间字符串的 UTC 偏移（小时）
    pub utc_offset_hours: i32,
    /// 判定为移动的最小距离（近似米）
    pub min_move_distance: f64,
    /// 每批最多写入的记录数
    pub batch_size: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            utc_offset_hours: 8, // 东八区
            min_move_distance: 0.0,
            batch_size: 256,
        }
    }
}

/// 日志输出格式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
    Json,
}

/// 日志配置
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}
