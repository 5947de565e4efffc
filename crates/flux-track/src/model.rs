use crate::error::{Result, TrackError};
use crate::packed::DigitCode;
use serde::{Deserialize, Serialize};

/// 颜色码中颜色值所在的数位
pub const COLOR_CODE_DIGIT: usize = 0;

/// 颜色码中高亮标志所在的数位
pub const HIGHLIGHT_DIGIT: usize = 1;

/// 后台缓存的设备状态，不考虑渲染问题
///
/// 字段名与旧版 JSON 快照保持一致。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    /// 设备 ID（全局唯一）
    pub id: String,

    /// 原始坐标（转换前）
    #[serde(rename = "orgx", default)]
    pub org_x: f32,
    #[serde(rename = "orgy", default)]
    pub org_y: f32,

    /// 当前坐标
    pub x: f32,
    pub y: f32,

    /// 朝向角
    #[serde(default)]
    pub r: f32,

    /// 状态码
    #[serde(rename = "s", default)]
    pub status: DigitCode,

    /// 颜色码：0 位为颜色，1 位为高亮标志
    #[serde(rename = "c", default)]
    pub color: DigitCode,

    /// 报文时间（秒）
    pub t: i64,

    /// 最后一次移动的报文时间
    #[serde(default)]
    pub tm: i64,

    /// 转发链路时间戳，透传
    #[serde(default)]
    pub t1: i64,
    #[serde(default)]
    pub t2: i64,
    #[serde(default)]
    pub t3: i64,
    #[serde(default)]
    pub t4: i64,
    #[serde(default)]
    pub t5: i64,
}

impl Device {
    /// 创建新设备，位姿与时间均为零
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            org_x: 0.0,
            org_y: 0.0,
            x: 0.0,
            y: 0.0,
            r: 0.0,
            status: DigitCode::ZERO,
            color: DigitCode::ZERO,
            t: 0,
            tm: 0,
            t1: 0,
            t2: 0,
            t3: 0,
            t4: 0,
            t5: 0,
        }
    }

    /// 设置位姿，原始坐标同时记为当前坐标
    pub fn with_pose(mut self, x: f32, y: f32, r: f32) -> Self {
        self.x = x;
        self.y = y;
        self.org_x = x;
        self.org_y = y;
        self.r = r;
        self
    }

    /// 设置报文时间
    pub fn with_time(mut self, t: i64) -> Self {
        self.t = t;
        self
    }

    /// 设置颜色码
    pub fn with_color(mut self, color: DigitCode) -> Self {
        self.color = color;
        self
    }

    /// 颜色值（颜色码 0 位）
    pub fn color_code(&self) -> u8 {
        self.color.digits()[COLOR_CODE_DIGIT]
    }

    /// 是否高亮
    pub fn is_highlighted(&self) -> bool {
        self.color.digits()[HIGHLIGHT_DIGIT] != 0
    }

    /// 设置高亮标志，不影响其他数位
    pub fn set_highlight(&mut self, on: bool) -> Result<()> {
        self.color = self.color.with_digit(HIGHLIGHT_DIGIT, u8::from(on))?;
        Ok(())
    }

    /// 序列化为 JSON
    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// 解析 JSON
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// 解析 JSON，缺失字段使用 `defaults` 中的值
    pub fn parse_with_defaults(bytes: &[u8], defaults: &Device) -> Result<Self> {
        let mut merged = serde_json::to_value(defaults)?;
        let incoming: serde_json::Value = serde_json::from_slice(bytes)?;

        match (merged.as_object_mut(), incoming) {
            (Some(base), serde_json::Value::Object(fields)) => {
                for (key, value) in fields {
                    base.insert(key, value);
                }
            }
            _ => {
                return Err(TrackError::invalid("device JSON must be an object"));
            }
        }

        Ok(serde_json::from_value(merged)?)
    }
}
