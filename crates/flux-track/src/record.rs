//! 上报记录
//!
//! 与 [`Device`] 字段相同，但报文时间 `t` 既可以是秒级时间戳，也可以是
//! `YYYY-MM-DD HH:MM:SS` 格式的本地时间字符串（按配置的 UTC 偏移解释）。

use crate::error::{Result, TrackError};
use crate::model::Device;
use crate::packed::DigitCode;
use chrono::{FixedOffset, NaiveDateTime, TimeZone};
use serde::{Deserialize, Serialize};

/// 本地时间字符串格式
pub const LOCAL_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// 默认的本地时间偏移（东八区）
pub const DEFAULT_UTC_OFFSET_HOURS: i32 = 8;

/// 报文时间
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReportTime {
    /// 秒级时间戳
    Epoch(i64),
    /// 本地时间字符串
    Local(String),
}

impl ReportTime {
    /// 转换为秒级时间戳
    pub fn to_epoch(&self, offset: FixedOffset) -> Result<i64> {
        match self {
            ReportTime::Epoch(t) => Ok(*t),
            ReportTime::Local(text) => {
                let naive = NaiveDateTime::parse_from_str(text.trim(), LOCAL_TIME_FORMAT)
                    .map_err(|e| TrackError::InvalidTimestamp(format!("'{text}': {e}")))?;
                offset
                    .from_local_datetime(&naive)
                    .single()
                    .map(|dt| dt.timestamp())
                    .ok_or_else(|| TrackError::InvalidTimestamp(text.clone()))
            }
        }
    }
}

/// 小时数转换为 UTC 偏移
pub fn utc_offset(hours: i32) -> Result<FixedOffset> {
    hours
        .checked_mul(3600)
        .and_then(FixedOffset::east_opt)
        .ok_or_else(|| TrackError::invalid(format!("UTC offset out of range: {hours}h")))
}

/// 一条上报记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRecord {
    pub id: String,
    #[serde(rename = "orgx", default)]
    pub org_x: Option<f32>,
    #[serde(rename = "orgy", default)]
    pub org_y: Option<f32>,
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub r: f32,
    #[serde(rename = "s", default)]
    pub status: DigitCode,
    #[serde(rename = "c", default)]
    pub color: DigitCode,
    pub t: ReportTime,
    #[serde(default)]
    pub tm: i64,
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

impl ReportRecord {
    /// 解析一行 JSON
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// 转换为设备状态；缺少原始坐标时使用当前坐标
    pub fn into_device(self, offset: FixedOffset) -> Result<Device> {
        let t = self.t.to_epoch(offset)?;
        Ok(Device {
            org_x: self.org_x.unwrap_or(self.x),
            org_y: self.org_y.unwrap_or(self.y),
            id: self.id,
            x: self.x,
            y: self.y,
            r: self.r,
            status: self.status,
            color: self.color,
            t,
            tm: self.tm,
            t1: self.t1,
            t2: self.t2,
            t3: self.t3,
            t4: self.t4,
            t5: self.t5,
        })
    }
}
