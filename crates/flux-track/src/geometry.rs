//! 两次读数之间的运动量计算
//!
//! 距离按平面近似：坐标差乘以固定比例 [`METERS_PER_UNIT`]，不做投影换算。

use crate::error::{Result, TrackError};
use crate::model::Device;

/// 坐标单位到米的近似换算比例（经纬度度数 × 1e5）
pub const METERS_PER_UNIT: f64 = 100_000.0;

/// 两次读数之间的变化量
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionDelta {
    /// 距离（近似米）
    pub distance: f64,
    /// 角度变化
    pub angle: f32,
    /// 时间变化（秒，可能为负）
    pub elapsed: i64,
}

impl Device {
    /// 位置与朝向是否完全相同（精确浮点比较）
    pub fn same_pose(&self, other: &Device) -> bool {
        self.x == other.x && self.y == other.y && self.r == other.r
    }

    /// 相对 `other` 的变化量
    pub fn delta_from(&self, other: &Device) -> MotionDelta {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        MotionDelta {
            distance: f64::from(dx * dx + dy * dy).sqrt() * METERS_PER_UNIT,
            angle: self.r - other.r,
            elapsed: self.t - other.t,
        }
    }

    /// 从 `other` 指向自身的方向角
    pub fn heading_from(&self, other: &Device) -> Result<f32> {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        if dx == 0.0 && dy == 0.0 {
            return Err(TrackError::NoMotion);
        }
        Ok(f64::from(dy).atan2(f64::from(dx)) as f32)
    }
}

/// 两次读数位姿是否一致
///
/// 返回 `true` 表示位置和朝向完全相同，即设备没有移动；任一读数缺失时返回 `false`。
pub fn moved(a: Option<&Device>, b: Option<&Device>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.same_pose(b),
        _ => false,
    }
}

/// 计算 `a` 相对 `b` 的距离、角度和时间变化
pub fn delta(a: Option<&Device>, b: Option<&Device>) -> Result<MotionDelta> {
    match (a, b) {
        (Some(a), Some(b)) => Ok(a.delta_from(b)),
        _ => Err(TrackError::NullInput),
    }
}

/// 根据坐标变化计算 `b` 指向 `a` 的方向角
pub fn angle(a: Option<&Device>, b: Option<&Device>) -> Result<f32> {
    match (a, b) {
        (Some(a), Some(b)) => a.heading_from(b),
        _ => Err(TrackError::NullInput),
    }
}
