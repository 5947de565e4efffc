//! 批量写入上报记录
//!
//! 同一写锁内将每条记录与集合中已有的状态比较，判断是否真正移动，
//! 再决定是否刷新最后移动时间。

use crate::error::Result;
use crate::model::Device;
use crate::record::{utc_offset, ReportRecord};
use crate::store::DeviceSet;
use chrono::FixedOffset;
use std::sync::Arc;
use tracing::{debug, warn};

/// 一批记录的写入结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// 新设备数
    pub created: usize,
    /// 已有设备的更新数
    pub updated: usize,
    /// 判定为移动的记录数（新设备也计入）
    pub moved: usize,
    /// 被拒绝的记录数
    pub rejected: usize,
}

/// 上报记录写入器
pub struct Ingestor {
    set: Arc<DeviceSet>,
    offset: FixedOffset,
    min_move_distance: f64,
}

impl Ingestor {
    /// 创建写入器
    ///
    /// # 参数
    /// * `utc_offset_hours` - 本地时间字符串的 UTC 偏移
    /// * `min_move_distance` - 超过该距离（近似米）才算移动
    pub fn new(set: Arc<DeviceSet>, utc_offset_hours: i32, min_move_distance: f64) -> Result<Self> {
        Ok(Self {
            set,
            offset: utc_offset(utc_offset_hours)?,
            min_move_distance,
        })
    }

    pub fn device_set(&self) -> &Arc<DeviceSet> {
        &self.set
    }

    /// 相对上一次状态是否算作移动
    pub fn is_motion(&self, previous: Option<&Device>, current: &Device) -> bool {
        match previous {
            None => true,
            Some(prev) => {
                let delta = current.delta_from(prev);
                delta.distance > self.min_move_distance || delta.angle != 0.0
            }
        }
    }

    /// 写入一批记录
    pub fn ingest(&self, records: Vec<ReportRecord>) -> IngestReport {
        let mut report = IngestReport::default();

        let devices: Vec<Device> = records
            .into_iter()
            .filter_map(|record| {
                let id = record.id.clone();
                match record.into_device(self.offset) {
                    Ok(device) if !device.id.is_empty() => Some(device),
                    Ok(_) => {
                        warn!("Rejected report record with empty id");
                        report.rejected += 1;
                        None
                    }
                    Err(e) => {
                        warn!(device_id = %id, error = %e, "Rejected report record");
                        report.rejected += 1;
                        None
                    }
                }
            })
            .collect();

        if devices.is_empty() {
            return report;
        }

        self.set.batch(|table| {
            for mut device in devices {
                let previous = table.device(&device.id);
                let moving = self.is_motion(previous, &device);
                if let (false, Some(prev)) = (moving, previous) {
                    device.tm = prev.tm;
                }

                match table.set_device(device, moving) {
                    Ok(true) => report.created += 1,
                    Ok(false) => report.updated += 1,
                    Err(e) => {
                        warn!(error = %e, "Rejected device");
                        report.rejected += 1;
                        continue;
                    }
                }
                if moving {
                    report.moved += 1;
                }
            }
        });

        debug!(
            created = report.created,
            updated = report.updated,
            moved = report.moved,
            rejected = report.rejected,
            "Report batch ingested"
        );
        report
    }
}
