//! 设备清单：ID → 报文时间
//!
//! 由 [`DeviceSet::list`](crate::DeviceSet::list) 一次性生成，不与集合保持同步；
//! 也可以单独使用，按墙上时钟淘汰超时条目。

use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::debug;

/// 设备清单
#[derive(Debug)]
pub struct DeviceList {
    device_class: String,
    devices: RwLock<HashMap<String, i64>>,
}

impl DeviceList {
    /// 创建空清单
    pub fn new(device_class: impl Into<String>) -> Self {
        Self {
            device_class: device_class.into(),
            devices: RwLock::new(HashMap::new()),
        }
    }

    pub(crate) fn from_entries(
        device_class: String,
        entries: impl IntoIterator<Item = (String, i64)>,
    ) -> Self {
        Self {
            device_class,
            devices: RwLock::new(entries.into_iter().collect()),
        }
    }

    pub fn device_class(&self) -> &str {
        &self.device_class
    }

    pub fn len(&self) -> usize {
        self.devices.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.read().is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.devices.read().contains_key(id)
    }

    /// 查询设备的报文时间
    pub fn get(&self, id: &str) -> Option<i64> {
        self.devices.read().get(id).copied()
    }

    /// 记录设备的报文时间，返回旧值
    pub fn touch(&self, id: impl Into<String>, t: i64) -> Option<i64> {
        self.devices.write().insert(id.into(), t)
    }

    pub fn remove(&self, id: &str) -> Option<i64> {
        self.devices.write().remove(id)
    }

    /// 清单内容的副本
    pub fn entries(&self) -> HashMap<String, i64> {
        self.devices.read().clone()
    }

    /// 按当前墙上时钟删除超过 `timeout` 秒未更新的条目，返回删除个数
    pub fn remove_timeout_devices(&self, timeout: i64) -> usize {
        self.remove_timeout_at(Utc::now().timestamp(), timeout)
    }

    /// 以 `now` 为当前时间删除超时条目
    pub fn remove_timeout_at(&self, now: i64, timeout: i64) -> usize {
        let mut devices = self.devices.write();
        let before = devices.len();
        devices.retain(|_, t| now.saturating_sub(*t) <= timeout);
        let removed = before - devices.len();

        debug!(
            device_class = %self.device_class,
            removed,
            remaining = devices.len(),
            "Device list pruned"
        );
        removed
    }
}
