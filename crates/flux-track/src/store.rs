//! 设备状态集合
//!
//! [`DeviceSet`] 用一把读写锁保护 ID → [`Device`] 映射以及最大报文时间。
//! 每个公开方法都自行加锁；需要在同一临界区内组合多个操作时，使用
//! [`DeviceSet::read`] / [`DeviceSet::batch`] 拿到 [`DeviceTable`] 直接操作。
//!
//! 读操作返回设备的独立副本，调用方修改副本不会影响集合。

use crate::error::{Result, TrackError};
use crate::list::DeviceList;
use crate::model::Device;
use crate::packed::DigitCode;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// 尚未收到任何报文时的最大报文时间
pub const UNSET_TIME: i64 = -1;

/// 超时判断使用的时间字段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeField {
    /// 报文时间 `t`：判断设备是否失联
    Report,
    /// 移动时间 `tm`：判断设备是否静止
    Motion,
}

impl TimeField {
    fn of(self, device: &Device) -> i64 {
        match self {
            TimeField::Report => device.t,
            TimeField::Motion => device.tm,
        }
    }
}

/// 分档染色结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TierOutcome {
    /// 实际改变颜色的设备数
    pub count: usize,
    /// 修改后的设备副本
    pub modified: Vec<Device>,
    /// 修改详情，格式 `id-->color`
    pub detail: Vec<String>,
}

/// 锁内的设备表
///
/// 只能通过 [`DeviceSet`] 的闭包入口或快照加载获得，方法本身不加锁。
#[derive(Debug, Clone)]
pub struct DeviceTable {
    pub(crate) device_class: String,
    pub(crate) devices: HashMap<String, Device>,
    pub(crate) last_modify_time: i64,
}

impl DeviceTable {
    pub(crate) fn new(device_class: String) -> Self {
        Self {
            device_class,
            devices: HashMap::new(),
            last_modify_time: UNSET_TIME,
        }
    }

    /// 设备类
    pub fn device_class(&self) -> &str {
        &self.device_class
    }

    /// 曾经写入过的最大报文时间（删除设备后也不会回退）
    pub fn last_modify_time(&self) -> i64 {
        self.last_modify_time
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.devices.contains_key(id)
    }

    /// 当前所有设备 ID
    pub fn ids(&self) -> HashSet<String> {
        self.devices.keys().cloned().collect()
    }

    /// 生成 ID → 报文时间 的清单
    pub fn list(&self) -> DeviceList {
        DeviceList::from_entries(
            self.device_class.clone(),
            self.devices.iter().map(|(id, device)| (id.clone(), device.t)),
        )
    }

    /// 借用指定设备
    pub fn device(&self, id: &str) -> Option<&Device> {
        self.devices.get(id)
    }

    /// 获取指定设备的副本
    pub fn get_device(&self, id: &str) -> Option<Device> {
        self.devices.get(id).cloned()
    }

    /// 获取全部设备的副本，顺序不定
    pub fn get_devices(&self) -> Vec<Device> {
        self.devices.values().cloned().collect()
    }

    /// 写入或更新设备
    ///
    /// `update_last_motion` 为真时同时把 `tm` 设为 `t`。返回是否为新设备。
    pub fn set_device(&mut self, device: Device, update_last_motion: bool) -> Result<bool> {
        if device.id.is_empty() {
            return Err(TrackError::invalid("device id must not be empty"));
        }
        Ok(self.install(device, update_last_motion))
    }

    /// 批量写入，返回（新建数，更新数）
    ///
    /// 任一设备 ID 为空时整批拒绝，集合保持不变。
    pub fn set_devices(
        &mut self,
        devices: Vec<Device>,
        update_last_motion: bool,
    ) -> Result<(usize, usize)> {
        if devices.is_empty() {
            return Ok((0, 0));
        }
        if devices.iter().any(|d| d.id.is_empty()) {
            return Err(TrackError::invalid("device id must not be empty"));
        }

        let mut created = 0;
        let mut updated = 0;
        for device in devices {
            if self.install(device, update_last_motion) {
                created += 1;
            } else {
                updated += 1;
            }
        }

        debug!(
            device_class = %self.device_class,
            created,
            updated,
            "Devices set"
        );
        Ok((created, updated))
    }

    fn install(&mut self, mut device: Device, update_last_motion: bool) -> bool {
        if update_last_motion {
            device.tm = device.t;
        }
        if device.t > self.last_modify_time {
            self.last_modify_time = device.t;
        }
        self.devices.insert(device.id.clone(), device).is_none()
    }

    /// 只更新报文时间，返回设备是否存在
    pub fn set_timestamp(&mut self, id: &str, t: i64) -> Result<bool> {
        if id.is_empty() {
            return Err(TrackError::invalid("device id must not be empty"));
        }
        match self.devices.get_mut(id) {
            Some(device) => {
                device.t = t;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// 删除设备，返回设备是否存在
    pub fn remove_device(&mut self, id: &str) -> Result<bool> {
        if id.is_empty() {
            return Err(TrackError::invalid("device id must not be empty"));
        }
        Ok(self.devices.remove(id).is_some())
    }

    /// 批量删除，返回实际删除个数
    pub fn remove_devices<I, S>(&mut self, ids: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        ids.into_iter()
            .filter(|id| self.devices.remove(id.as_ref()).is_some())
            .count()
    }

    /// 清空设备，最大报文时间保持不变
    pub fn clear(&mut self) {
        self.devices.clear();
    }

    /// 删除 `now - t > timeout` 的设备，返回（删除个数，删除的 ID）
    pub fn remove_timeout_by_report_time(&mut self, now: i64, timeout: i64) -> (usize, Vec<String>) {
        self.remove_timeout(TimeField::Report, now, timeout)
    }

    /// 删除 `now - tm > timeout` 的设备（在线但长时间未移动）
    pub fn remove_timeout_by_motion_time(&mut self, now: i64, timeout: i64) -> (usize, Vec<String>) {
        self.remove_timeout(TimeField::Motion, now, timeout)
    }

    /// 按指定时间字段删除超时设备
    pub fn remove_timeout(&mut self, field: TimeField, now: i64, timeout: i64) -> (usize, Vec<String>) {
        let mut expired: Vec<String> = self
            .devices
            .values()
            .filter(|device| now.saturating_sub(field.of(device)) > timeout)
            .map(|device| device.id.clone())
            .collect();
        expired.sort();

        for id in &expired {
            self.devices.remove(id);
        }
        (expired.len(), expired)
    }

    /// 将 `now - t > timeout` 的设备颜色码整体设为 `color`
    ///
    /// 无论颜色是否已经相同，都计入修改结果。
    pub fn tag_timeout_by_report_time(
        &mut self,
        now: i64,
        timeout: i64,
        color: DigitCode,
    ) -> (usize, Vec<Device>) {
        self.tag_timeout(TimeField::Report, now, timeout, color)
    }

    /// 将 `now - tm > timeout` 的设备颜色码整体设为 `color`
    pub fn tag_timeout_by_motion_time(
        &mut self,
        now: i64,
        timeout: i64,
        color: DigitCode,
    ) -> (usize, Vec<Device>) {
        self.tag_timeout(TimeField::Motion, now, timeout, color)
    }

    /// 按指定时间字段为超时设备染色
    pub fn tag_timeout(
        &mut self,
        field: TimeField,
        now: i64,
        timeout: i64,
        color: DigitCode,
    ) -> (usize, Vec<Device>) {
        let mut modified: Vec<Device> = self
            .devices
            .values_mut()
            .filter(|device| now.saturating_sub(field.of(device)) > timeout)
            .map(|device| {
                device.color = color;
                device.clone()
            })
            .collect();
        modified.sort_by(|a, b| a.id.cmp(&b.id));
        (modified.len(), modified)
    }

    /// 按报文时间分档染色
    ///
    /// `thresholds` 与 `colors` 一一对应，调用方需按超时降序排列；每个设备取第一个满足
    /// `now - t >= thresholds[i]` 的档位。只记录颜色真正发生变化的设备，未命中任何档位的设备不变。
    pub fn tag_tiered_timeout(
        &mut self,
        now: i64,
        thresholds: &[i64],
        colors: &[DigitCode],
    ) -> Result<TierOutcome> {
        if thresholds.len() != colors.len() {
            return Err(TrackError::invalid(format!(
                "thresholds and colors must have the same length ({} != {})",
                thresholds.len(),
                colors.len()
            )));
        }

        let mut outcome = TierOutcome::default();
        for device in self.devices.values_mut() {
            let elapsed = now.saturating_sub(device.t);
            let Some(tier) = thresholds.iter().position(|limit| elapsed >= *limit) else {
                continue;
            };
            let color = colors[tier];
            if device.color != color {
                device.color = color;
                outcome.detail.push(format!("{}-->{}", device.id, color));
                outcome.modified.push(device.clone());
            }
        }

        outcome.modified.sort_by(|a, b| a.id.cmp(&b.id));
        outcome.detail.sort();
        outcome.count = outcome.modified.len();
        Ok(outcome)
    }
}

/// 设备状态集合，可在线程间共享
#[derive(Debug)]
pub struct DeviceSet {
    table: RwLock<DeviceTable>,
}

impl DeviceSet {
    /// 创建空集合，最大报文时间为 [`UNSET_TIME`]
    pub fn new(device_class: impl Into<String>) -> Self {
        Self::from_table(DeviceTable::new(device_class.into()))
    }

    pub(crate) fn from_table(table: DeviceTable) -> Self {
        Self {
            table: RwLock::new(table),
        }
    }

    /// 在一次读锁内执行闭包
    pub fn read<R>(&self, f: impl FnOnce(&DeviceTable) -> R) -> R {
        f(&self.table.read())
    }

    /// 在一次写锁内执行闭包，用于组合多个修改
    ///
    /// 闭包内不要再调用同一集合的加锁方法，否则会死锁。
    pub fn batch<R>(&self, f: impl FnOnce(&mut DeviceTable) -> R) -> R {
        f(&mut self.table.write())
    }

    pub fn device_class(&self) -> String {
        self.table.read().device_class.clone()
    }

    pub fn last_modify_time(&self) -> i64 {
        self.table.read().last_modify_time
    }

    pub fn len(&self) -> usize {
        self.table.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.read().is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.table.read().contains(id)
    }

    pub fn ids(&self) -> HashSet<String> {
        self.table.read().ids()
    }

    pub fn list(&self) -> DeviceList {
        self.table.read().list()
    }

    pub fn get_device(&self, id: &str) -> Option<Device> {
        self.table.read().get_device(id)
    }

    pub fn get_devices(&self) -> Vec<Device> {
        self.table.read().get_devices()
    }

    pub fn set_device(&self, device: Device, update_last_motion: bool) -> Result<bool> {
        self.table.write().set_device(device, update_last_motion)
    }

    pub fn set_devices(&self, devices: Vec<Device>, update_last_motion: bool) -> Result<(usize, usize)> {
        self.table.write().set_devices(devices, update_last_motion)
    }

    pub fn set_timestamp(&self, id: &str, t: i64) -> Result<bool> {
        self.table.write().set_timestamp(id, t)
    }

    pub fn remove_device(&self, id: &str) -> Result<bool> {
        self.table.write().remove_device(id)
    }

    pub fn remove_devices<I, S>(&self, ids: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.table.write().remove_devices(ids)
    }

    pub fn clear(&self) {
        self.table.write().clear();
    }

    pub fn remove_timeout_by_report_time(&self, now: i64, timeout: i64) -> (usize, Vec<String>) {
        self.table.write().remove_timeout_by_report_time(now, timeout)
    }

    pub fn remove_timeout_by_motion_time(&self, now: i64, timeout: i64) -> (usize, Vec<String>) {
        self.table.write().remove_timeout_by_motion_time(now, timeout)
    }

    pub fn tag_timeout_by_report_time(
        &self,
        now: i64,
        timeout: i64,
        color: DigitCode,
    ) -> (usize, Vec<Device>) {
        self.table.write().tag_timeout_by_report_time(now, timeout, color)
    }

    pub fn tag_timeout_by_motion_time(
        &self,
        now: i64,
        timeout: i64,
        color: DigitCode,
    ) -> (usize, Vec<Device>) {
        self.table.write().tag_timeout_by_motion_time(now, timeout, color)
    }

    pub fn tag_tiered_timeout(
        &self,
        now: i64,
        thresholds: &[i64],
        colors: &[DigitCode],
    ) -> Result<TierOutcome> {
        self.table.write().tag_tiered_timeout(now, thresholds, colors)
    }
}
