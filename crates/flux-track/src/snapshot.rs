//! 设备集合快照
//!
//! 快照为单个 JSON 对象：`DeviceClass`、`Devices`（ID → 设备）以及 `LastModifyTime`。
//! 序列化只在读锁内进行，写文件前释放锁。

use crate::error::Result;
use crate::model::Device;
use crate::store::{DeviceSet, DeviceTable, UNSET_TIME};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

#[derive(Serialize)]
struct SnapshotRef<'a> {
    #[serde(rename = "DeviceClass")]
    device_class: &'a str,
    #[serde(rename = "Devices")]
    devices: &'a HashMap<String, Device>,
    #[serde(rename = "LastModifyTime")]
    last_modify_time: i64,
}

#[derive(Deserialize)]
struct SnapshotFile {
    #[serde(rename = "DeviceClass")]
    device_class: String,
    #[serde(rename = "Devices", default)]
    devices: HashMap<String, Device>,
    #[serde(rename = "LastModifyTime", default)]
    last_modify_time: Option<i64>,
}

impl TryFrom<SnapshotFile> for DeviceTable {
    type Error = serde_json::Error;

    fn try_from(file: SnapshotFile) -> std::result::Result<Self, Self::Error> {
        if let Some((key, device)) = file.devices.iter().find(|(key, device)| **key != device.id) {
            return Err(serde::de::Error::custom(format!(
                "device keyed as '{key}' carries id '{}'",
                device.id
            )));
        }

        // 旧快照没有 LastModifyTime 时按设备报文时间推算
        let last_modify_time = file.last_modify_time.unwrap_or_else(|| {
            file.devices
                .values()
                .map(|d| d.t)
                .max()
                .unwrap_or(UNSET_TIME)
        });

        Ok(DeviceTable {
            device_class: file.device_class,
            devices: file.devices,
            last_modify_time,
        })
    }
}

impl DeviceSet {
    /// 序列化整个集合
    pub fn to_snapshot_bytes(&self) -> Result<Vec<u8>> {
        self.read(|table| {
            let snapshot = SnapshotRef {
                device_class: &table.device_class,
                devices: &table.devices,
                last_modify_time: table.last_modify_time,
            };
            Ok(serde_json::to_vec(&snapshot)?)
        })
    }

    /// 从快照数据重建集合，锁为新建状态
    pub fn from_snapshot_bytes(bytes: &[u8]) -> Result<Self> {
        let file: SnapshotFile = serde_json::from_slice(bytes)?;
        let table = DeviceTable::try_from(file)?;
        Ok(DeviceSet::from_table(table))
    }

    /// 保存快照到文件（整体覆盖）
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let data = self.to_snapshot_bytes()?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, &data)?;

        info!(path = %path.display(), bytes = data.len(), "Device snapshot saved");
        Ok(())
    }

    /// 从文件加载快照
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        let set = Self::from_snapshot_bytes(&data)?;

        info!(
            path = %path.display(),
            device_class = %set.device_class(),
            devices = set.len(),
            "Device snapshot loaded"
        );
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TrackError;
    use crate::packed::DigitCode;
    use tempfile::tempdir;

    fn sample_set() -> DeviceSet {
        let set = DeviceSet::new("taxi");
        let mut a = Device::new("a").with_pose(116.39, 39.91, 1.25).with_time(1_700_000_100);
        a.org_x = 116.0;
        a.org_y = 39.0;
        a.status = DigitCode::from(120u32);
        a.color = DigitCode::from(11u32);
        a.t1 = 1;
        a.t2 = 2;
        a.t3 = 3;
        a.t4 = 4;
        a.t5 = 5;
        set.set_device(a, true).unwrap();
        set.set_device(Device::new("b").with_time(1_700_000_000), false).unwrap();
        set
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let set = sample_set();
        let restored = DeviceSet::from_snapshot_bytes(&set.to_snapshot_bytes().unwrap()).unwrap();

        assert_eq!(restored.device_class(), "taxi");
        assert_eq!(restored.last_modify_time(), 1_700_000_100);
        for id in ["a", "b"] {
            assert_eq!(restored.get_device(id), set.get_device(id));
        }
        assert_eq!(restored.get_device("a").unwrap().tm, 1_700_000_100);
    }

    #[test]
    fn test_snapshot_keeps_high_water_mark_after_removal() {
        let set = sample_set();
        set.remove_device("a").unwrap();

        let restored = DeviceSet::from_snapshot_bytes(&set.to_snapshot_bytes().unwrap()).unwrap();
        assert_eq!(restored.len(), 1);
        assert_eq!(restored.last_modify_time(), 1_700_000_100);
    }

    #[test]
    fn test_snapshot_format() {
        let bytes = sample_set().to_snapshot_bytes().unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["DeviceClass"], "taxi");
        assert_eq!(value["LastModifyTime"], 1_700_000_100i64);
        assert_eq!(value["Devices"]["a"]["c"], 11);
        assert_eq!(value["Devices"]["a"]["s"], 120);
    }

    #[test]
    fn test_load_snapshot_without_high_water_mark() {
        let bytes = br#"{
            "DeviceClass": "legacy",
            "Devices": {
                "p": {"id": "p", "x": 1.0, "y": 2.0, "r": 0.0, "s": 0, "c": 1, "t": 500},
                "q": {"id": "q", "x": 3.0, "y": 4.0, "r": 0.0, "s": 0, "c": 0, "t": 800}
            }
        }"#;
        let set = DeviceSet::from_snapshot_bytes(bytes).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.last_modify_time(), 800);

        let empty = DeviceSet::from_snapshot_bytes(br#"{"DeviceClass":"none"}"#).unwrap();
        assert_eq!(empty.last_modify_time(), UNSET_TIME);
    }

    #[test]
    fn test_load_rejects_malformed_snapshot() {
        assert!(matches!(
            DeviceSet::from_snapshot_bytes(b"not json"),
            Err(TrackError::Deserialization(_))
        ));
        assert!(matches!(
            DeviceSet::from_snapshot_bytes(br#"{"Devices":{}}"#),
            Err(TrackError::Deserialization(_))
        ));

        let mismatched = br#"{"DeviceClass":"x","Devices":{"k":{"id":"other","x":0,"y":0,"t":1}}}"#;
        assert!(matches!(
            DeviceSet::from_snapshot_bytes(mismatched),
            Err(TrackError::Deserialization(_))
        ));
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("devices.json");

        let set = sample_set();
        set.save(&path).unwrap();

        let restored = DeviceSet::load(&path).unwrap();
        assert_eq!(restored.get_devices().len(), 2);
        assert_eq!(restored.get_device("a"), set.get_device("a"));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let result = DeviceSet::load(dir.path().join("absent.json"));
        assert!(matches!(result, Err(TrackError::Io(_))));
    }
}
