use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// 超时扫描配置，时间单位均为秒
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SweepConfig {
    /// 扫描间隔
    pub interval_secs: u64,
    /// 未上报超时删除
    pub remove_after_secs: Option<i64>,
    /// 未移动超时删除
    pub remove_after_motion_secs: Option<i64>,
    /// 未上报超时染色
    pub tag_after_secs: Option<i64>,
    pub tag_color: Option<u32>,
    /// 未移动超时染色
    pub tag_after_motion_secs: Option<i64>,
    pub tag_motion_color: Option<u32>,
    /// 分档染色，按 after_secs 降序
    pub tiers: Vec<TierConfig>,
}

/// 一个染色档位，颜色为打包整数（u32 总能放进 10 个数位）
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TierConfig {
    pub after_secs: i64,
    pub color: u32,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval_secs: 10,
            remove_after_secs: None,
            remove_after_motion_secs: None,
            tag_after_secs: None,
            tag_color: None,
            tag_after_motion_secs: None,
            tag_motion_color: None,
            tiers: Vec::new(),
        }
    }
}

impl SweepConfig {
    /// 未上报染色（超时, 颜色）
    pub fn tag(&self) -> Option<(i64, u32)> {
        self.tag_after_secs.zip(self.tag_color)
    }

    /// 未移动染色（超时, 颜色）
    pub fn tag_motion(&self) -> Option<(i64, u32)> {
        self.tag_after_motion_secs.zip(self.tag_motion_color)
    }

    /// 检查配置是否合法
    pub fn validate(&self) -> Result<()> {
        if self.interval_secs == 0 {
            return Err(anyhow!("sweep.interval_secs must be greater than 0"));
        }

        let timeouts = [
            ("remove_after_secs", self.remove_after_secs),
            ("remove_after_motion_secs", self.remove_after_motion_secs),
            ("tag_after_secs", self.tag_after_secs),
            ("tag_after_motion_secs", self.tag_after_motion_secs),
        ];
        for (name, value) in timeouts {
            if let Some(secs) = value.filter(|v| *v < 0) {
                return Err(anyhow!("sweep.{} must not be negative (got {})", name, secs));
            }
        }

        if self.tag_after_secs.is_some() != self.tag_color.is_some() {
            return Err(anyhow!("sweep.tag_after_secs and sweep.tag_color must be set together"));
        }
        if self.tag_after_motion_secs.is_some() != self.tag_motion_color.is_some() {
            return Err(anyhow!(
                "sweep.tag_after_motion_secs and sweep.tag_motion_color must be set together"
            ));
        }

        for tier in &self.tiers {
            if tier.after_secs < 0 {
                return Err(anyhow!("sweep tier after_secs must not be negative (got {})", tier.after_secs));
            }
        }
        if let Some(pair) = self.tiers.windows(2).find(|w| w[0].after_secs <= w[1].after_secs) {
            return Err(anyhow!(
                "sweep tiers must be sorted by after_secs in descending order ({} before {})",
                pair[0].after_secs,
                pair[1].after_secs
            ));
        }

        Ok(())
    }
}
