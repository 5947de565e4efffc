use anyhow::{anyhow, Result};
use config::{Config, File, FileFormat};
use std::path::{Path, PathBuf};

use crate::GlobalConfig;

/// 全局配置文件名
pub const GLOBAL_CONFIG_FILE: &str = "global.toml";

/// 配置加载器
pub struct ConfigLoader {
    config_dir: PathBuf,
}

impl ConfigLoader {
    /// 创建配置加载器
    pub fn new<P: AsRef<Path>>(config_dir: P) -> Self {
        Self {
            config_dir: config_dir.as_ref().to_path_buf(),
        }
    }

    /// 配置目录
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// 加载全局配置
    pub fn load_global(&self) -> Result<GlobalConfig> {
        let config_path = self.config_dir.join(GLOBAL_CONFIG_FILE);

        if !config_path.exists() {
            // 如果配置文件不存在，返回默认配置
            return Ok(GlobalConfig::default());
        }

        let config = Config::builder()
            .add_source(File::new(
                config_path.to_str().ok_or_else(|| anyhow!("Invalid config path"))?,
                FileFormat::Toml,
            ))
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// 加载并验证全局配置
    pub fn load_validated(&self) -> Result<GlobalConfig> {
        let global = self.load_global()?;
        Self::check(&global)?;
        Ok(global)
    }

    /// 验证配置
    pub fn validate(&self) -> Result<()> {
        let global = self.load_global()?;
        Self::check(&global)
    }

    fn check(global: &GlobalConfig) -> Result<()> {
        if global.store.device_class.trim().is_empty() {
            return Err(anyhow!("store.device_class must not be empty"));
        }

        if !(-12..=14).contains(&global.ingest.utc_offset_hours) {
            return Err(anyhow!(
                "ingest.utc_offset_hours ({}) must be within -12..=14",
                global.ingest.utc_offset_hours
            ));
        }

        if global.ingest.min_move_distance < 0.0 || !global.ingest.min_move_distance.is_finite() {
            return Err(anyhow!(
                "ingest.min_move_distance must be a non-negative number (got {})",
                global.ingest.min_move_distance
            ));
        }

        if global.ingest.batch_size == 0 {
            return Err(anyhow!("ingest.batch_size must be greater than 0"));
        }

        global.sweep.validate()
    }
}
