//! 配置文件定位与加载

use anyhow::{Context, Result};
use rover_tools::RoverConfig;
use std::path::{Path, PathBuf};
use tracing::debug;

/// 默认配置文件路径（`<config_dir>/rover/config.toml`）
pub fn default_config_path() -> Option<PathBuf> {
    let mut path = dirs::config_dir()?;
    path.push("rover");
    path.push("config.toml");
    Some(path)
}

/// 加载配置
///
/// - 显式指定的文件必须存在且合法
/// - 未指定时尝试默认路径，不存在则使用默认配置
pub fn load_config(explicit: Option<&Path>) -> Result<RoverConfig> {
    if let Some(path) = explicit {
        return RoverConfig::load_from_file(path)
            .with_context(|| format!("加载配置文件失败: {}", path.display()));
    }

    match default_config_path() {
        Some(path) if path.exists() => {
            debug!("Loading config from {}", path.display());
            RoverConfig::load_from_file(&path)
                .with_context(|| format!("加载配置文件失败: {}", path.display()))
        },
        _ => Ok(RoverConfig::default()),
    }
}
