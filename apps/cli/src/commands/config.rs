//! 配置管理命令

use crate::settings::default_config_path;
use anyhow::{Context, Result};
use clap::Subcommand;
use rover_tools::RoverConfig;
use std::fs;
use std::path::{Path, PathBuf};

/// 配置命令
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// 显示生效的配置（TOML）
    Show,

    /// 检查配置文件
    Check {
        /// 配置文件（默认检查当前生效的配置）
        file: Option<PathBuf>,
    },

    /// 写入默认配置文件
    Init {
        /// 输出路径（默认 <config_dir>/rover/config.toml）
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// 覆盖已存在的文件
        #[arg(long)]
        force: bool,
    },
}

impl ConfigCommand {
    pub fn execute(&self, config: &RoverConfig) -> Result<()> {
        match self {
            ConfigCommand::Show => {
                print!("{}", config.to_toml_string()?);
                Ok(())
            },

            ConfigCommand::Check { file } => Self::check_(file.as_deref(), config),

            ConfigCommand::Init { output, force } => Self::init_(output.clone(), *force),
        }
    }

    fn check_(file: Option<&Path>, effective: &RoverConfig) -> Result<()> {
        let config = match file {
            Some(path) => RoverConfig::load_from_file(path)
                .with_context(|| format!("配置无效: {}", path.display()))?,
            None => effective.clone(),
        };
        config.validate().context("配置无效")?;

        let labels = config.label_map()?;
        println!("✅ 配置有效");
        println!("  串口: {}", config.serial.port.as_deref().unwrap_or("(自动发现)"));
        println!("  波特率: {}", config.serial.baud);
        println!("  去抖阈值: {}", config.debounce.stability_threshold);
        println!("  冷却: {} ms", config.arbiter.cooldown_ms);
        println!("  避障阈值: {} cm", config.arbiter.obstacle_threshold_cm);
        println!("  映射规则: {} 条", labels.rules().len());
        Ok(())
    }

    fn init_(output: Option<PathBuf>, force: bool) -> Result<()> {
        let path = match output {
            Some(path) => path,
            None => default_config_path().ok_or_else(|| anyhow::anyhow!("无法确定配置目录"))?,
        };

        if path.exists() && !force {
            anyhow::bail!("配置文件已存在: {}（使用 --force 覆盖）", path.display());
        }
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).context("创建配置目录失败")?;
        }

        let content = RoverConfig::default().to_toml_string()?;
        fs::write(&path, content).context("写入配置文件失败")?;
        println!("✅ 已写入默认配置: {}", path.display());
        Ok(())
    }
}
