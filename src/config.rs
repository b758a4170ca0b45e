//! 应用配置模块

use crate::cli::Cli;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 配置目录覆盖变量
pub const CONFIG_DIR_ENV: &str = "FOLDERSYNC_CONFIG_DIR";

const CONFIG_FILE: &str = "config.json";

/// 镜像任务配置（由命令行解析得到）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorConfig {
    pub source: PathBuf,
    pub replica: PathBuf,
    pub interval: Duration,
    pub log_file: PathBuf,
    /// 只执行一轮
    pub once: bool,
}

impl From<Cli> for MirrorConfig {
    fn from(cli: Cli) -> Self {
        Self {
            source: cli.source,
            replica: cli.replica,
            interval: Duration::from_secs(cli.interval),
            log_file: cli.log_file,
            once: cli.once,
        }
    }
}

/// 应用配置目录：环境变量优先，其次是系统配置目录下的 foldersync
pub fn app_config_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV).filter(|v| !v.is_empty()) {
        return PathBuf::from(dir);
    }

    crate::dirs::config_dir()
        .map(|p| p.join("foldersync"))
        .unwrap_or_else(|| PathBuf::from(".foldersync"))
}

/// 从 config.json 读取一个配置段，文件或字段缺失、格式错误时返回 None
pub fn load_section<T: DeserializeOwned>(config_dir: &Path, key: &str) -> Option<T> {
    let content = fs::read_to_string(config_dir.join(CONFIG_FILE)).ok()?;
    let config = serde_json::from_str::<serde_json::Value>(&content).ok()?;
    let section = config.get(key)?.clone();
    serde_json::from_value(section).ok()
}
