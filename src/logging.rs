//! 诊断日志 - tracing 输出的文件写入和大小管理
//!
//! 与动作日志无关：动作日志由命令行指定，这里只记录程序运行状况。

use serde::Deserialize;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing_subscriber::fmt::MakeWriter;

const LOG_FILE_NAME: &str = "foldersync.log";

/// 日志配置
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogConfig {
    /// 是否启用日志记录
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// 最大日志文件大小（MB）
    #[serde(default = "default_max_size_mb")]
    pub max_size_mb: u32,
    /// 日志级别: "error", "warn", "info", "debug", "trace"
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_enabled() -> bool {
    true
}

fn default_max_size_mb() -> u32 {
    5
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            max_size_mb: default_max_size_mb(),
            level: default_level(),
        }
    }
}

impl LogConfig {
    /// 从配置文件加载日志配置
    pub fn load(config_dir: &Path) -> Self {
        let mut config: Self = crate::config::load_section(config_dir, "log").unwrap_or_default();
        config.max_size_mb = config.max_size_mb.clamp(1, 100);
        config
    }

    /// 将配置的日志级别转换为 tracing Level
    pub fn tracing_level(&self) -> tracing::Level {
        match self.level.to_lowercase().as_str() {
            "error" => tracing::Level::ERROR,
            "warn" => tracing::Level::WARN,
            "debug" => tracing::Level::DEBUG,
            "trace" => tracing::Level::TRACE,
            _ => tracing::Level::INFO,
        }
    }
}

type SharedWriter = Arc<Mutex<Option<BufWriter<File>>>>;

fn lock(writer: &SharedWriter) -> MutexGuard<'_, Option<BufWriter<File>>> {
    writer.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// 带大小限制的日志写入器
///
/// 超过上限时当前文件改名为 `foldersync.log.old`，只保留一份旧日志。
#[derive(Clone)]
pub struct SizeRotatingWriter {
    file_path: PathBuf,
    max_size: u64,
    writer: SharedWriter,
}

impl SizeRotatingWriter {
    pub fn new(log_dir: &Path, max_size_mb: u32) -> io::Result<Self> {
        fs::create_dir_all(log_dir)?;

        let file_path = log_dir.join(LOG_FILE_NAME);
        let max_size = (max_size_mb as u64) * 1024 * 1024;

        let writer = Self::open_file(&file_path, max_size)?;

        Ok(Self {
            file_path,
            max_size,
            writer: Arc::new(Mutex::new(Some(writer))),
        })
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    fn open_file(file_path: &Path, max_size: u64) -> io::Result<BufWriter<File>> {
        if exceeds(file_path, max_size) {
            Self::rotate_log(file_path)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(file_path)?;

        Ok(BufWriter::new(file))
    }

    /// 轮转日志文件
    fn rotate_log(file_path: &Path) -> io::Result<()> {
        let backup_path = file_path.with_extension("log.old");

        if backup_path.exists() {
            fs::remove_file(&backup_path)?;
        }

        fs::rename(file_path, &backup_path)
    }

    /// 超限时关闭、轮转并重新打开
    fn rotate_if_needed(file_path: &Path, max_size: u64, writer: &SharedWriter) -> io::Result<()> {
        if !exceeds(file_path, max_size) {
            return Ok(());
        }

        let mut guard = lock(writer);
        if let Some(mut w) = guard.take() {
            let _ = w.flush();
        }

        Self::rotate_log(file_path)?;
        *guard = Some(Self::open_file(file_path, max_size)?);
        Ok(())
    }
}

fn exceeds(file_path: &Path, max_size: u64) -> bool {
    fs::metadata(file_path)
        .map(|m| m.len() > max_size)
        .unwrap_or(false)
}

/// 日志写入器包装
pub struct LogWriter {
    inner: SharedWriter,
    file_path: PathBuf,
    max_size: u64,
}

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = {
            let mut guard = lock(&self.inner);
            let writer = guard
                .as_mut()
                .ok_or_else(|| io::Error::other("writer not available"))?;
            let n = writer.write(buf)?;
            writer.flush()?;
            n
        };

        let _ = SizeRotatingWriter::rotate_if_needed(&self.file_path, self.max_size, &self.inner);
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        match lock(&self.inner).as_mut() {
            Some(writer) => writer.flush(),
            None => Ok(()),
        }
    }
}

impl<'a> MakeWriter<'a> for SizeRotatingWriter {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        let _ = Self::rotate_if_needed(&self.file_path, self.max_size, &self.writer);

        LogWriter {
            inner: self.writer.clone(),
            file_path: self.file_path.clone(),
            max_size: self.max_size,
        }
    }
}

/// 诊断日志目录（位于应用配置目录下）
pub fn get_log_dir() -> PathBuf {
    crate::config::app_config_dir().join("logs")
}
