//! 动作日志 - 记录每一次复制、更新、删除

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// 一条动作记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogRecord {
    /// 副本中原本不存在，新复制
    Replicated { source: PathBuf, replica: PathBuf },
    /// 修改时间不同，覆盖副本
    Updated { source: PathBuf, replica: PathBuf },
    /// 源中已不存在，从副本删除
    Removed { replica: PathBuf },
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogRecord::Replicated { source, replica } => write!(
                f,
                "{} has been replicated into {}.",
                source.display(),
                replica.display()
            ),
            LogRecord::Updated { source, replica } => write!(
                f,
                "{} has been updated into {}.",
                source.display(),
                replica.display()
            ),
            LogRecord::Removed { replica } => write!(f, "{} has been removed.", replica.display()),
        }
    }
}

/// 动作记录的接收端
pub trait ActionSink {
    fn record(&mut self, record: &LogRecord) -> io::Result<()>;
}

impl<S: ActionSink + ?Sized> ActionSink for &mut S {
    fn record(&mut self, record: &LogRecord) -> io::Result<()> {
        (**self).record(record)
    }
}

impl ActionSink for Vec<LogRecord> {
    fn record(&mut self, record: &LogRecord) -> io::Result<()> {
        self.push(record.clone());
        Ok(())
    }
}

/// 行式动作日志，每条记录写入后立即 flush
pub struct ActionLog<W: Write> {
    writer: W,
    echo: Option<Box<dyn Write + Send>>,
}

impl ActionLog<File> {
    /// 以截断模式打开日志文件，上一次运行的内容会被丢弃
    pub fn create(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        Ok(Self::new(file, true))
    }
}

impl<W: Write> ActionLog<W> {
    /// `echo` 为 true 时同时输出到标准输出
    pub fn new(writer: W, echo: bool) -> Self {
        let echo: Option<Box<dyn Write + Send>> = if echo {
            Some(Box::new(io::stdout()))
        } else {
            None
        };
        Self { writer, echo }
    }

    /// 回显到指定输出而不是标准输出
    pub fn with_echo(writer: W, echo: impl Write + Send + 'static) -> Self {
        Self {
            writer,
            echo: Some(Box::new(echo)),
        }
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> ActionSink for ActionLog<W> {
    fn record(&mut self, record: &LogRecord) -> io::Result<()> {
        let line = record.to_string();
        writeln!(self.writer, "{}", line)?;
        self.writer.flush()?;

        // 回显端关闭（如管道断开）时返回错误而不是 panic
        if let Some(echo) = self.echo.as_mut() {
            writeln!(echo, "{}", line)?;
            echo.flush()?;
        }
        debug!("动作记录: {}", line);

        Ok(())
    }
}
