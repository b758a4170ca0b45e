//! 同步错误类型

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// 同步过程中的致命错误
///
/// 任何一个变体都会中止当前同步轮次，由调用方决定是否退出进程。
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("failed to create directory {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to list directory {}: {source}", .path.display())]
    ReadDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to copy {} into {}: {source}", .from.display(), .to.display())]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to remove {}: {source}", .path.display())]
    Remove {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write action log: {0}")]
    Log(#[source] io::Error),

    #[error("failed to scan {}: {source}", .path.display())]
    Scan {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl SyncError {
    pub(crate) fn create_dir(path: &Path, source: io::Error) -> Self {
        Self::CreateDir {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn read_dir(path: &Path, source: io::Error) -> Self {
        Self::ReadDir {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn copy(from: &Path, to: &Path, source: io::Error) -> Self {
        Self::Copy {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
            source,
        }
    }

    pub(crate) fn remove(path: &Path, source: io::Error) -> Self {
        Self::Remove {
            path: path.to_path_buf(),
            source,
        }
    }

    /// 出错的路径（日志写入错误没有路径）
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::CreateDir { path, .. }
            | Self::ReadDir { path, .. }
            | Self::Remove { path, .. }
            | Self::Scan { path, .. } => Some(path),
            Self::Copy { to, .. } => Some(to),
            Self::Log(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
