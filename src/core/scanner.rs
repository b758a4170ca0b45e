//! 分歧扫描 - 找出副本中源已不存在的条目（只读，不修改任何文件）

use crate::core::error::{Result, SyncError};
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// 返回副本中没有对应源条目的最上层路径
///
/// 多余目录只报告目录本身，不再深入其子项。副本根目录不存在时返回空列表。
pub fn find_stale_entries(source: &Path, replica: &Path) -> Result<Vec<PathBuf>> {
    if !replica.exists() {
        return Ok(Vec::new());
    }

    let mut stale = Vec::new();
    let mut walker = WalkDir::new(replica)
        .follow_links(false)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter();

    while let Some(entry) = walker.next() {
        let entry = entry.map_err(|e| scan_error(replica, e))?;
        let relative = match entry.path().strip_prefix(replica) {
            Ok(r) => r,
            Err(_) => continue,
        };

        let counterpart = source.join(relative);
        if counterpart.symlink_metadata().is_ok() {
            continue;
        }

        if entry.file_type().is_dir() {
            walker.skip_current_dir();
        }
        stale.push(entry.into_path());
    }

    if !stale.is_empty() {
        debug!("副本中有 {} 个多余条目", stale.len());
    }

    Ok(stale)
}

fn scan_error(replica: &Path, err: walkdir::Error) -> SyncError {
    let path = err.path().unwrap_or(replica).to_path_buf();
    let source = err
        .into_io_error()
        .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, "filesystem loop detected"));
    SyncError::Scan { path, source }
}
