use std::fs;
use std::io;
use std::path::Path;
use std::time::SystemTime;

/// 文件比较结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileRelation {
    /// 副本不存在
    Missing,
    /// 修改时间相同
    Equal,
    /// 修改时间不同（不区分新旧）
    Differs,
}

/// 文件比较器
///
/// 只比较修改时间，不看大小和内容。两端都用 `symlink_metadata`，
/// 符号链接比较的是链接本身的时间。
#[derive(Debug, Clone, Copy, Default)]
pub struct FileComparator;

impl FileComparator {
    pub fn new() -> Self {
        Self
    }

    /// 比较源文件和副本文件
    ///
    /// 副本不存在返回 `Missing`；源文件读取失败或副本的其它错误原样返回。
    pub fn compare(&self, source: &Path, replica: &Path) -> io::Result<FileRelation> {
        let src_mtime = modified_time(source)?;

        let repl_mtime = match modified_time(replica) {
            Ok(t) => t,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(FileRelation::Missing),
            Err(e) => return Err(e),
        };

        if src_mtime != repl_mtime {
            tracing::debug!(
                "文件时间不同: {} (src={:?}, dst={:?})",
                source.display(),
                src_mtime,
                repl_mtime
            );
            Ok(FileRelation::Differs)
        } else {
            Ok(FileRelation::Equal)
        }
    }
}

fn modified_time(path: &Path) -> io::Result<SystemTime> {
    fs::symlink_metadata(path)?.modified()
}
