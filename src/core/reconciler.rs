use crate::core::comparator::{FileComparator, FileRelation};
use crate::core::copier::{copy_entry, remove_entry};
use crate::core::error::{Result, SyncError};
use crate::core::journal::{ActionSink, LogRecord};
use crate::core::report::PassReport;
use std::collections::BTreeSet;
use std::ffi::{OsStr, OsString};
use std::fs;
use std::io;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// 单向镜像：让副本目录与源目录保持一致
///
/// 每次调用 [`Reconciler::reconcile`] 执行一轮完整同步，每个新增、更新、
/// 删除动作都写入 sink。遇到无法恢复的文件系统错误立即返回，不继续处理
/// 剩余条目。
pub struct Reconciler<S: ActionSink> {
    sink: S,
    comparator: FileComparator,
    copy: CopyFn,
}

type CopyFn = fn(&Path, &Path) -> io::Result<()>;

impl<S: ActionSink> Reconciler<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            comparator: FileComparator::new(),
            copy: copy_entry,
        }
    }

    #[cfg(test)]
    fn with_copy(sink: S, copy: CopyFn) -> Self {
        Self {
            sink,
            comparator: FileComparator::new(),
            copy,
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// 执行一轮同步
    pub fn reconcile(&mut self, source: &Path, replica: &Path) -> Result<PassReport> {
        let started = Instant::now();
        let mut report = PassReport::begin();

        debug!(
            "开始同步: {} -> {} ({})",
            source.display(),
            replica.display(),
            report.pass_id
        );

        self.sync_dir(source, replica, &mut report)?;
        report.finish(started.elapsed().as_millis() as u64);

        info!(
            "同步完成: 新增 {}, 更新 {}, 删除 {}, 未变 {}, 目录 {}, 耗时 {}ms",
            report.files_replicated,
            report.files_updated,
            report.entries_removed,
            report.files_unchanged,
            report.dirs_visited,
            report.duration_ms
        );

        Ok(report)
    }

    fn sync_dir(&mut self, source: &Path, replica: &Path, report: &mut PassReport) -> Result<()> {
        report.dirs_visited += 1;

        let src_names = list_or_create(source)?;
        list_or_create(replica)?;

        for name in &src_names {
            let src_path = source.join(name);
            let repl_path = replica.join(name);

            // 子目录（包括指向目录的链接）递归处理，目录本身不比较也不记录
            if is_dir(&src_path) {
                self.claim_replica_dir(&repl_path, report)?;
                self.sync_dir(&src_path, &repl_path, report)?;
                continue;
            }

            self.sync_file(&src_path, &repl_path, report)?;
        }

        // 上面的复制改变了副本内容，删除前重新列出两边
        let src_names = list_dir(source)?;
        let repl_names = list_dir(replica)?;

        let present: BTreeSet<&OsStr> = src_names.iter().map(OsString::as_os_str).collect();

        if !prune_gate(src_names.len(), repl_names.len()) {
            let left = repl_names
                .iter()
                .filter(|name| !present.contains(name.as_os_str()))
                .count();
            if left > 0 {
                debug!("数量相同，跳过删除: {} 中有 {} 个多余条目", replica.display(), left);
                report.prune_skipped += left as u32;
            }
            return Ok(());
        }

        for name in &repl_names {
            if present.contains(name.as_os_str()) {
                continue;
            }

            let repl_path = replica.join(name);
            remove_entry(&repl_path).map_err(|e| SyncError::remove(&repl_path, e))?;
            self.emit(LogRecord::Removed { replica: repl_path }, report)?;
        }

        Ok(())
    }

    /// 确保副本路径是真实目录，不会经由旧链接写到别处
    fn claim_replica_dir(&mut self, replica: &Path, report: &mut PassReport) -> Result<()> {
        match fs::symlink_metadata(replica) {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => {
                remove_entry(replica).map_err(|e| SyncError::remove(replica, e))?;
                self.emit(
                    LogRecord::Removed {
                        replica: replica.to_path_buf(),
                    },
                    report,
                )
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SyncError::read_dir(replica, e)),
        }
    }

    fn sync_file(&mut self, source: &Path, replica: &Path, report: &mut PassReport) -> Result<()> {
        let record = match self.comparator.compare(source, replica) {
            Ok(FileRelation::Equal) => {
                report.files_unchanged += 1;
                return Ok(());
            }
            Ok(FileRelation::Differs) => match (self.copy)(source, replica) {
                Ok(()) => LogRecord::Updated {
                    source: source.to_path_buf(),
                    replica: replica.to_path_buf(),
                },
                Err(e) => {
                    warn!("更新失败，重试一次: {} ({})", replica.display(), e);
                    (self.copy)(source, replica).map_err(|e| SyncError::copy(source, replica, e))?;
                    replicated(source, replica)
                }
            },
            Ok(FileRelation::Missing) => {
                (self.copy)(source, replica).map_err(|e| SyncError::copy(source, replica, e))?;
                replicated(source, replica)
            }
            Err(e) => {
                // 比较阶段出错（包括源文件刚被删掉），按新文件处理
                debug!("无法比较 {}: {}，直接复制", source.display(), e);
                (self.copy)(source, replica).map_err(|e| SyncError::copy(source, replica, e))?;
                replicated(source, replica)
            }
        };

        self.emit(record, report)
    }

    fn emit(&mut self, record: LogRecord, report: &mut PassReport) -> Result<()> {
        self.sink.record(&record).map_err(SyncError::Log)?;
        report.count(&record);
        Ok(())
    }
}

/// 删除阶段的触发条件：只比较条目数量，副本多于源时才扫描多余条目
pub fn prune_gate(source_len: usize, replica_len: usize) -> bool {
    source_len < replica_len
}

fn replicated(source: &Path, replica: &Path) -> LogRecord {
    LogRecord::Replicated {
        source: source.to_path_buf(),
        replica: replica.to_path_buf(),
    }
}

/// 跟随链接判断是否为目录
fn is_dir(path: &Path) -> bool {
    fs::metadata(path)
        .map(|m| m.is_dir())
        .unwrap_or(false)
}

/// 按名称排序列出目录的直接子项
fn list_dir(path: &Path) -> Result<Vec<OsString>> {
    read_names(path).map_err(|e| SyncError::read_dir(path, e))
}

/// 列出目录，不存在时先递归创建
fn list_or_create(path: &Path) -> Result<Vec<OsString>> {
    match read_names(path) {
        Ok(names) => Ok(names),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("目录不存在，自动创建: {}", path.display());
            fs::create_dir_all(path).map_err(|e| SyncError::create_dir(path, e))?;
            list_dir(path)
        }
        Err(e) => Err(SyncError::read_dir(path, e)),
    }
}

fn read_names(path: &Path) -> io::Result<Vec<OsString>> {
    let mut names = fs::read_dir(path)?
        .map(|entry| entry.map(|e| e.file_name()))
        .collect::<io::Result<Vec<_>>>()?;
    names.sort();
    Ok(names)
}
