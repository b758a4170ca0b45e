use filetime::{set_file_mtime, FileTime};
use foldersync_lib::core::find_stale_entries;
use foldersync_lib::{ActionLog, ActionSink, LogRecord, Reconciler, SyncError};
use pretty_assertions::assert_eq;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

struct Trees {
    _dir: TempDir,
    src: PathBuf,
    repl: PathBuf,
}

fn trees() -> Trees {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("source");
    let repl = dir.path().join("replica");
    fs::create_dir_all(&src).unwrap();
    Trees {
        _dir: dir,
        src,
        repl,
    }
}

fn write(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn pass(src: &Path, repl: &Path) -> Vec<String> {
    let mut reconciler = Reconciler::new(ActionLog::new(Vec::new(), false));
    reconciler.reconcile(src, repl).unwrap();
    let bytes = reconciler.into_sink().into_inner();
    String::from_utf8(bytes)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

fn mtime(path: &Path) -> FileTime {
    FileTime::from_last_modification_time(&fs::symlink_metadata(path).unwrap())
}

#[test]
fn first_pass_replicates_in_name_order() {
    let t = trees();
    write(&t.src.join("b.txt"), "b");
    write(&t.src.join("a.txt"), "a");
    write(&t.src.join("Z.txt"), "z");
    write(&t.src.join("sub").join("c.txt"), "c");

    let lines = pass(&t.src, &t.repl);

    let expected: Vec<String> = ["Z.txt", "a.txt", "b.txt"]
        .iter()
        .map(|n| {
            format!(
                "{} has been replicated into {}.",
                t.src.join(n).display(),
                t.repl.join(n).display()
            )
        })
        .chain(std::iter::once(format!(
            "{} has been replicated into {}.",
            t.src.join("sub").join("c.txt").display(),
            t.repl.join("sub").join("c.txt").display()
        )))
        .collect();
    assert_eq!(lines, expected);
    assert_eq!(fs::read_to_string(t.repl.join("sub").join("c.txt")).unwrap(), "c");
}

#[test]
fn second_pass_is_idempotent() {
    let t = trees();
    write(&t.src.join("a.txt"), "alpha");
    write(&t.src.join("nested").join("deep").join("b.bin"), "beta");

    assert_eq!(pass(&t.src, &t.repl).len(), 2);
    assert!(pass(&t.src, &t.repl).is_empty());
    assert_eq!(
        fs::read_to_string(t.repl.join("nested").join("deep").join("b.bin")).unwrap(),
        "beta"
    );
}

#[test]
fn identical_inputs_produce_identical_logs() {
    let t = trees();
    for name in ["m", "k", "q", "a"] {
        write(&t.src.join(name).join("f.txt"), name);
        write(&t.src.join(format!("{name}.txt")), name);
    }

    let first = pass(&t.src, &t.repl);
    fs::remove_dir_all(&t.repl).unwrap();
    let second = pass(&t.src, &t.repl);

    assert_eq!(first, second);
    assert_eq!(first.len(), 8);
}

#[test]
fn missing_roots_are_created() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("not").join("yet");
    let repl = dir.path().join("also").join("missing");

    let lines = pass(&src, &repl);

    assert!(lines.is_empty());
    assert!(src.is_dir());
    assert!(repl.is_dir());
}

#[test]
fn empty_subdirectory_is_mirrored_without_log() {
    let t = trees();
    fs::create_dir_all(t.src.join("sub")).unwrap();

    let lines = pass(&t.src, &t.repl);

    assert!(lines.is_empty());
    assert!(t.repl.join("sub").is_dir());
    assert_eq!(fs::read_dir(t.repl.join("sub")).unwrap().count(), 0);
}

#[test]
fn differing_mtime_updates_even_when_source_is_older() {
    let t = trees();
    write(&t.src.join("x.txt"), "new content");
    write(&t.repl.join("x.txt"), "old");
    set_file_mtime(t.src.join("x.txt"), FileTime::from_unix_time(1_000_000_000, 0)).unwrap();
    set_file_mtime(t.repl.join("x.txt"), FileTime::from_unix_time(1_700_000_000, 0)).unwrap();

    let lines = pass(&t.src, &t.repl);

    assert_eq!(
        lines,
        vec![format!(
            "{} has been updated into {}.",
            t.src.join("x.txt").display(),
            t.repl.join("x.txt").display()
        )]
    );
    assert_eq!(fs::read_to_string(t.repl.join("x.txt")).unwrap(), "new content");
    assert_eq!(mtime(&t.repl.join("x.txt")), mtime(&t.src.join("x.txt")));
}

#[test]
fn equal_mtime_skips_regardless_of_content() {
    let t = trees();
    write(&t.src.join("x.txt"), "source side");
    write(&t.repl.join("x.txt"), "replica side, longer");
    let stamp = FileTime::from_unix_time(1_650_000_000, 0);
    set_file_mtime(t.src.join("x.txt"), stamp).unwrap();
    set_file_mtime(t.repl.join("x.txt"), stamp).unwrap();

    assert!(pass(&t.src, &t.repl).is_empty());
    assert_eq!(
        fs::read_to_string(t.repl.join("x.txt")).unwrap(),
        "replica side, longer"
    );
}

#[test]
fn extra_replica_entries_removed_when_replica_has_more() {
    let t = trees();
    write(&t.src.join("a"), "a");
    write(&t.repl.join("b"), "b");
    write(&t.repl.join("c").join("inner").join("f"), "f");

    let lines = pass(&t.src, &t.repl);

    assert_eq!(
        lines,
        vec![
            format!(
                "{} has been replicated into {}.",
                t.src.join("a").display(),
                t.repl.join("a").display()
            ),
            format!("{} has been removed.", t.repl.join("b").display()),
            format!("{} has been removed.", t.repl.join("c").display()),
        ]
    );
    assert!(t.repl.join("a").exists());
    assert!(!t.repl.join("b").exists());
    assert!(!t.repl.join("c").exists());
}

#[test]
fn nested_removal_happens_at_each_level() {
    let t = trees();
    write(&t.src.join("dir").join("keep"), "k");
    write(&t.repl.join("dir").join("stale"), "s");

    let lines = pass(&t.src, &t.repl);

    assert_eq!(lines.len(), 2);
    assert_eq!(
        lines[1],
        format!("{} has been removed.", t.repl.join("dir").join("stale").display())
    );
    assert!(find_stale_entries(&t.src, &t.repl).unwrap().is_empty());
}

/// 模拟同步过程中有外部程序往源目录写入文件
struct ConcurrentWriter {
    records: Vec<LogRecord>,
    inject: Option<PathBuf>,
}

impl ActionSink for ConcurrentWriter {
    fn record(&mut self, record: &LogRecord) -> io::Result<()> {
        if let Some(path) = self.inject.take() {
            fs::write(path, "late arrival")?;
        }
        self.records.push(record.clone());
        Ok(())
    }
}

#[test]
fn deletion_skipped_when_relisted_counts_are_equal() {
    let t = trees();
    write(&t.src.join("a"), "a");
    write(&t.src.join("b"), "b");
    pass(&t.src, &t.repl);

    write(&t.repl.join("c"), "stale");
    write(&t.src.join("x"), "x");

    let mut reconciler = Reconciler::new(ConcurrentWriter {
        records: Vec::new(),
        inject: Some(t.src.join("y")),
    });
    let report = reconciler.reconcile(&t.src, &t.repl).unwrap();

    // 源 {a,b,x,y} 与副本 {a,b,c,x} 数量相同，c 被保留
    assert_eq!(report.files_replicated, 1);
    assert_eq!(report.entries_removed, 0);
    assert_eq!(reconciler.sink().records.len(), 1);
    assert!(t.repl.join("c").exists());
    assert_eq!(
        find_stale_entries(&t.src, &t.repl).unwrap(),
        vec![t.repl.join("c")]
    );

    // 下一轮 y 被复制后副本多出一项，c 被删除
    let lines = pass(&t.src, &t.repl);
    assert_eq!(
        lines,
        vec![
            format!(
                "{} has been replicated into {}.",
                t.src.join("y").display(),
                t.repl.join("y").display()
            ),
            format!("{} has been removed.", t.repl.join("c").display()),
        ]
    );
}

#[cfg(unix)]
#[test]
fn copies_keep_permissions_and_symlinks() {
    use std::os::unix::fs::PermissionsExt;

    let t = trees();
    write(&t.src.join("run.sh"), "#!/bin/sh\n");
    fs::set_permissions(t.src.join("run.sh"), fs::Permissions::from_mode(0o750)).unwrap();
    fs::create_dir_all(t.src.join("real")).unwrap();
    write(&t.src.join("real").join("inside"), "i");
    std::os::unix::fs::symlink("real", t.src.join("alias")).unwrap();
    std::os::unix::fs::symlink("run.sh", t.src.join("shortcut")).unwrap();

    pass(&t.src, &t.repl);

    let mode = fs::metadata(t.repl.join("run.sh")).unwrap().permissions().mode() & 0o777;
    assert_eq!(mode, 0o750);
    assert_eq!(mtime(&t.repl.join("run.sh")), mtime(&t.src.join("run.sh")));

    // 指向目录的链接被展开成真实目录
    let alias = fs::symlink_metadata(t.repl.join("alias")).unwrap();
    assert!(alias.is_dir());
    assert_eq!(fs::read_to_string(t.repl.join("alias").join("inside")).unwrap(), "i");

    // 指向文件的链接按原目标重建
    let shortcut = fs::symlink_metadata(t.repl.join("shortcut")).unwrap();
    assert!(shortcut.file_type().is_symlink());
    assert_eq!(fs::read_link(t.repl.join("shortcut")).unwrap(), Path::new("run.sh"));

    assert!(pass(&t.src, &t.repl).is_empty());
}

#[cfg(unix)]
#[test]
fn replica_link_at_directory_position_is_replaced() {
    let t = trees();
    write(&t.src.join("real").join("precious"), "keep me");
    write(&t.src.join("alias").join("only.txt"), "o");
    fs::create_dir_all(&t.repl).unwrap();
    // 旧副本里的 alias 指回源目录
    std::os::unix::fs::symlink(t.src.join("real"), t.repl.join("alias")).unwrap();

    let lines = pass(&t.src, &t.repl);

    assert_eq!(fs::read_to_string(t.src.join("real").join("precious")).unwrap(), "keep me");
    assert!(!t.src.join("real").join("only.txt").exists());
    assert!(fs::symlink_metadata(t.repl.join("alias")).unwrap().is_dir());
    assert_eq!(
        lines,
        vec![
            format!("{} has been removed.", t.repl.join("alias").display()),
            format!(
                "{} has been replicated into {}.",
                t.src.join("alias").join("only.txt").display(),
                t.repl.join("alias").join("only.txt").display()
            ),
            format!(
                "{} has been replicated into {}.",
                t.src.join("real").join("precious").display(),
                t.repl.join("real").join("precious").display()
            ),
        ]
    );
}

#[test]
fn replica_directory_in_place_of_file_is_fatal() {
    let t = trees();
    write(&t.src.join("x"), "file");
    set_file_mtime(t.src.join("x"), FileTime::from_unix_time(1_000_000_000, 0)).unwrap();
    write(&t.repl.join("x").join("nested"), "n");

    let mut reconciler = Reconciler::new(Vec::new());
    let err = reconciler.reconcile(&t.src, &t.repl).unwrap_err();

    assert!(matches!(err, SyncError::Copy { .. }));
    assert_eq!(err.path(), Some(t.repl.join("x").as_path()));
    assert!(t.repl.join("x").join("nested").exists());
    assert!(reconciler.sink().is_empty());
}

#[cfg(unix)]
#[test]
fn unreadable_source_directory_is_fatal() {
    use std::os::unix::fs::PermissionsExt;

    // root 不受权限位限制
    if !permission_bits_enforced() {
        return;
    }

    let t = trees();
    write(&t.src.join("locked").join("f"), "f");
    fs::set_permissions(t.src.join("locked"), fs::Permissions::from_mode(0o000)).unwrap();

    let mut reconciler = Reconciler::new(Vec::new());
    let err = reconciler.reconcile(&t.src, &t.repl).unwrap_err();
    fs::set_permissions(t.src.join("locked"), fs::Permissions::from_mode(0o755)).unwrap();

    assert!(matches!(err, SyncError::ReadDir { .. }));
    assert_eq!(err.path(), Some(t.src.join("locked").as_path()));
}

#[cfg(unix)]
fn permission_bits_enforced() -> bool {
    use std::os::unix::fs::PermissionsExt;

    let scratch = tempfile::tempdir().unwrap();
    let locked = scratch.path().join("locked");
    fs::create_dir(&locked).unwrap();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
    let denied = fs::read_dir(&locked).is_err();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
    denied
}

#[test]
fn action_log_file_matches_records() {
    let t = trees();
    write(&t.src.join("one.txt"), "1");
    let log_path = t.src.parent().unwrap().join("logs").join("run.txt");

    let log = ActionLog::create(&log_path).unwrap();
    let mut reconciler = Reconciler::new(log);
    reconciler.reconcile(&t.src, &t.repl).unwrap();

    let content = fs::read_to_string(&log_path).unwrap();
    assert_eq!(
        content,
        format!(
            "{} has been replicated into {}.\n",
            t.src.join("one.txt").display(),
            t.repl.join("one.txt").display()
        )
    );
}
