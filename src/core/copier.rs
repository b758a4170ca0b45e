//! 副本写入 - 保留元数据的复制和删除

use filetime::{set_file_times, set_symlink_file_times, FileTime};
use std::fs;
use std::io;
use std::path::Path;

/// 把源条目复制到副本路径，不跟随符号链接
///
/// 普通文件复制内容、权限位和访问/修改时间；符号链接按原目标重建，
/// 并设置链接自身的时间。副本路径上已有的文件或链接先被移除，
/// 这样既不会写穿旧链接，也不会被只读副本挡住。
pub fn copy_entry(source: &Path, replica: &Path) -> io::Result<()> {
    let metadata = fs::symlink_metadata(source)?;
    remove_existing_leaf(replica)?;

    let accessed = FileTime::from_last_access_time(&metadata);
    let modified = FileTime::from_last_modification_time(&metadata);

    if metadata.file_type().is_symlink() {
        let target = fs::read_link(source)?;
        create_symlink(source, &target, replica)?;
        set_symlink_file_times(replica, accessed, modified)?;
    } else {
        fs::copy(source, replica)?;
        fs::set_permissions(replica, metadata.permissions())?;
        set_file_times(replica, accessed, modified)?;
    }

    Ok(())
}

/// 删除副本条目：真实目录整棵删除，其余（文件、链接）单个删除
pub fn remove_entry(path: &Path) -> io::Result<()> {
    if fs::symlink_metadata(path)?.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

fn remove_existing_leaf(path: &Path) -> io::Result<()> {
    match fs::symlink_metadata(path) {
        // 目录留给后续复制报错，不在这里删
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => fs::remove_file(path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(unix)]
fn create_symlink(_source: &Path, target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn create_symlink(source: &Path, target: &Path, link: &Path) -> io::Result<()> {
    // Windows 需要区分文件链接和目录链接
    let points_to_dir = fs::metadata(source).map(|m| m.is_dir()).unwrap_or(false);
    if points_to_dir {
        std::os::windows::fs::symlink_dir(target, link)
    } else {
        std::os::windows::fs::symlink_file(target, link)
    }
}
