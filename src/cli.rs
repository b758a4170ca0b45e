//! 命令行参数

use clap::Parser;
use std::path::PathBuf;

pub const USAGE: &str =
    "Usage: foldersync <src_folder_path> <repl_folder_path> <sync_interval_in_sec> <log_file>";

/// Mirror a source folder onto a replica folder at a fixed interval
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "foldersync", version, about, override_usage = USAGE)]
pub struct Cli {
    /// Source folder (created empty if missing)
    pub source: PathBuf,

    /// Replica folder (created if missing)
    pub replica: PathBuf,

    /// Seconds to wait between synchronization passes
    #[arg(value_parser = parse_interval)]
    pub interval: u64,

    /// Action log file, must end in .txt
    #[arg(value_parser = parse_log_file)]
    pub log_file: PathBuf,

    /// Run a single pass and exit
    #[arg(long)]
    pub once: bool,
}

fn parse_interval(raw: &str) -> Result<u64, String> {
    let secs: u64 = raw
        .trim()
        .parse()
        .map_err(|_| "The sync interval should be an integer.".to_string())?;
    if secs == 0 {
        return Err("The sync interval should be a positive integer.".to_string());
    }
    Ok(secs)
}

fn parse_log_file(raw: &str) -> Result<PathBuf, String> {
    if !raw.ends_with(".txt") {
        return Err("Your log file should be a .txt file".to_string());
    }
    Ok(PathBuf::from(raw))
}
