use clap::Parser;
use foldersync_lib::cli::Cli;
use foldersync_lib::logging::{get_log_dir, LogConfig, SizeRotatingWriter};
use foldersync_lib::{ActionLog, MirrorConfig, Reconciler, Scheduler};
use std::process::ExitCode;
use tracing_subscriber::prelude::*;

/// 初始化日志系统
fn init_logging() {
    let log_dir = get_log_dir();
    let config = LogConfig::load(&foldersync_lib::config::app_config_dir());

    if !config.enabled {
        let _ = tracing::subscriber::set_global_default(tracing_subscriber::registry());
        return;
    }

    let env_filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(config.tracing_level().into())
        .from_env_lossy();

    match SizeRotatingWriter::new(&log_dir, config.max_size_mb) {
        Ok(file_writer) => {
            let file_layer = tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false);

            // 控制台输出走 stderr，stdout 留给动作记录
            let console_layer = tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false);

            let subscriber = tracing_subscriber::registry()
                .with(env_filter)
                .with(file_layer)
                .with(console_layer);
            let _ = tracing::subscriber::set_global_default(subscriber);
        }
        Err(_) => {
            // 文件日志创建失败，只输出到控制台
            let console_layer = tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false);

            let subscriber = tracing_subscriber::registry()
                .with(env_filter)
                .with(console_layer);
            let _ = tracing::subscriber::set_global_default(subscriber);
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // 参数错误只打印提示，不视为失败
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            print!("{}", e);
            return ExitCode::SUCCESS;
        }
    };

    init_logging();

    let config = MirrorConfig::from(cli);

    let action_log = match ActionLog::create(&config.log_file) {
        Ok(log) => log,
        Err(e) => {
            tracing::error!("无法打开动作日志 {}: {}", config.log_file.display(), e);
            eprintln!("{}: {}", config.log_file.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let mut scheduler = Scheduler::new(config, Reconciler::new(action_log));

    match scheduler.run().await {
        Ok(()) => ExitCode::SUCCESS,
        // 参数错误之外的失败都以状态 1 退出
        Err(e) => {
            tracing::error!("同步中止: {:#}", e);
            eprintln!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
