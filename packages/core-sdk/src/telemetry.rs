use std::{fs::OpenOptions, path::Path, sync::Mutex};

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_FILE: &str = "altlens.log";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())
}

/**
 * \brief 初始化日志：开启文件日志时写入 `{log_dir}/altlens.log`，否则输出到标准输出。
 * \details 文件无法创建时回退到标准输出；重复初始化会被忽略。
 */
pub fn init(file_logging: bool, log_dir: &Path) {
    if file_logging {
        if let Err(e) = init_to_file(log_dir) {
            eprintln!("file logging unavailable, falling back to stdout: {:#}", e);
            init_to_stdout();
        }
    } else {
        init_to_stdout();
    }
}

pub fn init_to_stdout() {
    let _ = tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer().with_ansi(true))
        .try_init();
}

/**
 * \brief 以追加方式写入日志文件，不带 ANSI 颜色。
 */
pub fn init_to_file(log_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(log_dir)?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join(LOG_FILE))?;
    let _ = tracing_subscriber::registry()
        .with(env_filter())
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false),
        )
        .try_init();
    Ok(())
}
