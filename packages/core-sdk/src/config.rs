use std::{path::PathBuf, time::Duration};

/** \brief 默认的 Gemini API 基地址。 */
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";
/** \brief 默认视觉模型。 */
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

/**
 * \brief 生成器的运行参数（地址、模型与超时）。
 */
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub api_base: String,
    pub model: String,
    pub fetch_timeout: Duration,
    pub api_timeout: Duration,
    pub total_timeout: Duration,
    /** \brief 允许拉取的最大图片字节数。 */
    pub max_image_bytes: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            fetch_timeout: Duration::from_secs(30),
            api_timeout: Duration::from_secs(60),
            total_timeout: Duration::from_secs(120),
            max_image_bytes: crate::llm::MAX_IMAGE_BYTES,
        }
    }
}

/**
 * \brief 进程级配置，来源于环境变量（可由 .env 提供）。
 */
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub log_dir: PathBuf,
    pub concurrency: usize,
    pub generator: GeneratorConfig,
}

impl AppConfig {
    /**
     * \brief 读取 .env 与环境变量；无法解析的数值回退为默认值。
     */
    pub fn from_env() -> Self {
        if let Ok(path) = dotenvy::dotenv() {
            eprintln!(".env read successfully from {}", path.display());
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = GeneratorConfig::default();
        let secs = |key: &str, default: Duration| {
            lookup(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .filter(|v| *v > 0)
                .map(Duration::from_secs)
                .unwrap_or(default)
        };
        Self {
            db_path: lookup("ALTLENS_DB")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("altlens.db")),
            log_dir: lookup("ALTLENS_LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("logs")),
            concurrency: lookup("ALTLENS_CONCURRENCY")
                .and_then(|v| v.trim().parse::<usize>().ok())
                .filter(|v| *v > 0)
                .unwrap_or(4),
            generator: GeneratorConfig {
                api_base: lookup("ALTLENS_API_BASE").unwrap_or(defaults.api_base),
                model: lookup("ALTLENS_MODEL").unwrap_or(defaults.model),
                fetch_timeout: secs("ALTLENS_FETCH_TIMEOUT_SECS", defaults.fetch_timeout),
                api_timeout: secs("ALTLENS_API_TIMEOUT_SECS", defaults.api_timeout),
                total_timeout: secs("ALTLENS_TOTAL_TIMEOUT_SECS", defaults.total_timeout),
                max_image_bytes: lookup("ALTLENS_MAX_IMAGE_BYTES")
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .filter(|v| *v > 0)
                    .unwrap_or(defaults.max_image_bytes),
            },
        }
    }
}
