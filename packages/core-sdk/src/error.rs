use thiserror::Error;

use crate::models::ImageId;

/**
 * \brief 替代文本生成流程中的错误分类。每种错误只影响单张图片的本次生成。
 */
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("cannot resolve image {id}: {reason}")]
    Resolution { id: ImageId, reason: String },

    #[error("fetch image failed: {0}")]
    Fetch(String),

    #[error("generation api failed: {0}")]
    Api(String),

    #[error("unexpected response format: {0}")]
    UnexpectedResponseFormat(String),

    #[error("media store error: {0}")]
    Storage(String),
}

impl GenerationError {
    /**
     * \brief 稳定的错误类别标识，用于结构化日志。
     */
    pub fn kind(&self) -> &'static str {
        match self {
            GenerationError::Configuration(_) => "ConfigurationError",
            GenerationError::Resolution { .. } => "ResolutionError",
            GenerationError::Fetch(_) => "FetchError",
            GenerationError::Api(_) => "ApiError",
            GenerationError::UnexpectedResponseFormat(_) => "UnexpectedResponseFormat",
            GenerationError::Storage(_) => "StorageError",
        }
    }

    /**
     * \brief 面向调用方的消息。配置错误只返回通用提示，细节仅写日志。
     */
    pub fn public_message(&self) -> String {
        match self {
            GenerationError::Configuration(_) => "alt text generation is not configured".to_string(),
            other => other.to_string(),
        }
    }

    pub(crate) fn storage(err: anyhow::Error) -> Self {
        GenerationError::Storage(format!("{:#}", err))
    }
}

/**
 * \brief 派发阶段的错误，与生成结果无关。
 */
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("task queue is closed")]
    QueueClosed,

    #[error("media store error: {0}")]
    Storage(String),
}
