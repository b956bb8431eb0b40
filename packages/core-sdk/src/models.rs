use std::fmt;

use serde::{Deserialize, Serialize};

/**
 * \brief 媒体库中图片记录的主键。
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageId(pub i64);

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/**
 * \brief 媒体库图片记录。
 */
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRecord {
    /** \brief 自增主键 */
    pub id: ImageId,
    /** \brief 图片的公开访问地址 */
    pub url: String,
    /** \brief MIME 类型，需以 image/ 开头才会被处理 */
    pub mime_type: String,
    /** \brief 替代文本，空值表示需要生成 */
    pub alt_text: Option<String>,
}

impl ImageRecord {
    pub fn is_image(&self) -> bool {
        is_image_mime(&self.mime_type)
    }

    /**
     * \brief 替代文本为空或仅含空白时返回 true。
     */
    pub fn needs_alt_text(&self) -> bool {
        self.alt_text
            .as_deref()
            .map(|s| s.trim().is_empty())
            .unwrap_or(true)
    }
}

pub fn is_image_mime(mime_type: &str) -> bool {
    mime_type.trim().to_ascii_lowercase().starts_with("image/")
}

/**
 * \brief 单次生成的结果。
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    /** \brief 新生成并已写回的替代文本 */
    Generated(String),
    /** \brief 已有替代文本，未做任何改动 */
    Skipped(String),
}

impl GenerationOutcome {
    pub fn alt_text(&self) -> &str {
        match self {
            GenerationOutcome::Generated(text) | GenerationOutcome::Skipped(text) => text,
        }
    }
}

/**
 * \brief 允许在后台执行的操作。封闭枚举，不从外部字符串解析行为。
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackgroundTask {
    GenerateAltText(ImageId),
}

impl BackgroundTask {
    pub fn image_id(&self) -> ImageId {
        match self {
            BackgroundTask::GenerateAltText(id) => *id,
        }
    }
}

/**
 * \brief 单图生成接口的返回结构。
 */
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SingleGenerationResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/**
 * \brief 批量补全接口的返回结构，仅表示派发是否成功。
 */
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DispatchResponse {
    pub success: bool,
}
