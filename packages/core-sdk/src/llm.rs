use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::header::CONTENT_TYPE;
use serde_json::{json, Value};

use crate::{config::GeneratorConfig, error::GenerationError};

/** \brief 固定的生成指令。 */
pub const ALT_TEXT_PROMPT: &str =
    "Describe the following image for use as alt text. Return just the text to be used in the alt attribute.";

/** \brief 以 inlineData 上传时声明的 MIME 类型。 */
pub const INLINE_MIME_TYPE: &str = "image/jpeg";

/** \brief inlineData 允许的默认最大图片字节数。 */
pub const MAX_IMAGE_BYTES: usize = 20 * 1024 * 1024;

/**
 * \brief Gemini 视觉模型客户端，同时负责拉取原图。证书校验始终开启。
 */
#[derive(Debug, Clone)]
pub struct VisionClient {
    http: reqwest::Client,
    api_base: String,
    model: String,
    max_image_bytes: usize,
}

impl VisionClient {
    pub fn new(config: &GeneratorConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("altlens/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            api_base: normalize_gemini_base(&config.api_base),
            model: config.model.clone(),
            max_image_bytes: config.max_image_bytes,
        })
    }

    pub fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.api_base, self.model)
    }

    /**
     * \brief 拉取图片原始字节，每次都重新请求，不做缓存。
     */
    pub async fn fetch_image(&self, url: &str, timeout: Duration) -> Result<Vec<u8>, GenerationError> {
        let mut resp = self
            .http
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| GenerationError::Fetch(describe_transport_error(&e, timeout)))?;

        if !resp.status().is_success() {
            return Err(GenerationError::Fetch(format!(
                "{} returned {}",
                url,
                resp.status()
            )));
        }
        let limit = self.max_image_bytes;
        if let Some(len) = resp.content_length() {
            if len > limit as u64 {
                return Err(too_large(len, limit));
            }
        }

        // chunked bodies carry no length; the cap is enforced while reading
        let mut image = Vec::new();
        while let Some(chunk) = resp
            .chunk()
            .await
            .map_err(|e| GenerationError::Fetch(describe_transport_error(&e, timeout)))?
        {
            if image.len() + chunk.len() > limit {
                return Err(GenerationError::Fetch(format!(
                    "image exceeds the {} byte limit",
                    limit
                )));
            }
            image.extend_from_slice(&chunk);
        }
        if image.is_empty() {
            return Err(GenerationError::Fetch(format!("{} returned an empty body", url)));
        }
        Ok(image)
    }

    /**
     * \brief 发送一次 generateContent 请求并取出首个候选的首段文本（未清洗）。
     */
    pub async fn describe_image(
        &self,
        api_key: &str,
        image: &[u8],
        timeout: Duration,
    ) -> Result<String, GenerationError> {
        let body = build_generate_body(ALT_TEXT_PROMPT, &STANDARD.encode(image));

        let resp = self
            .http
            .post(self.endpoint())
            .query(&[("key", api_key)])
            .header(CONTENT_TYPE, "application/json")
            .timeout(timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| GenerationError::Api(describe_transport_error(&e, timeout)))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| GenerationError::Api(describe_transport_error(&e, timeout)))?;

        if !status.is_success() {
            let message = extract_error_message(&text).unwrap_or(text);
            return Err(GenerationError::Api(format!("{} -> {}", status, message)));
        }

        let v: Value = serde_json::from_str(&text).map_err(|e| {
            GenerationError::UnexpectedResponseFormat(format!("body is not json: {}", e))
        })?;
        extract_gemini_text(&v).map(|s| s.to_string()).ok_or_else(|| {
            GenerationError::UnexpectedResponseFormat(
                "missing candidates[0].content.parts[0].text".to_string(),
            )
        })
    }
}

/**
 * \brief 构造单条多模态请求体。
 */
pub fn build_generate_body(prompt: &str, image_base64: &str) -> Value {
    json!({
        "contents": [{
            "parts": [
                {"text": prompt},
                {"inlineData": {"mimeType": INLINE_MIME_TYPE, "data": image_base64}}
            ]
        }]
    })
}

fn extract_gemini_text(v: &Value) -> Option<&str> {
    v.get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .get(0)?
        .get("text")?
        .as_str()
}

/**
 * \brief 从 Provider 的错误信封 `{error: {message}}` 中取出消息。
 */
fn extract_error_message(body: &str) -> Option<String> {
    let v: Value = serde_json::from_str(body).ok()?;
    v.get("error")?
        .get("message")?
        .as_str()
        .map(|s| s.to_string())
}

fn too_large(len: u64, limit: usize) -> GenerationError {
    GenerationError::Fetch(format!("image is {} bytes, limit is {}", len, limit))
}

fn describe_transport_error(err: &reqwest::Error, timeout: Duration) -> String {
    if err.is_timeout() {
        format!("timed out after {}s", timeout.as_secs_f32())
    } else {
        err.to_string()
    }
}

pub fn normalize_gemini_base(api_base: &str) -> String {
    let trimmed = api_base.trim_end_matches('/');
    if trimmed.ends_with("/v1")
        || trimmed.ends_with("/v1beta")
        || trimmed.contains("/v1/")
        || trimmed.contains("/v1beta/")
    {
        trimmed.to_string()
    } else {
        format!("{}/v1beta", trimmed)
    }
}
