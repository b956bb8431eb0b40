use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use crate::{
    config::GeneratorConfig,
    error::GenerationError,
    llm::VisionClient,
    models::{GenerationOutcome, ImageId},
    sanitize::sanitize_alt_text,
    store::{MediaStore, SettingsStore},
};

/**
 * \brief 替代文本生成器：判断是否需要生成、调用视觉模型、校验结果并写回元数据。
 * \details 每次调用最多一次拉图、一次 API 请求、一次写入；任何失败都只终止本次调用，不做重试。
 */
#[derive(Clone)]
pub struct Generator {
    store: Arc<dyn MediaStore>,
    settings: Arc<dyn SettingsStore>,
    client: VisionClient,
    config: GeneratorConfig,
}

impl Generator {
    pub fn new(
        store: Arc<dyn MediaStore>,
        settings: Arc<dyn SettingsStore>,
        config: GeneratorConfig,
    ) -> anyhow::Result<Self> {
        let client = VisionClient::new(&config)?;
        Ok(Self {
            store,
            settings,
            client,
            config,
        })
    }

    /**
     * \brief 为指定图片生成替代文本。已有替代文本时返回 `Skipped`，不发起任何网络请求。
     */
    #[tracing::instrument(name = "generate_alt_text", skip_all, fields(image_id = %id))]
    pub async fn generate(&self, id: ImageId) -> Result<GenerationOutcome, GenerationError> {
        let result = self.run(id).await;
        match &result {
            Ok(GenerationOutcome::Generated(text)) => {
                tracing::info!(image_id = %id, chars = text.chars().count(), "alt text generated");
            }
            Ok(GenerationOutcome::Skipped(_)) => {
                tracing::debug!(image_id = %id, "alt text already present, skipped");
            }
            Err(e) => {
                tracing::warn!(image_id = %id, kind = e.kind(), error = %e, "alt text generation failed");
            }
        }
        result
    }

    async fn run(&self, id: ImageId) -> Result<GenerationOutcome, GenerationError> {
        let deadline = Instant::now() + self.config.total_timeout;

        let settings = self.settings.clone();
        let api_key = off_runtime(move || settings.api_key())
            .await?
            .ok_or_else(|| GenerationError::Configuration("gemini api key is not set".to_string()))?;

        let store = self.store.clone();
        let record = off_runtime(move || store.get_image(id))
            .await?
            .ok_or_else(|| GenerationError::Resolution {
                id,
                reason: "record not found".to_string(),
            })?;
        if !record.is_image() {
            return Err(GenerationError::Resolution {
                id,
                reason: format!("mime type {} is not an image", record.mime_type),
            });
        }
        let url = record.url.trim();
        if url.is_empty() {
            return Err(GenerationError::Resolution {
                id,
                reason: "image has no public url".to_string(),
            });
        }

        if !record.needs_alt_text() {
            return Ok(GenerationOutcome::Skipped(
                record.alt_text.clone().unwrap_or_default(),
            ));
        }

        let budget = phase_budget(deadline, self.config.fetch_timeout)
            .ok_or_else(|| GenerationError::Fetch("generation time budget exhausted".to_string()))?;
        let image = self.client.fetch_image(url, budget).await?;

        let budget = phase_budget(deadline, self.config.api_timeout)
            .ok_or_else(|| GenerationError::Api("generation time budget exhausted".to_string()))?;
        let raw = self.client.describe_image(&api_key, &image, budget).await?;

        let alt_text = sanitize_alt_text(&raw);
        if alt_text.is_empty() {
            return Err(GenerationError::UnexpectedResponseFormat(
                "response text is empty after sanitizing".to_string(),
            ));
        }

        let store = self.store.clone();
        let written = alt_text.clone();
        off_runtime(move || store.set_alt_text(id, &written)).await?;
        Ok(GenerationOutcome::Generated(alt_text))
    }
}

/**
 * \brief 在阻塞线程池上执行存储操作，SQLite 锁等待不会占住运行时线程。
 */
async fn off_runtime<T, F>(f: F) -> Result<T, GenerationError>
where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| GenerationError::Storage(format!("store task failed: {}", e)))?
        .map_err(GenerationError::storage)
}

/**
 * \brief 阶段超时与剩余总预算取较小者；预算耗尽时返回 None。
 */
fn phase_budget(deadline: Instant, phase: Duration) -> Option<Duration> {
    let remaining = deadline.saturating_duration_since(Instant::now());
    if remaining.is_zero() {
        None
    } else {
        Some(remaining.min(phase))
    }
}
