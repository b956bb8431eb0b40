use std::sync::Arc;

use crate::{
    error::DispatchError,
    generator::Generator,
    models::{BackgroundTask, ImageId, SingleGenerationResponse},
    pool::JobQueue,
    store::MediaStore,
};

/**
 * \brief 调度协调器：决定以同步、上传后延迟或批量补全的方式调用生成器。
 */
#[derive(Clone)]
pub struct Coordinator {
    generator: Generator,
    store: Arc<dyn MediaStore>,
    queue: Arc<dyn JobQueue>,
}

impl Coordinator {
    pub fn new(generator: Generator, store: Arc<dyn MediaStore>, queue: Arc<dyn JobQueue>) -> Self {
        Self {
            generator,
            store,
            queue,
        }
    }

    /**
     * \brief 同步生成单张图片的替代文本，调用方等待结果。
     */
    pub async fn generate_single(&self, id: ImageId) -> SingleGenerationResponse {
        match self.generator.generate(id).await {
            Ok(outcome) => SingleGenerationResponse {
                success: true,
                alt_text: Some(outcome.alt_text().to_string()),
                error: None,
            },
            Err(e) => SingleGenerationResponse {
                success: false,
                alt_text: None,
                error: Some(e.public_message()),
            },
        }
    }

    /**
     * \brief 将单张图片的生成任务放入后台队列，不等待执行。
     */
    pub fn dispatch_deferred(&self, id: ImageId) -> Result<(), DispatchError> {
        self.queue.submit(BackgroundTask::GenerateAltText(id))
    }

    /**
     * \brief 新图片入库后的钩子，每张新图片调用一次。
     */
    pub fn on_image_stored(&self, id: ImageId) -> Result<(), DispatchError> {
        self.dispatch_deferred(id).map_err(|e| {
            tracing::warn!(image_id = %id, error = %e, "cannot queue alt text job for new image");
            e
        })
    }

    /**
     * \brief 为所有缺少替代文本的图片派发后台任务，立即返回已派发的数量。
     */
    pub fn generate_missing(&self) -> Result<usize, DispatchError> {
        let ids = self
            .store
            .images_missing_alt_text()
            .map_err(|e| DispatchError::Storage(format!("{:#}", e)))?;
        for id in &ids {
            self.dispatch_deferred(*id)?;
        }
        tracing::info!(dispatched = ids.len(), "alt text backfill started");
        Ok(ids.len())
    }
}
