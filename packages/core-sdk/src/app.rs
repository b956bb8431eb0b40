use std::sync::Arc;

use anyhow::{Context, Result};

use crate::{
    config::AppConfig,
    dispatch::Coordinator,
    generator::Generator,
    models::{is_image_mime, ImageId},
    pool::TaskPool,
    store::SqliteStore,
};

/**
 * \brief 进程内的服务组合：存储、生成器、任务池与协调器。需在 tokio 运行时内构建。
 */
#[derive(Clone)]
pub struct Services {
    pub store: SqliteStore,
    pub coordinator: Coordinator,
    pub pool: TaskPool,
}

impl Services {
    pub fn build(config: &AppConfig) -> Result<Self> {
        let store = SqliteStore::open(&config.db_path)
            .with_context(|| format!("open database {} failed", config.db_path.display()))?;
        Self::from_store(store, config)
    }

    pub fn from_store(store: SqliteStore, config: &AppConfig) -> Result<Self> {
        let generator = Generator::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            config.generator.clone(),
        )
        .context("build http client failed")?;
        let pool = TaskPool::new(generator.clone(), config.concurrency);
        let coordinator = Coordinator::new(
            generator,
            Arc::new(store.clone()),
            Arc::new(pool.clone()),
        );
        Ok(Self {
            store,
            coordinator,
            pool,
        })
    }

    /**
     * \brief 登记一张新入库的图片。MIME 以 image/ 开头时触发一次 `on_image_stored`。
     * \details 派发失败已由协调器写入日志，不影响入库结果。
     */
    pub fn store_image(
        &self,
        url: &str,
        mime_type: &str,
        alt_text: Option<&str>,
    ) -> Result<ImageId> {
        let id = self.store.insert_image(url, mime_type, alt_text)?;
        tracing::info!(image_id = %id, mime_type, "image stored");
        if is_image_mime(mime_type) {
            let _ = self.coordinator.on_image_stored(id);
        }
        Ok(id)
    }
}
