pub mod app;
pub mod config;
pub mod db;
pub mod dispatch;
pub mod error;
pub mod generator;
pub mod llm;
pub mod models;
pub mod pool;
pub mod sanitize;
pub mod server;
pub mod store;
pub mod telemetry;

#[cfg(test)]
mod test_support;

/**
 * \brief SDK 预导入集合，方便外部引用常用模块。
 */
pub mod prelude {
    pub use crate::app::Services;
    pub use crate::config::{AppConfig, GeneratorConfig};
    pub use crate::dispatch::Coordinator;
    pub use crate::error::{DispatchError, GenerationError};
    pub use crate::generator::Generator;
    pub use crate::models::{GenerationOutcome, ImageId, ImageRecord};
    pub use crate::pool::{JobQueue, TaskPool};
    pub use crate::store::{MediaStore, SettingsStore, SqliteStore};
    pub use crate::{server, telemetry};
}
