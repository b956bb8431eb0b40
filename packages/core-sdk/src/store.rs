use std::{
    path::Path,
    sync::{Arc, Mutex, MutexGuard},
};

use anyhow::{anyhow, Result};
use rusqlite::Connection;

use crate::{
    db,
    models::{ImageId, ImageRecord},
};

/**
 * \brief 媒体库接口：生成流程只通过它读取图片与写回替代文本。
 */
pub trait MediaStore: Send + Sync {
    fn get_image(&self, id: ImageId) -> Result<Option<ImageRecord>>;
    fn set_alt_text(&self, id: ImageId, alt_text: &str) -> Result<()>;
    /** \brief 所有 MIME 以 image/ 开头且替代文本为空的图片。 */
    fn images_missing_alt_text(&self) -> Result<Vec<ImageId>>;
}

/**
 * \brief 设置存储接口，只暴露密钥读取。
 */
pub trait SettingsStore: Send + Sync {
    fn api_key(&self) -> Result<Option<String>>;
}

/**
 * \brief 基于 SQLite 的媒体库与设置存储，连接由互斥锁保护。
 */
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /**
     * \brief 打开数据库文件并执行迁移。
     */
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = db::open_db(path)?;
        db::migrate(&conn)?;
        Ok(Self::from_connection(conn))
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        db::migrate(&conn)?;
        Ok(Self::from_connection(conn))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /**
     * \brief 在持锁状态下执行数据库操作。
     */
    pub fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let guard = self.lock()?;
        f(&guard)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("database connection mutex poisoned"))
    }

    pub fn insert_image(
        &self,
        url: &str,
        mime_type: &str,
        alt_text: Option<&str>,
    ) -> Result<ImageId> {
        self.with_conn(|conn| db::insert_image(conn, url, mime_type, alt_text))
    }

    pub fn list_images(&self, missing_only: bool) -> Result<Vec<ImageRecord>> {
        self.with_conn(|conn| db::list_images(conn, missing_only))
    }

    pub fn delete_image(&self, id: ImageId) -> Result<()> {
        self.with_conn(|conn| db::delete_image(conn, id))
    }

    pub fn set_api_key(&self, api_key: &str) -> Result<()> {
        self.with_conn(|conn| db::set_api_key(conn, api_key))
    }

    pub fn clear_api_key(&self) -> Result<()> {
        self.with_conn(db::clear_api_key)
    }

    pub fn telemetry_enabled(&self) -> Result<bool> {
        self.with_conn(db::get_telemetry_enabled)
    }

    pub fn set_telemetry_enabled(&self, enabled: bool) -> Result<()> {
        self.with_conn(|conn| db::set_telemetry_enabled(conn, enabled))
    }
}

impl MediaStore for SqliteStore {
    fn get_image(&self, id: ImageId) -> Result<Option<ImageRecord>> {
        self.with_conn(|conn| db::get_image(conn, id))
    }

    fn set_alt_text(&self, id: ImageId, alt_text: &str) -> Result<()> {
        self.with_conn(|conn| db::set_alt_text(conn, id, alt_text))
    }

    fn images_missing_alt_text(&self) -> Result<Vec<ImageId>> {
        Ok(self
            .list_images(true)?
            .into_iter()
            .map(|record| record.id)
            .collect())
    }
}

impl SettingsStore for SqliteStore {
    fn api_key(&self) -> Result<Option<String>> {
        self.with_conn(db::get_api_key)
    }
}
