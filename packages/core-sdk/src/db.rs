use anyhow::{bail, Result};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::{path::Path, thread, time::Duration};

use crate::models::{ImageId, ImageRecord};

const API_KEY_CONFIG: &str = "gemini_api_key";
const TELEMETRY_CONFIG: &str = "telemetry_enabled";

/**
 * \brief 打开媒体库数据库文件。
 */
pub fn open_db(path: impl AsRef<Path>) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(Duration::from_secs(5))?;
    Ok(conn)
}

/**
 * \brief 运行数据库迁移，创建必要表结构。
 */
pub fn migrate(conn: &Connection) -> Result<()> {
    retry_on_locked(|| {
        conn.execute_batch(
            r#"
        PRAGMA journal_mode=WAL;
        CREATE TABLE IF NOT EXISTS images (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            url TEXT NOT NULL,
            mime_type TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS app_config (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );
        "#,
        )
    })?;

    ensure_image_alt_text_column(conn)?;
    Ok(())
}

fn ensure_image_alt_text_column(conn: &Connection) -> Result<()> {
    let mut stmt = conn.prepare("PRAGMA table_info(images)")?;
    let mut rows = stmt.query([])?;
    let mut has = false;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == "alt_text" {
            has = true;
            break;
        }
    }
    if !has {
        retry_on_locked(|| conn.execute("ALTER TABLE images ADD COLUMN alt_text TEXT", []))?;
    }
    Ok(())
}

fn set_config(conn: &Connection, key: &str, value: &str) -> Result<()> {
    retry_on_locked(|| {
        conn.execute(
            "INSERT INTO app_config (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
            params![key, value],
        )
    })?;
    Ok(())
}

fn get_config(conn: &Connection, key: &str) -> Result<Option<String>> {
    conn.query_row(
        "SELECT value FROM app_config WHERE key=?1",
        params![key],
        |row| row.get::<_, String>(0),
    )
    .optional()
    .map_err(Into::into)
}

/**
 * \brief 读取 API Key；未设置或为空白时返回 None。
 */
pub fn get_api_key(conn: &Connection) -> Result<Option<String>> {
    Ok(get_config(conn, API_KEY_CONFIG)?
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty()))
}

/**
 * \brief 保存 API Key，仅做非空校验。
 */
pub fn set_api_key(conn: &Connection, api_key: &str) -> Result<()> {
    let trimmed = api_key.trim();
    if trimmed.is_empty() {
        bail!("api key must not be empty");
    }
    set_config(conn, API_KEY_CONFIG, trimmed)
}

pub fn clear_api_key(conn: &Connection) -> Result<()> {
    retry_on_locked(|| {
        conn.execute(
            "DELETE FROM app_config WHERE key=?1",
            params![API_KEY_CONFIG],
        )
    })?;
    Ok(())
}

/**
 * \brief 读取文件日志开关。
 */
pub fn get_telemetry_enabled(conn: &Connection) -> Result<bool> {
    Ok(get_config(conn, TELEMETRY_CONFIG)?
        .map(|s| s == "1")
        .unwrap_or(false))
}

/**
 * \brief 更新文件日志开关。
 */
pub fn set_telemetry_enabled(conn: &Connection, enabled: bool) -> Result<()> {
    set_config(conn, TELEMETRY_CONFIG, if enabled { "1" } else { "0" })
}

/**
 * \brief 新增图片记录，返回主键。
 */
pub fn insert_image(
    conn: &Connection,
    url: &str,
    mime_type: &str,
    alt_text: Option<&str>,
) -> Result<ImageId> {
    retry_on_locked(|| {
        conn.execute(
            "INSERT INTO images (url, mime_type, alt_text) VALUES (?1, ?2, ?3)",
            params![url, mime_type, alt_text],
        )
    })?;
    Ok(ImageId(conn.last_insert_rowid()))
}

fn map_image(row: &rusqlite::Row<'_>) -> rusqlite::Result<ImageRecord> {
    Ok(ImageRecord {
        id: ImageId(row.get(0)?),
        url: row.get(1)?,
        mime_type: row.get(2)?,
        alt_text: row.get(3)?,
    })
}

/**
 * \brief 按 ID 获取图片记录。
 */
pub fn get_image(conn: &Connection, id: ImageId) -> Result<Option<ImageRecord>> {
    conn.query_row(
        "SELECT id, url, mime_type, alt_text FROM images WHERE id=?1",
        params![id.0],
        map_image,
    )
    .optional()
    .map_err(Into::into)
}

/**
 * \brief 列出图片记录；`missing_only` 为 true 时只返回缺少替代文本的图片。
 */
pub fn list_images(conn: &Connection, missing_only: bool) -> Result<Vec<ImageRecord>> {
    let sql = if missing_only {
        "SELECT id, url, mime_type, alt_text FROM images
         WHERE lower(mime_type) LIKE 'image/%' AND (alt_text IS NULL OR trim(alt_text) = '')
         ORDER BY id ASC"
    } else {
        "SELECT id, url, mime_type, alt_text FROM images ORDER BY id ASC"
    };
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map([], map_image)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/**
 * \brief 写入替代文本。
 */
pub fn set_alt_text(conn: &Connection, id: ImageId, alt_text: &str) -> Result<()> {
    let rows = retry_on_locked(|| {
        conn.execute(
            "UPDATE images SET alt_text=?1 WHERE id=?2",
            params![alt_text, id.0],
        )
    })?;
    if rows == 0 {
        bail!("image id {} not found", id);
    }
    Ok(())
}

pub fn delete_image(conn: &Connection, id: ImageId) -> Result<()> {
    retry_on_locked(|| conn.execute("DELETE FROM images WHERE id=?1", params![id.0]))?;
    Ok(())
}

/**
 * \brief 针对 SQLite 锁冲突的重试助手。
 * \details 捕获 `database is locked`/`database table is locked` 等错误并线性退避，最多尝试 6 次。
 */
fn retry_on_locked<T, F>(mut action: F) -> Result<T>
where
    F: FnMut() -> rusqlite::Result<T>,
{
    const MAX_RETRIES: usize = 5;
    let mut attempt = 0;
    loop {
        match action() {
            Ok(value) => return Ok(value),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if matches!(
                    err.code,
                    ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked
                ) && attempt < MAX_RETRIES =>
            {
                attempt += 1;
                thread::sleep(Duration::from_millis(200 * attempt as u64));
            }
            Err(e) => return Err(e.into()),
        }
    }
}
