use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use crate::{
    app::Services,
    models::{DispatchResponse, ImageId, ImageRecord, SingleGenerationResponse},
    store::{MediaStore, SettingsStore},
};

/**
 * \brief 构建管理接口路由。
 */
pub fn router(services: Services) -> Router {
    Router::new()
        .route("/api/config", get(get_config).post(set_config))
        .route("/api/images", get(list_images).post(create_image))
        .route("/api/images/{id}", get(get_image).delete(delete_image))
        .route("/api/images/{id}/alt-text", post(generate_single))
        .route("/api/images/alt-text/missing", post(generate_missing))
        .route("/api/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(services)
}

/**
 * \brief 启动本地 HTTP 服务，Ctrl-C 后停止接收请求并等待后台任务结束。
 * \param addr 监听地址，如 "127.0.0.1:8787"
 */
pub async fn run(addr: &str, services: Services) -> Result<()> {
    let pool = services.pool.clone();
    let app = router(services);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Server listening on http://{}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("cannot listen for shutdown signal: {}", e);
            }
        })
        .await?;

    tracing::info!("waiting for background alt text jobs");
    pool.shutdown().await;
    Ok(())
}

#[derive(Deserialize, Debug)]
struct NewImageRequest {
    /** \brief 图片公开地址 */
    url: String,
    /** \brief MIME 类型 */
    mime_type: String,
    #[serde(default)]
    alt_text: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ImageListQuery {
    #[serde(default)]
    missing: Option<bool>,
}

#[derive(Serialize, Debug)]
struct ImageListResponse {
    images: Vec<ImageRecord>,
}

#[derive(Deserialize, Debug)]
struct ConfigInput {
    #[serde(default)]
    api_key: Option<String>,
    #[serde(default)]
    telemetry_enabled: Option<bool>,
}

#[derive(Serialize, Debug)]
struct ConfigState {
    api_key_set: bool,
    /** \brief 仅返回掩码后的密钥。 */
    api_key: String,
    telemetry_enabled: bool,
}

type ApiError = (StatusCode, String);

fn build_config_state(services: &Services) -> Result<ConfigState> {
    let key = services.store.api_key()?;
    Ok(ConfigState {
        api_key_set: key.is_some(),
        api_key: key.as_deref().map(mask_secret).unwrap_or_default(),
        telemetry_enabled: services.store.telemetry_enabled()?,
    })
}

fn mask_secret(secret: &str) -> String {
    let tail: String = secret
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    if secret.chars().count() <= 4 {
        "****".to_string()
    } else {
        format!("****{}", tail)
    }
}

/**
 * \brief 获取当前设置。
 */
async fn get_config(State(services): State<Services>) -> Result<Json<ConfigState>, ApiError> {
    let state = build_config_state(&services).map_err(internal_err)?;
    Ok(Json(state))
}

/**
 * \brief 更新设置；api_key 为空字符串时清除密钥。
 */
async fn set_config(
    State(services): State<Services>,
    Json(input): Json<ConfigInput>,
) -> Result<Json<ConfigState>, ApiError> {
    if let Some(key) = input.api_key.as_deref() {
        if key.trim().is_empty() {
            services.store.clear_api_key().map_err(internal_err)?;
            tracing::info!("api key cleared");
        } else {
            services.store.set_api_key(key).map_err(internal_err)?;
            tracing::info!("api key updated");
        }
    }
    if let Some(enabled) = input.telemetry_enabled {
        services
            .store
            .set_telemetry_enabled(enabled)
            .map_err(internal_err)?;
    }
    let state = build_config_state(&services).map_err(internal_err)?;
    Ok(Json(state))
}

/**
 * \brief 登记新入库的图片；是图片时触发一次后台生成。
 */
async fn create_image(
    State(services): State<Services>,
    Json(payload): Json<NewImageRequest>,
) -> Result<(StatusCode, Json<ImageRecord>), ApiError> {
    let url = payload.url.trim();
    let mime_type = payload.mime_type.trim();
    if url.is_empty() || mime_type.is_empty() {
        return Err(bad_request("url and mime_type are required"));
    }
    let alt_text = payload
        .alt_text
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let id = services
        .store_image(url, mime_type, alt_text)
        .map_err(internal_err)?;

    let record = services
        .store
        .get_image(id)
        .map_err(internal_err)?
        .ok_or_else(|| internal_err(format!("image {} vanished after insert", id)))?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn list_images(
    State(services): State<Services>,
    Query(q): Query<ImageListQuery>,
) -> Result<Json<ImageListResponse>, ApiError> {
    let images = services
        .store
        .list_images(q.missing.unwrap_or(false))
        .map_err(internal_err)?;
    Ok(Json(ImageListResponse { images }))
}

async fn get_image(
    State(services): State<Services>,
    Path(id): Path<i64>,
) -> Result<Json<ImageRecord>, ApiError> {
    services
        .store
        .get_image(ImageId(id))
        .map_err(internal_err)?
        .map(Json)
        .ok_or_else(|| not_found(ImageId(id)))
}

async fn delete_image(
    State(services): State<Services>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    services
        .store
        .delete_image(ImageId(id))
        .map_err(internal_err)?;
    tracing::info!(image_id = id, "image deleted");
    Ok(StatusCode::NO_CONTENT)
}

/**
 * \brief 单图生成：等待结果并直接返回。
 */
async fn generate_single(
    State(services): State<Services>,
    Path(id): Path<i64>,
) -> Json<SingleGenerationResponse> {
    Json(services.coordinator.generate_single(ImageId(id)).await)
}

/**
 * \brief 批量补全：派发后立即返回。
 */
async fn generate_missing(State(services): State<Services>) -> Json<DispatchResponse> {
    let success = match services.coordinator.generate_missing() {
        Ok(_) => true,
        Err(e) => {
            tracing::error!(error = %e, "alt text backfill dispatch failed");
            false
        }
    };
    Json(DispatchResponse { success })
}

async fn health_check(State(services): State<Services>) -> Result<Json<serde_json::Value>, ApiError> {
    let configured = services.store.api_key().map_err(internal_err)?.is_some();
    Ok(Json(serde_json::json!({
        "ok": true,
        "api_key_configured": configured,
    })))
}

fn internal_err<E: std::fmt::Display>(e: E) -> ApiError {
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

fn bad_request(message: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, message.to_string())
}

fn not_found(id: ImageId) -> ApiError {
    (StatusCode::NOT_FOUND, format!("image {} not found", id))
}
