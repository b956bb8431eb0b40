//! Local stand-ins for the image host and the generation provider.

use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{json, Value};
use tokio_util::io::ReaderStream;

use crate::{config::GeneratorConfig, generator::Generator, store::SqliteStore};

const IMAGE_BYTES: &[u8] = &[0xff, 0xd8, 0xff, 0xe0, 0x00, 0x10, b'J', b'F', b'I', b'F'];

/** \brief 分块传输（无 Content-Length）的图片大小。 */
pub const STREAMED_IMAGE_LEN: usize = 64 * 1024;

/** \brief 慢速图片地址在响应前的等待时间。 */
const SLOW_IMAGE_DELAY: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub enum ProviderReply {
    Json(Value),
    Error(u16, String),
    Slow(Duration, Value),
}

impl ProviderReply {
    pub fn text(text: &str) -> Self {
        ProviderReply::Json(json!({
            "candidates": [{"content": {"parts": [{"text": text}], "role": "model"}}]
        }))
    }

    pub fn json(v: Value) -> Self {
        ProviderReply::Json(v)
    }

    pub fn error(code: u16, message: &str) -> Self {
        ProviderReply::Error(code, message.to_string())
    }
}

struct MockState {
    reply: ProviderReply,
    fetch_hits: AtomicUsize,
    api_hits: AtomicUsize,
    last_request: Mutex<Option<(Option<String>, Value)>>,
}

pub struct MockProvider {
    addr: SocketAddr,
    state: Arc<MockState>,
}

impl MockProvider {
    pub async fn start(reply: ProviderReply) -> Self {
        let state = Arc::new(MockState {
            reply,
            fetch_hits: AtomicUsize::new(0),
            api_hits: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        });
        let app = Router::new()
            .route("/images/photo.jpg", get(serve_image))
            .route("/images/slow.jpg", get(serve_slow_image))
            .route("/images/stream.jpg", get(serve_streamed_image))
            .route("/v1beta/models/{action}", post(generate_content))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock provider");
        let addr = listener.local_addr().expect("mock provider addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Self { addr, state }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn image_url(&self) -> String {
        format!("{}/images/photo.jpg", self.base_url())
    }

    pub fn slow_image_url(&self) -> String {
        format!("{}/images/slow.jpg", self.base_url())
    }

    pub fn streamed_image_url(&self) -> String {
        format!("{}/images/stream.jpg", self.base_url())
    }

    pub fn missing_image_url(&self) -> String {
        format!("{}/images/missing.jpg", self.base_url())
    }

    pub fn image_base64() -> String {
        STANDARD.encode(IMAGE_BYTES)
    }

    pub fn fetch_hits(&self) -> usize {
        self.state.fetch_hits.load(Ordering::SeqCst)
    }

    pub fn api_hits(&self) -> usize {
        self.state.api_hits.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<(Option<String>, Value)> {
        self.state.last_request.lock().expect("lock last request").clone()
    }

    pub fn generator_config(&self) -> GeneratorConfig {
        GeneratorConfig {
            api_base: self.base_url(),
            ..GeneratorConfig::default()
        }
    }
}

pub fn generator_for(store: &SqliteStore, mock: &MockProvider) -> Generator {
    generator_with_config(store, mock.generator_config())
}

pub fn generator_with_config(store: &SqliteStore, config: GeneratorConfig) -> Generator {
    Generator::new(Arc::new(store.clone()), Arc::new(store.clone()), config)
        .expect("build generator")
}

async fn serve_image(State(state): State<Arc<MockState>>) -> impl IntoResponse {
    state.fetch_hits.fetch_add(1, Ordering::SeqCst);
    ([(header::CONTENT_TYPE, "image/jpeg")], IMAGE_BYTES)
}

async fn serve_slow_image(State(state): State<Arc<MockState>>) -> impl IntoResponse {
    state.fetch_hits.fetch_add(1, Ordering::SeqCst);
    tokio::time::sleep(SLOW_IMAGE_DELAY).await;
    ([(header::CONTENT_TYPE, "image/jpeg")], IMAGE_BYTES)
}

async fn serve_streamed_image(State(state): State<Arc<MockState>>) -> impl IntoResponse {
    state.fetch_hits.fetch_add(1, Ordering::SeqCst);
    let bytes: Vec<u8> = IMAGE_BYTES
        .iter()
        .copied()
        .cycle()
        .take(STREAMED_IMAGE_LEN)
        .collect();
    let body = Body::from_stream(ReaderStream::new(std::io::Cursor::new(bytes)));
    ([(header::CONTENT_TYPE, "image/jpeg")], body)
}

async fn generate_content(
    State(state): State<Arc<MockState>>,
    Query(query): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.api_hits.fetch_add(1, Ordering::SeqCst);
    *state.last_request.lock().expect("lock last request") = Some((query.get("key").cloned(), body));

    match state.reply.clone() {
        ProviderReply::Json(v) => (StatusCode::OK, Json(v)),
        ProviderReply::Error(code, message) => (
            StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST),
            Json(json!({"error": {"code": code, "message": message, "status": "INVALID_ARGUMENT"}})),
        ),
        ProviderReply::Slow(delay, v) => {
            tokio::time::sleep(delay).await;
            (StatusCode::OK, Json(v))
        }
    }
}
