//! Servidor Axum para pré-visualizar janelas em tempo real.
//!
//! - `GET  /health`  — verificação simples
//! - `GET  /config`  — configuração efetiva do tokenizador e do pipeline
//! - `POST /windows` — documentos → janelas (resposta única)
//! - `GET  /ws`      — mesmo processamento, uma mensagem por janela

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use nerwin_core::corpus::CorpusRecord;
use nerwin_core::{
    Document, LabelVocabulary, PaddingSpec, PipelineConfig, SplitStats, TokenizerConfig, Window,
    WindowPipeline,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::tokenizer::SharedTokenizer;

/// Estado compartilhado da aplicação
pub struct AppState {
    pub pipeline: WindowPipeline<SharedTokenizer>,
}

#[derive(Deserialize)]
pub struct WindowsRequest {
    pub documents: Vec<CorpusRecord>,
    /// Rótulos fixos; sem eles o vocabulário vem dos próprios documentos.
    #[serde(default)]
    pub labels: Option<Vec<String>>,
    /// Nome do split (decide a política de segmentação).
    #[serde(default = "default_split")]
    pub split: String,
}

fn default_split() -> String {
    "train".to_string()
}

#[derive(Serialize)]
struct WindowsResponse {
    label2idx: LabelVocabulary,
    windows: Vec<Window>,
    stats: SplitStats,
}

#[derive(Serialize)]
struct ConfigResponse<'a> {
    tokenizer: &'a TokenizerConfig,
    pipeline: &'a PipelineConfig,
    padding: PaddingSpec,
}

/// Mensagens enviadas pelo WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
enum StreamEvent {
    Vocabulary(LabelVocabulary),
    Window(Window),
    Done(SplitStats),
    Error { message: String },
}

/// Erro da API: mensagem JSON com status HTTP.
struct ApiError {
    status: StatusCode,
    message: String,
}

impl From<nerwin_core::Error> for ApiError {
    fn from(err: nerwin_core::Error) -> Self {
        use nerwin_core::Error as E;
        let status = match &err {
            E::WindowOverflow { .. } | E::EntityIntegrity { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            E::InvalidMention { .. } | E::Json { .. } | E::InvalidConfig(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(serde_json::json!({ "error": self.message }))).into_response()
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/config", get(config_handler))
        .route("/windows", post(windows_handler))
        .route("/ws", get(ws_handler))
        .layer(cors)
        .with_state(state)
}

pub async fn serve(addr: std::net::SocketAddr, state: Arc<AppState>) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("servidor de janelas em http://{addr}");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn config_handler(State(state): State<Arc<AppState>>) -> Result<Json<serde_json::Value>, ApiError> {
    let pipeline = &state.pipeline;
    let body = serde_json::to_value(ConfigResponse {
        tokenizer: pipeline.tokenizer_config(),
        pipeline: pipeline.config(),
        padding: pipeline.padding(),
    })
    .map_err(|e| ApiError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        message: e.to_string(),
    })?;
    Ok(Json(body))
}

/// Converte a requisição e roda o pipeline (síncrono).
fn process(state: &AppState, req: WindowsRequest) -> Result<WindowsResponse, ApiError> {
    let documents = req
        .documents
        .into_iter()
        .map(CorpusRecord::into_document)
        .collect::<nerwin_core::Result<Vec<Document>>>()?;
    let vocab = match req.labels {
        Some(labels) => LabelVocabulary::from_labels(labels),
        None => state.pipeline.build_vocabulary(&documents),
    };
    let output = state.pipeline.process_split(&req.split, &documents, &vocab)?;
    Ok(WindowsResponse {
        label2idx: vocab,
        windows: output.windows,
        stats: output.stats,
    })
}

async fn windows_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<WindowsRequest>,
) -> Result<Json<WindowsResponse>, ApiError> {
    if req.documents.is_empty() {
        return Err(ApiError {
            status: StatusCode::BAD_REQUEST,
            message: "nenhum documento".to_string(),
        });
    }
    let response = tokio::task::spawn_blocking(move || process(&state, req))
        .await
        .map_err(|e| ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: e.to_string(),
        })??;
    Ok(Json(response))
}

/// Upgrade HTTP → WebSocket
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_websocket(socket, state))
}

/// Cada mensagem de texto é um [`WindowsRequest`]; a resposta é um evento por janela.
///
/// Pings são respondidos pelo próprio axum.
async fn handle_websocket(mut socket: WebSocket, state: Arc<AppState>) {
    info!("WebSocket conectado");

    while let Some(Ok(msg)) = socket.recv().await {
        match msg {
            Message::Text(text) => {
                for event in request_events(&state, &text).await {
                    let Ok(json) = serde_json::to_string(&event) else {
                        continue;
                    };
                    if socket.send(Message::Text(json)).await.is_err() {
                        warn!("cliente desconectou no meio do envio");
                        return;
                    }
                }
            }
            Message::Close(_) => {
                info!("WebSocket desconectado");
                return;
            }
            _ => {}
        }
    }
}

/// Eventos de resposta a uma mensagem de texto do WebSocket.
async fn request_events(state: &Arc<AppState>, text: &str) -> Vec<StreamEvent> {
    let req = match serde_json::from_str::<WindowsRequest>(text) {
        Ok(req) => req,
        Err(err) => return vec![StreamEvent::Error { message: err.to_string() }],
    };
    let state = Arc::clone(state);
    match tokio::task::spawn_blocking(move || process(&state, req)).await {
        Ok(Ok(response)) => stream_events(response),
        Ok(Err(err)) => vec![StreamEvent::Error { message: err.message }],
        Err(err) => vec![StreamEvent::Error { message: err.to_string() }],
    }
}

fn stream_events(response: WindowsResponse) -> Vec<StreamEvent> {
    let mut events = Vec::with_capacity(response.windows.len() + 2);
    events.push(StreamEvent::Vocabulary(response.label2idx));
    events.extend(response.windows.into_iter().map(StreamEvent::Window));
    events.push(StreamEvent::Done(response.stats));
    events
}
