use crate::config::Environment;
use crate::core::gateway::TryOnGateway;
use crate::core::params::validate_params;
use crate::domain::model::{ImageBlob, TryOnRequest, TryOnResult};
use crate::utils::error::{RelayError, Result, MISSING_IMAGES_MESSAGE};
use axum::{
    extract::{
        multipart::{Field, MultipartRejection},
        DefaultBodyLimit, Multipart, State,
    },
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bytes::BytesMut;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

// 除了兩張圖片外，保留給其他表單欄位與 multipart 邊界的空間
const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;

pub struct AppState {
    pub gateway: TryOnGateway,
    pub environment: Environment,
    pub max_upload_bytes: usize,
}

#[derive(Serialize)]
struct SuccessBody<T> {
    success: bool,
    data: T,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    success: bool,
    error: String,
    error_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_details: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub backend_connected: bool,
}

impl AppState {
    fn failure(&self, err: RelayError) -> Response {
        let status = err.status_code();
        if status.is_server_error() {
            tracing::error!("Virtual try-on error: {}", err);
        } else {
            tracing::warn!("Rejected try-on request: {}", err);
        }

        let body = ErrorBody {
            success: false,
            error: err.to_string(),
            error_type: err.kind(),
            error_details: self
                .environment
                .is_development()
                .then(|| err.details()),
        };
        (status, Json(body)).into_response()
    }
}

pub fn cors_layer(origin: &str) -> Result<CorsLayer> {
    let origin = HeaderValue::from_str(origin).map_err(|e| RelayError::ConfigError {
        message: format!("Invalid CORS origin '{}': {}", origin, e),
    })?;

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]))
}

pub fn create_router(state: Arc<AppState>, cors_origin: &str) -> Result<Router> {
    let body_limit = state.max_upload_bytes * 2 + FORM_OVERHEAD_BYTES;

    Ok(Router::new()
        .route("/api/virtual-tryon", post(virtual_tryon))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors_layer(cors_origin)?)
        .with_state(state))
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        backend_connected: state.gateway.handles().is_connected().await,
    })
}

async fn virtual_tryon(
    State(state): State<Arc<AppState>>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Response {
    let request = match multipart {
        Ok(multipart) => read_tryon_form(multipart, state.max_upload_bytes).await,
        // 非 multipart 請求視同沒有上傳任何檔案
        Err(MultipartRejection::InvalidBoundary(_)) => {
            Err(RelayError::validation(MISSING_IMAGES_MESSAGE))
        }
        Err(rejection) => Err(RelayError::upload(rejection.body_text())),
    };

    let request = match request {
        Ok(request) => request,
        Err(e) => return state.failure(e),
    };

    match state.gateway.run(request).await {
        Ok(result) => (
            StatusCode::OK,
            Json(SuccessBody::<TryOnResult> {
                success: true,
                data: result,
            }),
        )
            .into_response(),
        Err(e) => state.failure(e),
    }
}

/// Collects the first `human` and `garment` files plus the text fields of the form.
async fn read_tryon_form(mut multipart: Multipart, max_file_bytes: usize) -> Result<TryOnRequest> {
    let mut human = None;
    let mut garment = None;
    let mut fields = HashMap::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| RelayError::upload(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let is_file = field.file_name().is_some();

        match name.as_str() {
            "human" | "garment" => {
                let slot = if name == "human" { &mut human } else { &mut garment };
                if slot.is_some() {
                    tracing::debug!("Ignoring extra '{}' file", name);
                    continue;
                }
                *slot = Some(read_image(field, max_file_bytes).await?);
            }
            _ if is_file => {
                tracing::debug!("Ignoring unexpected file field '{}'", name);
            }
            _ => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| RelayError::upload(e.body_text()))?;
                fields.entry(name).or_insert(value);
            }
        }
    }

    Ok(TryOnRequest {
        human,
        garment,
        params: validate_params(&fields),
    })
}

async fn read_image(mut field: Field<'_>, max_bytes: usize) -> Result<ImageBlob> {
    let content_type = field.content_type().unwrap_or_default().to_string();
    if !content_type.starts_with("image/") {
        return Err(RelayError::upload("Only image files are allowed"));
    }
    let file_name = field.file_name().map(str::to_string);

    let mut data = BytesMut::new();
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| RelayError::upload(e.body_text()))?
    {
        if data.len() + chunk.len() > max_bytes {
            return Err(RelayError::upload("File too large"));
        }
        data.extend_from_slice(&chunk);
    }

    let image = ImageBlob::new(data.freeze(), content_type);
    Ok(match file_name {
        Some(name) => image.with_file_name(name),
        None => image,
    })
}

/// Serves the router until Ctrl-C.
pub async fn serve(router: Router, address: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(address).await?;
    tracing::info!("🚀 Server is running on http://{}", listener.local_addr()?);

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("🛑 Shutdown signal received");
        })
        .await?;
    Ok(())
}
