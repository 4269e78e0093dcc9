//! Client for a remote Gradio app, either a Hugging Face Space or a self-hosted URL.
//!
//! Uses the Gradio REST protocol: files go through `/upload`, a prediction is
//! queued with `POST /call/{api}` and its outcome is read from the
//! server-sent event stream at `GET /call/{api}/{event_id}`.

use crate::domain::model::{CanvasInput, ImageBlob, PredictInput};
use crate::domain::ports::{BackendConnector, BackendSession};
use crate::utils::error::{RelayError, Result};
use async_trait::async_trait;
use reqwest::{multipart, Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

pub const HF_SPACES_API: &str = "https://huggingface.co/api/spaces";
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct SpaceHost {
    host: String,
}

#[derive(Debug, Default, Deserialize)]
struct AppConfig {
    #[serde(default)]
    api_prefix: Option<String>,
    #[serde(default)]
    version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QueuedCall {
    event_id: String,
}

#[derive(Debug, Clone)]
pub struct GradioConnector {
    client: Client,
    backend: String,
    hf_token: Option<String>,
    spaces_api: String,
    lookup_timeout: Duration,
}

impl GradioConnector {
    pub fn new(backend: impl Into<String>, hf_token: Option<String>) -> Self {
        Self {
            client: Client::new(),
            backend: backend.into(),
            hf_token,
            spaces_api: HF_SPACES_API.to_string(),
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
        }
    }

    /// Per-request limit for the host lookup and `/config` calls made while connecting.
    pub fn with_lookup_timeout(mut self, lookup_timeout: Duration) -> Self {
        self.lookup_timeout = lookup_timeout;
        self
    }

    /// Overrides the Space lookup API base (used against mock servers).
    pub fn with_spaces_api(mut self, spaces_api: impl Into<String>) -> Self {
        self.spaces_api = spaces_api.into();
        self
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        // 設定超時
        authorize(builder, self.hf_token.as_deref()).timeout(self.lookup_timeout)
    }

    /// 取得 Gradio app 的根網址
    async fn resolve_root(&self) -> Result<String> {
        if self.backend.contains("://") {
            return Ok(self.backend.trim_end_matches('/').to_string());
        }

        let url = format!("{}/{}/host", self.spaces_api.trim_end_matches('/'), self.backend);
        tracing::debug!("Resolving Space host via {}", url);
        let response = self.authorized(self.client.get(&url)).send().await?;
        let response = ensure_success(response, "Space host lookup").await?;
        let space: SpaceHost = response.json().await?;

        Ok(space.host.trim_end_matches('/').to_string())
    }
}

#[async_trait]
impl BackendConnector for GradioConnector {
    async fn connect(&self) -> Result<Arc<dyn BackendSession>> {
        let root = self.resolve_root().await?;

        let response = self
            .authorized(self.client.get(format!("{}/config", root)))
            .send()
            .await?;
        let response = ensure_success(response, "Gradio config").await?;
        let config: AppConfig = response.json().await?;

        let api_prefix = config
            .api_prefix
            .map(|p| p.trim_end_matches('/').to_string())
            .unwrap_or_default();
        tracing::debug!(
            "Gradio app at {} (version: {}, api prefix: '{}')",
            root,
            config.version.as_deref().unwrap_or("unknown"),
            api_prefix
        );

        Ok(Arc::new(GradioSession {
            client: self.client.clone(),
            root,
            api_prefix,
            hf_token: self.hf_token.clone(),
        }))
    }

    fn describe(&self) -> String {
        self.backend.clone()
    }
}

#[derive(Debug)]
pub struct GradioSession {
    client: Client,
    root: String,
    api_prefix: String,
    hf_token: Option<String>,
}

impl GradioSession {
    fn endpoint(&self, path: &str) -> String {
        format!("{}{}{}", self.root, self.api_prefix, path)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        authorize(builder, self.hf_token.as_deref())
    }

    /// Uploads one image and returns its `FileData` description.
    async fn upload(&self, image: &ImageBlob) -> Result<Value> {
        let file_name = image
            .file_name
            .clone()
            .unwrap_or_else(|| default_file_name(&image.content_type));

        let part = multipart::Part::bytes(image.data.to_vec())
            .file_name(file_name.clone())
            .mime_str(&image.content_type)?;
        let form = multipart::Form::new().part("files", part);

        let response = self
            .authorized(self.client.post(self.endpoint("/upload")))
            .multipart(form)
            .send()
            .await?;
        let response = ensure_success(response, "Upload").await?;
        let paths: Vec<String> = response.json().await?;
        let path = paths
            .into_iter()
            .next()
            .ok_or_else(|| RelayError::upstream("Upload returned no file path"))?;

        tracing::debug!("Uploaded {} ({} bytes) as {}", file_name, image.len(), path);
        Ok(json!({
            "path": path,
            "orig_name": file_name,
            "mime_type": image.content_type,
            "size": image.len(),
            "meta": { "_type": "gradio.FileData" }
        }))
    }

    async fn encode_canvas(&self, canvas: &CanvasInput) -> Result<Value> {
        let background = self.upload(&canvas.background).await?;
        let mut layers = Vec::with_capacity(canvas.layers.len());
        for layer in &canvas.layers {
            layers.push(self.upload(layer).await?);
        }
        let composite = match &canvas.composite {
            Some(image) => self.upload(image).await?,
            None => Value::Null,
        };

        Ok(json!({
            "background": background,
            "layers": layers,
            "composite": composite
        }))
    }

    async fn encode(&self, input: &PredictInput) -> Result<Value> {
        Ok(match input {
            PredictInput::Canvas(canvas) => self.encode_canvas(canvas).await?,
            PredictInput::Image(image) => self.upload(image).await?,
            PredictInput::Text(text) => Value::String(text.clone()),
            PredictInput::Bool(flag) => Value::Bool(*flag),
            PredictInput::Number(n) => json!(n),
        })
    }
}

#[async_trait]
impl BackendSession for GradioSession {
    async fn predict(&self, api_name: &str, inputs: Vec<PredictInput>) -> Result<Vec<Value>> {
        let api_name = api_name.trim_start_matches('/');

        let mut data = Vec::with_capacity(inputs.len());
        for input in &inputs {
            data.push(self.encode(input).await?);
        }

        let call_url = self.endpoint(&format!("/call/{}", api_name));
        let response = self
            .authorized(self.client.post(&call_url))
            .json(&json!({ "data": data }))
            .send()
            .await?;
        let response = ensure_success(response, "Prediction request").await?;
        let queued: QueuedCall = response.json().await?;
        tracing::debug!("Prediction queued on /{} with event id {}", api_name, queued.event_id);

        let response = self
            .authorized(self.client.get(format!("{}/{}", call_url, queued.event_id)))
            .send()
            .await?;
        let response = ensure_success(response, "Prediction stream").await?;
        let body = response.text().await?;

        parse_event_stream(&body)
    }
}

fn authorize(builder: RequestBuilder, token: Option<&str>) -> RequestBuilder {
    match token {
        Some(token) => builder.bearer_auth(token),
        None => builder,
    }
}

async fn ensure_success(response: Response, what: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let body = body.trim();
    Err(RelayError::upstream(if body.is_empty() {
        format!("{} failed with status {}", what, status)
    } else {
        format!("{} failed with status {}: {}", what, status, body)
    }))
}

fn default_file_name(content_type: &str) -> String {
    let extension = content_type
        .strip_prefix("image/")
        .map(|subtype| subtype.split(['+', ';']).next().unwrap_or(subtype))
        .filter(|ext| !ext.is_empty())
        .unwrap_or("bin");
    format!("image.{}", extension)
}

/// Reads a Gradio SSE body until the `complete` or `error` event.
pub fn parse_event_stream(body: &str) -> Result<Vec<Value>> {
    let mut event = "";

    for line in body.lines() {
        let line = line.trim_end_matches('\r');
        if let Some(name) = line.strip_prefix("event:") {
            event = name.trim();
            continue;
        }
        let Some(payload) = line.strip_prefix("data:") else {
            continue;
        };
        let payload = payload.trim();

        match event {
            "complete" => {
                let outputs: Value = serde_json::from_str(payload)?;
                return match outputs {
                    Value::Array(items) => Ok(items),
                    Value::Null => Ok(Vec::new()),
                    other => Ok(vec![other]),
                };
            }
            "error" => {
                let message = match serde_json::from_str::<Value>(payload) {
                    Ok(Value::String(message)) => message,
                    Ok(Value::Null) | Err(_) if payload.is_empty() || payload == "null" => {
                        "The inference backend reported an error".to_string()
                    }
                    Ok(Value::Object(obj)) => obj
                        .get("message")
                        .or_else(|| obj.get("error"))
                        .and_then(Value::as_str)
                        .unwrap_or(payload)
                        .to_string(),
                    _ => payload.to_string(),
                };
                return Err(RelayError::upstream(message));
            }
            _ => {}
        }
    }

    Err(RelayError::upstream(
        "Inference stream ended before a result was produced",
    ))
}
