use crate::core::handle::BackendHandleManager;
use crate::domain::model::{
    CanvasInput, ImageBlob, PredictInput, TryOnParameters, TryOnRequest, TryOnResult,
};
use crate::utils::error::{RelayError, Result, MISSING_IMAGES_MESSAGE};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_API_NAME: &str = "/tryon";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct GatewayOptions {
    pub api_name: String,
    pub timeout: Duration,
}

impl Default for GatewayOptions {
    fn default() -> Self {
        Self {
            api_name: DEFAULT_API_NAME.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Runs one try-on request end to end against the shared backend session.
pub struct TryOnGateway {
    handles: Arc<BackendHandleManager>,
    options: GatewayOptions,
}

impl TryOnGateway {
    pub fn new(handles: Arc<BackendHandleManager>, options: GatewayOptions) -> Self {
        Self { handles, options }
    }

    pub fn handles(&self) -> &Arc<BackendHandleManager> {
        &self.handles
    }

    pub async fn run(&self, request: TryOnRequest) -> Result<TryOnResult> {
        let (human, garment) = match (request.human, request.garment) {
            (Some(human), Some(garment)) => (human, garment),
            _ => return Err(RelayError::validation(MISSING_IMAGES_MESSAGE)),
        };
        let params = request.params;

        tracing::debug!(
            "Try-on request validated (human: {} bytes, garment: {} bytes, masking: {})",
            human.len(),
            garment.len(),
            params.masking_mode.as_str()
        );

        match self.forward(human, garment, &params).await {
            Ok(result) => Ok(result),
            Err(e) => {
                if e.is_connectivity() {
                    self.handles.invalidate().await;
                }
                Err(e)
            }
        }
    }

    async fn forward(
        &self,
        human: ImageBlob,
        garment: ImageBlob,
        params: &TryOnParameters,
    ) -> Result<TryOnResult> {
        // 連線（含排隊等待其他請求的連線）與推論共用同一個時限
        let deadline = tokio::time::Instant::now() + self.options.timeout;
        let session = match tokio::time::timeout_at(deadline, self.handles.ensure_connected()).await
        {
            Ok(session) => session?,
            Err(_) => {
                tracing::warn!(
                    "⏱️ Backend connection not ready within {:?}",
                    self.options.timeout
                );
                return Err(RelayError::BackendUnavailable {
                    message: format!(
                        "backend connection not ready within {:?}",
                        self.options.timeout
                    ),
                    source: None,
                });
            }
        };
        let inputs = build_inputs(human, garment, params);

        // 逾時時直接丟棄 future，進行中的 HTTP 請求會一併中止
        let call = session.predict(&self.options.api_name, inputs);
        let outputs = match tokio::time::timeout_at(deadline, call).await {
            Ok(outputs) => outputs?,
            Err(_) => {
                tracing::warn!(
                    "⏱️ Inference call exceeded {:?}, abandoning request",
                    self.options.timeout
                );
                return Err(RelayError::TimeoutError);
            }
        };

        let mut outputs = outputs.into_iter();
        let output_image = match outputs.next() {
            Some(value) if is_present(&value) => value,
            _ => return Err(RelayError::InvalidResponse),
        };
        let masked_image = outputs.next().filter(is_present);

        tracing::info!("✅ Try-on inference completed");
        Ok(TryOnResult {
            output_image,
            masked_image,
            params: params.clone(),
        })
    }
}

fn is_present(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => false,
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

/// Positional inputs in the order the try-on endpoint expects.
pub fn build_inputs(
    human: ImageBlob,
    garment: ImageBlob,
    params: &TryOnParameters,
) -> Vec<PredictInput> {
    vec![
        PredictInput::Canvas(CanvasInput::background_only(human)),
        PredictInput::Image(garment),
        PredictInput::Text(params.masking_mode.as_str().to_string()),
        PredictInput::Bool(params.use_auto_mask),
        PredictInput::Bool(params.enhance_output),
        PredictInput::Number(i64::from(params.denoising_steps)),
        PredictInput::Number(params.seed as i64),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::MaskingMode;
    use crate::domain::ports::{BackendConnector, BackendSession};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    enum Reply {
        Outputs(Vec<serde_json::Value>),
        Fail(&'static str),
        Hang,
    }

    struct ScriptedSession {
        reply: Reply,
        calls: Mutex<Vec<(String, Vec<PredictInput>)>>,
    }

    #[async_trait]
    impl BackendSession for ScriptedSession {
        async fn predict(
            &self,
            api_name: &str,
            inputs: Vec<PredictInput>,
        ) -> Result<Vec<serde_json::Value>> {
            self.calls
                .lock()
                .unwrap()
                .push((api_name.to_string(), inputs));
            match &self.reply {
                Reply::Outputs(values) => Ok(values.clone()),
                Reply::Fail(message) => Err(RelayError::upstream(*message)),
                Reply::Hang => std::future::pending().await,
            }
        }
    }

    struct ScriptedConnector {
        session: Arc<ScriptedSession>,
        connects: AtomicUsize,
    }

    #[async_trait]
    impl BackendConnector for ScriptedConnector {
        async fn connect(&self) -> Result<Arc<dyn BackendSession>> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            Ok(self.session.clone())
        }

        fn describe(&self) -> String {
            "scripted".to_string()
        }
    }

    fn scripted_gateway(reply: Reply) -> (TryOnGateway, Arc<ScriptedConnector>) {
        let connector = Arc::new(ScriptedConnector {
            session: Arc::new(ScriptedSession {
                reply,
                calls: Mutex::new(Vec::new()),
            }),
            connects: AtomicUsize::new(0),
        });
        let handles = Arc::new(BackendHandleManager::new(connector.clone()));
        (
            TryOnGateway::new(handles, GatewayOptions::default()),
            connector,
        )
    }

    fn request(with_human: bool, with_garment: bool) -> TryOnRequest {
        TryOnRequest {
            human: with_human.then(|| ImageBlob::new(vec![1u8, 2, 3], "image/png")),
            garment: with_garment.then(|| ImageBlob::new(vec![4u8, 5], "image/jpeg")),
            params: TryOnParameters::default(),
        }
    }

    #[tokio::test]
    async fn test_missing_images_never_touch_backend() {
        for (human, garment) in [(false, true), (true, false), (false, false)] {
            let (gateway, connector) = scripted_gateway(Reply::Outputs(vec![json!("out")]));
            let err = gateway.run(request(human, garment)).await.unwrap_err();

            assert_eq!(err.to_string(), MISSING_IMAGES_MESSAGE);
            assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
            assert_eq!(connector.connects.load(Ordering::SeqCst), 0);
            assert!(!gateway.handles().is_connected().await);
        }
    }

    #[tokio::test]
    async fn test_successful_inference() {
        let (gateway, connector) =
            scripted_gateway(Reply::Outputs(vec![json!("out.png"), json!("mask.png")]));
        let result = gateway.run(request(true, true)).await.unwrap();

        assert_eq!(result.output_image, json!("out.png"));
        assert_eq!(result.masked_image, Some(json!("mask.png")));
        assert_eq!(result.params, TryOnParameters::default());

        let calls = connector.session.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let (api_name, inputs) = &calls[0];
        assert_eq!(api_name, "/tryon");
        assert_eq!(inputs.len(), 7);
        match &inputs[0] {
            PredictInput::Canvas(canvas) => {
                assert_eq!(canvas.background.content_type, "image/png");
                assert!(canvas.layers.is_empty());
                assert!(canvas.composite.is_none());
            }
            other => panic!("expected canvas input, got {:?}", other),
        }
        assert!(matches!(&inputs[1], PredictInput::Image(img) if img.content_type == "image/jpeg"));
        assert_eq!(inputs[2], PredictInput::Text("auto".to_string()));
        assert_eq!(inputs[3], PredictInput::Bool(true));
        assert_eq!(inputs[4], PredictInput::Bool(true));
        assert_eq!(inputs[5], PredictInput::Number(30));
        assert_eq!(inputs[6], PredictInput::Number(42));
    }

    #[tokio::test]
    async fn test_manual_masking_is_forwarded() {
        let (gateway, connector) = scripted_gateway(Reply::Outputs(vec![json!("out.png")]));
        let mut req = request(true, true);
        req.params.masking_mode = MaskingMode::Manual;

        let result = gateway.run(req).await.unwrap();
        assert_eq!(result.masked_image, None);
        assert_eq!(result.params.masking_mode, MaskingMode::Manual);

        let calls = connector.session.calls.lock().unwrap();
        assert_eq!(calls[0].1[2], PredictInput::Text("manual".to_string()));
    }

    #[tokio::test]
    async fn test_empty_output_is_invalid_response() {
        for outputs in [vec![], vec![serde_json::Value::Null, json!("mask.png")]] {
            let (gateway, _) = scripted_gateway(Reply::Outputs(outputs));
            let err = gateway.run(request(true, true)).await.unwrap_err();
            assert_eq!(err.kind(), "InvalidResponse");
            // not a connectivity failure, the session is kept
            assert!(gateway.handles().is_connected().await);
        }
    }

    #[tokio::test]
    async fn test_network_failure_invalidates_session() {
        let (gateway, connector) =
            scripted_gateway(Reply::Fail("network error while streaming"));
        let err = gateway.run(request(true, true)).await.unwrap_err();

        assert_eq!(err.kind(), "UpstreamError");
        assert!(!gateway.handles().is_connected().await);

        let _ = gateway.run(request(true, true)).await;
        assert_eq!(connector.connects.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_other_failures_keep_session() {
        let (gateway, connector) = scripted_gateway(Reply::Fail("GPU quota exceeded"));
        let _ = gateway.run(request(true, true)).await.unwrap_err();
        let _ = gateway.run(request(true, true)).await.unwrap_err();

        assert!(gateway.handles().is_connected().await);
        assert_eq!(connector.connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_backend_times_out() {
        let (gateway, _) = scripted_gateway(Reply::Hang);
        let started = tokio::time::Instant::now();

        let err = gateway.run(request(true, true)).await.unwrap_err();

        assert_eq!(err.kind(), "TimeoutError");
        assert_eq!(err.to_string(), "Request timeout");
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(60));
        assert!(elapsed < Duration::from_secs(61));
    }

    struct StalledConnector;

    #[async_trait]
    impl BackendConnector for StalledConnector {
        async fn connect(&self) -> Result<Arc<dyn BackendSession>> {
            std::future::pending().await
        }

        fn describe(&self) -> String {
            "stalled".to_string()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_connect_answers_every_request_within_budget() {
        let handles = Arc::new(BackendHandleManager::new(Arc::new(StalledConnector)));
        let gateway = Arc::new(TryOnGateway::new(handles, GatewayOptions::default()));
        let started = tokio::time::Instant::now();

        let tasks: Vec<_> = (0..2)
            .map(|_| {
                let gateway = Arc::clone(&gateway);
                tokio::spawn(async move { gateway.run(request(true, true)).await.unwrap_err() })
            })
            .collect();
        for task in tasks {
            let err = task.await.unwrap();
            assert_eq!(err.kind(), "BackendUnavailable");
            assert_eq!(err.status_code(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);
        }

        assert!(started.elapsed() < Duration::from_secs(61));
        assert!(!gateway.handles().is_connected().await);
    }
}
