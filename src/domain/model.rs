use bytes::Bytes;
use serde::{Deserialize, Serialize};

pub const DEFAULT_DENOISING_STEPS: u32 = 30;
pub const DEFAULT_SEED: u64 = 42;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaskingMode {
    #[default]
    Auto,
    Manual,
}

impl MaskingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MaskingMode::Auto => "auto",
            MaskingMode::Manual => "manual",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TryOnParameters {
    pub masking_mode: MaskingMode,
    pub denoising_steps: u32,
    pub seed: u64,
    pub use_auto_mask: bool,
    pub enhance_output: bool,
}

impl Default for TryOnParameters {
    fn default() -> Self {
        Self {
            masking_mode: MaskingMode::Auto,
            denoising_steps: DEFAULT_DENOISING_STEPS,
            seed: DEFAULT_SEED,
            use_auto_mask: true,
            enhance_output: true,
        }
    }
}

/// An uploaded image kept in memory together with its declared MIME type.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageBlob {
    pub data: Bytes,
    pub content_type: String,
    pub file_name: Option<String>,
}

impl ImageBlob {
    pub fn new(data: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            content_type: content_type.into(),
            file_name: None,
        }
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Image-editor style input: a background plus optional drawing layers and composite.
#[derive(Debug, Clone, PartialEq)]
pub struct CanvasInput {
    pub background: ImageBlob,
    pub layers: Vec<ImageBlob>,
    pub composite: Option<ImageBlob>,
}

impl CanvasInput {
    pub fn background_only(background: ImageBlob) -> Self {
        Self {
            background,
            layers: Vec::new(),
            composite: None,
        }
    }
}

/// One positional argument of a backend prediction call.
#[derive(Debug, Clone, PartialEq)]
pub enum PredictInput {
    Canvas(CanvasInput),
    Image(ImageBlob),
    Text(String),
    Bool(bool),
    Number(i64),
}

#[derive(Debug, Clone)]
pub struct TryOnRequest {
    pub human: Option<ImageBlob>,
    pub garment: Option<ImageBlob>,
    pub params: TryOnParameters,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TryOnResult {
    pub output_image: serde_json::Value,
    pub masked_image: Option<serde_json::Value>,
    pub params: TryOnParameters,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parameters_serialize_camel_case() {
        let value = serde_json::to_value(TryOnParameters::default()).unwrap();
        assert_eq!(
            value,
            json!({
                "maskingMode": "auto",
                "denoisingSteps": 30,
                "seed": 42,
                "useAutoMask": true,
                "enhanceOutput": true
            })
        );
    }

    #[test]
    fn test_result_without_mask_serializes_null() {
        let result = TryOnResult {
            output_image: json!({"url": "https://example.com/out.png"}),
            masked_image: None,
            params: TryOnParameters::default(),
        };
        let value = serde_json::to_value(result).unwrap();
        assert_eq!(value["outputImage"]["url"], "https://example.com/out.png");
        assert!(value["maskedImage"].is_null());
        assert_eq!(value["params"]["maskingMode"], "auto");
    }
}
