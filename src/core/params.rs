use crate::domain::model::{MaskingMode, TryOnParameters};
use std::collections::HashMap;

/// 將呼叫端送來的表單欄位轉成完整的參數組。永遠不會失敗。
pub fn validate_params(raw: &HashMap<String, String>) -> TryOnParameters {
    let masking_mode = match raw.get("maskingMode").map(String::as_str) {
        Some("manual") => MaskingMode::Manual,
        Some("auto") => MaskingMode::Auto,
        _ => MaskingMode::Auto,
    };

    TryOnParameters {
        masking_mode,
        ..TryOnParameters::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_masking_mode_passthrough() {
        let params = validate_params(&fields(&[("maskingMode", "manual")]));
        assert_eq!(params.masking_mode, MaskingMode::Manual);

        let params = validate_params(&fields(&[("maskingMode", "auto")]));
        assert_eq!(params.masking_mode, MaskingMode::Auto);
    }

    #[test]
    fn test_unrecognized_masking_mode_defaults_to_auto() {
        for value in ["Manual", "AUTO", "", "brush", " manual"] {
            let params = validate_params(&fields(&[("maskingMode", value)]));
            assert_eq!(params.masking_mode, MaskingMode::Auto, "value {:?}", value);
        }
        assert_eq!(
            validate_params(&HashMap::new()).masking_mode,
            MaskingMode::Auto
        );
    }

    #[test]
    fn test_fixed_parameters_ignore_input() {
        let params = validate_params(&fields(&[
            ("maskingMode", "manual"),
            ("denoisingSteps", "5"),
            ("seed", "7"),
            ("useAutoMask", "false"),
            ("enhanceOutput", "false"),
        ]));
        assert_eq!(params.denoising_steps, 30);
        assert_eq!(params.seed, 42);
        assert!(params.use_auto_mask);
        assert!(params.enhance_output);
    }
}
