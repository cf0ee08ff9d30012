use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub model: String,
    pub api_url: String,
    pub temperature: Option<f32>,
}

impl ProviderConfig {
    pub fn from_env(provider: &str) -> Self {
        let prefix = provider.to_uppercase();

        // Get model from env or use the provider default
        let model = env::var(format!("{}_MODEL", prefix)).unwrap_or_else(|_| match provider {
            "gemini" => "gemini-2.5-flash".to_string(),
            _ => String::new(),
        });

        // Get API base URL from env or use default
        let api_url = env::var(format!("{}_API_URL", prefix)).unwrap_or_else(|_| match provider {
            "gemini" => "https://generativelanguage.googleapis.com/v1beta".to_string(),
            _ => String::new(),
        });

        // Temperature is only sent when explicitly configured
        let temperature = env::var(format!("{}_TEMPERATURE", prefix))
            .ok()
            .and_then(|t| t.parse().ok());

        Self {
            model,
            api_url,
            temperature,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DetectorConfig {
    pub model_path: PathBuf,
    pub model_url: Option<String>,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
}

impl DetectorConfig {
    pub fn from_env() -> Self {
        Self {
            model_path: env::var("YOLO_MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("models/yolov8n.onnx")),
            model_url: env::var("YOLO_MODEL_URL").ok(),
            confidence_threshold: env::var("YOLO_CONFIDENCE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0.25),
            iou_threshold: env::var("YOLO_IOU")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0.45),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            upload_dir: env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| env::temp_dir()),
            max_upload_bytes: env::var("MAX_UPLOAD_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(25 * 1024 * 1024),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gemini_defaults() {
        // Clear any ambient overrides so the defaults are what gets asserted.
        env::remove_var("GEMINI_MODEL");
        env::remove_var("GEMINI_API_URL");
        env::remove_var("GEMINI_TEMPERATURE");

        let config = ProviderConfig::from_env("gemini");
        assert_eq!(config.model, "gemini-2.5-flash");
        assert_eq!(
            config.api_url,
            "https://generativelanguage.googleapis.com/v1beta"
        );
        assert_eq!(config.temperature, None);
    }

    #[test]
    fn unknown_provider_has_no_defaults() {
        let config = ProviderConfig::from_env("acme");
        assert!(config.model.is_empty());
        assert!(config.api_url.is_empty());
    }

    #[test]
    fn detector_defaults() {
        env::remove_var("YOLO_MODEL_PATH");
        env::remove_var("YOLO_MODEL_URL");
        env::remove_var("YOLO_CONFIDENCE");
        env::remove_var("YOLO_IOU");

        let config = DetectorConfig::from_env();
        assert_eq!(config.model_path, PathBuf::from("models/yolov8n.onnx"));
        assert!((config.confidence_threshold - 0.25).abs() < f32::EPSILON);
        assert!((config.iou_threshold - 0.45).abs() < f32::EPSILON);
    }
}
