use std::str::FromStr;
use std::sync::Arc;

use fl_core::{Error, InferenceService, Result};

use crate::InferenceConfig;

pub mod gemini;
pub mod scripted;

pub use gemini::GeminiModel;
pub use scripted::ScriptedModel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    Gemini,
    /// Canned offline responses, no network access
    Scripted,
}

impl FromStr for ModelKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(ModelKind::Gemini),
            "scripted" | "offline" => Ok(ModelKind::Scripted),
            other => Err(Error::Validation(format!(
                "Unknown model '{}'. Available models: gemini, scripted",
                other
            ))),
        }
    }
}

pub fn create_model(
    kind: ModelKind,
    config: &InferenceConfig,
) -> Result<Arc<dyn InferenceService>> {
    match kind {
        ModelKind::Gemini => Ok(Arc::new(GeminiModel::new(config)?)),
        ModelKind::Scripted => Ok(Arc::new(ScriptedModel::demo())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_kind_parsing() {
        assert_eq!("Gemini".parse::<ModelKind>().unwrap(), ModelKind::Gemini);
        assert_eq!("offline".parse::<ModelKind>().unwrap(), ModelKind::Scripted);
        assert!("gpt".parse::<ModelKind>().is_err());
    }

    #[test]
    fn test_create_gemini_requires_api_key() {
        let result = create_model(ModelKind::Gemini, &InferenceConfig::default());
        assert!(result.is_err());
        assert_eq!(
            result.unwrap_err().to_string(),
            "Inference error: Gemini API key is required"
        );

        let scripted = create_model(ModelKind::Scripted, &InferenceConfig::default()).unwrap();
        assert_eq!(scripted.name(), "Scripted");
    }
}
