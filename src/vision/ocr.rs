//! OCR (Optical Character Recognition) engine boundary
//!
//! The recognition engine is an external service. The pipeline only needs to
//! initialize it once and then send it independent `recognize` requests.

use async_trait::async_trait;
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// Language variant selectable per region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    #[default]
    Primary,
    Secondary,
}

/// Language tags the engine is initialized with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageSpec {
    /// Tag used for [`Language::Primary`] (e.g. "eng")
    pub primary: String,
    /// Tag used for [`Language::Secondary`] (e.g. "vie")
    pub secondary: String,
}

impl Default for LanguageSpec {
    fn default() -> Self {
        Self {
            primary: "eng".to_string(),
            secondary: "vie".to_string(),
        }
    }
}

impl LanguageSpec {
    /// Engine tag for a language variant
    pub fn tag(&self, language: Language) -> &str {
        match language {
            Language::Primary => &self.primary,
            Language::Secondary => &self.secondary,
        }
    }

    /// All tags joined the way multi-language engines expect ("eng+vie")
    pub fn combined(&self) -> String {
        format!("{}+{}", self.primary, self.secondary)
    }
}

/// Per-call recognition options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognizeOptions {
    /// Engine language tag
    pub language: String,
}

/// Raw engine output
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RecognizedText {
    pub text: String,
}

/// Engine-side failures
#[derive(Debug, Clone, Error)]
pub enum OcrError {
    #[error("OCR engine failed to initialize: {0}")]
    Init(String),

    #[error("Recognition failed: {0}")]
    Recognition(String),
}

/// An initialized recognition engine
///
/// Calls are independent requests and may run concurrently.
#[async_trait]
pub trait RecognitionEngine: Send + Sync {
    async fn recognize(
        &self,
        image: &RgbaImage,
        options: &RecognizeOptions,
    ) -> Result<RecognizedText, OcrError>;
}

/// Produces a recognition engine
#[async_trait]
pub trait RecognitionBackend: Send + Sync {
    /// Backend name for logging
    fn name(&self) -> &str;

    async fn initialize(
        &self,
        languages: &LanguageSpec,
    ) -> Result<Arc<dyn RecognitionEngine>, OcrError>;
}

/// Shared, lazily initialized engine handle
///
/// Clones share the same engine. Initialization succeeds at most once;
/// concurrent `init` calls wait on the one in flight, and a failed attempt
/// leaves the handle uninitialized so a later call can retry.
#[derive(Clone, Default)]
pub struct EngineHandle {
    cell: Arc<OnceCell<Arc<dyn RecognitionEngine>>>,
}

impl fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineHandle")
            .field("ready", &self.is_ready())
            .finish()
    }
}

impl EngineHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Initialize the engine if that has not happened yet
    pub async fn init(
        &self,
        backend: &dyn RecognitionBackend,
        languages: &LanguageSpec,
    ) -> Result<(), OcrError> {
        if self.is_ready() {
            debug!("OCR engine already initialized");
            return Ok(());
        }

        self.cell
            .get_or_try_init(|| async {
                info!(
                    "Initializing {} OCR backend with languages {}",
                    backend.name(),
                    languages.combined()
                );
                let engine = backend.initialize(languages).await;
                match &engine {
                    Ok(_) => info!("{} OCR backend initialized", backend.name()),
                    Err(e) => warn!("{} OCR backend unavailable: {}", backend.name(), e),
                }
                engine
            })
            .await
            .map(|_| ())
    }

    /// The engine, if initialized
    pub fn get(&self) -> Option<Arc<dyn RecognitionEngine>> {
        self.cell.get().cloned()
    }

    pub fn is_ready(&self) -> bool {
        self.cell.initialized()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct EchoEngine;

    #[async_trait]
    impl RecognitionEngine for EchoEngine {
        async fn recognize(
            &self,
            _image: &RgbaImage,
            options: &RecognizeOptions,
        ) -> Result<RecognizedText, OcrError> {
            Ok(RecognizedText {
                text: options.language.clone(),
            })
        }
    }

    struct CountingBackend {
        calls: AtomicUsize,
        fail_first: bool,
    }

    #[async_trait]
    impl RecognitionBackend for CountingBackend {
        fn name(&self) -> &str {
            "counting"
        }

        async fn initialize(
            &self,
            _languages: &LanguageSpec,
        ) -> Result<Arc<dyn RecognitionEngine>, OcrError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            if self.fail_first && call == 0 {
                return Err(OcrError::Init("model missing".to_string()));
            }
            Ok(Arc::new(EchoEngine))
        }
    }

    #[test]
    fn test_language_tags() {
        let spec = LanguageSpec::default();
        assert_eq!(spec.tag(Language::Primary), "eng");
        assert_eq!(spec.tag(Language::Secondary), "vie");
        assert_eq!(spec.combined(), "eng+vie");
        assert_eq!(Language::default(), Language::Primary);
    }

    #[tokio::test]
    async fn test_init_is_idempotent() {
        let backend = CountingBackend {
            calls: AtomicUsize::new(0),
            fail_first: false,
        };
        let handle = EngineHandle::new();
        let languages = LanguageSpec::default();

        let (a, b) = tokio::join!(
            handle.init(&backend, &languages),
            handle.init(&backend, &languages)
        );
        a.unwrap();
        b.unwrap();
        handle.init(&backend, &languages).await.unwrap();

        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
        assert!(handle.is_ready());
    }

    #[tokio::test]
    async fn test_failed_init_leaves_handle_uninitialized() {
        let backend = CountingBackend {
            calls: AtomicUsize::new(0),
            fail_first: true,
        };
        let handle = EngineHandle::new();
        let languages = LanguageSpec::default();

        assert!(handle.init(&backend, &languages).await.is_err());
        assert!(!handle.is_ready());
        assert!(handle.get().is_none());

        handle.init(&backend, &languages).await.unwrap();
        assert!(handle.is_ready());
    }

    #[tokio::test]
    async fn test_clones_share_engine() {
        let backend = CountingBackend {
            calls: AtomicUsize::new(0),
            fail_first: false,
        };
        let handle = EngineHandle::new();
        let clone = handle.clone();

        handle.init(&backend, &LanguageSpec::default()).await.unwrap();

        let engine = clone.get().unwrap();
        let text = engine
            .recognize(
                &RgbaImage::new(1, 1),
                &RecognizeOptions {
                    language: "vie".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(text.text, "vie");
    }
}
