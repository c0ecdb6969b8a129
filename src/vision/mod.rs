//! Vision/OCR Layer
//!
//! Recognizes the text in each cropped seat region. The recognition engine
//! itself is external; this layer owns its shared handle, fans recognition
//! out per region and cleans up the returned text.

pub mod ocr;
pub mod orchestrator;
pub mod sanitize;

pub use ocr::{
    EngineHandle, Language, LanguageSpec, OcrError, RecognitionBackend, RecognitionEngine,
    RecognizeOptions, RecognizedText,
};
pub use orchestrator::{
    default_region_config, BatchSummary, RecognitionOrchestrator, RecognitionResult, RegionConfig,
};
pub use sanitize::{sanitize, Sanitizer};
