//! Recognition orchestration
//!
//! Runs one recognition task per enabled region of a capture against the
//! shared engine. All tasks of a batch are spawned before any is awaited and
//! their results are collected back in ordinal order. A failing task only
//! marks its own region as errored.

use futures_util::future::join_all;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::ocr::{
    EngineHandle, Language, LanguageSpec, OcrError, RecognizeOptions, RecognizedText,
};
use super::sanitize::sanitize;
use crate::calibration::REGION_COUNT;
use crate::capture::Capture;
use crate::error::PipelineError;
use crate::routing::GridId;

/// Per-region recognition settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionConfig {
    /// Whether the region is recognized at all
    pub enabled: bool,
    /// Which language variant to recognize with
    pub language: Language,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            language: Language::Primary,
        }
    }
}

/// Default settings for every region
pub fn default_region_config() -> Vec<RegionConfig> {
    vec![RegionConfig::default(); REGION_COUNT]
}

/// Outcome of one region in a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionResult {
    /// Ordinal index of the region
    pub index: usize,
    /// Sanitized recognized text, empty when nothing was recognized
    pub text: String,
    /// False when the region was disabled for this batch
    pub ocr_performed: bool,
    /// Engine language tag used, if a call was made
    pub language_used: Option<String>,
    /// True when the crop was missing or the call failed
    pub error: bool,
}

impl RecognitionResult {
    fn skipped(index: usize) -> Self {
        Self {
            index,
            text: String::new(),
            ocr_performed: false,
            language_used: None,
            error: false,
        }
    }

    fn failed(index: usize, language_used: Option<String>) -> Self {
        Self {
            index,
            text: String::new(),
            ocr_performed: true,
            language_used,
            error: true,
        }
    }

    fn recognized(index: usize, raw: &str, language_used: String) -> Self {
        Self {
            index,
            text: sanitize(raw),
            ocr_performed: true,
            language_used: Some(language_used),
            error: false,
        }
    }
}

/// Counts over a finished batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchSummary {
    pub recognized: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn from_results(results: &[RecognitionResult]) -> Self {
        results.iter().fold(Self::default(), |mut summary, result| {
            if !result.ocr_performed {
                summary.skipped += 1;
            } else if result.error {
                summary.failed += 1;
            } else {
                summary.recognized += 1;
            }
            summary
        })
    }
}

/// Per-destination state
#[derive(Debug)]
struct DestinationState {
    capture: Option<Capture>,
    region_config: Vec<RegionConfig>,
    busy: Arc<AtomicBool>,
}

impl Default for DestinationState {
    fn default() -> Self {
        Self {
            capture: None,
            region_config: default_region_config(),
            busy: Arc::new(AtomicBool::new(false)),
        }
    }
}

/// Clears a destination's busy flag when the batch settles
struct BatchGuard {
    busy: Arc<AtomicBool>,
}

impl Drop for BatchGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

/// Slot of a batch before it is awaited
enum PendingResult {
    Ready(RecognitionResult),
    Spawned {
        index: usize,
        language: String,
        task: JoinHandle<Result<RecognizedText, OcrError>>,
    },
}

impl PendingResult {
    async fn settle(self) -> RecognitionResult {
        match self {
            Self::Ready(result) => result,
            Self::Spawned {
                index,
                language,
                task,
            } => match task.await {
                Ok(Ok(recognized)) => RecognitionResult::recognized(index, &recognized.text, language),
                Ok(Err(e)) => {
                    warn!(
                        "{}",
                        PipelineError::RecognitionTaskFailed {
                            index,
                            reason: e.to_string()
                        }
                    );
                    RecognitionResult::failed(index, Some(language))
                }
                Err(e) => {
                    warn!(
                        "{}",
                        PipelineError::RecognitionTaskFailed {
                            index,
                            reason: format!("task aborted: {}", e)
                        }
                    );
                    RecognitionResult::failed(index, Some(language))
                }
            },
        }
    }
}

/// Dispatches recognition batches for every destination grid
#[derive(Debug)]
pub struct RecognitionOrchestrator {
    engine: EngineHandle,
    languages: LanguageSpec,
    destinations: Mutex<HashMap<GridId, DestinationState>>,
}

impl RecognitionOrchestrator {
    pub fn new(engine: EngineHandle, languages: LanguageSpec) -> Self {
        Self {
            engine,
            languages,
            destinations: Mutex::new(HashMap::new()),
        }
    }

    /// Shared engine handle
    pub fn engine(&self) -> &EngineHandle {
        &self.engine
    }

    pub fn languages(&self) -> &LanguageSpec {
        &self.languages
    }

    /// Region settings currently selected for a destination
    pub fn region_config(&self, grid: GridId) -> Vec<RegionConfig> {
        self.destinations
            .lock()
            .get(&grid)
            .map(|state| state.region_config.clone())
            .unwrap_or_else(default_region_config)
    }

    /// Enable or disable recognition of one region
    pub fn set_enabled(&self, grid: GridId, index: usize, enabled: bool) {
        let mut destinations = self.destinations.lock();
        if let Some(config) = destinations
            .entry(grid)
            .or_default()
            .region_config
            .get_mut(index)
        {
            config.enabled = enabled;
        }
    }

    /// Select the language variant of one region
    pub fn set_language(&self, grid: GridId, index: usize, language: Language) {
        let mut destinations = self.destinations.lock();
        if let Some(config) = destinations
            .entry(grid)
            .or_default()
            .region_config
            .get_mut(index)
        {
            config.language = language;
        }
    }

    /// Latest capture recognized for a destination
    pub fn current_capture(&self, grid: GridId) -> Option<Capture> {
        self.destinations
            .lock()
            .get(&grid)
            .and_then(|state| state.capture.clone())
    }

    /// Whether a batch is running for a destination
    pub fn is_busy(&self, grid: GridId) -> bool {
        self.destinations
            .lock()
            .get(&grid)
            .is_some_and(|state| state.busy.load(Ordering::Acquire))
    }

    /// Forget every destination's capture and settings
    pub fn clear(&self) {
        self.destinations.lock().clear();
    }

    fn begin_batch(&self, grid: GridId, capture: Capture) -> Result<BatchGuard, PipelineError> {
        let mut destinations = self.destinations.lock();
        let state = destinations.entry(grid).or_default();

        if state
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(PipelineError::BatchInProgress(grid));
        }

        state.capture = Some(capture);
        Ok(BatchGuard {
            busy: Arc::clone(&state.busy),
        })
    }

    /// Recognize every enabled region of a capture
    ///
    /// Returns `Err` only for conditions that prevent the whole batch from
    /// starting. Individual region failures are reported in the results,
    /// which are always in ordinal order.
    pub async fn run_batch(
        &self,
        grid: GridId,
        capture: Capture,
        config: &[RegionConfig],
    ) -> Result<Vec<RecognitionResult>, PipelineError> {
        if config.len() != capture.len() {
            return Err(PipelineError::ConfigLength {
                expected: capture.len(),
                actual: config.len(),
            });
        }
        let engine = self.engine.get().ok_or_else(|| {
            PipelineError::RecognitionEngineUnavailable("engine not initialized".to_string())
        })?;

        let guard = self.begin_batch(grid, capture.clone())?;
        let batch_id = Uuid::new_v4();
        debug!("Batch {} started for {}", batch_id, grid);

        let pending: Vec<PendingResult> = capture
            .crops()
            .iter()
            .zip(config)
            .enumerate()
            .map(|(index, (crop, region))| {
                if !region.enabled {
                    return PendingResult::Ready(RecognitionResult::skipped(index));
                }
                let Some(crop) = crop else {
                    warn!("Region {} has no crop, marking as failed", index);
                    return PendingResult::Ready(RecognitionResult::failed(index, None));
                };

                let language = self.languages.tag(region.language).to_string();
                let engine = Arc::clone(&engine);
                let crop = Arc::clone(crop);
                let options = RecognizeOptions {
                    language: language.clone(),
                };
                let task = tokio::spawn(async move { engine.recognize(&crop, &options).await });

                PendingResult::Spawned {
                    index,
                    language,
                    task,
                }
            })
            .collect();

        // The supervisor owns the guard, so the destination stays busy until
        // every task has settled even if this future is dropped.
        let pasted = capture.source().timestamp;
        let supervisor = tokio::spawn(async move {
            let _guard = guard;
            let results = join_all(pending.into_iter().map(PendingResult::settle)).await;

            let summary = BatchSummary::from_results(&results);
            info!(
                "Batch {} for {} finished {:?} after paste: {} recognized, {} skipped, {} failed",
                batch_id,
                grid,
                pasted.elapsed(),
                summary.recognized,
                summary.skipped,
                summary.failed
            );
            results
        });

        supervisor.await.map_err(|e| PipelineError::BatchAborted {
            grid,
            reason: e.to_string(),
        })
    }
}
