//! Process-scoped pipeline context
//!
//! Holds the state every pipeline step shares: the calibration store, the
//! recognition engine handle and per-table batch state.
//!
//! Lifecycle: [`PipelineContext::start`] validates the seat route table and
//! loads the stored calibration; [`PipelineContext::init_engine`] brings up
//! the recognition engine (recognition is refused until it succeeds);
//! [`PipelineContext::reset`] drops the engine and all per-table state and
//! reloads the calibration from disk.

use anyhow::Result;
use parking_lot::RwLock;
use std::collections::VecDeque;
use tracing::{info, warn};

use crate::calibration::Calibration;
use crate::capture::{crop_regions, CapturedFrame, CropOutcome};
use crate::config::AppConfig;
use crate::error::{DimensionMismatch, PipelineError};
use crate::overlay::RegionEditor;
use crate::routing::{route, validate_route_table, DestinationGrid, GridId, RouteSummary, SEAT_ROUTE_TABLE};
use crate::shared::messages::PipelineStatus;
use crate::storage::{self, CalibrationStore};
use crate::vision::{BatchSummary, EngineHandle, RecognitionBackend, RecognitionOrchestrator};

/// Number of recent statuses kept for display
const STATUS_HISTORY: usize = 16;

/// Runtime state that is not persisted
#[derive(Debug, Clone, Default)]
pub struct RuntimeState {
    /// Most recent statuses, oldest first
    pub statuses: VecDeque<PipelineStatus>,
    /// Batches that ran to completion
    pub batches_completed: u64,
}

impl RuntimeState {
    /// The latest status, if any
    pub fn last_status(&self) -> Option<&PipelineStatus> {
        self.statuses.back()
    }

    fn push(&mut self, status: PipelineStatus) {
        if self.statuses.len() == STATUS_HISTORY {
            self.statuses.pop_front();
        }
        self.statuses.push_back(status);
    }
}

/// What happened to one pasted screenshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasteReport {
    /// Set when the screenshot resolution differs from the reference
    pub mismatch: Option<DimensionMismatch>,
    /// Per-region recognition counts
    pub batch: BatchSummary,
    /// Routing counts
    pub routed: RouteSummary,
}

/// Shared state of the whole pipeline
#[derive(Debug)]
pub struct PipelineContext {
    config: AppConfig,
    store: CalibrationStore,
    orchestrator: RecognitionOrchestrator,
    runtime: RwLock<RuntimeState>,
}

impl PipelineContext {
    /// Validate static tables and load the stored calibration
    pub fn start(config: AppConfig, store: CalibrationStore) -> Result<Self, PipelineError> {
        validate_route_table(&SEAT_ROUTE_TABLE)?;

        let orchestrator = RecognitionOrchestrator::new(EngineHandle::new(), config.languages());
        let context = Self {
            config,
            store,
            orchestrator,
            runtime: RwLock::new(RuntimeState::default()),
        };
        context.load_calibration();

        Ok(context)
    }

    /// Start with the calibration file named in the config, or the default location
    pub fn open(config: AppConfig) -> Result<Self> {
        let path = match config.storage.calibration_file.clone() {
            Some(path) => path,
            None => storage::default_calibration_path()?,
        };
        Ok(Self::start(config, CalibrationStore::new(path))?)
    }

    fn load_calibration(&self) {
        let status = match self.store.load() {
            Some(calibration) => PipelineStatus::CalibrationLoaded {
                width: calibration.reference_width(),
                height: calibration.reference_height(),
            },
            None => PipelineStatus::NoCalibration,
        };
        self.report(status);
    }

    /// Drop the engine and per-table state, then reload the calibration
    pub fn reset(&mut self) {
        info!("Resetting pipeline context");
        self.orchestrator =
            RecognitionOrchestrator::new(EngineHandle::new(), self.config.languages());
        *self.runtime.write() = RuntimeState::default();
        self.load_calibration();
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn store(&self) -> &CalibrationStore {
        &self.store
    }

    pub fn orchestrator(&self) -> &RecognitionOrchestrator {
        &self.orchestrator
    }

    /// The active calibration
    pub fn calibration(&self) -> Option<Calibration> {
        self.store.active()
    }

    /// Snapshot of the runtime state
    pub fn runtime(&self) -> RuntimeState {
        self.runtime.read().clone()
    }

    /// The latest status
    pub fn last_status(&self) -> Option<PipelineStatus> {
        self.runtime.read().last_status().cloned()
    }

    fn report(&self, status: PipelineStatus) {
        if status.is_error() {
            warn!("{}", status);
        } else {
            info!("{}", status);
        }
        self.runtime.write().push(status);
    }

    /// Initialize the shared recognition engine
    pub async fn init_engine(&self, backend: &dyn RecognitionBackend) -> Result<(), PipelineError> {
        match self
            .orchestrator
            .engine()
            .init(backend, self.orchestrator.languages())
            .await
        {
            Ok(()) => {
                self.report(PipelineStatus::EngineReady);
                Ok(())
            }
            Err(e) => {
                self.report(PipelineStatus::EngineUnavailable(e.to_string()));
                Err(PipelineError::RecognitionEngineUnavailable(e.to_string()))
            }
        }
    }

    /// A fresh editor configured from the settings
    pub fn editor(&self) -> RegionEditor {
        RegionEditor::new(self.config.viewport(), self.config.editor.min_region_size)
    }

    /// Commit the editor's regions as the active calibration
    ///
    /// `Ok(None)` while the editor does not have every region drawn.
    pub fn accept_calibration(
        &self,
        editor: &mut RegionEditor,
    ) -> Result<Option<Calibration>, PipelineError> {
        match editor.accept(&self.store) {
            Ok(Some(calibration)) => {
                self.report(PipelineStatus::CalibrationSaved {
                    width: calibration.reference_width(),
                    height: calibration.reference_height(),
                });
                Ok(Some(calibration))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                self.report(PipelineStatus::CalibrationSaveFailed(e.to_string()));
                Err(e)
            }
        }
    }

    fn require_calibration(&self) -> Result<Calibration, PipelineError> {
        self.calibration().ok_or_else(|| {
            self.report(PipelineStatus::NoCalibration);
            PipelineError::CalibrationInvalid("no calibration saved".to_string())
        })
    }

    fn report_crop(&self, grid: GridId, outcome: &CropOutcome) {
        if let Some(mismatch) = outcome.mismatch {
            self.report(PipelineStatus::DimensionMismatch(mismatch));
        }
        let failed = outcome.capture.failed_indices();
        if !failed.is_empty() {
            self.report(PipelineStatus::CropFailed {
                grid,
                regions: failed,
            });
        }
    }

    /// Crop a pasted screenshot for a table
    pub fn capture(&self, grid: GridId, frame: CapturedFrame) -> Result<CropOutcome, PipelineError> {
        let calibration = self.require_calibration()?;
        let outcome = crop_regions(frame, &calibration);
        self.report_crop(grid, &outcome);
        Ok(outcome)
    }

    /// Crop, recognize and route one pasted screenshot
    ///
    /// Missing calibration, an unavailable engine or a batch already running
    /// for the table are reported before any recognition starts. Crop
    /// warnings are only reported once the batch has been accepted.
    pub async fn process_paste(
        &self,
        grid: GridId,
        frame: CapturedFrame,
        destination: &mut dyn DestinationGrid,
    ) -> Result<PasteReport, PipelineError> {
        let calibration = self.require_calibration()?;
        if !self.orchestrator.engine().is_ready() {
            let reason = "engine not initialized".to_string();
            self.report(PipelineStatus::EngineUnavailable(reason.clone()));
            return Err(PipelineError::RecognitionEngineUnavailable(reason));
        }

        let outcome = crop_regions(frame, &calibration);
        let config = self.orchestrator.region_config(grid);

        let results = match self
            .orchestrator
            .run_batch(grid, outcome.capture.clone(), &config)
            .await
        {
            Ok(results) => results,
            Err(e) => {
                if let PipelineError::BatchInProgress(_) = e {
                    self.report(PipelineStatus::BatchBusy(grid));
                }
                return Err(e);
            }
        };
        self.report_crop(grid, &outcome);

        let batch = BatchSummary::from_results(&results);
        self.runtime.write().batches_completed += 1;
        self.report(PipelineStatus::BatchFinished {
            grid,
            recognized: batch.recognized,
            skipped: batch.skipped,
            failed: batch.failed,
        });

        let routed = route(results, grid, destination);
        self.report(PipelineStatus::Routed {
            grid,
            delivered: routed.delivered,
            skipped: routed.skipped,
        });

        Ok(PasteReport {
            mismatch: outcome.mismatch,
            batch,
            routed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::{Region, REGION_COUNT};
    use crate::routing::{GridPosition, NameCell, SEAT_POSITIONS};
    use crate::vision::{LanguageSpec, OcrError, RecognitionEngine, RecognizeOptions, RecognizedText};
    use async_trait::async_trait;
    use egui::Pos2;
    use image::{Rgba, RgbaImage};
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::{tempdir, TempDir};

    /// Engine that names each seat after the crop's first pixel
    struct SeatEngine {
        delay: Duration,
    }

    #[async_trait]
    impl RecognitionEngine for SeatEngine {
        async fn recognize(
            &self,
            image: &RgbaImage,
            _options: &RecognizeOptions,
        ) -> Result<RecognizedText, OcrError> {
            tokio::time::sleep(self.delay).await;
            let seat = image.get_pixel(0, 0).0[0];
            if seat == 99 {
                return Err(OcrError::Recognition("blurred".to_string()));
            }
            Ok(RecognizedText {
                text: format!("Player {}!", seat),
            })
        }
    }

    struct SeatBackend {
        available: bool,
        delay: Duration,
    }

    impl SeatBackend {
        fn ready() -> Self {
            Self {
                available: true,
                delay: Duration::ZERO,
            }
        }
    }

    #[async_trait]
    impl RecognitionBackend for SeatBackend {
        fn name(&self) -> &str {
            "seat"
        }

        async fn initialize(
            &self,
            _languages: &LanguageSpec,
        ) -> Result<Arc<dyn RecognitionEngine>, OcrError> {
            if self.available {
                Ok(Arc::new(SeatEngine { delay: self.delay }))
            } else {
                Err(OcrError::Init("no language data".to_string()))
            }
        }
    }

    #[derive(Default)]
    struct Seat(Option<String>);

    impl NameCell for Seat {
        fn set_name_text(&mut self, text: &str) {
            self.0 = Some(text.to_string());
        }
    }

    #[derive(Default)]
    struct Tables(HashMap<(GridId, GridPosition), Seat>);

    impl Tables {
        fn full() -> Self {
            let mut tables = Self::default();
            for grid in GridId::all() {
                for position in SEAT_POSITIONS {
                    tables.0.insert((grid, position), Seat::default());
                }
            }
            tables
        }

        fn name(&self, grid: GridId, position: GridPosition) -> Option<String> {
            self.0.get(&(grid, position)).and_then(|seat| seat.0.clone())
        }
    }

    impl DestinationGrid for Tables {
        fn cell_at(&mut self, grid: GridId, position: GridPosition) -> Option<&mut dyn NameCell> {
            self.0
                .get_mut(&(grid, position))
                .map(|seat| seat as &mut dyn NameCell)
        }
    }

    fn region(index: usize) -> Region {
        Region::new(index as u32 * 20, 10, 16, 8)
    }

    /// Screenshot whose region `i` is filled with red value `i`
    fn screenshot(width: u32, height: u32) -> CapturedFrame {
        let mut image = RgbaImage::new(width, height);
        for index in 0..REGION_COUNT {
            let r = region(index);
            for y in r.y..(r.y + r.height).min(height) {
                for x in r.x..(r.x + r.width).min(width) {
                    image.put_pixel(x, y, Rgba([index as u8, 0, 0, 255]));
                }
            }
        }
        CapturedFrame::new(image)
    }

    fn calibrated_context() -> (TempDir, PipelineContext) {
        let dir = tempdir().unwrap();
        let store = CalibrationStore::new(dir.path().join("calibration.json"));
        let regions = (0..REGION_COUNT).map(region).collect();
        store
            .save(&Calibration::new(200, 50, regions).unwrap())
            .unwrap();

        let context = PipelineContext::start(AppConfig::default(), store).unwrap();
        (dir, context)
    }

    #[test]
    fn test_start_without_calibration() {
        let dir = tempdir().unwrap();
        let store = CalibrationStore::new(dir.path().join("calibration.json"));

        let context = PipelineContext::start(AppConfig::default(), store).unwrap();

        assert!(context.calibration().is_none());
        assert_eq!(context.last_status(), Some(PipelineStatus::NoCalibration));
    }

    #[test]
    fn test_start_loads_calibration() {
        let (_dir, context) = calibrated_context();

        assert!(context.calibration().is_some());
        assert_eq!(
            context.last_status(),
            Some(PipelineStatus::CalibrationLoaded {
                width: 200,
                height: 50
            })
        );
    }

    #[test]
    fn test_capture_requires_calibration() {
        let dir = tempdir().unwrap();
        let store = CalibrationStore::new(dir.path().join("calibration.json"));
        let context = PipelineContext::start(AppConfig::default(), store).unwrap();

        let result = context.capture(GridId(0), screenshot(200, 50));

        assert!(matches!(result, Err(PipelineError::CalibrationInvalid(_))));
    }

    #[test]
    fn test_capture_reports_mismatch_and_crop_failures() {
        let (_dir, context) = calibrated_context();

        let outcome = context.capture(GridId(1), screenshot(130, 50)).unwrap();

        assert!(outcome.mismatch.is_some());
        assert_eq!(outcome.capture.failed_indices(), vec![6]);
        let statuses = context.runtime().statuses;
        assert!(statuses
            .iter()
            .any(|s| matches!(s, PipelineStatus::DimensionMismatch(_))));
        assert_eq!(
            context.last_status(),
            Some(PipelineStatus::CropFailed {
                grid: GridId(1),
                regions: vec![6]
            })
        );
    }

    #[tokio::test]
    async fn test_engine_failure_is_reported_upfront() {
        let (_dir, context) = calibrated_context();
        let mut tables = Tables::full();

        let init = context.init_engine(&SeatBackend {
                available: false,
                delay: Duration::ZERO,
            }).await;
        assert!(matches!(
            init,
            Err(PipelineError::RecognitionEngineUnavailable(_))
        ));

        let result = context
            .process_paste(GridId(0), screenshot(200, 50), &mut tables)
            .await;
        assert!(matches!(
            result,
            Err(PipelineError::RecognitionEngineUnavailable(_))
        ));
        assert!(tables.name(GridId(0), GridPosition::new(3, 1)).is_none());
    }

    #[tokio::test]
    async fn test_process_paste_routes_names_to_seats() {
        let (_dir, context) = calibrated_context();
        let mut tables = Tables::full();
        context
            .init_engine(&SeatBackend::ready())
            .await
            .unwrap();
        context.orchestrator().set_enabled(GridId(2), 3, false);

        let report = context
            .process_paste(GridId(2), screenshot(200, 50), &mut tables)
            .await
            .unwrap();

        assert!(report.mismatch.is_none());
        assert_eq!(
            report.batch,
            BatchSummary {
                recognized: REGION_COUNT - 1,
                skipped: 1,
                failed: 0
            }
        );
        assert_eq!(report.routed.delivered, REGION_COUNT - 1);

        assert_eq!(
            tables.name(GridId(2), GridPosition::new(3, 1)).as_deref(),
            Some("Player 0")
        );
        assert_eq!(
            tables.name(GridId(2), GridPosition::new(3, 3)).as_deref(),
            Some("Player 6")
        );
        // Region 3 was disabled
        assert!(tables.name(GridId(2), SEAT_ROUTE_TABLE[3]).is_none());
        // Other tables untouched
        assert!(tables.name(GridId(0), GridPosition::new(3, 1)).is_none());

        assert_eq!(context.runtime().batches_completed, 1);
        assert!(!context.orchestrator().is_busy(GridId(2)));
    }

    #[tokio::test]
    async fn test_process_paste_with_larger_screenshot_still_routes() {
        let (_dir, context) = calibrated_context();
        let mut tables = Tables::full();
        context
            .init_engine(&SeatBackend::ready())
            .await
            .unwrap();

        let report = context
            .process_paste(GridId(0), screenshot(220, 55), &mut tables)
            .await
            .unwrap();

        assert!(report.mismatch.is_some());
        assert_eq!(report.routed.delivered, REGION_COUNT);
    }

    #[tokio::test]
    async fn test_second_paste_into_busy_table_is_rejected_without_crop_statuses() {
        let (_dir, context) = calibrated_context();
        context
            .init_engine(&SeatBackend {
                available: true,
                delay: Duration::from_millis(50),
            })
            .await
            .unwrap();
        let mut first_tables = Tables::full();
        let mut second_tables = Tables::full();

        let (first, second) = tokio::join!(
            context.process_paste(GridId(0), screenshot(200, 50), &mut first_tables),
            context.process_paste(GridId(0), screenshot(130, 50), &mut second_tables),
        );

        assert_eq!(first.unwrap().routed.delivered, REGION_COUNT);
        assert!(matches!(second, Err(PipelineError::BatchInProgress(GridId(0)))));
        assert!(second_tables.name(GridId(0), GridPosition::new(3, 1)).is_none());

        let statuses = context.runtime().statuses;
        assert!(statuses.contains(&PipelineStatus::BatchBusy(GridId(0))));
        assert!(!statuses.iter().any(|s| matches!(
            s,
            PipelineStatus::DimensionMismatch(_) | PipelineStatus::CropFailed { .. }
        )));
        assert_eq!(context.runtime().batches_completed, 1);
    }

    #[tokio::test]
    async fn test_reset_drops_engine_and_reloads_calibration() {
        let (_dir, mut context) = calibrated_context();
        context
            .init_engine(&SeatBackend::ready())
            .await
            .unwrap();

        context.reset();

        assert!(!context.orchestrator().engine().is_ready());
        assert!(context.calibration().is_some());
        assert_eq!(context.runtime().batches_completed, 0);
    }

    #[test]
    fn test_accept_calibration_through_editor() {
        let dir = tempdir().unwrap();
        let store = CalibrationStore::new(dir.path().join("calibration.json"));
        let context = PipelineContext::start(AppConfig::default(), store).unwrap();

        let mut editor = context.editor();
        editor.load_reference(RgbaImage::new(2400, 1600));
        assert!((editor.scale() - 0.5).abs() < 1e-6);

        for index in 0..REGION_COUNT {
            let x = 10.0 + index as f32 * 50.0;
            editor.pointer_down(Pos2::new(x, 20.0));
            editor.pointer_up(Pos2::new(x + 40.0, 40.0));
            if index == 0 {
                assert!(context.accept_calibration(&mut editor).unwrap().is_none());
            }
        }

        let calibration = context.accept_calibration(&mut editor).unwrap().unwrap();

        assert_eq!(calibration.regions()[0], Region::new(20, 40, 80, 40));
        assert_eq!(context.calibration(), Some(calibration));
        assert_eq!(
            context.last_status(),
            Some(PipelineStatus::CalibrationSaved {
                width: 2400,
                height: 1600
            })
        );
    }
}
