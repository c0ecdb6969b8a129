//! Calibration persistence
//!
//! The active calibration is kept in memory and mirrored to a JSON record on
//! disk. Loading never fails: anything missing or malformed on disk is treated
//! as "no calibration".

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::calibration::{Calibration, Region, REGION_COUNT};
use crate::error::{PipelineError, StorageError};

/// On-disk shape of a calibration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationRecord {
    /// Native width of the screenshot the regions were drawn on
    pub setup_image_original_width: u32,
    /// Native height of the screenshot the regions were drawn on
    pub setup_image_original_height: u32,
    /// Regions in ordinal order, native pixels
    pub regions: Vec<Region>,
}

impl From<&Calibration> for CalibrationRecord {
    fn from(calibration: &Calibration) -> Self {
        Self {
            setup_image_original_width: calibration.reference_width(),
            setup_image_original_height: calibration.reference_height(),
            regions: calibration.regions().to_vec(),
        }
    }
}

impl TryFrom<CalibrationRecord> for Calibration {
    type Error = PipelineError;

    fn try_from(record: CalibrationRecord) -> Result<Self, Self::Error> {
        Calibration::new(
            record.setup_image_original_width,
            record.setup_image_original_height,
            record.regions,
        )
    }
}

/// Serialize a calibration to its JSON record
pub fn serialize_calibration(calibration: &Calibration) -> Result<String, StorageError> {
    let record = CalibrationRecord::from(calibration);
    Ok(serde_json::to_string_pretty(&record)?)
}

/// Parse a JSON record, validating its shape
pub fn deserialize_calibration(content: &str) -> Result<Calibration, PipelineError> {
    let record: CalibrationRecord = serde_json::from_str(content)
        .map_err(|e| PipelineError::CalibrationInvalid(e.to_string()))?;
    Calibration::try_from(record)
}

/// Process-wide holder of the active calibration
#[derive(Debug)]
pub struct CalibrationStore {
    path: PathBuf,
    active: RwLock<Option<Calibration>>,
}

impl CalibrationStore {
    /// Create a store backed by the given file; nothing is read until [`load`](Self::load)
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            active: RwLock::new(None),
        }
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the calibration from disk and make it the active one
    ///
    /// Returns `None` when the file is missing, unreadable or malformed.
    pub fn load(&self) -> Option<Calibration> {
        let loaded = match std::fs::read_to_string(&self.path) {
            Ok(content) => match deserialize_calibration(&content) {
                Ok(calibration) => {
                    info!(
                        "Loaded calibration from {:?} ({}x{} reference)",
                        self.path,
                        calibration.reference_width(),
                        calibration.reference_height()
                    );
                    Some(calibration)
                }
                Err(e) => {
                    warn!("Ignoring stored calibration at {:?}: {}", self.path, e);
                    None
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No calibration stored at {:?}", self.path);
                None
            }
            Err(e) => {
                warn!("Could not read calibration at {:?}: {}", self.path, e);
                None
            }
        };

        *self.active.write() = loaded.clone();
        loaded
    }

    /// Replace the stored calibration
    ///
    /// The record is written to a sibling temp file and renamed over the
    /// target, so a reader sees either the old or the new calibration.
    pub fn save(&self, calibration: &Calibration) -> Result<(), StorageError> {
        if calibration.regions().len() != REGION_COUNT {
            return Err(StorageError::WrongRegionCount {
                expected: REGION_COUNT,
                actual: calibration.regions().len(),
            });
        }

        let content = serialize_calibration(calibration)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let temp_path = self.path.with_extension("json.tmp");
        std::fs::write(&temp_path, content)?;
        std::fs::rename(&temp_path, &self.path)?;

        *self.active.write() = Some(calibration.clone());
        info!("Saved calibration to {:?}", self.path);

        Ok(())
    }

    /// The calibration currently in effect
    pub fn active(&self) -> Option<Calibration> {
        self.active.read().clone()
    }
}
