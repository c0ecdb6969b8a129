//! Status lines reported to the user

use std::fmt;

use crate::error::DimensionMismatch;
use crate::routing::GridId;

/// Outcome of a pipeline step, rendered as one human-readable line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineStatus {
    /// No usable calibration is stored
    NoCalibration,
    /// A calibration was loaded at startup
    CalibrationLoaded { width: u32, height: u32 },
    /// The editor's regions were saved
    CalibrationSaved { width: u32, height: u32 },
    /// The editor's regions could not be saved
    CalibrationSaveFailed(String),
    /// Screenshot resolution differs from the reference
    DimensionMismatch(DimensionMismatch),
    /// Some regions fell outside the screenshot
    CropFailed { grid: GridId, regions: Vec<usize> },
    /// Recognition engine could not be initialized
    EngineUnavailable(String),
    /// Recognition engine is ready
    EngineReady,
    /// A batch is already running for this table
    BatchBusy(GridId),
    /// A batch settled
    BatchFinished {
        grid: GridId,
        recognized: usize,
        skipped: usize,
        failed: usize,
    },
    /// Recognized names were handed to the table
    Routed {
        grid: GridId,
        delivered: usize,
        skipped: usize,
    },
}

impl PipelineStatus {
    /// Whether the status should be shown as an error
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Self::NoCalibration
                | Self::CalibrationSaveFailed(_)
                | Self::CropFailed { .. }
                | Self::EngineUnavailable(_)
                | Self::BatchBusy(_)
        ) || matches!(self, Self::BatchFinished { failed, .. } if *failed > 0)
    }
}

impl fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCalibration => {
                write!(f, "No calibration found. Draw the seat regions on a reference screenshot first.")
            }
            Self::CalibrationLoaded { width, height } => {
                write!(f, "Calibration loaded ({}x{} reference).", width, height)
            }
            Self::CalibrationSaved { width, height } => {
                write!(f, "Calibration saved ({}x{} reference).", width, height)
            }
            Self::CalibrationSaveFailed(reason) => {
                write!(f, "Could not save calibration: {}", reason)
            }
            Self::DimensionMismatch(mismatch) => {
                write!(f, "Warning: {}. Re-calibrate if names land in the wrong seats.", mismatch)
            }
            Self::CropFailed { grid, regions } => {
                let list = regions
                    .iter()
                    .map(|index| (index + 1).to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "{}: region(s) {} fall outside the screenshot.", grid, list)
            }
            Self::EngineUnavailable(reason) => {
                write!(f, "Text recognition is unavailable: {}", reason)
            }
            Self::EngineReady => write!(f, "Text recognition is ready."),
            Self::BatchBusy(grid) => {
                write!(f, "{}: recognition is still running, wait for it to finish.", grid)
            }
            Self::BatchFinished {
                grid,
                recognized,
                skipped,
                failed,
            } => {
                write!(
                    f,
                    "{}: recognized {} seat(s), skipped {}, failed {}.",
                    grid, recognized, skipped, failed
                )
            }
            Self::Routed {
                grid,
                delivered,
                skipped,
            } => {
                write!(f, "{}: filled {} seat(s)", grid, delivered)?;
                if *skipped > 0 {
                    write!(f, ", {} seat(s) not found", skipped)?;
                }
                write!(f, ".")
            }
        }
    }
}
