//! Error types for the capture pipeline
//!
//! Failures local to one region are recorded in that region's result and
//! never surface as `Err`. The variants here that do surface as `Err` make the
//! whole pipeline unusable for the current request and are reported before any
//! work starts.

use std::io;
use thiserror::Error;

use crate::routing::GridId;

/// Main pipeline error type
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Calibration is invalid: {0}")]
    CalibrationInvalid(String),

    #[error("Region {index} does not fit inside the {image_width}x{image_height} screenshot")]
    CropOutOfBounds {
        index: usize,
        image_width: u32,
        image_height: u32,
    },

    #[error(transparent)]
    DimensionMismatch(#[from] DimensionMismatch),

    #[error("Recognition engine is unavailable: {0}")]
    RecognitionEngineUnavailable(String),

    #[error("Recognition failed for region {index}: {reason}")]
    RecognitionTaskFailed { index: usize, reason: String },

    #[error("A recognition batch is already running for {0}")]
    BatchInProgress(GridId),

    #[error("Recognition batch for {grid} stopped: {reason}")]
    BatchAborted { grid: GridId, reason: String },

    #[error("Expected {expected} region settings, got {actual}")]
    ConfigLength { expected: usize, actual: usize },

    #[error("Seat route table is invalid: {0}")]
    RouteTableInvalid(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Screenshot resolution differs from the calibration reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error(
    "Screenshot is {actual_width}x{actual_height} but the calibration was drawn on \
     {expected_width}x{expected_height}; regions may be misaligned"
)]
pub struct DimensionMismatch {
    pub expected_width: u32,
    pub expected_height: u32,
    pub actual_width: u32,
    pub actual_height: u32,
}

/// Calibration persistence errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Calibration must have {expected} regions, got {actual}")]
    WrongRegionCount { expected: usize, actual: usize },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
