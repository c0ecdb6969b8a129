//! Capture & crop
//!
//! Cuts every calibrated region out of a freshly pasted screenshot. Cropping
//! is synchronous and per-region: one region falling outside the screenshot
//! never stops the others from being cropped.

pub mod frame;

pub use frame::CapturedFrame;

use image::{imageops, RgbaImage};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::calibration::{Calibration, Region};
use crate::error::{DimensionMismatch, PipelineError};

/// Cropped region images of one pasted screenshot
///
/// Owned by the destination grid the screenshot was pasted into.
#[derive(Debug, Clone)]
pub struct Capture {
    source: Arc<CapturedFrame>,
    crops: Vec<Option<Arc<RgbaImage>>>,
}

impl Capture {
    /// Assemble a capture from already cropped images
    pub fn new(source: Arc<CapturedFrame>, crops: Vec<Option<Arc<RgbaImage>>>) -> Self {
        Self { source, crops }
    }

    /// The pasted screenshot
    pub fn source(&self) -> &CapturedFrame {
        &self.source
    }

    /// Crops in ordinal order, `None` where cropping failed
    pub fn crops(&self) -> &[Option<Arc<RgbaImage>>] {
        &self.crops
    }

    pub fn crop(&self, index: usize) -> Option<&Arc<RgbaImage>> {
        self.crops.get(index).and_then(Option::as_ref)
    }

    pub fn len(&self) -> usize {
        self.crops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.crops.is_empty()
    }

    /// Indices of regions that could not be cropped
    pub fn failed_indices(&self) -> Vec<usize> {
        self.crops
            .iter()
            .enumerate()
            .filter(|(_, crop)| crop.is_none())
            .map(|(index, _)| index)
            .collect()
    }
}

/// Result of cropping a screenshot
#[derive(Debug, Clone)]
pub struct CropOutcome {
    pub capture: Capture,
    /// Set when the screenshot resolution differs from the calibration reference
    pub mismatch: Option<DimensionMismatch>,
}

/// Crop one region at its exact pixel rectangle
pub fn crop_region(
    image: &RgbaImage,
    index: usize,
    region: &Region,
) -> Result<RgbaImage, PipelineError> {
    let (width, height) = image.dimensions();
    if !region.fits_within(width, height) {
        return Err(PipelineError::CropOutOfBounds {
            index,
            image_width: width,
            image_height: height,
        });
    }

    Ok(imageops::crop_imm(image, region.x, region.y, region.width, region.height).to_image())
}

/// Compare a screenshot's resolution with the calibration reference
pub fn check_dimensions(
    frame: &CapturedFrame,
    calibration: &Calibration,
) -> Option<DimensionMismatch> {
    let (actual_width, actual_height) = frame.dimensions();
    let (expected_width, expected_height) = calibration.reference_size();

    if (actual_width, actual_height) == (expected_width, expected_height) {
        return None;
    }

    Some(DimensionMismatch {
        expected_width,
        expected_height,
        actual_width,
        actual_height,
    })
}

/// Crop every calibrated region out of a screenshot
///
/// Region coordinates are used as stored, even when the screenshot's
/// resolution differs from the reference; the mismatch is only reported.
pub fn crop_regions(frame: impl Into<Arc<CapturedFrame>>, calibration: &Calibration) -> CropOutcome {
    let frame = frame.into();

    let mismatch = check_dimensions(&frame, calibration);
    if let Some(ref mismatch) = mismatch {
        warn!("{}", mismatch);
    }

    let crops = calibration
        .regions()
        .iter()
        .enumerate()
        .map(|(index, region)| match crop_region(&frame.image, index, region) {
            Ok(crop) => {
                debug!("Cropped region {} ({}x{})", index, crop.width(), crop.height());
                Some(Arc::new(crop))
            }
            Err(e) => {
                warn!("{}", e);
                None
            }
        })
        .collect();

    CropOutcome {
        capture: Capture::new(frame, crops),
        mismatch,
    }
}
