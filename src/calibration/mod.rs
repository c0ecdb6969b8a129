//! Calibration data
//!
//! A calibration is the ordered set of seat regions drawn on a reference
//! screenshot, stored in that screenshot's native pixel space together with
//! its resolution. A region's position in the list is its ordinal index.

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Number of seat regions in a calibration (seven seats per table)
pub const REGION_COUNT: usize = 7;

/// Minimum width and height, in display pixels, of a drawn region
pub const MIN_REGION_SIZE: f32 = 5.0;

/// Axis-aligned rectangle in native image pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
    /// Left edge
    pub x: u32,
    /// Top edge
    pub y: u32,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl Region {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Exclusive right edge
    pub fn right(&self) -> u64 {
        self.x as u64 + self.width as u64
    }

    /// Exclusive bottom edge
    pub fn bottom(&self) -> u64 {
        self.y as u64 + self.height as u64
    }

    /// Check the region is non-empty and lies fully inside an image of the given size
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.width > 0
            && self.height > 0
            && self.right() <= width as u64
            && self.bottom() <= height as u64
    }
}

/// The active set of seat regions plus the reference resolution they were drawn on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Calibration {
    reference_width: u32,
    reference_height: u32,
    regions: Vec<Region>,
}

impl Calibration {
    /// Build a calibration, rejecting anything but exactly [`REGION_COUNT`] regions
    pub fn new(
        reference_width: u32,
        reference_height: u32,
        regions: Vec<Region>,
    ) -> Result<Self, PipelineError> {
        if regions.len() != REGION_COUNT {
            return Err(PipelineError::CalibrationInvalid(format!(
                "expected {} regions, got {}",
                REGION_COUNT,
                regions.len()
            )));
        }
        if reference_width == 0 || reference_height == 0 {
            return Err(PipelineError::CalibrationInvalid(format!(
                "reference size {}x{} is empty",
                reference_width, reference_height
            )));
        }

        Ok(Self {
            reference_width,
            reference_height,
            regions,
        })
    }

    pub fn reference_width(&self) -> u32 {
        self.reference_width
    }

    pub fn reference_height(&self) -> u32 {
        self.reference_height
    }

    /// Reference resolution as (width, height)
    pub fn reference_size(&self) -> (u32, u32) {
        (self.reference_width, self.reference_height)
    }

    /// Regions in ordinal order
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }
}
