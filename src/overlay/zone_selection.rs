//! Interactive seat region editor
//!
//! Pointer-driven rectangle drawing over the displayed reference screenshot.
//! The UI layer forwards pointer events in display pixels; the editor keeps
//! the drawn list, the live preview and per-region thumbnails.

use egui::{ColorImage, Pos2, Rect, Vec2};
use image::{imageops, RgbaImage};
use tracing::{debug, info};

use super::{display_scale, display_size, display_to_native, Viewport};
use crate::calibration::{Calibration, Region, MIN_REGION_SIZE, REGION_COUNT};
use crate::error::PipelineError;
use crate::storage::CalibrationStore;

/// Pointer state of the editor
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum EditorState {
    /// Waiting for a pointer-down
    #[default]
    Idle,
    /// Dragging out a rectangle
    Drawing {
        /// Where the drag started (display pixels)
        anchor: Pos2,
        /// Latest pointer position (display pixels)
        current: Pos2,
    },
}

/// Visual-only crop of a drawn region
#[derive(Debug, Clone)]
pub struct Thumbnail {
    /// Ordinal index of the region
    pub index: usize,
    /// Cropped display-space pixels
    pub image: RgbaImage,
}

impl Thumbnail {
    /// Convert to an egui image for display
    pub fn to_color_image(&self) -> ColorImage {
        let size = [self.image.width() as usize, self.image.height() as usize];
        ColorImage::from_rgba_unmultiplied(size, self.image.as_raw())
    }
}

/// Reference screenshot as loaded into the editor
#[derive(Debug, Clone)]
struct Reference {
    native_size: (u32, u32),
    display_size: Vec2,
    scale: f32,
    /// Reference resized to display size, thumbnails are cut from this
    display_image: RgbaImage,
}

/// Draws [`REGION_COUNT`] regions and commits them as a calibration
#[derive(Debug, Clone)]
pub struct RegionEditor {
    viewport: Viewport,
    min_region_size: f32,
    reference: Option<Reference>,
    state: EditorState,
    drawn: Vec<Rect>,
    thumbnails: Vec<Thumbnail>,
    accepted: bool,
}

impl Default for RegionEditor {
    fn default() -> Self {
        Self::new(Viewport::default(), MIN_REGION_SIZE)
    }
}

impl RegionEditor {
    pub fn new(viewport: Viewport, min_region_size: f32) -> Self {
        Self {
            viewport,
            min_region_size,
            reference: None,
            state: EditorState::Idle,
            drawn: Vec::new(),
            thumbnails: Vec::new(),
            accepted: false,
        }
    }

    /// Show a new reference screenshot and start over
    pub fn load_reference(&mut self, image: RgbaImage) {
        let native_size = image.dimensions();
        let scale = display_scale(native_size, self.viewport);
        let display_size = display_size(native_size, scale);

        let display_image = if scale < 1.0 {
            imageops::resize(
                &image,
                display_size.x as u32,
                display_size.y as u32,
                imageops::FilterType::Triangle,
            )
        } else {
            image
        };

        info!(
            "Reference loaded: {}x{} native, shown at {:.0}x{:.0} (scale {:.3})",
            native_size.0, native_size.1, display_size.x, display_size.y, scale
        );

        self.reference = Some(Reference {
            native_size,
            display_size,
            scale,
            display_image,
        });
        self.state = EditorState::Idle;
        self.drawn.clear();
        self.thumbnails.clear();
        self.accepted = false;
    }

    pub fn has_reference(&self) -> bool {
        self.reference.is_some()
    }

    /// Display scale of the current reference (1.0 when none is loaded)
    pub fn scale(&self) -> f32 {
        self.reference.as_ref().map_or(1.0, |r| r.scale)
    }

    /// Display size of the current reference
    pub fn display_size(&self) -> Option<Vec2> {
        self.reference.as_ref().map(|r| r.display_size)
    }

    /// Native size of the current reference
    pub fn native_size(&self) -> Option<(u32, u32)> {
        self.reference.as_ref().map(|r| r.native_size)
    }

    pub fn state(&self) -> EditorState {
        self.state
    }

    /// Regions drawn so far, display pixels, in drawn order
    pub fn drawn_regions(&self) -> &[Rect] {
        &self.drawn
    }

    pub fn drawn_count(&self) -> usize {
        self.drawn.len()
    }

    pub fn thumbnails(&self) -> &[Thumbnail] {
        &self.thumbnails
    }

    /// Whether the current region set has been committed
    pub fn is_accepted(&self) -> bool {
        self.accepted
    }

    /// Rectangle being dragged out, normalized
    pub fn preview(&self) -> Option<Rect> {
        match self.state {
            EditorState::Drawing { anchor, current } => Some(Rect::from_two_pos(anchor, current)),
            EditorState::Idle => None,
        }
    }

    fn canvas(&self) -> Option<Rect> {
        self.reference
            .as_ref()
            .map(|r| Rect::from_min_size(Pos2::ZERO, r.display_size))
    }

    /// Start a rectangle; ignored outside the canvas or once all regions are drawn
    ///
    /// Returns whether drawing started.
    pub fn pointer_down(&mut self, pos: Pos2) -> bool {
        let Some(canvas) = self.canvas() else {
            return false;
        };
        if self.state != EditorState::Idle
            || self.drawn.len() >= REGION_COUNT
            || !canvas.contains(pos)
        {
            return false;
        }

        self.state = EditorState::Drawing {
            anchor: pos,
            current: pos,
        };
        true
    }

    /// Update the live preview while dragging
    pub fn pointer_move(&mut self, pos: Pos2) {
        let Some(canvas) = self.canvas() else {
            return;
        };
        if let EditorState::Drawing { anchor, .. } = self.state {
            self.state = EditorState::Drawing {
                anchor,
                current: pos.clamp(canvas.min, canvas.max),
            };
        }
    }

    /// Finish the rectangle
    ///
    /// Returns the new region's index, or `None` when nothing was being drawn
    /// or the rectangle was smaller than the minimum size (a misclick).
    pub fn pointer_up(&mut self, pos: Pos2) -> Option<usize> {
        self.pointer_move(pos);
        let rect = self.preview()?;
        self.state = EditorState::Idle;

        if rect.width() < self.min_region_size || rect.height() < self.min_region_size {
            debug!(
                "Discarding {:.0}x{:.0} rectangle below the {} px minimum",
                rect.width(),
                rect.height(),
                self.min_region_size
            );
            return None;
        }

        let index = self.drawn.len();
        self.drawn.push(rect);
        if let Some(thumbnail) = self.thumbnail(index, rect) {
            self.thumbnails.push(thumbnail);
        }
        debug!("Region {} drawn at {:?}", index, rect);

        Some(index)
    }

    /// Abandon the rectangle being dragged
    pub fn cancel_drag(&mut self) {
        self.state = EditorState::Idle;
    }

    /// Clear every drawn region
    pub fn reset(&mut self) {
        self.state = EditorState::Idle;
        self.drawn.clear();
        self.thumbnails.clear();
        self.accepted = false;
    }

    /// Accept is only possible with exactly [`REGION_COUNT`] regions drawn
    pub fn can_accept(&self) -> bool {
        self.reference.is_some() && self.drawn.len() == REGION_COUNT
    }

    /// Drawn regions converted to native pixels
    pub fn native_regions(&self) -> Option<Vec<Region>> {
        let reference = self.reference.as_ref()?;
        Some(
            self.drawn
                .iter()
                .map(|rect| display_to_native(*rect, reference.display_size, reference.native_size))
                .collect(),
        )
    }

    /// Convert the drawn set to native space and save it
    ///
    /// A no-op returning `Ok(None)` while fewer than [`REGION_COUNT`] regions
    /// are drawn.
    pub fn accept(&mut self, store: &CalibrationStore) -> Result<Option<Calibration>, PipelineError> {
        if !self.can_accept() {
            debug!(
                "Accept ignored: {} of {} regions drawn",
                self.drawn.len(),
                REGION_COUNT
            );
            return Ok(None);
        }
        let (Some(reference), Some(regions)) = (self.reference.as_ref(), self.native_regions())
        else {
            return Ok(None);
        };

        let calibration =
            Calibration::new(reference.native_size.0, reference.native_size.1, regions)?;
        store.save(&calibration)?;
        self.accepted = true;

        info!("Calibration accepted with {} regions", REGION_COUNT);
        Ok(Some(calibration))
    }

    fn thumbnail(&self, index: usize, rect: Rect) -> Option<Thumbnail> {
        let image = &self.reference.as_ref()?.display_image;
        let x = rect.min.x.round() as u32;
        let y = rect.min.y.round() as u32;
        let width = (rect.width().round() as u32).min(image.width().saturating_sub(x));
        let height = (rect.height().round() as u32).min(image.height().saturating_sub(y));
        if width == 0 || height == 0 {
            return None;
        }

        Some(Thumbnail {
            index,
            image: imageops::crop_imm(image, x, y, width, height).to_image(),
        })
    }
}
