//! Region drawing over the reference screenshot
//!
//! The reference screenshot is shown at a bounded display size. Regions are
//! drawn in display pixels and converted to native image pixels on accept.

pub mod zone_selection;

pub use zone_selection::{EditorState, RegionEditor, Thumbnail};

use egui::{Rect, Vec2};

use crate::calibration::Region;

/// Bounded area the reference screenshot is fitted into
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// Maximum display width in pixels
    pub max_width: f32,
    /// Maximum display height in pixels
    pub max_height: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            max_width: 1200.0,
            max_height: 800.0,
        }
    }
}

/// Scale that fits a native image into the viewport without upscaling
pub fn display_scale(native_size: (u32, u32), viewport: Viewport) -> f32 {
    let (width, height) = native_size;
    if width == 0 || height == 0 {
        return 1.0;
    }

    1.0_f32
        .min(viewport.max_width / width as f32)
        .min(viewport.max_height / height as f32)
}

/// Display size of a native image at the given scale, in whole pixels
pub fn display_size(native_size: (u32, u32), scale: f32) -> Vec2 {
    egui::vec2(
        (native_size.0 as f32 * scale).round().max(1.0),
        (native_size.1 as f32 * scale).round().max(1.0),
    )
}

/// Convert a display-space rectangle to a native-space region
pub fn display_to_native(rect: Rect, display_size: Vec2, native_size: (u32, u32)) -> Region {
    let scale_x = native_size.0 as f32 / display_size.x;
    let scale_y = native_size.1 as f32 / display_size.y;

    // Negative values saturate to zero in the cast
    Region::new(
        (rect.min.x * scale_x).round() as u32,
        (rect.min.y * scale_y).round() as u32,
        (rect.width() * scale_x).round() as u32,
        (rect.height() * scale_y).round() as u32,
    )
}
