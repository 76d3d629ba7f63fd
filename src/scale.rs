//! On-screen geometry for a thumbnail cell.
//!
//! Runs on every layout pass for every visible entry, so everything here is
//! total: degenerate input yields a neutral answer rather than an error.

use crate::{DEFAULT_PIXEL_SCALE, DEFAULT_THUMBNAIL_SIZE};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplaySize {
    pub width: f64,
    pub height: f64,
}

impl DisplaySize {
    pub const ZERO: DisplaySize = DisplaySize { width: 0.0, height: 0.0 };

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    pub fn fits_within(&self, container_size: f64) -> bool {
        self.width <= container_size && self.height <= container_size
    }

    /// Top-left offset that centres this size in a square cell. Negative when
    /// the image overflows the cell.
    pub fn centered_origin(&self, container_size: f64) -> (f64, f64) {
        (
            (container_size - self.width) / 2.0,
            (container_size - self.height) / 2.0,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplaySettings {
    pub container_size: f64,
    pub fit_small: bool,
    pub fit_large: bool,
    pub pixel_scale: f64,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            container_size: DEFAULT_THUMBNAIL_SIZE,
            fit_small: true,
            fit_large: true,
            pixel_scale: DEFAULT_PIXEL_SCALE,
        }
    }
}

impl DisplaySettings {
    pub fn scale_for(&self, pixel_width: u32, pixel_height: u32) -> f64 {
        compute_scale(
            pixel_width as f64,
            pixel_height as f64,
            self.container_size,
            self.fit_small,
            self.fit_large,
            self.pixel_scale,
        )
    }

    pub fn display_size(&self, pixel_width: u32, pixel_height: u32) -> DisplaySize {
        compute_display_size(
            pixel_width as f64,
            pixel_height as f64,
            self.container_size,
            self.fit_small,
            self.fit_large,
            self.pixel_scale,
        )
    }
}

fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

/// Scale factor applied to the native pixel size. `1.0` for degenerate input.
pub fn compute_scale(
    pixel_width: f64,
    pixel_height: f64,
    container_size: f64,
    fit_small: bool,
    fit_large: bool,
    pixel_scale: f64,
) -> f64 {
    if !is_positive(pixel_width) || !is_positive(pixel_height) || !is_positive(container_size) {
        return 1.0;
    }

    if fit_small {
        let scale = (container_size / pixel_width).min(container_size / pixel_height);
        if fit_large {
            scale
        } else {
            scale.max(1.0)
        }
    } else {
        let pixel_scale = if is_positive(pixel_scale) { pixel_scale } else { 1.0 };
        let scaled_width = pixel_width * pixel_scale;
        let scaled_height = pixel_height * pixel_scale;

        if fit_large && (scaled_width > container_size || scaled_height > container_size) {
            let fit_scale = (container_size / scaled_width).min(container_size / scaled_height);
            pixel_scale * fit_scale
        } else {
            pixel_scale
        }
    }
}

/// On-screen size of an image in a square cell of `container_size`.
///
/// In manual mode without `fit_large` the result may exceed the cell; the
/// caller clips or centres it. Degenerate input yields [`DisplaySize::ZERO`].
pub fn compute_display_size(
    pixel_width: f64,
    pixel_height: f64,
    container_size: f64,
    fit_small: bool,
    fit_large: bool,
    pixel_scale: f64,
) -> DisplaySize {
    if !is_positive(pixel_width) || !is_positive(pixel_height) || !is_positive(container_size) {
        return DisplaySize::ZERO;
    }

    if !fit_small {
        let pixel_scale = if is_positive(pixel_scale) { pixel_scale } else { 1.0 };
        let scaled_width = pixel_width * pixel_scale;
        let scaled_height = pixel_height * pixel_scale;

        // Multiply the already scaled size so the unclamped path stays exact
        if fit_large && (scaled_width > container_size || scaled_height > container_size) {
            let fit_scale = (container_size / scaled_width).min(container_size / scaled_height);
            return DisplaySize {
                width: scaled_width * fit_scale,
                height: scaled_height * fit_scale,
            };
        }
        return DisplaySize {
            width: scaled_width,
            height: scaled_height,
        };
    }

    let scale = compute_scale(pixel_width, pixel_height, container_size, fit_small, fit_large, pixel_scale);
    DisplaySize {
        width: pixel_width * scale,
        height: pixel_height * scale,
    }
}
