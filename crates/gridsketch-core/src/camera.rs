//! Screen/view transform for the drawing surface.

use kurbo::{Affine, Point, Vec2};
use serde::{Deserialize, Serialize};

/// Zoom multiplier for one wheel notch.
pub const WHEEL_ZOOM_STEP: f64 = 1.1;

/// Maps between screen pixels and view space.
///
/// View space is the unzoomed, unpanned pixel space in which the grid and the
/// origin live. Screen = view * zoom + pan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    /// Screen offset of the view-space origin.
    pub pan: Vec2,
    /// 1.0 is 100%.
    pub zoom: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
}

impl Default for Camera {
    fn default() -> Self {
        Self::with_zoom_bounds(0.1, 10.0)
    }
}

impl Camera {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_zoom_bounds(min_zoom: f64, max_zoom: f64) -> Self {
        Self {
            pan: Vec2::ZERO,
            zoom: 1.0,
            min_zoom,
            max_zoom,
        }
    }

    /// View space to screen space.
    pub fn view_transform(&self) -> Affine {
        Affine::translate(self.pan) * Affine::scale(self.zoom)
    }

    pub fn screen_to_view(&self, screen: Point) -> Point {
        self.view_transform().inverse() * screen
    }

    pub fn view_to_screen(&self, view: Point) -> Point {
        self.view_transform() * view
    }

    /// A distance measured on screen, in view units. Keeps pick and snap
    /// tolerances constant on screen at any zoom.
    pub fn screen_distance_to_view(&self, distance: f64) -> f64 {
        distance / self.zoom
    }

    pub fn pan_by(&mut self, delta: Vec2) {
        self.pan += delta;
    }

    /// Multiply the zoom by `factor` (clamped) around a fixed screen point.
    /// Returns whether the zoom changed.
    pub fn zoom_at(&mut self, anchor: Point, factor: f64) -> bool {
        let zoom = (self.zoom * factor).clamp(self.min_zoom, self.max_zoom);
        if (zoom - self.zoom).abs() < f64::EPSILON {
            return false;
        }
        let fixed = self.screen_to_view(anchor);
        self.zoom = zoom;
        self.pan += anchor - self.view_to_screen(fixed);
        true
    }

    /// Mouse wheel zoom: each notch scrolled up (negative `notches`) zooms in
    /// by [`WHEEL_ZOOM_STEP`], each notch down zooms out.
    pub fn wheel_zoom(&mut self, anchor: Point, notches: f64) -> bool {
        self.zoom_at(anchor, WHEEL_ZOOM_STEP.powf(-notches))
    }

    /// Back to 100% with no pan. Zoom bounds are kept.
    pub fn reset(&mut self) {
        self.pan = Vec2::ZERO;
        self.zoom = 1.0;
    }
}
