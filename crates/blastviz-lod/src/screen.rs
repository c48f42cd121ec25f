//! Pixels-per-world-unit from camera parameters.

/// Camera description sufficient to convert world lengths to pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ScreenScale {
    /// Orthographic camera.
    Orthographic {
        /// World units shown vertically at zoom 1.
        view_height: f32,
        /// Magnification; 2 shows half as many world units.
        zoom: f32,
    },
    /// Perspective camera measured at a given depth.
    Perspective {
        /// Vertical field of view in radians.
        fov_y: f32,
        /// Distance from the eye in world units.
        distance: f32,
    },
}

impl ScreenScale {
    /// Orthographic camera showing `view_height` units at `zoom`.
    pub fn orthographic(view_height: f32, zoom: f32) -> Self {
        Self::Orthographic { view_height, zoom }
    }

    /// Perspective camera with `fov_y` radians, measured `distance` units out.
    pub fn perspective(fov_y: f32, distance: f32) -> Self {
        Self::Perspective { fov_y, distance }
    }

    /// Pixels covered by one world unit on a viewport `viewport_height` pixels tall.
    ///
    /// Degenerate cameras yield 0, which classifies everything as the lowest band.
    pub fn pixels_per_unit(&self, viewport_height: f32) -> f32 {
        let visible = match *self {
            ScreenScale::Orthographic { view_height, zoom } => view_height / zoom,
            ScreenScale::Perspective { fov_y, distance } => 2.0 * distance * (fov_y * 0.5).tan(),
        };
        let ppu = viewport_height / visible;
        if ppu.is_finite() && ppu > 0.0 { ppu } else { 0.0 }
    }
}
