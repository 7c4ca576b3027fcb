//! Raster-surface abstraction the map projector draws through.
//!
//! The surface is host-owned; the projector only ever issues these
//! primitives and never touches pixels directly.

use anyhow::Result;

/// RGBA color with alpha in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f64,
}

impl Color {
    pub const fn rgba(r: u8, g: u8, b: u8, a: f64) -> Self {
        Self { r, g, b, a }
    }

    pub fn with_alpha(self, a: f64) -> Self {
        Self { a, ..self }
    }
}

/// A 2D raster surface accepting fill, stroke, arc, and text primitives.
pub trait DrawSurface {
    fn width(&self) -> f64;
    fn height(&self) -> f64;

    /// Fill the whole surface with one color.
    fn fill(&mut self, color: Color) -> Result<()>;
    fn fill_rect(&mut self, x: f64, y: f64, w: f64, h: f64, color: Color) -> Result<()>;
    fn stroke_line(
        &mut self,
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
        line_width: f64,
        color: Color,
    ) -> Result<()>;
    fn fill_circle(&mut self, x: f64, y: f64, radius: f64, color: Color) -> Result<()>;
    fn text(&mut self, text: &str, x: f64, y: f64, color: Color) -> Result<()>;
}
