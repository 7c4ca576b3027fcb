//! OpenCV-backed raster surface.
//!
//! The map is drawn into a BGR `Mat` with `imgproc` primitives and shown by
//! the host through HighGUI. `imgproc` has no alpha blending, so alpha is
//! approximated by scaling the color toward the dark background.

use anyhow::Result;
use opencv::core::{Mat, Point, Rect, Scalar, CV_8UC3};
use opencv::imgproc;
use opencv::prelude::*;

use crate::viz::surface::{Color, DrawSurface};

pub struct MatSurface {
    mat: Mat,
    width: i32,
    height: i32,
}

impl MatSurface {
    pub fn new(width: i32, height: i32) -> Result<Self> {
        let mat = Mat::new_rows_cols_with_default(height, width, CV_8UC3, Scalar::all(0.0))?;
        Ok(Self { mat, width, height })
    }

    /// The backing image, for `highgui::imshow`.
    pub fn mat(&self) -> &Mat {
        &self.mat
    }

    fn scalar(color: Color) -> Scalar {
        let a = color.a.clamp(0.0, 1.0);
        Scalar::new(
            f64::from(color.b) * a,
            f64::from(color.g) * a,
            f64::from(color.r) * a,
            0.0,
        )
    }
}

impl DrawSurface for MatSurface {
    fn width(&self) -> f64 {
        f64::from(self.width)
    }

    fn height(&self) -> f64 {
        f64::from(self.height)
    }

    fn fill(&mut self, color: Color) -> Result<()> {
        imgproc::rectangle(
            &mut self.mat,
            Rect::new(0, 0, self.width, self.height),
            Self::scalar(color),
            imgproc::FILLED,
            imgproc::LINE_8,
            0,
        )?;
        Ok(())
    }

    fn fill_rect(&mut self, x: f64, y: f64, w: f64, h: f64, color: Color) -> Result<()> {
        imgproc::rectangle(
            &mut self.mat,
            Rect::new(x as i32, y as i32, (w as i32).max(1), (h as i32).max(1)),
            Self::scalar(color),
            imgproc::FILLED,
            imgproc::LINE_8,
            0,
        )?;
        Ok(())
    }

    fn stroke_line(
        &mut self,
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
        line_width: f64,
        color: Color,
    ) -> Result<()> {
        imgproc::line(
            &mut self.mat,
            Point::new(x1 as i32, y1 as i32),
            Point::new(x2 as i32, y2 as i32),
            Self::scalar(color),
            (line_width as i32).max(1),
            imgproc::LINE_AA,
            0,
        )?;
        Ok(())
    }

    fn fill_circle(&mut self, x: f64, y: f64, radius: f64, color: Color) -> Result<()> {
        imgproc::circle(
            &mut self.mat,
            Point::new(x as i32, y as i32),
            (radius as i32).max(1),
            Self::scalar(color),
            imgproc::FILLED,
            imgproc::LINE_AA,
            0,
        )?;
        Ok(())
    }

    fn text(&mut self, text: &str, x: f64, y: f64, color: Color) -> Result<()> {
        imgproc::put_text(
            &mut self.mat,
            text,
            Point::new(x as i32, y as i32),
            imgproc::FONT_HERSHEY_SIMPLEX,
            0.45,
            Self::scalar(color),
            1,
            imgproc::LINE_8,
            false,
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viz::projector::MapProjector;
    use crate::world::LandmarkBuffer;

    #[test]
    fn full_render_pass_draws_without_error() {
        let mut surface = MatSurface::new(320, 240).unwrap();
        let projector = MapProjector::new();
        let traj = vec![
            crate::world::TrajectorySample {
                x: 0.0,
                y: 0.0,
                z: 0.0,
            },
            crate::world::TrajectorySample {
                x: 0.5,
                y: 0.0,
                z: 0.8,
            },
        ];
        let mut landmarks = LandmarkBuffer::new();
        landmarks.push(crate::world::LandmarkPoint {
            x: 0.2,
            y: 0.0,
            z: 0.4,
        });

        projector.render(&mut surface, &traj, &landmarks).unwrap();
        assert_eq!(surface.mat().rows(), 240);
        assert_eq!(surface.mat().cols(), 320);
    }
}
