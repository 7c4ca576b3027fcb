//! Map visualization: view state, dual-mode projector, raster surfaces.

pub mod mat_surface;
pub mod projector;
pub mod surface;
pub mod view;

pub use mat_surface::MatSurface;
pub use projector::{MapMode, MapProjector};
pub use surface::{Color, DrawSurface};
pub use view::{ViewEvent, ViewState};
