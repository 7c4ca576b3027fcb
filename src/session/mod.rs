//! Session lifecycle: the explicit owner of engine, world, and projector.

pub mod error;
pub mod session;

pub use error::SessionError;
pub use session::{SessionConfig, VoSession};
