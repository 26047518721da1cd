// Module declarations for the library crate.

pub mod cli;
pub mod config;
pub mod event;
pub mod logger;
pub mod overlay;
pub mod render;
pub mod source;
pub mod stats;
pub mod telemetry;
pub mod util;

pub use overlay::{Overlay, OverlaySettings};
pub use render::Renderer;
