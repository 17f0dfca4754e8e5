//! Geometry planning, resampling, and the per-image transform engine.

pub mod geometry;
pub mod resize;
pub mod transform;

pub use geometry::{GeometryPlan, ModeSettings, PrintBox, SampleRect, TransformMode};
pub use transform::{EncodedImage, MAX_OUTPUT_EDGE, TransformEngine};

pub type Result<T> = crate::Result<T>;
