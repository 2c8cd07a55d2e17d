//! # Chroma Vision — image intake and outfit analysis
//!
//! Accepts one outfit image, encodes it for transport, and relays it to the
//! external vision model with a fixed structured prompt. The relay degrades to
//! a fixed fallback sentence on any provider failure; it never crashes the
//! caller.

pub mod analyzer;
pub mod error;
pub mod image;
pub mod prompt;

pub use analyzer::{VisionAnalyzer, ANALYSIS_FALLBACK};
pub use error::{VisionError, VisionResult};
pub use image::EncodedImage;
pub use prompt::{color_summary, OUTFIT_ANALYSIS_PROMPT};
