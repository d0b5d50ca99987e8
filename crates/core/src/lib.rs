//! Real-time face swap: capture, detection, identity swap and presentation.
//!
//! Each bounded context splits into `domain` (traits and value types) and
//! `infrastructure` (ONNX, ffmpeg and image-crate adapters). [`session`]
//! wires them into a running capture/pipeline pair.

pub mod capture;
pub mod detection;
pub mod models;
pub mod monitor;
pub mod pipeline;
pub mod session;
pub mod settings;
pub mod shared;
pub mod source;
pub mod swapping;

#[cfg(test)]
pub(crate) mod test_support;
