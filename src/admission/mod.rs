//! Camera frame admission ahead of landmark detection.

pub mod controller;
pub mod motion;

pub use controller::{AdmissionConfig, AdmissionStats, FrameAdmissionController};
pub use motion::{FrameView, luma_proxy};
