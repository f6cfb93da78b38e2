//! Data models for moodpost-acquire
//!
//! - Acquisition state machine and per-call context

pub mod acquisition;

pub use acquisition::{AcquisitionContext, AcquisitionState, StateTransition};
