//! Tick-level orchestration of tracking and mapping.
//!
//! `FusionSystem` owns the cross-tick state (model, pose) and runs one
//! synchronous tick at a time; `CaptureSignals` carries the
//! edge-triggered capture/clear/quit requests in from outside.

mod fusion_system;
pub mod result;
pub mod signals;

pub use fusion_system::FusionSystem;
pub use result::{SystemState, TickMetrics, TickResult, TickTiming};
pub use signals::CaptureSignals;
