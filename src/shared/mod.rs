//! Shared pipeline state and status reporting
//!
//! The context ties the calibration store, the recognition engine and
//! routing together; statuses are what the user sees of each step.

pub mod messages;
pub mod state;

pub use messages::PipelineStatus;
pub use state::{PasteReport, PipelineContext, RuntimeState};
