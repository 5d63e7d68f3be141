//! PoemForge Agent
//!
//! Runs two poets in alternating turns over a grounding context, judges the
//! resulting poems and assembles the output record.

pub mod assembly;
mod grounding;
pub mod judge;
pub mod pipeline;
pub mod poet;
pub mod retry;
pub mod session_state;
pub mod system_prompt;
pub mod turn_loop;

#[cfg(test)]
mod testing;

pub use assembly::{OutputRecord, PoemView, RunMetadata, assemble, render_json, render_text};
pub use judge::{Judge, parse_judgment};
pub use pipeline::{CompletedRun, PoemPipeline, derive_context};
pub use poet::Poet;
pub use retry::RetryPolicy;
pub use session_state::Session;
pub use turn_loop::{RunFailure, TurnOrchestrator, TurnState};
