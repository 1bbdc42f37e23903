//! The Aventura turn orchestration core.
//!
//! For each user input the [`TurnCoordinator`] drives five phases:
//! retrieve long-term context and select world entries (concurrently),
//! stream the narrator, classify the passage into structured deltas, and
//! apply those deltas while opportunistically forming chapters. All
//! cross-component signalling flows through the
//! [`av_events::EventBus`]; the entry table and chapter list are each
//! mutated only by their owning engine.

pub mod cancel;
pub mod chapters;
pub mod classifier;
pub mod coordinator;
pub mod entries;
pub mod log;
pub mod narrator;
pub mod session;
pub mod suggestions;
pub mod world;
pub(crate) mod util;

pub use cancel::CancelToken;
pub use coordinator::{TurnCoordinator, TurnOutcome};
pub use session::StorySession;
pub use world::WorldSnapshot;
