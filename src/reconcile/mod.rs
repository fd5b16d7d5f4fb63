//! Provider-independent reconciliation logic.
//!
//! Everything here is pure: it takes already-fetched data and returns
//! decisions. Commands do the fetching and apply the decisions.

pub mod duration;
pub mod fuzzy;
pub mod lifecycle;
pub mod mapper;
pub mod tracking;

pub use duration::parse_duration;
pub use fuzzy::{close_matches, resolve};
pub use lifecycle::{FinishTarget, SyncState, finish_remote, next_state};
pub use mapper::map_local_task;
pub use tracking::{TrackingPlan, TrackingWindow, is_matching, plan};
