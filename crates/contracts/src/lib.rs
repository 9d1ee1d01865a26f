//! # Contracts
//!
//! Frozen interface contracts shared by every crate in the workspace.
//! Business crates depend on this crate only; reverse dependencies are prohibited.
//!
//! ## Record model
//! - A `Record` is one unit of incoming data tagged with a topic label
//! - `sequence` is the monotonic receive order stamped by the ingestion side
//! - Every record handed to the dispatcher ends in exactly one `Outcome`

mod blueprint;
mod error;
mod outcome;
mod producer;
mod record;
mod reporter;
mod sink;

pub use blueprint::*;
pub use error::*;
pub use outcome::*;
pub use producer::*;
pub use record::*;
pub use reporter::*;
pub use sink::*;
