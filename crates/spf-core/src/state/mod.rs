//! Engine state kept between update cycles
//!
//! - [`UpdateMemo`]: Digest of the last desired record set that was applied

pub mod memo;

pub use memo::{UpdateMemo, desired_state_digest};
