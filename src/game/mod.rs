//! The crash game round engine
//!
//! Everything that decides a round's outcome lives here: the fairness
//! scheme that fixes the crash point, the multiplier clock, the per-round
//! bet ledger, and the engine task that serializes every mutation.

pub mod clock;
pub mod engine;
pub mod events;
pub mod fairness;
pub mod ledger;
pub mod types;
