//! The authoritative tick driver: a fixed-cadence loop plus a deferred
//! callback scheduler, kept free of any game-specific state so it can be
//! unit tested in isolation from the room/entity model that sits on top
//! of it in `game/core`.

pub mod scheduler;
pub mod tick;

pub use scheduler::{DeferredId, DeferredScheduler};
pub use tick::TickDriver;
