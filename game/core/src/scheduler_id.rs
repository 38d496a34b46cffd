//! Thin alias over the world crate's generic deferred scheduler, specialised
//! to the payload types the game logic actually schedules: a running gather
//! action loop, a resource node respawn, and a dropped-item despawn.

pub use moonlapse_world::scheduler::{DeferredId, DeferredScheduler};

use crate::connection::GatherJob;
use crate::model::InstanceId;

/// Every kind of deferred callback the game logic schedules, carried by the
/// one scheduler instance the world owns.
#[derive(Debug, Clone)]
pub enum TimerJob {
    Gather(GatherJob),
    Respawn { instance_id: InstanceId },
    Despawn { instance_id: InstanceId },
}

pub type GatherScheduler = DeferredScheduler<TimerJob>;
