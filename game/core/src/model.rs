//! The data model shared by the map, inventory, gathering and view
//! modules. Deliberately plain structs rather than an ECS: the world is
//! small enough (a handful of rooms, at most a few hundred live instances)
//! that a couple of hashbrown maps keyed by id outperform an archetype
//! store and are far easier to reason about.

use serde_derive::{Deserialize, Serialize};

pub type EntityId = u64;
pub type InstanceId = u64;
pub type RoomId = u32;
pub type PlayerId = u64;
pub type ItemId = u32;
pub type InventoryItemId = u64;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub enum EntityKind {
    Player,
    Item,
    Pickaxe,
    Axe,
    Ore,
    Logs,
    OreNode,
    TreeNode,
    Portal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub kind: EntityKind,
    pub name: String,
}

/// An instance's vertical position while waiting to respawn. Replaces the
/// original out-of-bounds sentinel coordinate with a typed state so "is
/// this instance currently displaced" can't be confused with a legitimate
/// position.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub enum InstanceState {
    Alive,
    AwaitingRespawn { original_y: i32, original_x: i32, due_tick: u64 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instance {
    pub id: InstanceId,
    pub entity: Entity,
    pub room_id: RoomId,
    pub y: i32,
    pub x: i32,
    pub amount: u32,
    pub state: InstanceState,
    /// Ticks after a gather kill before this instance respawns. `None`
    /// means the instance is deleted outright instead of displaced.
    pub respawn_ticks: Option<u64>,
}

impl Instance {
    pub fn is_alive(&self) -> bool {
        matches!(self.state, InstanceState::Alive)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub entity_id: EntityId,
    pub kind: EntityKind,
    pub max_stack_amt: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Portal {
    pub entity_id: EntityId,
    pub linked_room: RoomId,
    pub linked_y: i32,
    pub linked_x: i32,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub enum GatherTool {
    Pickaxe,
    Axe,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceNode {
    pub entity_id: EntityId,
    pub required_tool: GatherTool,
    pub drop_table_id: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DropTableItem {
    pub item_id: ItemId,
    /// A 1-in-`chance` roll per gather success.
    pub chance: u32,
    pub min_amt: u32,
    pub max_amt: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: InventoryItemId,
    pub item_id: ItemId,
    pub amount: u32,
    pub player_id: PlayerId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub user_id: u64,
    pub entity_id: EntityId,
    pub instance_id: InstanceId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub username: String,
    pub password_hash: String,
}
