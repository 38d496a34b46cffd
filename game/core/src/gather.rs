//! The gathering action loop: a player standing on a resource node with
//! the right tool rolls, once per tick, for a chance to harvest it. A
//! success rolls the node's drop table and kills the node (displacing it
//! until it respawns); a failure just keeps the loop going.

use crate::inventory::add_item_to_inventory;
use crate::model::{EntityKind, GatherTool, Instance, InstanceState, PlayerId, ResourceNode};
use crate::store::Store;
use rand::Rng;

/// One in six ticks succeeds, matching the original node difficulty curve.
pub const SUCCESS_DENOMINATOR: u32 = 6;

pub enum GatherOutcome {
    /// Gathering continues; nothing happened this tick.
    Continuing,
    /// The node was harvested. Carries the items actually awarded (after
    /// inventory overflow is accounted for) for the caller to narrate.
    Success(Vec<(u32, u32)>),
    /// The required tool isn't in the player's inventory.
    MissingTool(GatherTool),
    /// Someone else killed this node first.
    AlreadyGathered,
}

pub fn required_tool_kind(tool: GatherTool) -> EntityKind {
    match tool {
        GatherTool::Pickaxe => EntityKind::Pickaxe,
        GatherTool::Axe => EntityKind::Axe,
    }
}

pub fn has_required_tool<S: Store>(store: &S, player_id: PlayerId, tool: GatherTool) -> bool {
    let kind = required_tool_kind(tool);
    store
        .inventory_for_player(player_id)
        .iter()
        .any(|inv| store.get_item(inv.item_id).map(|item| item.kind == kind).unwrap_or(false))
}

/// Rolls one tick of gathering against `node` for `player_id`, standing on
/// `instance`. Does not itself mutate `instance`'s state; the caller is
/// responsible for calling `kill_instance` on `GatherOutcome::Success`.
pub fn attempt_gather<S: Store, R: Rng>(
    store: &mut S,
    rng: &mut R,
    player_id: PlayerId,
    instance: &Instance,
    node: &ResourceNode,
) -> GatherOutcome {
    if !instance.is_alive() {
        return GatherOutcome::AlreadyGathered;
    }

    if !has_required_tool(store, player_id, node.required_tool) {
        return GatherOutcome::MissingTool(node.required_tool);
    }

    if rng.gen_range(0..SUCCESS_DENOMINATOR) != 0 {
        return GatherOutcome::Continuing;
    }

    let mut awarded = Vec::new();
    for drop in store.drop_table(node.drop_table_id) {
        if rng.gen_range(1..=drop.chance) != 1 {
            continue;
        }

        let amt = rng.gen_range(drop.min_amt..=drop.max_amt);
        if let Some(item) = store.get_item(drop.item_id) {
            add_item_to_inventory(store, player_id, &item, amt);
            awarded.push((drop.item_id, amt));
        }
    }

    GatherOutcome::Success(awarded)
}

/// Displaces a gathered/depleted instance out of the room until it
/// respawns, or deletes it outright if it has no respawn timer.
pub fn kill_instance<S: Store>(store: &mut S, current_tick: u64, mut instance: Instance) {
    match instance.respawn_ticks {
        Some(delay) => {
            instance.state = InstanceState::AwaitingRespawn {
                original_y: instance.y,
                original_x: instance.x,
                due_tick: current_tick + delay,
            };
            store.save_instance(instance);
        }
        None => store.delete_instance(instance.id),
    }
}

/// Restores an instance that was awaiting respawn back to its original
/// position. No-op if the instance is already alive or missing.
pub fn respawn_instance<S: Store>(store: &mut S, instance_id: crate::model::InstanceId) {
    if let Some(mut instance) = store.get_instance(instance_id) {
        if let InstanceState::AwaitingRespawn { original_y, original_x, .. } = instance.state {
            instance.y = original_y;
            instance.x = original_x;
            instance.state = InstanceState::Alive;
            store.save_instance(instance);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::*;
    use crate::store::InMemoryStore;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn setup() -> (InMemoryStore, Instance, ResourceNode) {
        let mut store = InMemoryStore::new();
        store.register_item(1, Item { entity_id: 1, kind: EntityKind::Pickaxe, max_stack_amt: 1 });
        store.register_item(2, Item { entity_id: 2, kind: EntityKind::Ore, max_stack_amt: 50 });
        store.register_drop_table(10, vec![DropTableItem { item_id: 2, chance: 1, min_amt: 1, max_amt: 3 }]);

        let node = ResourceNode { entity_id: 100, required_tool: GatherTool::Pickaxe, drop_table_id: 10 };

        let instance = Instance {
            id: 1,
            entity: Entity { id: 100, kind: EntityKind::OreNode, name: "rocks".into() },
            room_id: 1,
            y: 5,
            x: 5,
            amount: 1,
            state: InstanceState::Alive,
            respawn_ticks: Some(100),
        };

        (store, instance, node)
    }

    #[test]
    fn test_missing_tool_blocks_gather() {
        let (mut store, instance, node) = setup();
        let mut rng = StdRng::seed_from_u64(1);

        let outcome = attempt_gather(&mut store, &mut rng, 1, &instance, &node);
        assert!(matches!(outcome, GatherOutcome::MissingTool(GatherTool::Pickaxe)));
    }

    #[test]
    fn test_already_gathered_short_circuits() {
        let (mut store, mut instance, node) = setup();
        let mut rng = StdRng::seed_from_u64(1);
        instance.state = InstanceState::AwaitingRespawn { original_y: 5, original_x: 5, due_tick: 10 };

        let outcome = attempt_gather(&mut store, &mut rng, 1, &instance, &node);
        assert!(matches!(outcome, GatherOutcome::AlreadyGathered));
    }

    #[test]
    fn test_kill_instance_schedules_respawn_when_configured() {
        let (mut store, instance, _node) = setup();
        let id = instance.id;

        kill_instance(&mut store, 50, instance);

        let stored = store.get_instance(id).unwrap();
        assert!(matches!(stored.state, InstanceState::AwaitingRespawn { due_tick: 150, .. }));
    }

    #[test]
    fn test_kill_instance_deletes_when_no_respawn_timer() {
        let (mut store, mut instance, _node) = setup();
        instance.respawn_ticks = None;
        let id = instance.id;

        kill_instance(&mut store, 50, instance);

        assert!(store.get_instance(id).is_none());
    }

    #[test]
    fn test_respawn_restores_original_position() {
        let (mut store, instance, _node) = setup();
        let id = instance.id;
        kill_instance(&mut store, 50, instance);

        respawn_instance(&mut store, id);

        let stored = store.get_instance(id).unwrap();
        assert!(stored.is_alive());
        assert_eq!((stored.y, stored.x), (5, 5));
    }
}
