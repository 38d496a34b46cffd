//! Inventory stacking law: incoming amounts top up existing stacks before
//! any new row is created, rows never exceed an item's `max_stack_amt`,
//! and a player's inventory never grows past 30 rows.

use crate::model::{Item, InventoryItem, PlayerId};
use crate::store::Store;

pub const MAX_INVENTORY_ROWS: usize = 30;

/// Adds `amt` of `item` to `player_id`'s inventory, returning however much
/// couldn't be placed because the inventory is full. A return value of 0
/// means everything was stored.
pub fn add_item_to_inventory<S: Store>(store: &mut S, player_id: PlayerId, item: &Item, amt: u32) -> u32 {
    let mut existing = store.inventory_for_player(player_id);
    existing.retain(|inv| inv.item_id == item.entity_id as u32);

    for inv_item in existing {
        if inv_item.amount >= item.max_stack_amt {
            continue;
        }

        let mut updated = inv_item.clone();
        let leftover = (updated.amount + amt).saturating_sub(item.max_stack_amt);
        updated.amount = (updated.amount + amt).min(item.max_stack_amt);
        store.save_inventory_item(updated);

        if leftover == 0 {
            return 0;
        }

        return fill_new_rows(store, player_id, item, leftover);
    }

    fill_new_rows(store, player_id, item, amt)
}

fn fill_new_rows<S: Store>(store: &mut S, player_id: PlayerId, item: &Item, mut remaining: u32) -> u32 {
    while remaining > 0 {
        if store.inventory_for_player(player_id).len() >= MAX_INVENTORY_ROWS {
            return remaining;
        }

        let new_amt = remaining.min(item.max_stack_amt);
        let id = store.next_inventory_item_id();
        store.save_inventory_item(InventoryItem {
            id,
            item_id: item.entity_id as u32,
            amount: new_amt,
            player_id,
        });
        remaining -= new_amt;
    }

    0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    fn make_item() -> Item {
        Item { entity_id: 7, kind: crate::model::EntityKind::Ore, max_stack_amt: 10 }
    }

    #[test]
    fn test_new_stack_created_when_empty() {
        let mut store = InMemoryStore::new();
        let item = make_item();

        let leftover = add_item_to_inventory(&mut store, 1, &item, 5);

        assert_eq!(leftover, 0);
        assert_eq!(store.inventory_for_player(1).len(), 1);
        assert_eq!(store.inventory_for_player(1)[0].amount, 5);
    }

    #[test]
    fn test_tops_up_existing_stack_before_new_row() {
        let mut store = InMemoryStore::new();
        let item = make_item();

        add_item_to_inventory(&mut store, 1, &item, 4);
        add_item_to_inventory(&mut store, 1, &item, 3);

        let inv = store.inventory_for_player(1);
        assert_eq!(inv.len(), 1);
        assert_eq!(inv[0].amount, 7);
    }

    #[test]
    fn test_overflow_spills_into_new_row() {
        let mut store = InMemoryStore::new();
        let item = make_item();

        add_item_to_inventory(&mut store, 1, &item, 8);
        let leftover = add_item_to_inventory(&mut store, 1, &item, 5);

        assert_eq!(leftover, 0);
        let inv = store.inventory_for_player(1);
        assert_eq!(inv.len(), 2);
        let total: u32 = inv.iter().map(|i| i.amount).sum();
        assert_eq!(total, 13);
        assert!(inv.iter().all(|i| i.amount <= item.max_stack_amt));
    }

    #[test]
    fn test_full_inventory_returns_leftover() {
        let mut store = InMemoryStore::new();
        let item = Item { entity_id: 99, kind: crate::model::EntityKind::Ore, max_stack_amt: 1 };

        // Fill every row with a distinct, already-maxed item so nothing can stack.
        for i in 0..MAX_INVENTORY_ROWS {
            let id = store.next_inventory_item_id();
            store.save_inventory_item(InventoryItem {
                id,
                item_id: 1000 + i as u32,
                amount: 1,
                player_id: 1,
            });
        }

        let leftover = add_item_to_inventory(&mut store, 1, &item, 1);

        assert_eq!(leftover, 1);
        assert_eq!(store.inventory_for_player(1).len(), MAX_INVENTORY_ROWS);
    }
}
