//! Persistence as an external collaborator: everything that outlives a
//! single tick (users, players, inventories, world instances) goes through
//! this trait. The in-memory implementation is what the server actually
//! runs with today; a disk- or database-backed implementation can be
//! dropped in later without touching any of the game logic.

use crate::model::*;
use hashbrown::HashMap;

#[derive(Debug)]
pub enum StoreError {
    NotFound,
    Duplicate,
}

pub trait Store {
    fn find_user_by_username(&self, username: &str) -> Option<User>;
    fn create_user(&mut self, username: &str, password_hash: String) -> Result<User, StoreError>;

    fn find_player_by_user(&self, user_id: u64) -> Option<Player>;
    fn find_player_by_entity(&self, entity_id: EntityId) -> Option<Player>;
    fn create_player(&mut self, user_id: u64, entity_id: EntityId, instance_id: InstanceId) -> Player;

    fn get_instance(&self, id: InstanceId) -> Option<Instance>;
    fn save_instance(&mut self, instance: Instance);
    fn delete_instance(&mut self, id: InstanceId);
    fn instances_in_room(&self, room_id: RoomId) -> Vec<Instance>;
    fn next_instance_id(&mut self) -> InstanceId;

    fn inventory_for_player(&self, player_id: PlayerId) -> Vec<InventoryItem>;
    fn save_inventory_item(&mut self, item: InventoryItem) -> InventoryItem;
    fn delete_inventory_item(&mut self, id: InventoryItemId);
    fn next_inventory_item_id(&mut self) -> InventoryItemId;

    fn get_item(&self, id: ItemId) -> Option<Item>;
    fn find_item_by_entity(&self, entity_id: EntityId) -> Option<Item>;
    fn get_resource_node(&self, entity_id: EntityId) -> Option<ResourceNode>;
    fn drop_table(&self, drop_table_id: u32) -> Vec<DropTableItem>;
    fn get_portal(&self, entity_id: EntityId) -> Option<Portal>;
}

#[derive(Default)]
pub struct InMemoryStore {
    users: HashMap<u64, User>,
    usernames: HashMap<String, u64>,
    players: HashMap<u64, Player>,
    players_by_user: HashMap<u64, u64>,
    instances: HashMap<InstanceId, Instance>,
    inventory: HashMap<InventoryItemId, InventoryItem>,
    items: HashMap<ItemId, Item>,
    resource_nodes: HashMap<EntityId, ResourceNode>,
    drop_tables: HashMap<u32, Vec<DropTableItem>>,
    portals: HashMap<EntityId, Portal>,
    next_user_id: u64,
    next_player_id: u64,
    next_instance_id: InstanceId,
    next_inventory_item_id: InventoryItemId,
}

impl InMemoryStore {
    pub fn new() -> InMemoryStore {
        InMemoryStore::default()
    }

    pub fn register_item(&mut self, id: ItemId, item: Item) {
        self.items.insert(id, item);
    }

    pub fn register_resource_node(&mut self, node: ResourceNode) {
        self.resource_nodes.insert(node.entity_id, node);
    }

    pub fn register_drop_table(&mut self, id: u32, items: Vec<DropTableItem>) {
        self.drop_tables.insert(id, items);
    }

    pub fn register_portal(&mut self, portal: Portal) {
        self.portals.insert(portal.entity_id, portal);
    }
}

impl Store for InMemoryStore {
    fn find_user_by_username(&self, username: &str) -> Option<User> {
        self.usernames.get(username).and_then(|id| self.users.get(id)).cloned()
    }

    fn create_user(&mut self, username: &str, password_hash: String) -> Result<User, StoreError> {
        if self.usernames.contains_key(username) {
            return Err(StoreError::Duplicate);
        }

        let id = self.next_user_id;
        self.next_user_id += 1;

        let user = User {
            id,
            username: username.to_string(),
            password_hash,
        };

        self.usernames.insert(username.to_string(), id);
        self.users.insert(id, user.clone());

        Ok(user)
    }

    fn find_player_by_user(&self, user_id: u64) -> Option<Player> {
        self.players_by_user.get(&user_id).and_then(|id| self.players.get(id)).cloned()
    }

    fn find_player_by_entity(&self, entity_id: EntityId) -> Option<Player> {
        self.players.values().find(|player| player.entity_id == entity_id).cloned()
    }

    fn create_player(&mut self, user_id: u64, entity_id: EntityId, instance_id: InstanceId) -> Player {
        let id = self.next_player_id;
        self.next_player_id += 1;

        let player = Player { id, user_id, entity_id, instance_id };

        self.players_by_user.insert(user_id, id);
        self.players.insert(id, player.clone());

        player
    }

    fn get_instance(&self, id: InstanceId) -> Option<Instance> {
        self.instances.get(&id).cloned()
    }

    fn save_instance(&mut self, instance: Instance) {
        self.instances.insert(instance.id, instance);
    }

    fn delete_instance(&mut self, id: InstanceId) {
        self.instances.remove(&id);
    }

    fn instances_in_room(&self, room_id: RoomId) -> Vec<Instance> {
        self.instances
            .values()
            .filter(|i| i.room_id == room_id)
            .cloned()
            .collect()
    }

    fn next_instance_id(&mut self) -> InstanceId {
        let id = self.next_instance_id;
        self.next_instance_id += 1;
        id
    }

    fn inventory_for_player(&self, player_id: PlayerId) -> Vec<InventoryItem> {
        self.inventory
            .values()
            .filter(|i| i.player_id == player_id)
            .cloned()
            .collect()
    }

    fn save_inventory_item(&mut self, item: InventoryItem) -> InventoryItem {
        self.inventory.insert(item.id, item.clone());
        item
    }

    fn delete_inventory_item(&mut self, id: InventoryItemId) {
        self.inventory.remove(&id);
    }

    fn next_inventory_item_id(&mut self) -> InventoryItemId {
        let id = self.next_inventory_item_id;
        self.next_inventory_item_id += 1;
        id
    }

    fn get_item(&self, id: ItemId) -> Option<Item> {
        self.items.get(&id).cloned()
    }

    fn find_item_by_entity(&self, entity_id: EntityId) -> Option<Item> {
        self.items.values().find(|item| item.entity_id == entity_id).cloned()
    }

    fn get_resource_node(&self, entity_id: EntityId) -> Option<ResourceNode> {
        self.resource_nodes.get(&entity_id).cloned()
    }

    fn drop_table(&self, drop_table_id: u32) -> Vec<DropTableItem> {
        self.drop_tables.get(&drop_table_id).cloned().unwrap_or_default()
    }

    fn get_portal(&self, entity_id: EntityId) -> Option<Portal> {
        self.portals.get(&entity_id).cloned()
    }
}
