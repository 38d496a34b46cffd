//! The per-connection state machine: GET_ENTRY (not yet logged in) then
//! PLAY (inhabiting a room). One `Connection` exists per TCP client; all
//! its methods take the shared `Store` and room maps rather than owning
//! any of the world themselves, so the world driver can tick many
//! connections against one authoritative state.

use crate::auth::{self, AuthError};
use crate::gather::{self, GatherOutcome};
use crate::inventory::add_item_to_inventory;
use crate::map::RoomMap;
use crate::model::*;
use crate::packet::{Direction, Packet};
use crate::store::Store;
use crate::view::{coord_in_view, diff_visible_sets};
use hashbrown::HashMap;
use rand::Rng;
use std::collections::{HashSet, VecDeque};

/// A scheduled gathering attempt: which player, standing on which instance,
/// working which resource node. Rescheduled every tick while gathering
/// continues; dropped the moment the player moves, logs out, or succeeds.
#[derive(Debug, Clone)]
pub struct GatherJob {
    pub player_id: PlayerId,
    pub instance_id: InstanceId,
    pub node_instance_id: InstanceId,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ConnectionState {
    GetEntry,
    Play,
}

/// Something a connection's packet handling produced that has to reach
/// other connections sharing a room; a `Connection` can't reach its
/// siblings directly, so these are queued here and fanned out by the world
/// driver once the current tick's packets have all been processed.
#[derive(Debug, Clone)]
pub enum RoomEvent {
    /// Send `packet` to every connection currently in `room_id`.
    Broadcast { room_id: RoomId, packet: Packet },
    /// Recompute the visible set (and queue whatever Goodbye/ServerModel
    /// deltas fall out of it) for every connection currently in `room_id`.
    RecomputeVisible { room_id: RoomId },
}

pub struct Connection {
    pub state: ConnectionState,
    pub username: String,
    pub player: Option<Player>,
    pub room_id: Option<RoomId>,
    pub logged_in: bool,
    pub visible_instances: HashSet<InstanceId>,
    pub outgoing: VecDeque<Packet>,
    pub room_events: VecDeque<RoomEvent>,
    pub actionloop: Option<crate::scheduler_id::DeferredId>,
}

impl Default for Connection {
    fn default() -> Self {
        Connection {
            state: ConnectionState::GetEntry,
            username: String::new(),
            player: None,
            room_id: None,
            logged_in: false,
            visible_instances: HashSet::new(),
            outgoing: VecDeque::new(),
            room_events: VecDeque::new(),
            actionloop: None,
        }
    }
}

impl Connection {
    pub fn new() -> Connection {
        Connection::default()
    }

    /// Dispatches one incoming packet according to the current state,
    /// mirroring the GET_ENTRY / PLAY split.
    pub fn process_packet<S: Store, R: Rng>(
        &mut self,
        store: &mut S,
        room_maps: &HashMap<RoomId, RoomMap>,
        scheduler: &mut crate::scheduler_id::GatherScheduler,
        current_tick: u64,
        ticks_per_second: u64,
        rng: &mut R,
        logged_in_players: &mut HashSet<PlayerId>,
        packet: Packet,
    ) {
        match self.state {
            ConnectionState::GetEntry => self.handle_get_entry(store, room_maps, logged_in_players, packet),
            ConnectionState::Play => {
                self.handle_play(store, room_maps, scheduler, current_tick, ticks_per_second, rng, logged_in_players, packet)
            }
        }
    }

    fn handle_get_entry<S: Store>(
        &mut self,
        store: &mut S,
        room_maps: &HashMap<RoomId, RoomMap>,
        logged_in_players: &mut HashSet<PlayerId>,
        packet: Packet,
    ) {
        match packet {
            Packet::Login { username, password } => self.login_user(store, room_maps, logged_in_players, &username, &password),
            Packet::Register { username, password } => self.register_user(store, &username, &password),
            _ => {}
        }
    }

    fn login_user<S: Store>(
        &mut self,
        store: &mut S,
        room_maps: &HashMap<RoomId, RoomMap>,
        logged_in_players: &mut HashSet<PlayerId>,
        username: &str,
        password: &str,
    ) {
        let user = match auth::login(store, username, password) {
            Ok(user) => user,
            Err(AuthError::UnknownUser) => {
                self.outgoing.push_back(Packet::Deny { reason: "I don't know anybody by that name".into() });
                return;
            }
            Err(AuthError::IncorrectPassword) => {
                self.outgoing.push_back(Packet::Deny { reason: "Incorrect password".into() });
                return;
            }
            Err(_) => {
                self.outgoing.push_back(Packet::Deny { reason: "Login failed".into() });
                return;
            }
        };

        let player = match store.find_player_by_user(user.id) {
            Some(player) => player,
            None => {
                self.outgoing.push_back(Packet::Deny { reason: "No character exists for that account".into() });
                return;
            }
        };

        if logged_in_players.contains(&player.id) {
            self.outgoing.push_back(Packet::Deny { reason: format!("{} is already inhabiting this realm.", user.username) });
            return;
        }

        self.username = user.username;
        self.player = Some(player.clone());
        logged_in_players.insert(player.id);

        self.outgoing.push_back(Packet::Ok);

        let room_id = store
            .get_instance(player.instance_id)
            .map(|instance| instance.room_id)
            .unwrap_or(1);
        self.move_rooms(store, room_maps, logged_in_players, room_id);
    }

    fn register_user<S: Store>(&mut self, store: &mut S, username: &str, password: &str) {
        match auth::register(store, username, password) {
            Ok(_) => self.outgoing.push_back(Packet::Ok),
            Err(AuthError::UsernameTaken) => {
                self.outgoing.push_back(Packet::Deny { reason: "Somebody else already goes by that name".into() });
            }
            Err(AuthError::ValueTooLong) => {
                self.outgoing.push_back(Packet::Deny { reason: "Error. Value too long.".into() });
            }
            Err(_) => {
                self.outgoing.push_back(Packet::Deny { reason: "Error. Please try again later.".into() });
            }
        }
    }

    fn handle_play<S: Store, R: Rng>(
        &mut self,
        store: &mut S,
        room_maps: &HashMap<RoomId, RoomMap>,
        scheduler: &mut crate::scheduler_id::GatherScheduler,
        current_tick: u64,
        ticks_per_second: u64,
        rng: &mut R,
        logged_in_players: &mut HashSet<PlayerId>,
        packet: Packet,
    ) {
        match packet {
            Packet::Move { direction } => {
                self.handle_move(store, room_maps, scheduler, current_tick, logged_in_players, direction)
            }
            Packet::Chat { message } => self.chat(&message),
            Packet::Logout { username } => self.logout(store, scheduler, logged_in_players, &username),
            Packet::Goodbye { instance_id } => self.depart_other(store, instance_id),
            Packet::ServerLog { message } => self.outgoing.push_back(Packet::ServerLog { message }),
            Packet::GrabItem => self.grab_item_here(store, room_maps, scheduler, current_tick),
            Packet::DropItem { inventory_item_id } => {
                self.drop_item(store, room_maps, scheduler, current_tick, ticks_per_second, inventory_item_id)
            }
            Packet::WeatherChange { weather } => self.outgoing.push_back(Packet::WeatherChange { weather }),
            _ => {
                let _ = rng;
            }
        }
    }

    /// Truncates to 80 characters and ignores whitespace-only messages,
    /// mirroring the original chat filter. Said to the whole room, not just
    /// the speaker.
    fn chat(&mut self, message: &str) {
        if message.trim().is_empty() {
            return;
        }
        let room_id = match self.room_id {
            Some(room_id) => room_id,
            None => return,
        };
        let truncated: String = message.chars().take(80).collect();
        let name = self.player_name();
        let packet = Packet::ServerLog { message: format!("{} says: {}", name, truncated) };
        self.room_events.push_back(RoomEvent::Broadcast { room_id, packet });
    }

    fn player_name(&self) -> String {
        self.username.clone()
    }

    fn logout<S: Store>(
        &mut self,
        store: &mut S,
        scheduler: &mut crate::scheduler_id::GatherScheduler,
        logged_in_players: &mut HashSet<PlayerId>,
        username: &str,
    ) {
        if username != self.username {
            return;
        }

        self.outgoing.push_back(Packet::Ok);

        if let Some(player) = &self.player {
            logged_in_players.remove(&player.id);
        }

        if let Some(room_id) = self.room_id {
            self.room_events.push_back(RoomEvent::RecomputeVisible { room_id });
        }

        self.logged_in = false;
        self.player = None;
        self.room_id = None;
        self.username.clear();
        self.visible_instances.clear();
        self.state = ConnectionState::GetEntry;

        if let Some(id) = self.actionloop.take() {
            scheduler.cancel(id);
        }

        let _ = store;
    }

    fn depart_other<S: Store>(&mut self, store: &S, instance_id: InstanceId) {
        if store.get_instance(instance_id).is_none() {
            self.visible_instances.remove(&instance_id);
            return;
        }

        self.visible_instances.remove(&instance_id);
        self.outgoing.push_back(Packet::Goodbye { instance_id });
    }

    fn grab_item_here<S: Store>(
        &mut self,
        store: &mut S,
        _room_maps: &HashMap<RoomId, RoomMap>,
        scheduler: &mut crate::scheduler_id::GatherScheduler,
        current_tick: u64,
    ) {
        let player = match &self.player {
            Some(player) => player.clone(),
            None => return,
        };

        let self_instance = match store.get_instance(player.instance_id) {
            Some(instance) => instance,
            None => return,
        };

        let candidate = self
            .visible_instances
            .iter()
            .filter_map(|id| store.get_instance(*id))
            .find(|instance| {
                matches!(
                    instance.entity.kind,
                    EntityKind::Item | EntityKind::Pickaxe | EntityKind::Axe | EntityKind::Ore | EntityKind::Logs
                ) && instance.y == self_instance.y
                    && instance.x == self_instance.x
            });

        let mut instance = match candidate {
            Some(instance) => instance,
            None => {
                self.outgoing.push_back(Packet::Deny { reason: "There is no item here.".into() });
                return;
            }
        };

        let item = match store.find_item_by_entity(instance.entity.id) {
            Some(item) => item,
            None => return,
        };

        let leftover = add_item_to_inventory(store, player.id, &item, instance.amount);

        if leftover > 0 {
            instance.amount = leftover;
            store.save_instance(instance);
        } else {
            let instance_id = instance.id;
            let room_id = instance.room_id;
            let respawn_ticks = instance.respawn_ticks;
            gather::kill_instance(store, current_tick, instance);
            if let Some(delay) = respawn_ticks {
                scheduler.schedule_once(current_tick, delay, crate::scheduler_id::TimerJob::Respawn { instance_id });
            }
            self.room_events.push_back(RoomEvent::RecomputeVisible { room_id });
        }
    }

    fn drop_item<S: Store>(
        &mut self,
        store: &mut S,
        _room_maps: &HashMap<RoomId, RoomMap>,
        scheduler: &mut crate::scheduler_id::GatherScheduler,
        current_tick: u64,
        ticks_per_second: u64,
        inventory_item_id: InventoryItemId,
    ) {
        let player = match &self.player {
            Some(player) => player.clone(),
            None => return,
        };

        let inv_items = store.inventory_for_player(player.id);
        let inv_item = match inv_items.into_iter().find(|i| i.id == inventory_item_id) {
            Some(inv_item) => inv_item,
            None => return,
        };

        let item = match store.get_item(inv_item.item_id) {
            Some(item) => item,
            None => return,
        };

        let self_instance = match store.get_instance(player.instance_id) {
            Some(instance) => instance,
            None => return,
        };

        let new_id = store.next_instance_id();
        let room_id = self_instance.room_id;
        let instance = Instance {
            id: new_id,
            entity: Entity { id: item.entity_id, kind: item.kind, name: String::new() },
            room_id,
            y: self_instance.y,
            x: self_instance.x,
            amount: inv_item.amount,
            state: InstanceState::Alive,
            respawn_ticks: None,
        };
        store.save_instance(instance);
        store.delete_inventory_item(inv_item.id);

        // A dropped item despawns 120 seconds after it hits the ground.
        const DROPPED_ITEM_DESPAWN_SECONDS: u64 = 120;
        scheduler.schedule_once(
            current_tick,
            ticks_per_second * DROPPED_ITEM_DESPAWN_SECONDS,
            crate::scheduler_id::TimerJob::Despawn { instance_id: new_id },
        );

        self.room_events.push_back(RoomEvent::RecomputeVisible { room_id });
    }

    fn handle_move<S: Store>(
        &mut self,
        store: &mut S,
        room_maps: &HashMap<RoomId, RoomMap>,
        scheduler: &mut crate::scheduler_id::GatherScheduler,
        current_tick: u64,
        logged_in_players: &HashSet<PlayerId>,
        direction: Direction,
    ) {
        if let Some(id) = self.actionloop.take() {
            scheduler.cancel(id);
        }

        let player = match &self.player {
            Some(player) => player.clone(),
            None => return,
        };

        let mut instance = match store.get_instance(player.instance_id) {
            Some(instance) => instance,
            None => return,
        };

        let (mut desired_y, mut desired_x) = (instance.y, instance.x);
        match direction {
            Direction::Up => desired_y -= 1,
            Direction::Down => desired_y += 1,
            Direction::Left => desired_x -= 1,
            Direction::Right => desired_x += 1,
        }

        for id in self.visible_instances.clone() {
            let other = match store.get_instance(id) {
                Some(other) => other,
                None => continue,
            };

            if other.y != desired_y || other.x != desired_x {
                continue;
            }

            if other.entity.kind == EntityKind::Portal {
                if let Some(portal) = store.get_portal(other.entity.id) {
                    let origin_room = other.room_id;
                    instance.y = portal.linked_y;
                    instance.x = portal.linked_x;
                    let dest_room = portal.linked_room;
                    store.save_instance(instance);
                    if dest_room != origin_room {
                        self.room_events.push_back(RoomEvent::RecomputeVisible { room_id: origin_room });
                        self.move_rooms(store, room_maps, logged_in_players, dest_room);
                        return;
                    }
                    self.room_events.push_back(RoomEvent::RecomputeVisible { room_id: origin_room });
                    return;
                }
            } else if matches!(other.entity.kind, EntityKind::OreNode | EntityKind::TreeNode) {
                self.start_gather(store, scheduler, current_tick, &instance, other);
                return;
            }
        }

        let room_map = match room_maps.get(&instance.room_id) {
            Some(map) => map,
            None => return,
        };

        if room_map.passable(desired_y, desired_x) {
            let room_id = instance.room_id;
            instance.y = desired_y;
            instance.x = desired_x;
            store.save_instance(instance);
            self.room_events.push_back(RoomEvent::RecomputeVisible { room_id });
        } else {
            self.outgoing.push_back(Packet::Deny { reason: "Can't move there".into() });
        }
    }

    fn start_gather<S: Store>(
        &mut self,
        store: &S,
        scheduler: &mut crate::scheduler_id::GatherScheduler,
        current_tick: u64,
        instance: &Instance,
        node_instance: Instance,
    ) {
        let node = match store.get_resource_node(node_instance.entity.id) {
            Some(node) => node,
            None => return,
        };

        let player_id = match &self.player {
            Some(player) => player.id,
            None => return,
        };

        if !gather::has_required_tool(store, player_id, node.required_tool) {
            let tool = match node.required_tool {
                GatherTool::Pickaxe => "Pickaxe",
                GatherTool::Axe => "Axe",
            };
            self.outgoing.push_back(Packet::ServerLog { message: format!("You do not have a {}.", tool) });
            return;
        }

        let verb = if node_instance.entity.kind == EntityKind::OreNode {
            "You begin to mine at the rocks."
        } else {
            "You begin to chop at the tree."
        };
        self.outgoing.push_back(Packet::ServerLog { message: verb.into() });

        if let Some(id) = self.actionloop.take() {
            scheduler.cancel(id);
        }

        let job = GatherJob { player_id, instance_id: instance.id, node_instance_id: node_instance.id };
        let id = scheduler.schedule_repeating(current_tick, 1, crate::scheduler_id::TimerJob::Gather(job));
        self.actionloop = Some(id);
    }

    /// Runs one queued gather attempt against `node_instance`. Called by
    /// the world driver when `job`'s due tick arrives.
    pub fn attempt_gather_tick<S: Store, R: Rng>(
        &mut self,
        store: &mut S,
        rng: &mut R,
        current_tick: u64,
        scheduler: &mut crate::scheduler_id::GatherScheduler,
        job: &GatherJob,
    ) -> bool {
        let instance = match store.get_instance(job.instance_id) {
            Some(instance) => instance,
            None => return true,
        };

        let node_instance = match store.get_instance(job.node_instance_id) {
            Some(instance) => instance,
            None => return true,
        };

        let node = match store.get_resource_node(node_instance.entity.id) {
            Some(node) => node,
            None => return true,
        };

        match gather::attempt_gather(store, rng, job.player_id, &node_instance, &node) {
            GatherOutcome::Continuing => false,
            GatherOutcome::AlreadyGathered => {
                self.actionloop = None;
                true
            }
            GatherOutcome::MissingTool(_) => true,
            GatherOutcome::Success(awarded) => {
                for (item_id, amt) in &awarded {
                    let name = store.get_item(*item_id).map(|i| format!("{:?}", i.kind)).unwrap_or_default();
                    self.outgoing.push_back(Packet::ServerLog { message: format!("You acquire {} {}.", amt, name) });
                }
                let node_instance_id = node_instance.id;
                let room_id = node_instance.room_id;
                let respawn_ticks = node_instance.respawn_ticks;
                gather::kill_instance(store, current_tick, node_instance);
                if let Some(delay) = respawn_ticks {
                    scheduler.schedule_once(current_tick, delay, crate::scheduler_id::TimerJob::Respawn { instance_id: node_instance_id });
                }
                self.room_events.push_back(RoomEvent::RecomputeVisible { room_id });
                self.actionloop = None;
                let _ = instance;
                true
            }
        }
    }

    pub fn move_rooms<S: Store>(
        &mut self,
        store: &mut S,
        room_maps: &HashMap<RoomId, RoomMap>,
        logged_in_players: &HashSet<PlayerId>,
        dest_room: RoomId,
    ) {
        if self.logged_in {
            if let Some(player) = &self.player {
                self.outgoing.push_back(Packet::Goodbye { instance_id: player.instance_id });
            }
            self.visible_instances.clear();
        }

        self.logged_in = true;
        self.outgoing.push_back(Packet::MoveRooms { room_id: dest_room });

        if let Some(player) = self.player.clone() {
            if let Some(mut instance) = store.get_instance(player.instance_id) {
                instance.room_id = dest_room;
                store.save_instance(instance);
            }
        }

        self.room_id = Some(dest_room);
        self.outgoing.push_back(Packet::Ok);
        self.establish_player_in_room(store, room_maps, logged_in_players);
        self.room_events.push_back(RoomEvent::RecomputeVisible { room_id: dest_room });
    }

    fn establish_player_in_room<S: Store>(
        &mut self,
        store: &S,
        room_maps: &HashMap<RoomId, RoomMap>,
        logged_in_players: &HashSet<PlayerId>,
    ) {
        let player = match &self.player {
            Some(player) => player.clone(),
            None => return,
        };

        let instance = match store.get_instance(player.instance_id) {
            Some(instance) => instance,
            None => return,
        };

        let was_initial_login = self.state == ConnectionState::GetEntry;

        if let Some(room_map) = room_maps.get(&instance.room_id) {
            let json = serde_json::json!({ "id": room_map.id, "name": room_map.name }).to_string();
            self.outgoing.push_back(Packet::ServerModel { model_type: "Room".into(), json });
        }

        let json = serde_json::to_string(&instance).unwrap_or_default();
        self.outgoing.push_back(Packet::ServerModel { model_type: "Instance".into(), json });

        self.outgoing.push_back(Packet::WeatherChange { weather: "clear".into() });

        if was_initial_login {
            for item in store.inventory_for_player(player.id) {
                let json = serde_json::to_string(&item).unwrap_or_default();
                self.outgoing.push_back(Packet::ServerModel { model_type: "InventoryItem".into(), json });
            }
        }

        self.state = ConnectionState::Play;
        self.outgoing.push_back(Packet::ServerLog { message: format!("{} has arrived.", self.username) });

        self.process_visible_instances(store, logged_in_players);
    }

    /// Recomputes this connection's visible set and queues the goodbye /
    /// model / delta packets for whatever changed. A `Player` instance whose
    /// owning connection isn't currently logged in (and any instance parked
    /// awaiting respawn) is excluded from the visible set entirely.
    pub fn process_visible_instances<S: Store>(&mut self, store: &S, logged_in_players: &HashSet<PlayerId>) {
        let player = match &self.player {
            Some(player) => player.clone(),
            None => return,
        };

        let instance = match store.get_instance(player.instance_id) {
            Some(instance) => instance,
            None => return,
        };

        let previous = self.visible_instances.clone();

        let current: HashSet<InstanceId> = store
            .instances_in_room(instance.room_id)
            .into_iter()
            .filter(|other| other.id != instance.id)
            .filter(|other| other.is_alive())
            .filter(|other| coord_in_view(instance.y, instance.x, other.y, other.x))
            .filter(|other| {
                if other.entity.kind != EntityKind::Player {
                    return true;
                }
                store.find_player_by_entity(other.entity.id).map(|p| logged_in_players.contains(&p.id)).unwrap_or(false)
            })
            .map(|other| other.id)
            .collect();

        self.visible_instances = current.clone();

        let diff = diff_visible_sets(&previous, &current);

        for id in diff.left {
            self.outgoing.push_back(Packet::Goodbye { instance_id: id });
        }

        for id in diff.entered.into_iter().chain(diff.stayed) {
            if let Some(other) = store.get_instance(id) {
                let json = serde_json::to_string(&other).unwrap_or_default();
                self.outgoing.push_back(Packet::ServerModel { model_type: "Instance".into(), json });
            }
        }
    }

    /// Drains queued outgoing packets for the world driver to flush to the
    /// socket, in the order they were generated.
    pub fn drain_outgoing(&mut self) -> Vec<Packet> {
        self.outgoing.drain(..).collect()
    }

    /// Drains the room-scoped broadcasts/recomputes this connection's
    /// packet handling produced, for the world driver to fan out.
    pub fn drain_room_events(&mut self) -> Vec<RoomEvent> {
        self.room_events.drain(..).collect()
    }

    /// Pushes this connection's own avatar state to itself, independent of
    /// any move; used for the periodic self-sync tick.
    pub fn push_self_sync<S: Store>(&mut self, store: &S) {
        let player = match &self.player {
            Some(player) => player.clone(),
            None => return,
        };
        if let Some(instance) = store.get_instance(player.instance_id) {
            let json = serde_json::to_string(&instance).unwrap_or_default();
            self.outgoing.push_back(Packet::ServerModel { model_type: "Instance".into(), json });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    fn room_maps() -> HashMap<RoomId, RoomMap> {
        let mut maps = HashMap::new();
        maps.insert(1, RoomMap::empty(1, "start".into(), 5, 5));
        maps
    }

    fn seed_user(store: &mut InMemoryStore) -> Player {
        let user = auth::register(store, "alice", "hunter2").unwrap();
        let instance = Instance {
            id: 1,
            entity: Entity { id: 1, kind: EntityKind::Player, name: "alice".into() },
            room_id: 1,
            y: 0,
            x: 0,
            amount: 1,
            state: InstanceState::Alive,
            respawn_ticks: None,
        };
        store.save_instance(instance);
        store.create_player(user.id, 1, 1)
    }

    #[test]
    fn test_login_with_unknown_username_is_denied() {
        let mut store = InMemoryStore::new();
        let maps = room_maps();
        let mut conn = Connection::new();
        let mut logged_in = HashSet::new();

        conn.login_user(&mut store, &maps, &mut logged_in, "nobody", "whatever");

        assert!(matches!(conn.outgoing.front(), Some(Packet::Deny { .. })));
    }

    #[test]
    fn test_login_success_transitions_to_play() {
        let mut store = InMemoryStore::new();
        seed_user(&mut store);
        let maps = room_maps();
        let mut conn = Connection::new();
        let mut logged_in = HashSet::new();

        conn.login_user(&mut store, &maps, &mut logged_in, "alice", "hunter2");

        assert_eq!(conn.state, ConnectionState::Play);
        assert!(conn.logged_in);
        assert!(logged_in.contains(&conn.player.as_ref().unwrap().id));
    }

    #[test]
    fn test_second_login_for_same_player_is_denied() {
        let mut store = InMemoryStore::new();
        let player = seed_user(&mut store);
        let maps = room_maps();
        let mut logged_in = HashSet::new();
        logged_in.insert(player.id);

        let mut conn = Connection::new();
        conn.login_user(&mut store, &maps, &mut logged_in, "alice", "hunter2");

        match conn.outgoing.front() {
            Some(Packet::Deny { reason }) => assert!(reason.contains("already inhabiting this realm")),
            other => panic!("unexpected packet: {:?}", other),
        }
        assert_eq!(conn.state, ConnectionState::GetEntry);
    }

    #[test]
    fn test_chat_ignores_blank_message() {
        let mut conn = Connection::new();
        conn.username = "alice".into();
        conn.room_id = Some(1);
        conn.chat("   ");
        assert!(conn.room_events.is_empty());
    }

    #[test]
    fn test_chat_truncates_to_eighty_chars_and_broadcasts_to_room() {
        let mut conn = Connection::new();
        conn.username = "alice".into();
        conn.room_id = Some(1);
        conn.chat(&"x".repeat(200));

        match conn.room_events.front() {
            Some(RoomEvent::Broadcast { room_id: 1, packet: Packet::ServerLog { message } }) => {
                assert!(message.len() <= "alice says: ".len() + 80)
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_logout_resets_state_to_get_entry() {
        let mut store = InMemoryStore::new();
        seed_user(&mut store);
        let maps = room_maps();
        let mut scheduler = crate::scheduler_id::GatherScheduler::new();
        let mut conn = Connection::new();
        let mut logged_in = HashSet::new();
        conn.login_user(&mut store, &maps, &mut logged_in, "alice", "hunter2");

        conn.logout(&mut store, &mut scheduler, &mut logged_in, "alice");

        assert_eq!(conn.state, ConnectionState::GetEntry);
        assert!(!conn.logged_in);
        assert!(logged_in.is_empty());
    }

    #[test]
    fn test_successful_move_queues_room_recompute() {
        let mut store = InMemoryStore::new();
        seed_user(&mut store);
        let maps = room_maps();
        let mut scheduler = crate::scheduler_id::GatherScheduler::new();
        let mut conn = Connection::new();
        let mut logged_in = HashSet::new();
        conn.login_user(&mut store, &maps, &mut logged_in, "alice", "hunter2");
        conn.drain_room_events();

        conn.handle_move(&mut store, &maps, &mut scheduler, 1, &logged_in, Direction::Right);

        assert!(matches!(conn.room_events.front(), Some(RoomEvent::RecomputeVisible { room_id: 1 })));
        let moved = store.get_instance(1).unwrap();
        assert_eq!((moved.y, moved.x), (0, 1));
    }
}
