//! Ties the store, room maps, connections and deferred scheduler together
//! into the single authoritative per-tick update, mirroring the ordering of
//! the original server's `tick()`: process each connection's next queued
//! packet, fire any deferred callbacks due this tick, fan out whatever that
//! produced to the rooms involved, then flush whatever got queued up for
//! the clients.

use crate::connection::{Connection, ConnectionState, RoomEvent};
use crate::gather;
use crate::map::RoomMap;
use crate::model::{PlayerId, RoomId};
use crate::packet::Packet;
use crate::scheduler_id::{GatherScheduler, TimerJob};
use crate::store::Store;
use hashbrown::{HashMap, HashSet};
use rand::Rng;

pub type ConnectionId = u64;

/// The weather cycles through these in order, one step every
/// `WEATHER_CHANGE_SECONDS`.
const WEATHER_CYCLE: [&str; 3] = ["clear", "rain", "storm"];
const WEATHER_CHANGE_SECONDS: u64 = 300;

pub struct World<S: Store> {
    pub store: S,
    pub room_maps: HashMap<RoomId, RoomMap>,
    pub scheduler: GatherScheduler,
    pub connections: HashMap<ConnectionId, Connection>,
    pub ticks_per_second: u64,
    pub weather: String,
    next_connection_id: ConnectionId,
}

impl<S: Store> World<S> {
    pub fn new(store: S, ticks_per_second: u64) -> World<S> {
        World {
            store,
            room_maps: HashMap::new(),
            scheduler: GatherScheduler::new(),
            connections: HashMap::new(),
            ticks_per_second,
            weather: "clear".to_string(),
            next_connection_id: 0,
        }
    }

    pub fn add_room_map(&mut self, map: RoomMap) {
        self.room_maps.insert(map.id, map);
    }

    pub fn register_connection(&mut self) -> ConnectionId {
        let id = self.next_connection_id;
        self.next_connection_id += 1;
        self.connections.insert(id, Connection::new());
        id
    }

    /// Drops a connection, cancelling its running gather loop (if any).
    pub fn remove_connection(&mut self, id: ConnectionId) {
        if let Some(mut conn) = self.connections.remove(&id) {
            if let Some(actionloop) = conn.actionloop.take() {
                self.scheduler.cancel(actionloop);
            }
        }
    }

    /// Runs one full tick: every queued incoming packet is processed in the
    /// order given, then due scheduler callbacks fire, then every room
    /// touched by either gets its broadcasts delivered and its visible set
    /// recomputed, then each connection's outgoing queue is drained for the
    /// caller to write to its socket.
    pub fn tick<R: Rng>(
        &mut self,
        current_tick: u64,
        rng: &mut R,
        incoming: Vec<(ConnectionId, Packet)>,
    ) -> HashMap<ConnectionId, Vec<Packet>> {
        let mut logged_in_players: HashSet<PlayerId> = self
            .connections
            .values()
            .filter(|c| c.logged_in)
            .filter_map(|c| c.player.as_ref().map(|p| p.id))
            .collect();

        let mut pending_broadcasts: Vec<(RoomId, Packet)> = Vec::new();
        let mut pending_recomputes: HashSet<RoomId> = HashSet::new();

        for (id, packet) in incoming {
            if let Some(conn) = self.connections.get_mut(&id) {
                conn.process_packet(
                    &mut self.store,
                    &self.room_maps,
                    &mut self.scheduler,
                    current_tick,
                    self.ticks_per_second,
                    rng,
                    &mut logged_in_players,
                    packet,
                );
                drain_room_events(conn, &mut pending_broadcasts, &mut pending_recomputes);
            }
        }

        for (due_id, job) in self.scheduler.drain_due(current_tick) {
            match job {
                TimerJob::Gather(gather_job) => {
                    let target = self
                        .connections
                        .iter_mut()
                        .find(|(_, conn)| conn.player.as_ref().map(|p| p.id) == Some(gather_job.player_id));

                    if let Some((_, conn)) = target {
                        let finished =
                            conn.attempt_gather_tick(&mut self.store, rng, current_tick, &mut self.scheduler, &gather_job);
                        drain_room_events(conn, &mut pending_broadcasts, &mut pending_recomputes);
                        if finished {
                            self.scheduler.cancel(due_id);
                        }
                    }
                }
                TimerJob::Respawn { instance_id } => {
                    if let Some(instance) = self.store.get_instance(instance_id) {
                        let room_id = instance.room_id;
                        gather::respawn_instance(&mut self.store, instance_id);
                        pending_recomputes.insert(room_id);
                    }
                }
                TimerJob::Despawn { instance_id } => {
                    if let Some(instance) = self.store.get_instance(instance_id) {
                        let room_id = instance.room_id;
                        self.store.delete_instance(instance_id);
                        pending_recomputes.insert(room_id);
                    }
                }
            }
        }

        for (room_id, packet) in pending_broadcasts {
            for conn in self.connections.values_mut() {
                if conn.room_id == Some(room_id) {
                    conn.outgoing.push_back(packet.clone());
                }
            }
        }

        for room_id in pending_recomputes {
            for conn in self.connections.values_mut() {
                if conn.room_id == Some(room_id) {
                    conn.process_visible_instances(&self.store, &logged_in_players);
                }
            }
        }

        if self.ticks_per_second > 0 && current_tick % self.ticks_per_second == 0 {
            for conn in self.connections.values_mut() {
                if conn.state == ConnectionState::Play {
                    conn.push_self_sync(&self.store);
                }
            }
        }

        self.advance_weather(current_tick);

        let mut outgoing = HashMap::new();
        for (id, conn) in self.connections.iter_mut() {
            let packets = conn.drain_outgoing();
            if !packets.is_empty() {
                outgoing.insert(*id, packets);
            }
        }
        outgoing
    }

    /// Steps the weather cycle and, on change, broadcasts it to every
    /// logged-in connection regardless of room.
    fn advance_weather(&mut self, current_tick: u64) {
        if self.ticks_per_second == 0 {
            return;
        }
        let seconds = current_tick / self.ticks_per_second;
        let index = ((seconds / WEATHER_CHANGE_SECONDS) as usize) % WEATHER_CYCLE.len();
        let weather = WEATHER_CYCLE[index];

        if weather == self.weather {
            return;
        }
        self.weather = weather.to_string();

        for conn in self.connections.values_mut() {
            if conn.state == ConnectionState::Play {
                conn.outgoing.push_back(Packet::WeatherChange { weather: weather.to_string() });
            }
        }
    }
}

fn drain_room_events(
    conn: &mut Connection,
    pending_broadcasts: &mut Vec<(RoomId, Packet)>,
    pending_recomputes: &mut HashSet<RoomId>,
) {
    for event in conn.drain_room_events() {
        match event {
            RoomEvent::Broadcast { room_id, packet } => pending_broadcasts.push((room_id, packet)),
            RoomEvent::RecomputeVisible { room_id } => {
                pending_recomputes.insert(room_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_register_and_remove_connection() {
        let mut world = World::new(InMemoryStore::new(), 20);
        let id = world.register_connection();

        assert!(world.connections.contains_key(&id));
        world.remove_connection(id);
        assert!(!world.connections.contains_key(&id));
    }

    #[test]
    fn test_tick_processes_incoming_then_flushes_outgoing() {
        let mut world = World::new(InMemoryStore::new(), 20);
        world.add_room_map(RoomMap::empty(1, "start".into(), 5, 5));
        let id = world.register_connection();
        let mut rng = StdRng::seed_from_u64(0);

        let incoming = vec![(id, Packet::Register { username: "alice".into(), password: "hunter2".into() })];
        let outgoing = world.tick(0, &mut rng, incoming);

        let packets = outgoing.get(&id).expect("registration should have queued a reply");
        assert!(matches!(packets.first(), Some(Packet::Ok)));
    }

    fn seed_player(store: &mut InMemoryStore, username: &str, instance_id: u64, y: i32, x: i32) {
        use crate::model::{Entity, EntityKind, Instance, InstanceState};

        let user = crate::auth::register(store, username, "hunter2").unwrap();
        store.save_instance(Instance {
            id: instance_id,
            entity: Entity { id: instance_id, kind: EntityKind::Player, name: username.into() },
            room_id: 1,
            y,
            x,
            amount: 1,
            state: InstanceState::Alive,
            respawn_ticks: None,
        });
        store.create_player(user.id, instance_id, instance_id);
    }

    #[test]
    fn test_move_broadcasts_recomputed_visibility_to_roommate() {
        let mut world = World::new(InMemoryStore::new(), 20);
        world.add_room_map(RoomMap::empty(1, "start".into(), 5, 5));
        seed_player(&mut world.store, "alice", 1, 0, 0);
        seed_player(&mut world.store, "bob", 2, 0, 2);
        let mover = world.register_connection();
        let watcher = world.register_connection();
        let mut rng = StdRng::seed_from_u64(0);

        let login = vec![
            (mover, Packet::Login { username: "alice".into(), password: "hunter2".into() }),
            (watcher, Packet::Login { username: "bob".into(), password: "hunter2".into() }),
        ];
        world.tick(0, &mut rng, login);

        let moved = vec![(mover, Packet::Move { direction: crate::packet::Direction::Right })];
        let outgoing = world.tick(1, &mut rng, moved);

        let watcher_packets = outgoing.get(&watcher).expect("watcher should have received a recompute");
        assert!(watcher_packets.iter().any(|p| matches!(p, Packet::ServerModel { .. })));
    }
}
