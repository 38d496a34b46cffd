use clap::{App, Arg};
use moonlapse_core::config::GameConfig;
use moonlapse_core::connection::ConnectionState;
use moonlapse_core::map::RoomMap;
use moonlapse_core::packet::Packet;
use moonlapse_core::store::InMemoryStore;
use moonlapse_core::transport::{self, MAX_FRAME_LEN};
use moonlapse_core::world::{ConnectionId, World};
use moonlapse_proto::crypto::{self, KeyPair, PublicKeyParams};
use moonlapse_proto::logging;
use moonlapse_proto::shared::{Deserialize as _, NetworkResult, Serialize as _};
use moonlapse_world::tick::TickDriver;
use rand::rngs::OsRng;
use rsa::RsaPublicKey;
use std::io::Cursor;
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;

const WELCOME_MESSAGE: &str =
    "Welcome to MoonlapseMUD\n ,-,-.\n/.( +.\\\n\\ {. */\n `-`-'\n     Enjoy your stay ~";

/// Messages a connection's reader thread hands to the world tick thread.
enum Inbound {
    Packet(ConnectionId, Packet),
    Disconnected(ConnectionId),
}

fn load_room_maps(dir: &str) -> Vec<RoomMap> {
    let mut maps = Vec::new();

    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return maps,
    };

    for (index, entry) in entries.flatten().enumerate() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        match RoomMap::load(index as u32 + 1, &path) {
            Ok(map) => maps.push(map),
            Err(err) => eprintln!("failed to load room map {:?}: {}", path, err),
        }
    }

    maps
}

fn send_packet(writer: &mut TcpStream, packet: &Packet, peer_key: Option<&RsaPublicKey>) -> NetworkResult<()> {
    let mut buf = vec![0u8; MAX_FRAME_LEN];
    let written = {
        let mut cursor = Cursor::new(&mut buf[..]);
        packet.serialize(&mut cursor)?;
        cursor.position() as usize
    };
    transport::send_frame(writer, &buf[..written], peer_key)
}

/// Drives one client connection: a reader thread decrypts and decodes
/// incoming frames, answering the RSA handshake (`ClientKey`) immediately
/// and forwarding everything else to the world tick loop; this thread
/// drains the world's reply queue for the connection and writes it back.
fn handle_connection(
    stream: TcpStream,
    id: ConnectionId,
    server_keys: Arc<KeyPair>,
    require_encryption: bool,
    ticks_per_second: u64,
    inbound_tx: Sender<Inbound>,
    outgoing_rx: Receiver<Packet>,
    log: logging::Logger,
) {
    let mut reader = match stream.try_clone() {
        Ok(stream) => stream,
        Err(_) => return,
    };
    let writer = Arc::new(Mutex::new(stream));
    let client_key: Arc<Mutex<Option<RsaPublicKey>>> = Arc::new(Mutex::new(None));

    let read_log = log.clone();
    let read_tx = inbound_tx.clone();
    let read_writer = writer.clone();
    let read_client_key = client_key.clone();
    let read_server_keys = server_keys.clone();
    thread::spawn(move || loop {
        let raw = match transport::read_netstring(&mut reader) {
            Ok(raw) => raw,
            Err(_) => {
                let _ = read_tx.send(Inbound::Disconnected(id));
                break;
            }
        };

        let plain = match transport::decrypt_frame(&read_server_keys.private, raw, require_encryption) {
            Ok(plain) => plain,
            Err(_) => {
                logging::warn!(read_log, "dropping undecryptable frame"; "connection" => id);
                continue;
            }
        };

        let mut cursor = Cursor::new(&plain[..]);
        let packet = match Packet::deserialize(&mut cursor) {
            Ok(packet) => packet,
            Err(err) => {
                logging::warn!(read_log, "rejected malformed packet"; "connection" => id, "error" => ?err);
                continue;
            }
        };

        if let Packet::ClientKey { n, e } = &packet {
            match crypto::import_public_key(&PublicKeyParams { n: n.clone(), e: e.clone() }) {
                Ok(pubkey) => {
                    *read_client_key.lock().expect("client key mutex poisoned") = Some(pubkey.clone());

                    let server_params = crypto::export_public_key(&read_server_keys.public);
                    let mut writer = read_writer.lock().expect("writer mutex poisoned");
                    let reply = Packet::ClientKey { n: server_params.n, e: server_params.e };
                    let _ = send_packet(&mut writer, &reply, Some(&pubkey));
                    let _ = send_packet(&mut writer, &Packet::ServerTickRate { ticks_per_second }, Some(&pubkey));
                    let _ = send_packet(
                        &mut writer,
                        &Packet::Welcome { message: WELCOME_MESSAGE.to_string() },
                        Some(&pubkey),
                    );
                }
                Err(_) => logging::warn!(read_log, "rejected malformed client key"; "connection" => id),
            }
            continue;
        }

        if read_tx.send(Inbound::Packet(id, packet)).is_err() {
            break;
        }
    });

    for packet in outgoing_rx.iter() {
        let key = client_key.lock().expect("client key mutex poisoned").clone();
        let mut writer = writer.lock().expect("writer mutex poisoned");
        if send_packet(&mut writer, &packet, key.as_ref()).is_err() {
            break;
        }
    }
}

fn main() {
    let matches = App::new("Moonlapse Game Runner")
        .version("1.0")
        .about("Runs the Moonlapse MUD server")
        .arg(
            Arg::with_name("CONFIG")
                .long("config")
                .help("Path to a game_config.toml file")
                .takes_value(true),
        )
        .arg(Arg::with_name("verbose").short("v").long("verbose").help("Enable verbose logging"))
        .get_matches();

    let log = logging::init(matches.is_present("verbose"));

    let config = match matches.value_of("CONFIG") {
        Some(path) => GameConfig::load(path),
        None => GameConfig::default(),
    };

    let server_keys = Arc::new(KeyPair::generate().expect("failed to generate server RSA keypair"));

    let mut world = World::new(InMemoryStore::new(), config.game.ticks_per_second);
    for map in load_room_maps(&config.game.rooms_dir) {
        logging::info!(log, "loaded room map"; "room" => map.id, "name" => %map.name);
        world.add_room_map(map);
    }
    let world = Arc::new(Mutex::new(world));

    let address = format!("{}:{}", config.server.address, config.server.port);
    let listener = TcpListener::bind(&address).expect("failed to bind game server listener");
    logging::info!(log, "listening"; "address" => %address);

    let (inbound_tx, inbound_rx) = channel::<Inbound>();
    let outgoing_senders: Arc<Mutex<hashbrown::HashMap<ConnectionId, Sender<Packet>>>> =
        Arc::new(Mutex::new(hashbrown::HashMap::new()));

    let accept_log = log.clone();
    let accept_world = world.clone();
    let accept_senders = outgoing_senders.clone();
    let accept_keys = server_keys.clone();
    let require_encryption = config.crypto.require_encryption;
    let ticks_per_second = config.game.ticks_per_second;

    thread::spawn(move || {
        for stream in listener.incoming() {
            let stream = match stream {
                Ok(stream) => stream,
                Err(_) => continue,
            };

            let id = accept_world.lock().expect("world mutex poisoned").register_connection();

            let (out_tx, out_rx) = channel::<Packet>();
            accept_senders.lock().expect("senders mutex poisoned").insert(id, out_tx);

            logging::info!(accept_log, "client connected"; "connection" => id);

            let conn_log = accept_log.clone();
            let conn_inbound = inbound_tx.clone();
            let conn_keys = accept_keys.clone();
            thread::spawn(move || {
                handle_connection(stream, id, conn_keys, require_encryption, ticks_per_second, conn_inbound, out_rx, conn_log);
            });
        }
    });

    run_tick_loop(world, inbound_rx, outgoing_senders, ticks_per_second, log);
}

fn run_tick_loop(
    world: Arc<Mutex<World<InMemoryStore>>>,
    inbound_rx: Receiver<Inbound>,
    outgoing_senders: Arc<Mutex<hashbrown::HashMap<ConnectionId, Sender<Packet>>>>,
    ticks_per_second: u64,
    log: logging::Logger,
) {
    let mut driver = TickDriver::new(ticks_per_second);
    let mut rng = OsRng;
    let shutdown = Arc::new(AtomicBool::new(false));

    driver.run(
        |tick| {
            let mut incoming = Vec::new();
            let mut to_remove = Vec::new();

            while let Ok(message) = inbound_rx.try_recv() {
                match message {
                    Inbound::Packet(id, packet) => incoming.push((id, packet)),
                    Inbound::Disconnected(id) => to_remove.push(id),
                }
            }

            let mut world = world.lock().expect("world mutex poisoned");

            for id in to_remove {
                world.remove_connection(id);
                outgoing_senders.lock().expect("senders mutex poisoned").remove(&id);
            }

            let outgoing = world.tick(tick, &mut rng, incoming);

            let senders = outgoing_senders.lock().expect("senders mutex poisoned");
            for (id, packets) in outgoing {
                if let Some(sender) = senders.get(&id) {
                    for packet in packets {
                        let _ = sender.send(packet);
                    }
                }
            }

            if tick % (ticks_per_second * 60) == 0 {
                let playing = world.connections.values().filter(|c| c.state == ConnectionState::Play).count();
                logging::debug!(log, "tick heartbeat"; "tick" => tick, "players" => playing);
            }
        },
        || shutdown.load(Ordering::Relaxed),
    );
}
