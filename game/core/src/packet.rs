//! The closed, ordered-slot packet set. Every packet starts with a single
//! discriminator byte; everything after it is a fixed sequence of typed
//! slots for that variant. Unknown discriminators are rejected rather than
//! silently ignored, so a protocol mismatch fails loudly instead of
//! desyncing the stream.

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use moonlapse_proto::shared::{Deserialize, ErrorType, NetworkError, NetworkResult, Serialize, SizedRead, SizedWrite};
use std::io::Write;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    ClientKey { n: Vec<u8>, e: Vec<u8> },
    ServerTickRate { ticks_per_second: u64 },
    Welcome { message: String },
    Login { username: String, password: String },
    Register { username: String, password: String },
    Ok,
    Deny { reason: String },
    Logout { username: String },
    Goodbye { instance_id: u64 },
    Move { direction: Direction },
    Chat { message: String },
    ServerLog { message: String },
    GrabItem,
    DropItem { inventory_item_id: u64 },
    WeatherChange { weather: String },
    ServerModel { model_type: String, json: String },
    MoveRooms { room_id: u32 },
}

const D_CLIENT_KEY: u8 = 0;
const D_SERVER_TICK_RATE: u8 = 1;
const D_WELCOME: u8 = 2;
const D_LOGIN: u8 = 3;
const D_REGISTER: u8 = 4;
const D_OK: u8 = 5;
const D_DENY: u8 = 6;
const D_LOGOUT: u8 = 7;
const D_GOODBYE: u8 = 8;
const D_MOVE: u8 = 9;
const D_CHAT: u8 = 10;
const D_SERVER_LOG: u8 = 11;
const D_GRAB_ITEM: u8 = 12;
const D_DROP_ITEM: u8 = 13;
const D_WEATHER_CHANGE: u8 = 14;
const D_SERVER_MODEL: u8 = 15;
const D_MOVE_ROOMS: u8 = 16;

fn write_bytes<W: SizedWrite>(stream: &mut W, data: &[u8]) -> NetworkResult<()> {
    if stream.free_capacity() < 4 + data.len() {
        return Err(NetworkError::Wait);
    }
    stream.write_u32::<BigEndian>(data.len() as u32)?;
    stream.write_all(data)?;
    Ok(())
}

fn read_bytes<R: SizedRead>(stream: &mut R) -> NetworkResult<Vec<u8>> {
    if stream.remaining_data() < 4 {
        return Err(NetworkError::Wait);
    }
    let len = stream.read_u32::<BigEndian>()? as usize;
    if stream.remaining_data() < len {
        return Err(NetworkError::Wait);
    }
    let mut buf = vec![0u8; len];
    std::io::Read::read_exact(stream, &mut buf)?;
    Ok(buf)
}

fn write_str<W: SizedWrite>(stream: &mut W, s: &str) -> NetworkResult<()> {
    write_bytes(stream, s.as_bytes())
}

fn read_str<R: SizedRead>(stream: &mut R) -> NetworkResult<String> {
    let bytes = read_bytes(stream)?;
    String::from_utf8(bytes).map_err(|_| NetworkError::Fatal(ErrorType::EmptyPayload))
}

impl Serialize for Packet {
    fn serialize<W: SizedWrite>(&self, stream: &mut W) -> NetworkResult<()> {
        if stream.free_capacity() < 1 {
            return Err(NetworkError::Wait);
        }

        match self {
            Packet::ClientKey { n, e } => {
                stream.write_u8(D_CLIENT_KEY)?;
                write_bytes(stream, n)?;
                write_bytes(stream, e)?;
            }
            Packet::ServerTickRate { ticks_per_second } => {
                stream.write_u8(D_SERVER_TICK_RATE)?;
                stream.write_u64::<BigEndian>(*ticks_per_second)?;
            }
            Packet::Welcome { message } => {
                stream.write_u8(D_WELCOME)?;
                write_str(stream, message)?;
            }
            Packet::Login { username, password } => {
                stream.write_u8(D_LOGIN)?;
                write_str(stream, username)?;
                write_str(stream, password)?;
            }
            Packet::Register { username, password } => {
                stream.write_u8(D_REGISTER)?;
                write_str(stream, username)?;
                write_str(stream, password)?;
            }
            Packet::Ok => {
                stream.write_u8(D_OK)?;
            }
            Packet::Deny { reason } => {
                stream.write_u8(D_DENY)?;
                write_str(stream, reason)?;
            }
            Packet::Logout { username } => {
                stream.write_u8(D_LOGOUT)?;
                write_str(stream, username)?;
            }
            Packet::Goodbye { instance_id } => {
                stream.write_u8(D_GOODBYE)?;
                stream.write_u64::<BigEndian>(*instance_id)?;
            }
            Packet::Move { direction } => {
                stream.write_u8(D_MOVE)?;
                let d = match direction {
                    Direction::Up => 0u8,
                    Direction::Down => 1,
                    Direction::Left => 2,
                    Direction::Right => 3,
                };
                stream.write_u8(d)?;
            }
            Packet::Chat { message } => {
                stream.write_u8(D_CHAT)?;
                write_str(stream, message)?;
            }
            Packet::ServerLog { message } => {
                stream.write_u8(D_SERVER_LOG)?;
                write_str(stream, message)?;
            }
            Packet::GrabItem => {
                stream.write_u8(D_GRAB_ITEM)?;
            }
            Packet::DropItem { inventory_item_id } => {
                stream.write_u8(D_DROP_ITEM)?;
                stream.write_u64::<BigEndian>(*inventory_item_id)?;
            }
            Packet::WeatherChange { weather } => {
                stream.write_u8(D_WEATHER_CHANGE)?;
                write_str(stream, weather)?;
            }
            Packet::ServerModel { model_type, json } => {
                stream.write_u8(D_SERVER_MODEL)?;
                write_str(stream, model_type)?;
                write_str(stream, json)?;
            }
            Packet::MoveRooms { room_id } => {
                stream.write_u8(D_MOVE_ROOMS)?;
                stream.write_u32::<BigEndian>(*room_id)?;
            }
        }

        Ok(())
    }
}

impl Deserialize for Packet {
    fn deserialize<R: SizedRead>(stream: &mut R) -> NetworkResult<Packet> {
        if stream.remaining_data() < 1 {
            return Err(NetworkError::Wait);
        }

        let discriminator = stream.read_u8()?;

        Ok(match discriminator {
            D_CLIENT_KEY => Packet::ClientKey { n: read_bytes(stream)?, e: read_bytes(stream)? },
            D_SERVER_TICK_RATE => Packet::ServerTickRate { ticks_per_second: stream.read_u64::<BigEndian>()? },
            D_WELCOME => Packet::Welcome { message: read_str(stream)? },
            D_LOGIN => Packet::Login { username: read_str(stream)?, password: read_str(stream)? },
            D_REGISTER => Packet::Register { username: read_str(stream)?, password: read_str(stream)? },
            D_OK => Packet::Ok,
            D_DENY => Packet::Deny { reason: read_str(stream)? },
            D_LOGOUT => Packet::Logout { username: read_str(stream)? },
            D_GOODBYE => Packet::Goodbye { instance_id: stream.read_u64::<BigEndian>()? },
            D_MOVE => {
                let d = stream.read_u8()?;
                let direction = match d {
                    0 => Direction::Up,
                    1 => Direction::Down,
                    2 => Direction::Left,
                    3 => Direction::Right,
                    other => return Err(NetworkError::Fatal(ErrorType::UnknownDiscriminator(other))),
                };
                Packet::Move { direction }
            }
            D_CHAT => Packet::Chat { message: read_str(stream)? },
            D_SERVER_LOG => Packet::ServerLog { message: read_str(stream)? },
            D_GRAB_ITEM => Packet::GrabItem,
            D_DROP_ITEM => Packet::DropItem { inventory_item_id: stream.read_u64::<BigEndian>()? },
            D_WEATHER_CHANGE => Packet::WeatherChange { weather: read_str(stream)? },
            D_SERVER_MODEL => Packet::ServerModel { model_type: read_str(stream)?, json: read_str(stream)? },
            D_MOVE_ROOMS => Packet::MoveRooms { room_id: stream.read_u32::<BigEndian>()? },
            other => return Err(NetworkError::Fatal(ErrorType::UnknownDiscriminator(other))),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn roundtrip(packet: Packet) -> Packet {
        let mut buf = [0u8; 256];
        {
            let mut cursor = Cursor::new(&mut buf[..]);
            packet.serialize(&mut cursor).unwrap();
        }
        let mut cursor = Cursor::new(&buf[..]);
        Packet::deserialize(&mut cursor).unwrap()
    }

    #[test]
    fn test_roundtrip_login() {
        let packet = Packet::Login { username: "alice".into(), password: "hunter2".into() };
        assert_eq!(roundtrip(packet.clone()), packet);
    }

    #[test]
    fn test_roundtrip_move() {
        let packet = Packet::Move { direction: Direction::Left };
        assert_eq!(roundtrip(packet.clone()), packet);
    }

    #[test]
    fn test_roundtrip_ok_and_grab_item_are_zero_arg() {
        assert_eq!(roundtrip(Packet::Ok), Packet::Ok);
        assert_eq!(roundtrip(Packet::GrabItem), Packet::GrabItem);
    }

    #[test]
    fn test_unknown_discriminator_is_rejected() {
        let buf = [255u8];
        let mut cursor = Cursor::new(&buf[..]);
        let result = Packet::deserialize(&mut cursor);
        assert_eq!(result.unwrap_err(), NetworkError::Fatal(ErrorType::UnknownDiscriminator(255)));
    }

    #[test]
    fn test_incomplete_packet_waits() {
        let buf = [D_LOGIN];
        let mut cursor = Cursor::new(&buf[..]);
        let result = Packet::deserialize(&mut cursor);
        assert_eq!(result.unwrap_err(), NetworkError::Wait);
    }
}
