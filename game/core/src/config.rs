use serde_derive::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_PORT: u16 = 42523;

#[derive(Serialize, Deserialize)]
pub struct Server {
    pub address: String,
    pub port: u16,
    pub max_clients: u16,
}

#[derive(Serialize, Deserialize)]
pub struct Game {
    pub ticks_per_second: u64,
    pub view_radius: i32,
    pub rooms_dir: String,
}

#[derive(Serialize, Deserialize)]
pub struct Crypto {
    /// Reject any connection whose first packet can't be RSA-decrypted
    /// instead of falling back to treating it as cleartext.
    pub require_encryption: bool,
}

#[derive(Serialize, Deserialize)]
pub struct GameConfig {
    pub server: Server,
    pub game: Game,
    pub crypto: Crypto,
}

impl Default for GameConfig {
    fn default() -> GameConfig {
        GameConfig {
            server: Server {
                address: "0.0.0.0".to_string(),
                port: DEFAULT_PORT,
                max_clients: 256,
            },
            game: Game {
                ticks_per_second: 20,
                view_radius: 10,
                rooms_dir: "rooms".to_string(),
            },
            crypto: Crypto {
                require_encryption: false,
            },
        }
    }
}

impl GameConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> GameConfig {
        serdeconv::from_toml_file(path).expect("Error loading game configuration file")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_uses_protocol_port() {
        let config = GameConfig::default();
        assert_eq!(config.server.port, DEFAULT_PORT);
        assert_eq!(config.game.ticks_per_second, 20);
        assert!(!config.crypto.require_encryption);
    }
}
