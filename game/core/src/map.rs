//! Room-scoped spatial model: a fixed-size grid of tiles loaded from a
//! map file, plus the passability check used by movement.

use crate::model::RoomId;
use serde_derive::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Tile {
    Nothing,
    Solid,
}

/// On-disk representation of a room map, one JSON file per room.
#[derive(Debug, Deserialize)]
struct RoomMapFile {
    name: String,
    width: i32,
    height: i32,
    /// `(y, x)` pairs of solid tiles. Everything else is passable.
    solid: Vec<(i32, i32)>,
}

#[derive(Debug, Clone)]
pub struct RoomMap {
    pub id: RoomId,
    pub name: String,
    pub width: i32,
    pub height: i32,
    tiles: Vec<Tile>,
}

impl RoomMap {
    /// Builds an all-passable map in memory, for tests and for rooms with
    /// no map file of their own yet.
    pub fn empty(id: RoomId, name: String, width: i32, height: i32) -> RoomMap {
        RoomMap {
            id,
            name,
            width,
            height,
            tiles: vec![Tile::Nothing; (width * height) as usize],
        }
    }

    pub fn load<P: AsRef<Path>>(id: RoomId, path: P) -> Result<RoomMap, std::io::Error> {
        let raw = std::fs::read_to_string(path)?;
        let file: RoomMapFile = serde_json::from_str(&raw)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        let mut tiles = vec![Tile::Nothing; (file.width * file.height) as usize];
        for (y, x) in &file.solid {
            if let Some(idx) = Self::index(file.width, file.height, *y, *x) {
                tiles[idx] = Tile::Solid;
            }
        }

        Ok(RoomMap {
            id,
            name: file.name,
            width: file.width,
            height: file.height,
            tiles,
        })
    }

    fn index(width: i32, height: i32, y: i32, x: i32) -> Option<usize> {
        if y < 0 || x < 0 || y >= height || x >= width {
            return None;
        }
        Some((y * width + x) as usize)
    }

    pub fn in_bounds(&self, y: i32, x: i32) -> bool {
        y >= 0 && x >= 0 && y < self.height && x < self.width
    }

    pub fn at(&self, y: i32, x: i32) -> Tile {
        match Self::index(self.width, self.height, y, x) {
            Some(idx) => self.tiles[idx],
            None => Tile::Solid,
        }
    }

    /// A tile can be walked onto if it's in bounds and not solid. Whether
    /// something is standing on it is a separate, instance-level check.
    pub fn passable(&self, y: i32, x: i32) -> bool {
        self.in_bounds(y, x) && self.at(y, x) == Tile::Nothing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_map() -> RoomMap {
        RoomMap {
            id: 1,
            name: "test".into(),
            width: 3,
            height: 3,
            tiles: vec![
                Tile::Nothing, Tile::Solid, Tile::Nothing,
                Tile::Nothing, Tile::Nothing, Tile::Nothing,
                Tile::Nothing, Tile::Nothing, Tile::Nothing,
            ],
        }
    }

    #[test]
    fn test_passable_respects_solid_tiles() {
        let map = make_map();
        assert!(!map.passable(0, 1));
        assert!(map.passable(0, 0));
    }

    #[test]
    fn test_passable_respects_bounds() {
        let map = make_map();
        assert!(!map.passable(-1, 0));
        assert!(!map.passable(0, 3));
    }
}
