//! Tunnel model and entrance directions

use std::fmt::Display;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Point;
use crate::TunnelWatchError;

/// One of the two tunnel entrances
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    North,
    South,
}

impl Direction {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::North => "north",
            Direction::South => "south",
        }
    }
}

impl Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = TunnelWatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "north" => Ok(Direction::North),
            "south" => Ok(Direction::South),
            other => Err(TunnelWatchError::validation(format!(
                "unknown direction '{other}', expected 'north' or 'south'"
            ))),
        }
    }
}

/// A road tunnel with a reference coordinate for each entrance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tunnel {
    pub id: Uuid,
    pub name: String,
    pub north_entrance_location: Point,
    pub south_entrance_location: Point,
    pub created_at: DateTime<Utc>,
}

impl Tunnel {
    /// Create a tunnel, rejecting an empty name
    pub fn new(
        id: Uuid,
        name: impl Into<String>,
        north_entrance_location: Point,
        south_entrance_location: Point,
        created_at: DateTime<Utc>,
    ) -> crate::Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(TunnelWatchError::validation("tunnel name cannot be empty"));
        }
        Ok(Self {
            id,
            name,
            north_entrance_location,
            south_entrance_location,
            created_at,
        })
    }

    /// Reference point of the entrance for `direction`
    #[must_use]
    pub fn entrance(&self, direction: Direction) -> &Point {
        match direction {
            Direction::North => &self.north_entrance_location,
            Direction::South => &self.south_entrance_location,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tunnel() -> Tunnel {
        Tunnel::new(
            Uuid::nil(),
            "Hvalfjörður",
            Point::new(64.1375, -21.8952).unwrap(),
            Point::new(64.3620, -21.7800).unwrap(),
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn test_entrance_selection() {
        let tunnel = tunnel();
        assert_eq!(tunnel.entrance(Direction::North).lat(), 64.1375);
        assert_eq!(tunnel.entrance(Direction::South).lat(), 64.3620);
    }

    #[test]
    fn test_direction_parsing() {
        assert_eq!("north".parse::<Direction>().unwrap(), Direction::North);
        assert_eq!("south".parse::<Direction>().unwrap(), Direction::South);
        assert!(matches!(
            "east".parse::<Direction>(),
            Err(TunnelWatchError::Validation { .. })
        ));
        assert_eq!(Direction::South.to_string(), "south");
    }

    #[test]
    fn test_direction_wire_format() {
        assert_eq!(serde_json::to_string(&Direction::North).unwrap(), "\"north\"");
        assert!(serde_json::from_str::<Direction>("\"North\"").is_err());
    }

    #[test]
    fn test_empty_name_rejected() {
        let point = Point::new(0.0, 0.0).unwrap();
        assert!(Tunnel::new(Uuid::nil(), "  ", point, point, Utc::now()).is_err());
    }

    #[test]
    fn test_tunnel_json_is_camel_case() {
        let value = serde_json::to_value(tunnel()).unwrap();
        assert!(value.get("northEntranceLocation").is_some());
        assert_eq!(value["southEntranceLocation"]["lng"], -21.78);
    }
}
