//! Signal primitives: approach directions, phase groups and light colours

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::CrosswayError;

/// An approach into an intersection, or the pedestrian crossing
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Direction {
    North,
    South,
    East,
    West,
    Pedestrian,
}

impl Direction {
    /// The four vehicle approaches, in signal index order
    pub const VEHICLE: [Direction; 4] = [
        Direction::North,
        Direction::South,
        Direction::East,
        Direction::West,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::North => "N",
            Direction::South => "S",
            Direction::East => "E",
            Direction::West => "W",
            Direction::Pedestrian => "PEDESTRIAN",
        }
    }

    /// Phase group sharing this direction's right-of-way slot
    #[inline]
    pub fn group(self) -> PhaseGroup {
        PhaseGroup::of(self)
    }

    /// Slot index for per-direction arrays; pedestrians have none
    pub fn index(self) -> Option<usize> {
        match self {
            Direction::North => Some(0),
            Direction::South => Some(1),
            Direction::East => Some(2),
            Direction::West => Some(3),
            Direction::Pedestrian => None,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = CrosswayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "N" => Ok(Direction::North),
            "S" => Ok(Direction::South),
            "E" => Ok(Direction::East),
            "W" => Ok(Direction::West),
            "PEDESTRIAN" => Ok(Direction::Pedestrian),
            other => Err(CrosswayError::InvalidDirection(other.to_string())),
        }
    }
}

impl Serialize for Direction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Direction {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Right-of-way slot at an intersection. Groups are mutually exclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PhaseGroup {
    #[serde(rename = "NS")]
    NorthSouth,
    #[serde(rename = "EW")]
    EastWest,
    #[serde(rename = "PEDESTRIAN")]
    Pedestrian,
}

impl PhaseGroup {
    pub fn of(direction: Direction) -> Self {
        match direction {
            Direction::North | Direction::South => PhaseGroup::NorthSouth,
            Direction::East | Direction::West => PhaseGroup::EastWest,
            Direction::Pedestrian => PhaseGroup::Pedestrian,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PhaseGroup::NorthSouth => "NS",
            PhaseGroup::EastWest => "EW",
            PhaseGroup::Pedestrian => "PEDESTRIAN",
        }
    }

    #[inline]
    pub fn is_vehicle(self) -> bool {
        self != PhaseGroup::Pedestrian
    }

    /// Dense index, for per-group tables
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for PhaseGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Displayed signal state, as reported in telemetry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
#[repr(u8)]
pub enum LightColor {
    #[default]
    Red = 0,
    Yellow = 1,
    Green = 2,
    Pedestrian = 3,
}

impl LightColor {
    #[inline]
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    pub fn from_byte(b: u8) -> Self {
        match b {
            1 => LightColor::Yellow,
            2 => LightColor::Green,
            3 => LightColor::Pedestrian,
            _ => LightColor::Red,
        }
    }
}
