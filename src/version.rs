//! Message processing model of a datagram.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::agent::vacm::SecurityModel;

/// Protocol version carried in the `version` field of a message.
///
/// The agent serves `V1` and `V2c`. `V3` is recognised only so such
/// datagrams can be counted and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum Version {
    V1,
    #[default]
    V2c,
    V3,
}

impl Version {
    const WIRE: [(Version, i32); 3] = [(Version::V1, 0), (Version::V2c, 1), (Version::V3, 3)];

    /// Value of the INTEGER version field.
    pub const fn as_i32(self) -> i32 {
        match self {
            Version::V1 => 0,
            Version::V2c => 1,
            Version::V3 => 3,
        }
    }

    pub fn from_i32(value: i32) -> Option<Self> {
        Self::WIRE
            .iter()
            .find(|(_, wire)| *wire == value)
            .map(|(version, _)| *version)
    }

    /// Whether this version is a community-based one.
    pub const fn is_community(self) -> bool {
        matches!(self, Version::V1 | Version::V2c)
    }

    /// Security model access checks for this version run under.
    pub const fn security_model(self) -> SecurityModel {
        match self {
            Version::V1 => SecurityModel::V1,
            Version::V2c => SecurityModel::V2c,
            Version::V3 => SecurityModel::Usm,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Version::V1 => "SNMPv1",
            Version::V2c => "SNMPv2c",
            Version::V3 => "SNMPv3",
        };
        f.write_str(name)
    }
}

/// Accepts `1`, `v1`, `2c`, `v2c`, `3` and `v3`, case-insensitively.
impl FromStr for Version {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        match lower.strip_prefix('v').unwrap_or(&lower) {
            "1" => Ok(Version::V1),
            "2c" => Ok(Version::V2c),
            "3" => Ok(Version::V3),
            _ => Err(format!("unknown SNMP version: {s}")),
        }
    }
}
