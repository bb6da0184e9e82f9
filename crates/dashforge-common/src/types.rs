//! Small closed enums shared by the cache index and the HTTP API.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Input container family for an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    File,
    Dash,
    Smooth,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Dash => "dash",
            Self::Smooth => "smooth",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "file" => Ok(Self::File),
            "dash" => Ok(Self::Dash),
            "smooth" => Ok(Self::Smooth),
            other => Err(crate::Error::unsupported_protocol(other)),
        }
    }
}

/// Generation state of an asset, as exposed by `listAvailables`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetState {
    #[serde(rename = "notGenerated")]
    NotGenerated,
    #[serde(rename = "generating")]
    Generating,
    #[serde(rename = "generated")]
    Generated,
}

impl fmt::Display for AssetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotGenerated => write!(f, "notGenerated"),
            Self::Generating => write!(f, "generating"),
            Self::Generated => write!(f, "generated"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_round_trips_through_lowercase_strings() {
        for (s, p) in [
            ("file", Protocol::File),
            ("dash", Protocol::Dash),
            ("smooth", Protocol::Smooth),
            ("DASH", Protocol::Dash),
        ] {
            assert_eq!(Protocol::from_str(s).unwrap(), p);
        }
        assert!(Protocol::from_str("ftp").is_err());
    }

    #[test]
    fn asset_state_serializes_to_spec_literal_strings() {
        assert_eq!(
            serde_json::to_string(&AssetState::NotGenerated).unwrap(),
            "\"notGenerated\""
        );
        assert_eq!(
            serde_json::to_string(&AssetState::Generating).unwrap(),
            "\"generating\""
        );
        assert_eq!(
            serde_json::to_string(&AssetState::Generated).unwrap(),
            "\"generated\""
        );
    }
}
