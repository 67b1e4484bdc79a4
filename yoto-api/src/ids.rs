//! Identity types for devices, cards and commands

use serde::{Deserialize, Serialize};
use std::fmt;

/// Macro to generate common ID type implementations
macro_rules! impl_id_type {
    ($name:ident) => {
        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                $name::new(s)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                $name::new(s)
            }
        }
    };
}

/// Unique identifier for a player
///
/// Matches the `deviceId` reported by the device listing and the
/// `{id}` segment of the device's topics.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl_id_type!(DeviceId);

/// Unique identifier for a card in the library
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardId(String);

impl CardId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Content URI the player resolves when asked to play this card
    pub fn uri(&self) -> String {
        format!("https://yoto.io/{}", self.0)
    }
}

impl_id_type!(CardId);

/// Unique identifier for an issued command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandId(uuid::Uuid);

impl CommandId {
    /// Generates a fresh random id
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_id_trims_whitespace() {
        let id = DeviceId::new("  y2abc ");
        assert_eq!(id.as_str(), "y2abc");
    }

    #[test]
    fn test_card_uri() {
        let card = CardId::from("4sJ2x");
        assert_eq!(card.uri(), "https://yoto.io/4sJ2x");
    }

    #[test]
    fn test_command_ids_are_unique() {
        assert_ne!(CommandId::generate(), CommandId::generate());
    }

    #[test]
    fn test_id_display() {
        assert_eq!(DeviceId::from("dev-1").to_string(), "dev-1");
        assert_eq!(CardId::from(String::from("card")).to_string(), "card");
    }

    #[test]
    fn test_ids_serialize_as_plain_strings() {
        let json = serde_json::to_string(&DeviceId::new("dev-1")).unwrap();
        assert_eq!(json, "\"dev-1\"");
    }
}
