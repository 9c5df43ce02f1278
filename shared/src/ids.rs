use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

macro_rules! snowflake_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub u64);

        impl $name {
            pub fn get(self) -> u64 {
                self.0
            }

            /// Bit-preserving conversion for BIGINT columns.
            pub fn to_db(self) -> i64 {
                self.0 as i64
            }

            pub fn from_db(value: i64) -> Self {
                Self(value as u64)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse::<u64>().map(Self)
            }
        }

        // Discord transports snowflakes as JSON strings.
        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(&self.0)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

snowflake_id!(
    /// Chat channel (or thread) identifier.
    ChannelId
);
snowflake_id!(
    /// Identifier of a message inside a channel.
    MessageId
);
snowflake_id!(UserId);
snowflake_id!(RoleId);

#[cfg(test)]
mod tests {
    use super::{ChannelId, MessageId};

    #[test]
    fn snowflakes_roundtrip_through_bigint_columns() {
        let high = ChannelId(u64::MAX - 7);
        assert_eq!(ChannelId::from_db(high.to_db()), high);
        assert_eq!(MessageId::from_db(42).get(), 42);
    }

    #[test]
    fn snowflakes_serialize_as_strings() {
        let json = serde_json::to_string(&MessageId(1_234_567_890_123)).expect("serialize id");
        assert_eq!(json, "\"1234567890123\"");
        let parsed: MessageId = serde_json::from_str(&json).expect("parse id");
        assert_eq!(parsed, MessageId(1_234_567_890_123));
    }
}
