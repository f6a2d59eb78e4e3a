/*!
 * Serde Helpers
 * Timestamp encodings and skip predicates for serialized container data
 */

use serde::{Deserialize, Deserializer, Serializer};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

fn to_micros<E: serde::ser::Error>(time: &SystemTime) -> Result<u64, E> {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .map_err(E::custom)
}

/// `SystemTime` as microseconds since the UNIX epoch
pub mod system_time_micros {
    use super::*;

    pub fn serialize<S: Serializer>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(to_micros::<S::Error>(time)?)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SystemTime, D::Error> {
        Ok(UNIX_EPOCH + Duration::from_micros(u64::deserialize(deserializer)?))
    }
}

/// `Option<SystemTime>` as optional microseconds since the UNIX epoch
pub mod optional_system_time_micros {
    use super::*;

    pub fn serialize<S: Serializer>(
        time: &Option<SystemTime>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match time {
            Some(t) => serializer.serialize_some(&to_micros::<S::Error>(t)?),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<SystemTime>, D::Error> {
        let micros = Option::<u64>::deserialize(deserializer)?;
        Ok(micros.map(|m| UNIX_EPOCH + Duration::from_micros(m)))
    }
}

pub fn is_none<T>(value: &Option<T>) -> bool {
    value.is_none()
}

pub fn is_zero_u64(value: &u64) -> bool {
    *value == 0
}
