//! The uniform success/failure wrapper returned by every public operation.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;

/// `{ok: true, response}` or `{ok: false, error}`. Exactly one payload is
/// ever present, enforced by the enum.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultEnvelope<T = Value, E = String> {
    Ok(T),
    Err(E),
}

impl<T, E> ResultEnvelope<T, E> {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }

    pub fn response(&self) -> Option<&T> {
        match self {
            Self::Ok(v) => Some(v),
            Self::Err(_) => None,
        }
    }

    pub fn error(&self) -> Option<&E> {
        match self {
            Self::Ok(_) => None,
            Self::Err(e) => Some(e),
        }
    }
}

impl<T, E> From<Result<T, E>> for ResultEnvelope<T, E> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(v) => Self::Ok(v),
            Err(e) => Self::Err(e),
        }
    }
}

impl<T: Serialize, E: Serialize> Serialize for ResultEnvelope<T, E> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        match self {
            Self::Ok(v) => {
                map.serialize_entry("ok", &true)?;
                map.serialize_entry("response", v)?;
            }
            Self::Err(e) => {
                map.serialize_entry("ok", &false)?;
                map.serialize_entry("error", e)?;
            }
        }
        map.end()
    }
}
