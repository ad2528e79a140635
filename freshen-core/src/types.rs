//! Domain types for reconciled records.
//!
//! Persisted attribute names follow the store's existing schema:
//! `client_id`, `info_type`, `hashstr`, `id`, `timestamp`, with any payload
//! fields flattened alongside them.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Opaque identifier of a reconciliation target.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClientId(pub String);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ClientId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ClientId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Category tag (`info_type`) partitioning a client's records into groups.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Category(pub String);

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for Category {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Category {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Content fingerprint (`hashstr`) of a tracked variant.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Fingerprint(pub String);

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for Fingerprint {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Fingerprint {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Generation identifier shared by every record written in one round of a group.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct GenerationId(pub u64);

impl GenerationId {
    /// The identifier following `self`.
    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for GenerationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u64> for GenerationId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// Opaque message fields carried by a record.
pub type Payload = BTreeMap<String, serde_json::Value>;

/// Attribute names owned by [`Record`]; payloads must not shadow them.
pub const RESERVED_FIELDS: &[&str] = &["client_id", "info_type", "hashstr", "id", "timestamp"];

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Logical key of a record: unique per (client, category, fingerprint).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordKey {
    pub client: ClientId,
    pub category: Category,
    pub fingerprint: Fingerprint,
}

/// A persisted record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "client_id")]
    pub client: ClientId,
    #[serde(rename = "info_type")]
    pub category: Category,
    #[serde(rename = "hashstr")]
    pub fingerprint: Fingerprint,
    #[serde(rename = "id", deserialize_with = "de_generation")]
    pub generation: GenerationId,
    /// Epoch timestamp of the last write, in seconds or milliseconds.
    #[serde(
        default,
        deserialize_with = "de_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<i64>,
    #[serde(flatten)]
    pub payload: Payload,
}

impl Record {
    pub fn key(&self) -> RecordKey {
        RecordKey {
            client: self.client.clone(),
            category: self.category.clone(),
            fingerprint: self.fingerprint.clone(),
        }
    }
}

/// Engine output: "upsert this record now". Never retracted once produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WriteIntent {
    pub client: ClientId,
    pub category: Category,
    pub fingerprint: Fingerprint,
    pub generation: GenerationId,
    pub timestamp: i64,
    pub payload: Payload,
}

impl WriteIntent {
    pub fn key(&self) -> RecordKey {
        RecordKey {
            client: self.client.clone(),
            category: self.category.clone(),
            fingerprint: self.fingerprint.clone(),
        }
    }

    /// The record this intent persists.
    pub fn to_record(&self) -> Record {
        Record {
            client: self.client.clone(),
            category: self.category.clone(),
            fingerprint: self.fingerprint.clone(),
            generation: self.generation,
            timestamp: Some(self.timestamp),
            payload: self.payload.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Lenient attribute decoding
// ---------------------------------------------------------------------------

// Older writers stored `id` as a numeric string and `timestamp` as either.
#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Integer(i64),
    Float(f64),
    Text(String),
    Other(#[allow(dead_code)] serde::de::IgnoredAny),
}

fn de_generation<'de, D>(deserializer: D) -> Result<GenerationId, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match NumberOrText::deserialize(deserializer)? {
        NumberOrText::Integer(n) if n >= 0 => Ok(GenerationId(n as u64)),
        NumberOrText::Float(f) if f >= 0.0 && f.fract() == 0.0 => Ok(GenerationId(f as u64)),
        NumberOrText::Text(s) => s
            .trim()
            .parse::<u64>()
            .map(GenerationId)
            .map_err(|_| D::Error::custom(format!("invalid generation id '{s}'"))),
        _ => Err(D::Error::custom("generation id must be a non-negative integer")),
    }
}

fn de_timestamp<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    // Anything unparseable, including bools and objects, counts as missing, which the
    // freshness check treats as stale.
    Ok(match Option::<NumberOrText>::deserialize(deserializer)? {
        Some(NumberOrText::Integer(n)) => Some(n),
        Some(NumberOrText::Float(f)) if f.is_finite() => Some(f as i64),
        Some(NumberOrText::Text(s)) => s.trim().parse::<i64>().ok(),
        _ => None,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
