//! Payload templates: a YAML mapping of message fields copied onto every write.
//!
//! ```yaml
//! msg1: "Follow the music and press A/B/C to dance and score!"
//! msg2: "Suis la musique et appuie sur A/B/C pour danser !"
//! ```

use std::path::Path;

use crate::error::PayloadError;
use crate::types::{Payload, RESERVED_FIELDS};

/// Load a payload template from `path`.
///
/// Fails with [`PayloadError::ReservedField`] when the mapping tries to set a
/// record key attribute such as `id` or `timestamp`.
pub fn load_at(path: &Path) -> Result<Payload, PayloadError> {
    let contents = std::fs::read_to_string(path).map_err(|source| PayloadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if contents.trim().is_empty() {
        return Ok(Payload::new());
    }
    let payload: Option<Payload> =
        serde_yaml::from_str(&contents).map_err(|source| PayloadError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    let payload = payload.unwrap_or_default();
    validate(&payload)?;
    Ok(payload)
}

/// Reject payloads that shadow record attributes.
pub fn validate(payload: &Payload) -> Result<(), PayloadError> {
    if let Some(field) = payload
        .keys()
        .find(|key| RESERVED_FIELDS.contains(&key.as_str()))
    {
        return Err(PayloadError::ReservedField(field.clone()));
    }
    Ok(())
}
