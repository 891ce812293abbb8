//! Storage contract for the alerts screen, expressed over the Crux key-value
//! capability. Records are stored as JSON arrays under fixed keys.

use crux_kv::KeyValue;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt::Display;
use thiserror::Error;

use crate::event::Event;
use crate::model::{Emergency, Patient};

pub type KvCapability = KeyValue<Event>;

pub const MAX_VALUE_SIZE: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StorageKey {
    Emergencies,
    Patients,
}

impl StorageKey {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Emergencies => "emergencies",
            Self::Patients => "patients",
        }
    }
}

impl Display for StorageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum StorageError {
    #[error("storage error on '{key}': {message}")]
    Io { key: String, message: String },

    #[error("failed to encode '{key}': {message}")]
    Serialization { key: String, message: String },

    #[error("failed to decode '{key}': {message}")]
    Deserialization { key: String, message: String },

    #[error("value for '{key}' too large: {size} bytes exceeds maximum of {max} bytes")]
    ValueTooLarge { key: String, size: usize, max: usize },
}

impl StorageError {
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::Io { key, .. }
            | Self::Serialization { key, .. }
            | Self::Deserialization { key, .. }
            | Self::ValueTooLarge { key, .. } => Some(key.as_str()),
        }
    }

    pub fn io(key: StorageKey, message: impl Display) -> Self {
        Self::Io {
            key: key.to_string(),
            message: message.to_string(),
        }
    }
}

pub fn encode_list<T: Serialize>(key: StorageKey, items: &[T]) -> Result<Vec<u8>, StorageError> {
    let data = serde_json::to_vec(items).map_err(|e| StorageError::Serialization {
        key: key.to_string(),
        message: e.to_string(),
    })?;

    if data.len() > MAX_VALUE_SIZE {
        return Err(StorageError::ValueTooLarge {
            key: key.to_string(),
            size: data.len(),
            max: MAX_VALUE_SIZE,
        });
    }

    Ok(data)
}

/// A key that was never written reads as an empty list.
pub fn decode_list<T: DeserializeOwned>(
    key: StorageKey,
    raw: Option<&[u8]>,
) -> Result<Vec<T>, StorageError> {
    let Some(bytes) = raw.filter(|b| !b.is_empty()) else {
        return Ok(Vec::new());
    };

    if bytes.len() > MAX_VALUE_SIZE {
        return Err(StorageError::ValueTooLarge {
            key: key.to_string(),
            size: bytes.len(),
            max: MAX_VALUE_SIZE,
        });
    }

    serde_json::from_slice(bytes).map_err(|e| StorageError::Deserialization {
        key: key.to_string(),
        message: e.to_string(),
    })
}

pub fn read_result<T, E>(
    key: StorageKey,
    result: Result<Option<Vec<u8>>, E>,
) -> Result<Vec<T>, StorageError>
where
    T: DeserializeOwned,
    E: Display,
{
    let raw = result.map_err(|e| StorageError::io(key, e))?;
    decode_list(key, raw.as_deref())
}

pub fn write_result<E: Display>(
    key: StorageKey,
    result: Result<Option<Vec<u8>>, E>,
) -> Result<(), StorageError> {
    result.map(|_previous| ()).map_err(|e| StorageError::io(key, e))
}

/// `getEmergencies` / `getPatients` / `saveEmergencies` on top of the
/// key-value capability. Every call issues exactly one shell request.
pub struct AlertStorage<'a> {
    kv: &'a KvCapability,
}

impl<'a> AlertStorage<'a> {
    #[must_use]
    pub fn new(kv: &'a KvCapability) -> Self {
        Self { kv }
    }

    pub fn get_emergencies<F>(&self, make_event: F)
    where
        F: FnOnce(Result<Vec<Emergency>, StorageError>) -> Event + Send + Sync + 'static,
    {
        let key = StorageKey::Emergencies;
        self.kv.get(key.as_str().to_string(), move |result| {
            make_event(read_result(key, result))
        });
    }

    pub fn get_patients<F>(&self, make_event: F)
    where
        F: FnOnce(Result<Vec<Patient>, StorageError>) -> Event + Send + Sync + 'static,
    {
        let key = StorageKey::Patients;
        self.kv.get(key.as_str().to_string(), move |result| {
            make_event(read_result(key, result))
        });
    }

    /// Full-list replace. Encoding failures are returned before any request
    /// reaches the shell.
    pub fn save_emergencies<F>(
        &self,
        emergencies: &[Emergency],
        make_event: F,
    ) -> Result<(), StorageError>
    where
        F: FnOnce(Result<(), StorageError>) -> Event + Send + Sync + 'static,
    {
        let key = StorageKey::Emergencies;
        let data = encode_list(key, emergencies)?;
        self.kv.set(key.as_str().to_string(), data, move |result| {
            make_event(write_result(key, result))
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EmergencyId, EmergencyType, PatientId, UnixTimeMs};

    fn sample_emergency() -> Emergency {
        Emergency::new(
            EmergencyId::new("e-1"),
            PatientId::new("p-1"),
            EmergencyType::Sos,
            UnixTimeMs(1_700_000_000_000),
        )
    }

    #[test]
    fn test_storage_keys() {
        assert_eq!(StorageKey::Emergencies.as_str(), "emergencies");
        assert_eq!(StorageKey::Patients.to_string(), "patients");
    }

    #[test]
    fn test_missing_value_reads_as_empty_list() {
        let list: Vec<Emergency> = decode_list(StorageKey::Emergencies, None).unwrap();
        assert!(list.is_empty());

        let list: Vec<Patient> = decode_list(StorageKey::Patients, Some(b"".as_slice())).unwrap();
        assert!(list.is_empty());
    }

    #[test]
    fn test_decode_rejects_malformed_json() {
        let result: Result<Vec<Emergency>, _> =
            decode_list(StorageKey::Emergencies, Some(b"{not json".as_slice()));
        assert!(matches!(
            result,
            Err(StorageError::Deserialization { ref key, .. }) if key == "emergencies"
        ));
    }

    #[test]
    fn test_decode_rejects_oversized_value() {
        let huge = vec![b' '; MAX_VALUE_SIZE + 1];
        let result: Result<Vec<Patient>, _> =
            decode_list(StorageKey::Patients, Some(huge.as_slice()));
        assert!(matches!(result, Err(StorageError::ValueTooLarge { .. })));
    }

    #[test]
    fn test_encode_rejects_oversized_list() {
        let mut e = sample_emergency();
        e.extra.insert(
            "notes".into(),
            serde_json::Value::String("x".repeat(MAX_VALUE_SIZE)),
        );

        let result = encode_list(StorageKey::Emergencies, &[e]);
        match result {
            Err(StorageError::ValueTooLarge { key, size, max }) => {
                assert_eq!(key, "emergencies");
                assert_eq!(max, MAX_VALUE_SIZE);
                assert!(size > MAX_VALUE_SIZE);
            }
            other => panic!("expected ValueTooLarge, got {other:?}"),
        }
    }

    #[test]
    fn test_encoded_list_uses_stored_field_names() {
        let data = encode_list(StorageKey::Emergencies, &[sample_emergency()]).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&data).unwrap();

        assert_eq!(json[0]["patientId"], "p-1");
        assert_eq!(json[0]["type"], "sos");
        assert_eq!(json[0]["isResolved"], false);
        assert!(json[0].get("response").is_none());
    }

    #[test]
    fn test_read_result_wraps_shell_error() {
        let result: Result<Vec<Patient>, _> =
            read_result(StorageKey::Patients, Err::<Option<Vec<u8>>, _>("io failure"));
        assert_eq!(
            result,
            Err(StorageError::Io {
                key: "patients".into(),
                message: "io failure".into(),
            })
        );
    }

    #[test]
    fn test_write_result_ignores_previous_value() {
        let ok = write_result::<String>(StorageKey::Emergencies, Ok(Some(b"[]".to_vec())));
        assert_eq!(ok, Ok(()));

        let err = write_result(StorageKey::Emergencies, Err("quota"));
        assert!(matches!(err, Err(StorageError::Io { .. })));
    }
}
