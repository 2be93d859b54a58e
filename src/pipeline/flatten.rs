use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use crate::models::{DimensionUser, Entry, FromEntry, RawPayload, User};

/// Why a record, or the whole payload, produced no output.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlattenError {
    #[error("raw payload has no usable data.MediaListCollection.lists: {0}")]
    Structural(String),

    #[error("entry {entry} of list {list} rejected: {reason}")]
    Record {
        list: usize,
        entry: usize,
        reason: String,
    },

    #[error("user rejected: {0}")]
    User(String),
}

#[derive(Debug, Clone)]
pub struct Flattened<T> {
    pub records: Vec<T>,
    pub errors: Vec<FlattenError>,
}

impl<T> Default for Flattened<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            errors: Vec::new(),
        }
    }
}

impl<T> Flattened<T> {
    fn structural(reason: impl Into<String>) -> Self {
        Self {
            records: Vec::new(),
            errors: vec![FlattenError::Structural(reason.into())],
        }
    }

    #[must_use]
    pub fn is_structural_failure(&self) -> bool {
        self.errors
            .iter()
            .any(|e| matches!(e, FlattenError::Structural(_)))
    }

    #[must_use]
    pub fn dropped(&self) -> usize {
        self.errors
            .iter()
            .filter(|e| !matches!(e, FlattenError::Structural(_)))
            .count()
    }
}

/// Flattens every list entry of `raw` into `T` records.
///
/// Entries that fail to decode or to build a `T` are skipped and reported in
/// `errors`; the remaining records keep list order, then entry order. A payload
/// without `data.MediaListCollection.lists` yields no records and a single
/// [`FlattenError::Structural`].
pub fn flatten<T: FromEntry>(raw: &serde_json::Value) -> Flattened<T> {
    let payload = match RawPayload::from_value(raw) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(table = T::TABLE, "Cannot flatten raw payload: {}", e);
            return Flattened::structural(e.to_string());
        }
    };

    let mut out = Flattened::default();

    for ((list, entry), value) in payload.entries() {
        let built = Entry::deserialize(value)
            .map_err(|e| e.to_string())
            .and_then(T::from_entry);

        match built {
            Ok(record) => out.records.push(record),
            Err(reason) => {
                warn!(
                    table = T::TABLE,
                    list, entry, "Skipping invalid entry: {}", reason
                );
                out.errors.push(FlattenError::Record {
                    list,
                    entry,
                    reason,
                });
            }
        }
    }

    out
}

/// Builds the single user dimension record of a run.
pub fn flatten_user(raw: &serde_json::Value) -> Flattened<DimensionUser> {
    let payload = match RawPayload::from_value(raw) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(table = DimensionUser::TABLE, "Cannot flatten raw payload: {}", e);
            return Flattened::structural(e.to_string());
        }
    };

    let user = serde_json::Value::Object(payload.data.user);
    let built = User::deserialize(&user)
        .map_err(|e| e.to_string())
        .and_then(DimensionUser::from_user);

    match built {
        Ok(record) => Flattened {
            records: vec![record],
            errors: Vec::new(),
        },
        Err(reason) => {
            warn!(table = DimensionUser::TABLE, "Skipping invalid user: {}", reason);
            Flattened {
                records: Vec::new(),
                errors: vec![FlattenError::User(reason)],
            }
        }
    }
}
