//! Persisted sensor state for script snapshot/restore
//!
//! Active repeating queries serialize to a flat stream of values, seven
//! per record: (npc, interval, name filter, exact key, type mask, radius,
//! arc). The flat shape survives partial writes: a truncated tail is
//! simply not a record and is ignored on restore.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SensorError;
use crate::sensor::query::SensorQuery;

/// Number of values per persisted query record
pub const RECORD_WIDTH: usize = 7;

/// One loosely-typed value in the persisted stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PersistValue {
    Key(Uuid),
    Num(f32),
    Int(u32),
    Text(String),
}

/// Decoded form of one persisted repeating query
#[derive(Debug, Clone, PartialEq)]
pub struct SensorRecord {
    pub npc_id: Uuid,
    pub interval: f32,
    pub name_filter: String,
    pub exact_key: Option<Uuid>,
    pub type_mask: u32,
    pub radius: f32,
    pub arc: f32,
}

impl SensorRecord {
    pub fn from_query(query: &SensorQuery) -> Self {
        Self {
            npc_id: query.npc_id,
            interval: query.cadence,
            name_filter: query.filter.name_filter.clone(),
            exact_key: query.filter.exact_key,
            type_mask: query.filter.type_mask,
            radius: query.filter.radius,
            arc: query.filter.arc,
        }
    }

    pub fn to_values(&self) -> [PersistValue; RECORD_WIDTH] {
        [
            PersistValue::Key(self.npc_id),
            PersistValue::Num(self.interval),
            PersistValue::Text(self.name_filter.clone()),
            PersistValue::Key(self.exact_key.unwrap_or_else(Uuid::nil)),
            PersistValue::Int(self.type_mask),
            PersistValue::Num(self.radius),
            PersistValue::Num(self.arc),
        ]
    }

    /// Rebuild a record from one full-width chunk; `None` when the chunk
    /// is not shaped like a record
    pub fn from_values(chunk: &[PersistValue]) -> Option<Self> {
        match chunk {
            [PersistValue::Key(npc_id), PersistValue::Num(interval), PersistValue::Text(name_filter), PersistValue::Key(exact_key), PersistValue::Int(type_mask), PersistValue::Num(radius), PersistValue::Num(arc)] => {
                Some(Self {
                    npc_id: *npc_id,
                    interval: *interval,
                    name_filter: name_filter.clone(),
                    exact_key: if exact_key.is_nil() {
                        None
                    } else {
                        Some(*exact_key)
                    },
                    type_mask: *type_mask,
                    radius: *radius,
                    arc: *arc,
                })
            }
            _ => None,
        }
    }
}

/// Parse a value stream into records
///
/// A trailing partial record is ignored, as is any full-width chunk whose
/// value types do not line up; neither is an error.
pub fn parse_records(values: &[PersistValue]) -> Vec<SensorRecord> {
    values
        .chunks_exact(RECORD_WIDTH)
        .filter_map(|chunk| {
            let record = SensorRecord::from_values(chunk);
            if record.is_none() {
                tracing::debug!("skipping malformed persisted sensor record");
            }
            record
        })
        .collect()
}

pub fn encode(values: &[PersistValue]) -> Result<Vec<u8>, SensorError> {
    Ok(bincode::serde::encode_to_vec(
        values,
        bincode::config::standard(),
    )?)
}

pub fn decode(bytes: &[u8]) -> Result<Vec<PersistValue>, SensorError> {
    let (values, _) =
        bincode::serde::decode_from_slice(bytes, bincode::config::standard())?;
    Ok(values)
}
