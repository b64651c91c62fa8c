//! Links between an output slot and an input slot
//!
//! Snapshots store links as positional tuples
//! `[id, origin_id, origin_slot, target_id, target_slot, type]`.

use serde::ser::SerializeTuple;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::types::{Id, LinkId, NodeId, SlotType};

/// A connection from one node output to one node input
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub id: LinkId,
    pub link_type: SlotType,
    pub origin_id: NodeId,
    pub origin_slot: usize,
    pub target_id: NodeId,
    pub target_slot: usize,
    /// Last value written by the origin output
    pub data: Value,
    /// Graph clock time of the last event sent through this link
    pub last_trigger_time: Option<f64>,
}

impl Link {
    pub fn new(
        id: LinkId,
        link_type: SlotType,
        origin_id: NodeId,
        origin_slot: usize,
        target_id: NodeId,
        target_slot: usize,
    ) -> Self {
        Self {
            id,
            link_type,
            origin_id,
            origin_slot,
            target_id,
            target_slot,
            data: Value::Null,
            last_trigger_time: None,
        }
    }

    /// Decode a link from its tuple or object snapshot form
    ///
    /// Returns `None` for malformed entries so loaders can skip them.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Array(items) if items.len() >= 5 => Some(Self::new(
                parse_id(&items[0])?,
                items
                    .get(5)
                    .map(parse_type)
                    .unwrap_or_default(),
                parse_id(&items[1])?,
                parse_slot(&items[2])?,
                parse_id(&items[3])?,
                parse_slot(&items[4])?,
            )),
            Value::Object(map) => Some(Self::new(
                parse_id(map.get("id")?)?,
                map.get("type").map(parse_type).unwrap_or_default(),
                parse_id(map.get("origin_id")?)?,
                parse_slot(map.get("origin_slot")?)?,
                parse_id(map.get("target_id")?)?,
                parse_slot(map.get("target_slot")?)?,
            )),
            _ => None,
        }
    }

    /// Encode as the snapshot tuple
    pub fn to_value(&self) -> Value {
        serde_json::json!([
            self.id,
            self.origin_id,
            self.origin_slot,
            self.target_id,
            self.target_slot,
            self.link_type,
        ])
    }
}

fn parse_id(value: &Value) -> Option<Id> {
    serde_json::from_value(value.clone()).ok()
}

fn parse_slot(value: &Value) -> Option<usize> {
    value.as_u64().and_then(|n| usize::try_from(n).ok())
}

fn parse_type(value: &Value) -> SlotType {
    serde_json::from_value(value.clone()).unwrap_or_default()
}

impl Serialize for Link {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(6)?;
        tuple.serialize_element(&self.id)?;
        tuple.serialize_element(&self.origin_id)?;
        tuple.serialize_element(&self.origin_slot)?;
        tuple.serialize_element(&self.target_id)?;
        tuple.serialize_element(&self.target_slot)?;
        tuple.serialize_element(&self.link_type)?;
        tuple.end()
    }
}

impl<'de> Deserialize<'de> for Link {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(&value)
            .ok_or_else(|| serde::de::Error::custom(format!("malformed link data: {}", value)))
    }
}
