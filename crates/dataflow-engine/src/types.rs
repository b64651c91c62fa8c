//! Core types for dataflow graphs
//!
//! Identifiers, slot types, node modes and slot references shared by
//! nodes, links and the graph.

use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

/// Identifier of a node or a link
///
/// Graphs hand out either sequential integers or random UUIDs depending
/// on [`IdScheme`](crate::config::IdScheme). Integers serialize as JSON
/// numbers and UUIDs as strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Id {
    Num(u64),
    Uuid(Uuid),
}

/// Unique identifier for a node
pub type NodeId = Id;

/// Unique identifier for a link
pub type LinkId = Id;

impl Id {
    /// Create a fresh random identifier
    pub fn new_uuid() -> Self {
        Self::Uuid(Uuid::new_v4())
    }

    /// The sequential value, if this is a numeric id
    pub fn as_num(&self) -> Option<u64> {
        match self {
            Self::Num(n) => Some(*n),
            Self::Uuid(_) => None,
        }
    }
}

impl From<u64> for Id {
    fn from(n: u64) -> Self {
        Self::Num(n)
    }
}

impl From<Uuid> for Id {
    fn from(u: Uuid) -> Self {
        Self::Uuid(u)
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Num(n) => write!(f, "{}", n),
            Self::Uuid(u) => write!(f, "{}", u),
        }
    }
}

impl Serialize for Id {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Num(n) => serializer.serialize_u64(*n),
            Self::Uuid(u) => serializer.serialize_str(&u.to_string()),
        }
    }
}

struct IdVisitor;

impl<'de> Visitor<'de> for IdVisitor {
    type Value = Id;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a non-negative integer or a UUID string")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Id, E> {
        Ok(Id::Num(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Id, E> {
        u64::try_from(v)
            .map(Id::Num)
            .map_err(|_| E::custom(format!("negative id {}", v)))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Id, E> {
        if v >= 0.0 && v.fract() == 0.0 && v <= u64::MAX as f64 {
            Ok(Id::Num(v as u64))
        } else {
            Err(E::custom(format!("invalid id {}", v)))
        }
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Id, E> {
        if let Ok(n) = v.parse::<u64>() {
            return Ok(Id::Num(n));
        }
        Uuid::parse_str(v)
            .map(Id::Uuid)
            .map_err(|_| E::custom(format!("invalid id '{}'", v)))
    }
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(IdVisitor)
    }
}

/// The data type carried by a slot or a link
///
/// `Any` is the wildcard. `Event` is the shared sentinel used both for
/// event outputs and action inputs. `Named` may hold a comma separated
/// list of accepted types, e.g. `"number,string"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum SlotType {
    #[default]
    Any,
    Event,
    Named(String),
}

impl SlotType {
    /// Action inputs share the event sentinel
    pub const ACTION: SlotType = SlotType::Event;

    /// Create a named slot type
    pub fn named(name: impl Into<String>) -> Self {
        Self::from_name(&name.into())
    }

    /// Parse a type name, mapping the wildcard and event spellings
    pub fn from_name(name: &str) -> Self {
        match name.trim() {
            "" | "*" | "0" => Self::Any,
            "_event_" | "-1" => Self::Event,
            other => Self::Named(other.to_string()),
        }
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Self::Any)
    }

    pub fn is_event(&self) -> bool {
        matches!(self, Self::Event)
    }

    /// Check if a value of this type can flow into a slot of `other`
    pub fn is_compatible_with(&self, other: &SlotType) -> bool {
        crate::validation::is_valid_connection(self, other)
    }
}

impl fmt::Display for SlotType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("*"),
            Self::Event => f.write_str("-1"),
            Self::Named(name) => f.write_str(name),
        }
    }
}

impl From<&str> for SlotType {
    fn from(name: &str) -> Self {
        Self::from_name(name)
    }
}

impl Serialize for SlotType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Any => serializer.serialize_str("*"),
            Self::Event => serializer.serialize_i64(-1),
            Self::Named(name) => serializer.serialize_str(name),
        }
    }
}

struct SlotTypeVisitor;

impl<'de> Visitor<'de> for SlotTypeVisitor {
    type Value = SlotType;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a type name, 0, -1 or null")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<SlotType, E> {
        Ok(match v {
            -1 => SlotType::Event,
            0 => SlotType::Any,
            other => SlotType::Named(other.to_string()),
        })
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<SlotType, E> {
        Ok(match v {
            0 => SlotType::Any,
            other => SlotType::Named(other.to_string()),
        })
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<SlotType, E> {
        if v.fract() == 0.0 {
            self.visit_i64(v as i64)
        } else {
            Ok(SlotType::Named(v.to_string()))
        }
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<SlotType, E> {
        Ok(SlotType::from_name(v))
    }

    fn visit_none<E: de::Error>(self) -> Result<SlotType, E> {
        Ok(SlotType::Any)
    }

    fn visit_unit<E: de::Error>(self) -> Result<SlotType, E> {
        Ok(SlotType::Any)
    }
}

impl<'de> Deserialize<'de> for SlotType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(SlotTypeVisitor)
    }
}

/// When a node runs
///
/// Serialized as the integer codes used in snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum NodeMode {
    /// Polled on every step
    #[default]
    Always,
    /// Reacts to actions only
    OnEvent,
    /// Never runs
    Never,
    /// Executes when one of its event inputs fires
    OnTrigger,
    /// Runs only when pulled by a downstream node
    OnRequest,
}

impl NodeMode {
    /// Human readable name
    pub fn label(self) -> &'static str {
        match self {
            Self::Always => "Always",
            Self::OnEvent => "On Event",
            Self::Never => "Never",
            Self::OnTrigger => "On Trigger",
            Self::OnRequest => "On Request",
        }
    }
}

impl From<NodeMode> for u8 {
    fn from(mode: NodeMode) -> u8 {
        match mode {
            NodeMode::Always => 0,
            NodeMode::OnEvent => 1,
            NodeMode::Never => 2,
            NodeMode::OnTrigger => 3,
            NodeMode::OnRequest => 4,
        }
    }
}

impl TryFrom<u8> for NodeMode {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Always),
            1 => Ok(Self::OnEvent),
            2 => Ok(Self::Never),
            3 => Ok(Self::OnTrigger),
            4 => Ok(Self::OnRequest),
            other => Err(format!("unknown node mode {}", other)),
        }
    }
}

/// Run state of a graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphStatus {
    #[default]
    Stopped,
    Running,
}

/// Which side of a node a slot belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotKind {
    Input,
    Output,
}

/// A reference to a slot by position or by name
///
/// `Event` is only meaningful as a connection target: it asks the target
/// node for its trigger input (see `EngineConfig::do_add_triggers_slots`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotRef {
    Index(usize),
    Name(String),
    Event,
}

impl From<usize> for SlotRef {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

impl From<&str> for SlotRef {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for SlotRef {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl From<&String> for SlotRef {
    fn from(name: &String) -> Self {
        Self::Name(name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_serialization() {
        assert_eq!(serde_json::to_value(Id::Num(7)).unwrap(), serde_json::json!(7));

        let uuid = Id::new_uuid();
        let json = serde_json::to_value(&uuid).unwrap();
        assert!(json.is_string());
        let back: Id = serde_json::from_value(json).unwrap();
        assert_eq!(back, uuid);
    }

    #[test]
    fn test_id_accepts_numeric_strings() {
        let id: Id = serde_json::from_value(serde_json::json!("12")).unwrap();
        assert_eq!(id, Id::Num(12));
        assert!(serde_json::from_value::<Id>(serde_json::json!("not-an-id")).is_err());
        assert!(serde_json::from_value::<Id>(serde_json::json!(-3)).is_err());
    }

    #[test]
    fn test_slot_type_spellings() {
        let parse = |v: serde_json::Value| serde_json::from_value::<SlotType>(v).unwrap();
        assert_eq!(parse(serde_json::json!(-1)), SlotType::Event);
        assert_eq!(parse(serde_json::json!("_event_")), SlotType::Event);
        assert_eq!(parse(serde_json::json!(0)), SlotType::Any);
        assert_eq!(parse(serde_json::json!("*")), SlotType::Any);
        assert_eq!(parse(serde_json::json!("")), SlotType::Any);
        assert_eq!(parse(serde_json::Value::Null), SlotType::Any);
        assert_eq!(parse(serde_json::json!("number")), SlotType::named("number"));
        assert_eq!(SlotType::ACTION, SlotType::Event);
    }

    #[test]
    fn test_slot_type_serialization() {
        assert_eq!(serde_json::to_value(SlotType::Event).unwrap(), serde_json::json!(-1));
        assert_eq!(serde_json::to_value(SlotType::Any).unwrap(), serde_json::json!("*"));
        assert_eq!(
            serde_json::to_value(SlotType::named("vec3")).unwrap(),
            serde_json::json!("vec3")
        );
    }

    #[test]
    fn test_node_mode_codes() {
        assert_eq!(serde_json::to_value(NodeMode::OnTrigger).unwrap(), serde_json::json!(3));
        let mode: NodeMode = serde_json::from_value(serde_json::json!(4)).unwrap();
        assert_eq!(mode, NodeMode::OnRequest);
        assert!(serde_json::from_value::<NodeMode>(serde_json::json!(9)).is_err());
    }
}
