//! Discovery responses and ping round control.

use std::collections::BTreeMap;

use serde::Serialize;

/// A response from another running instance to a discovery ping.
///
/// Carries the responder's instance id and the properties it advertised at
/// the time it answered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pong {
    instance_id: String,
    properties: BTreeMap<String, String>,
}

impl Pong {
    pub fn new(instance_id: impl Into<String>, properties: BTreeMap<String, String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            properties,
        }
    }

    /// The responder's instance id.
    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// All properties advertised by the responder.
    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    /// A single advertised property, if present.
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }
}

/// What a pong callback wants the ping round to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PingControl {
    /// Keep collecting responses until the timeout elapses.
    Continue,
    /// End the round now; no further callbacks are made.
    Stop,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_lookup() {
        let mut props = BTreeMap::new();
        props.insert("role".to_string(), "primary".to_string());
        let pong = Pong::new("instance-1", props);

        assert_eq!(pong.instance_id(), "instance-1");
        assert_eq!(pong.property("role"), Some("primary"));
        assert_eq!(pong.property("missing"), None);
    }

    #[test]
    fn test_pong_serializes_to_json() {
        let mut props = BTreeMap::new();
        props.insert("version".to_string(), "1.2.3".to_string());
        let pong = Pong::new("abc", props);

        let json = serde_json::to_value(&pong).unwrap();
        assert_eq!(json["instance_id"], "abc");
        assert_eq!(json["properties"]["version"], "1.2.3");
    }
}
