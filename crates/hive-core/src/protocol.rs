//! Discovery protocol message shapes.
//!
//! Ping and pong travel through the same channel as application messages and
//! are told apart by fixed prefixes:
//!
//! - ping: `__HIVE_PING__:{ping_id}`
//! - pong: `__HIVE_PONG__:{ping_id}:{instance_id}:{encoded_properties}`
//!
//! The properties field is last and is never split further, so it may contain
//! any characters the property encoding produces.

pub const PING_PREFIX: &str = "__HIVE_PING__:";
pub const PONG_PREFIX: &str = "__HIVE_PONG__:";

/// A message classified by the protocol dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame<'a> {
    Ping {
        ping_id: &'a str,
    },
    Pong {
        ping_id: &'a str,
        instance_id: &'a str,
        properties: &'a str,
    },
    /// Pong-prefixed but missing required fields.
    MalformedPong,
    /// Anything else: opaque application content.
    User(&'a str),
}

pub fn parse(message: &str) -> Frame<'_> {
    if let Some(ping_id) = message.strip_prefix(PING_PREFIX) {
        return Frame::Ping { ping_id };
    }
    if let Some(payload) = message.strip_prefix(PONG_PREFIX) {
        let mut fields = payload.splitn(3, ':');
        return match (fields.next(), fields.next(), fields.next()) {
            (Some(ping_id), Some(instance_id), Some(properties)) => Frame::Pong {
                ping_id,
                instance_id,
                properties,
            },
            _ => Frame::MalformedPong,
        };
    }
    Frame::User(message)
}

pub fn ping_message(ping_id: &str) -> String {
    format!("{PING_PREFIX}{ping_id}")
}

pub fn pong_message(ping_id: &str, instance_id: &str, encoded_properties: &str) -> String {
    format!("{PONG_PREFIX}{ping_id}:{instance_id}:{encoded_properties}")
}
