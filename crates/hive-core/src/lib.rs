//! Instance bus logic and driver port definitions for Hive.
//!
//! This crate defines the `HiveDriver` port that transports implement and the
//! `Hive` bus context that multiplexes application messages and peer
//! discovery (ping/pong) over one installed driver. It never touches the
//! filesystem -- the filewatcher transport lives in `hive-infra`.

pub mod bus;
pub mod delivery;
pub mod driver;
pub mod listener;
pub mod memory;
pub mod ping;
pub mod properties;
pub mod protocol;
pub mod signal;

pub use bus::Hive;
pub use delivery::Delivery;
pub use driver::HiveDriver;
pub use listener::{ListenerId, ListenerRegistry, MessageListener, listener};
pub use memory::{MemoryDriver, MemoryNetwork};
pub use signal::StopSignal;
