//! Domain Layer - Pure fleet logic with no I/O
//!
//! This module contains:
//! - Peer identities and records
//! - The peer registry with its merge order and fleet checksum
//! - Teacher selection
//! - Candidate validation
//! - The bonding state machine
//! - The fleet exchange messages

pub mod bonding;
pub mod entities;
pub mod errors;
pub mod events;
pub mod identity;
pub mod local_node;
pub mod messages;
pub mod registry;
pub mod selector;
pub mod validation;
pub mod value_objects;

pub use bonding::*;
pub use entities::*;
pub use errors::*;
pub use events::*;
pub use identity::*;
pub use local_node::*;
pub use messages::*;
pub use registry::*;
pub use selector::*;
pub use validation::*;
pub use value_objects::*;
