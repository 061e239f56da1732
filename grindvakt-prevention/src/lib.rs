//! # Grindvakt Prevention
//!
//! Ordered match/action rule chains, one per traffic direction, consulted on
//! the packet path without locks and mutated by a serialized control path.
//!
//! - `matcher`: evaluates one rule against one packet's header fields
//! - `store`: epoch-protected append/flush rule list
//! - `chain`: first-match traversal with a default action
//! - `firewall`: the input and output chains behind one handle
//! - `command`: the fixed-size control command record

pub mod chain;
pub mod command;
pub mod error;
pub mod firewall;
pub mod matcher;
pub mod rule;
pub mod store;

pub use chain::{Chain, ChainPolicy};
pub use command::{Command, COMMAND_WIRE_SIZE};
pub use error::{FirewallError, MalformedCommand};
pub use firewall::Firewall;
pub use rule::{Action, ChainId, Rule};
