//! Service Layer
//!
//! Channel registry, couriers and the peg registry that ties them to the
//! asset ledger and the connection transport.

pub mod channel;
pub mod courier;
pub mod invitation;
pub mod notifier;
pub mod peg_registry;

pub use channel::{ChannelRegistry, LocalChannelState};
pub use courier::{Courier, CourierKind, CourierParams};
pub use invitation::{TransferInvitation, TransferOutcome};
pub use notifier::{PegNotifier, PegSnapshot};
pub use peg_registry::PegRegistry;
