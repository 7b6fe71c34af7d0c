//! Adapters implementing the outbound ports.

pub mod clock;
pub mod memory;
pub mod notifier;
pub mod seed;

pub use clock::{ManualClock, SystemClock};
pub use memory::{InMemoryBondRepository, InMemoryTransactionRepository, InMemoryUserRepository};
pub use notifier::{LogNotifier, OutboxNotifier};
