//! Per-path link-layer state: the SARM/UA handshake flags, modulo-8
//! sequence counters, and the queue a path drains once a general
//! interrogation has been answered.

pub mod queue;
pub mod state;

pub use queue::PendingQueue;
pub use state::{LinkState, LinkStateMachine};
