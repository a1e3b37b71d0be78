//! Domain layer - wire types and port definitions
//!
//! Defines the share types exchanged with the backend and the traits (ports)
//! that the OpenStack and Kubernetes adapters implement.

pub mod ports;

pub use ports::*;
