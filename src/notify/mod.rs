//! Change notification scheduling
//!
//! Bursts of change signals are coalesced into single notifications that
//! respect a minimum quiet period and a maximum latency.

pub mod timer;

pub use timer::{NotificationCallback, NotificationTimer};
