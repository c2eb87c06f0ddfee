//! Connection role management for a single peer link
//!
//! This module handles:
//! - One listener, one dialer, and one session worker at most, each on
//!   its own task
//! - Serialized role transitions (the arbiter) with last-writer-wins
//!   stream promotion
//! - Self-healing fallback to listening on dial failure or session loss
//! - Raw byte delivery to the collaborator via events

mod dialer;
mod listener;
mod manager;
mod session;

pub use manager::{LinkConfig, LinkEvent, LinkManager, LinkState};
