//! Core domain + application logic for the VK quiz bot.
//!
//! This crate is intentionally framework-agnostic. The VK transport and the
//! operator console live behind ports (traits) implemented in adapter crates.

pub mod archive;
pub mod bank;
pub mod command;
pub mod config;
pub mod dispatcher;
pub mod domain;
pub mod errors;
pub mod events;
pub mod guard;
pub mod kicker;
pub mod logging;
pub mod ports;
pub mod quiz;
pub mod roster;
pub mod texts;

pub use errors::{Error, Result};
