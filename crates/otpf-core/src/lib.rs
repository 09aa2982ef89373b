//! Core rule matching, dispatch and persistence for the OTP forwarder.
//!
//! This crate is platform-agnostic. SMS sending and Telegram delivery sit
//! behind ports (traits) implemented in adapter crates.

pub mod classifier;
pub mod config;
pub mod dispatch;
pub mod domain;
pub mod errors;
pub mod gsm7;
pub mod logging;
pub mod pdu;
pub mod ports;
pub mod receiver;
pub mod settings;
pub mod sms;
pub mod store;
pub mod utils;

pub use errors::{Error, Result};
