#![cfg_attr(not(test), no_std)]

//! Secondary boot stage for the Meshtastic-Telegram gateway.
//!
//! Every power cycle samples the BOOT button once. A full hold enters the
//! provisioning portal; anything else selects the gateway image in `ota_1`
//! and restarts into it. The hardware-independent decision logic lives here;
//! the `esp-hal` bindings live in the firmware binary.

pub mod boot;
pub mod config;
pub mod network;
pub mod platform;
pub mod provisioning;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;
