//! Platform-independent core of the powermon dashboard
//!
//! This crate contains everything between the HTTP transport and the plotting
//! layer: sample buffers, acquisition payload decoding and destriding,
//! per-signal subscriptions and the per-frame polling driver.
//!
//! It is `#![no_std]` with `extern crate alloc` so it runs inside a browser
//! main loop as well as on desktop hosts (for the simulator and tests).

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod acquisition;
pub mod buffer;
pub mod channels;
pub mod config;
pub mod driver;
pub mod reassembly;
pub mod stats;
pub mod subscription;
pub mod time;
pub mod transport;
