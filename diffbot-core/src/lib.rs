//! Closed-loop wheel control for a two-wheeled differential-drive robot on no-std
//! embedded platforms.
//!
//! For a runnable host simulation, see `diffbot-app/mock-mcu`.
#![cfg_attr(not(test), no_std)]

pub mod utils;
