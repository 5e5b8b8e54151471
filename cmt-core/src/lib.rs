//! Measurement and command engine for a serial RGB colorimeter on no-std
//! embedded platforms.
//!
//! For a runnable host simulation, see the `mock-board` application.
#![no_std]

#[cfg(test)]
#[macro_use]
extern crate std;

pub mod utils;
