//! Keypad dispatcher
//!
//! A separate process (`voxtalk keypad`) that turns key presses on a
//! dedicated numeric keypad into control signals for the running daemon.
//! Keeping it out of the daemon means the daemon never needs access to
//! /dev/input.
//!
//! Requires the user to be in the 'input' group.

#[cfg(target_os = "linux")]
pub mod evdev_listener;

#[cfg(target_os = "linux")]
pub use evdev_listener::{run, KeypadDispatcher};
