//! wgsweep CLI library
//!
//! This library exposes the command, configuration and output modules for
//! the `wgsweep` binary and its tests.

pub mod commands;
pub mod config;
pub mod exit;
pub mod output;
