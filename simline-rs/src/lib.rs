//! simline: a command-line interpreter for simulation hosts.
//!
//! The host exposes its objects, classes and registers through
//! [`host::HostObjectModel`]; the interpreter in [`script`] runs command
//! lines against them.  Long-running scripts run as cooperative branches
//! scheduled by [`branch::Scheduler`].

pub mod branch;
pub mod cli;
pub mod config;
pub mod error;
pub mod host;
pub mod script;
pub mod var;
