//! # animsplice
//!
//! Library side of the `animsplice` binary: document I/O, merge
//! configuration and the CLI commands.

pub mod cli;
pub mod config;
pub mod documents;
