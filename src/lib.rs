//! A small interactive shell built around filesystem built-ins and
//! external process execution.
//!
//! The shell reads one line at a time, splits it on whitespace, and either
//! runs one of the built-in commands (`files`, `info`, `delete`, `copy`,
//! `make`, `down`, `up`, `finish`) in-process or resolves the first token
//! against a fixed search path and launches it as a child process, waiting
//! for it to terminate and reporting how it ended.
//!
//! The main entry point is [`Interpreter`], which dispatches commands by
//! name through a set of pluggable factories. The public modules
//! [`command`] and [`env`] expose the traits and types needed to implement
//! additional commands or to drive the interpreter from tests.

mod builtin;
pub mod command;
pub mod env;
pub mod external;
mod interpreter;
mod io_adapters;

pub use io_adapters::{MemReader, MemWriter};

/// Convenient re-export of the interactive command runner.
///
/// See [`Interpreter`] for the high-level API.
pub use interpreter::Interpreter;
