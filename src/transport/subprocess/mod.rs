//! Subprocess transport implementation
//!
//! Owns one provider child process, its environment, and the background
//! readers draining its pipes.

pub mod command;
pub mod config;
mod lifecycle;
mod reader;
mod transport;

pub use transport::SubprocessTransport;
