//! Concrete implementations of the domain ports.

pub mod cli_invoker;

pub use cli_invoker::CliInvoker;
