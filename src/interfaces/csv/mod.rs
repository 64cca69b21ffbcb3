//! CSV surface of the command-line tool: commands in, account snapshot out.

pub mod account_writer;
pub mod command_reader;
pub mod command_runner;
