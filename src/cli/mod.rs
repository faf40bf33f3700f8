//! Thin command line layer over the library: argument parsing, command
//! dispatch and output.

pub mod args;
pub mod commands;
