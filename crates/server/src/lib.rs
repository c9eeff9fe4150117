//! postflight service crate
//!
//! Ties the domain engine and adapters together behind an HTTP boundary
//! and a small CLI.

pub mod args;
pub mod commands;
pub mod config;
pub mod http;
