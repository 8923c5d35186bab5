//! Core types, config, and errors for planloop.

pub mod config;
pub mod error;
pub mod types;
