pub mod backend;
pub mod catalog;
pub mod commands;
pub mod config;
pub mod disposal;
pub mod engine;
pub mod error;
pub mod global;
pub mod retention;
pub mod testing;
pub mod ui;
pub mod utils;
