// src/lib.rs

pub mod config;
pub mod error;
pub mod gateway;
pub mod persona;
pub mod repl;
pub mod server;
pub mod session;
pub mod stream;
