pub mod config;
pub mod controller;
pub mod repl;
pub mod source;
