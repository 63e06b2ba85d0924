pub mod client;
pub mod error;
pub mod live;
pub mod payloads;
