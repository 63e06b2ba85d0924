pub mod achievements;
pub mod challenge;
pub mod kv_store;
pub mod state;
