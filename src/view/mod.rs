pub mod banner;
pub mod deep_link;
pub mod render;
