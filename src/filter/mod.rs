pub mod debounce;
pub mod visibility;
