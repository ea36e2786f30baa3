pub mod compare;
pub mod store;
pub mod types;
