pub mod command;
pub mod error;
pub mod presence;
pub mod projector;
pub mod query;
pub mod store;
