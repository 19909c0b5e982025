pub mod backend;
pub mod cache;
pub mod code_actions;
pub mod documents;
pub mod handlers;
pub mod transport;
pub mod utils;
