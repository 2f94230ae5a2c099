pub mod answers;
pub mod calculate;
pub mod config;
pub mod error;
pub mod invoker;
pub mod literal;
pub mod models;
pub mod normalize;
pub mod prompt;
pub mod server;
