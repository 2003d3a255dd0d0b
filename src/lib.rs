pub mod api;
pub mod cli;
pub mod client;
pub mod envelope;
pub mod token;
