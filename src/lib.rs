pub mod cli;
pub mod daemon;
pub mod errors;
pub mod models;
pub mod pipeline;
pub mod poller;
pub mod server;
pub mod storage;
