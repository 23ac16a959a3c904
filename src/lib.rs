pub mod api;
pub mod assembler;
pub mod chains;
pub mod classify;
pub mod config;
pub mod deploy;
pub mod errors;
pub mod explorer;
pub mod pricing;
pub mod retry;
pub mod rpc;
pub mod utils;
