pub mod api;
pub mod clients;
pub mod config;
pub mod context;
pub mod error;
pub mod gateway;
pub mod metrics;
pub mod models;
pub mod utils;
pub mod worker;
