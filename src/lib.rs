pub mod auction;
pub mod bidding;
pub mod clock;
pub mod config;
pub mod database;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod ingest;
pub mod query;
pub mod rules;
mod store;
