pub mod app;
pub mod clock;
pub mod codec;
pub mod config;
pub mod domain;
pub mod error;
pub mod fetch;
pub mod header;
pub mod local;
pub mod manifest;
pub mod obsolete;
pub mod output;
pub mod pool;
pub mod query;
pub mod rcsb;
pub mod reconcile;
pub mod remote;
pub mod store;
