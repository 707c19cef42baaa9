pub mod api;
pub mod app;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod generator;
pub mod models;
pub mod remote;
pub mod retry;
pub mod session;
pub mod srs;
pub mod sync;
pub mod templates;
pub mod usage;

#[cfg(test)]
mod test_support;
