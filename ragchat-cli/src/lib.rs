//! # ragchat-cli
//!
//! The `ragchat` console front end: loads `config.yaml`, builds the query
//! pipeline, and answers questions one-shot or in a loop.

pub mod app;
pub mod config;
pub mod display;

pub use app::App;
pub use config::AppConfig;
