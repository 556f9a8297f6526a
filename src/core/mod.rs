pub mod config;
pub mod credential;
pub mod fetcher;
pub mod formatter;
pub mod models;
pub mod refresh;
