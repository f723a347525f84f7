pub mod app;
pub mod cli;
pub mod client;
pub mod config;
pub mod logging;
pub mod model;
pub mod output;
pub mod query;
pub mod reindex;
pub mod shortcuts;
pub mod utils;

#[cfg(test)]
mod tests;
