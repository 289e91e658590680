#![forbid(unsafe_code)]

pub mod awards;
pub mod cli;
pub mod config;
pub mod connection;
pub mod content;
pub mod generator;
pub mod graph;
pub mod index_state;
pub mod indexer;
pub mod listing;
pub mod logging;
pub mod media;
pub mod missing;
pub mod panel;
pub mod render;
pub mod search;
pub mod store;
pub mod walk;
