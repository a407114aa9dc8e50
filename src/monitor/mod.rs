pub mod audit;
pub mod capture;
pub mod cluster;
pub mod config;
pub mod dedup;
pub mod export;
pub mod llm;
pub mod message;
pub mod paths;
pub mod retention;
pub mod search;
pub mod stats;
pub mod store;
pub mod summary;
pub mod util;
pub mod warn;
