pub mod cache;
pub mod catalog;
pub mod composer;
pub mod demographics;
pub mod engine;
pub mod enrichment;
pub mod handlers;
pub mod keywords;
pub mod matcher;
pub mod prompts;
pub mod questions;
pub mod repository;
pub mod suggestions;
pub mod traits;
