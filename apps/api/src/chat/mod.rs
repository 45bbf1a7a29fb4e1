pub mod handlers;
pub mod prompts;
pub mod sentiment;
pub mod store;
