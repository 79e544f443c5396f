pub mod ai;
pub mod cli;
pub mod config;
pub mod database;
pub mod generator;
pub mod html;
pub mod pipeline;
pub mod publisher;
pub mod scheduler;
pub mod sources;

pub use config::AppConfig;
pub use database::NewsDatabase;
pub use pipeline::AppContext;
