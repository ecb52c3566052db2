//! Collects a GitHub user's statistics over GraphQL and REST and renders
//! them into SVG cards.

pub mod config;
pub mod github;
pub mod http;
pub mod languages;
pub mod queries;
pub mod stats;
pub mod svg;
pub mod types;

pub use config::{Config, ConfigError, Credentials};
pub use github::GithubClient;
pub use stats::{LinesChanged, Stats};
