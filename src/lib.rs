//! Subscription aggregation service library.

pub mod admin;
pub mod aggregator;
pub mod cache;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod links;
pub mod observability;
pub mod pipeline;
pub mod services;
pub mod store;
pub mod subconverter;
pub mod transform;

pub use config::schema::ServiceConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
