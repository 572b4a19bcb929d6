//! Static file serving engine with rewrites, redirects, listings,
//! scripts and a proxy branch.

pub mod config;
pub mod delivery;
pub mod exec;
pub mod http;
pub mod lifecycle;
pub mod listing;
pub mod observability;
pub mod proxy;
pub mod resolve;
pub mod rules;

pub use config::{ServeConfig, Settings};
pub use http::{HttpServer, ServeHandler};
pub use lifecycle::Shutdown;
