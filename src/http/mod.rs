//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, trace span, timeout)
//!     → handler.rs (resolve, then one branch per disposition)
//!         → auth.rs (Basic credentials for files and directories)
//!         → data_uri.rs (inline payloads)
//!         → render.rs (listing and error pages)
//!     → response.rs (redirect, OPTIONS, HEAD shaping)
//!     → error.rs (JSON or rendered error on any failure)
//!     → Send to client
//! ```
//!
//! # Design Decisions
//! - The handler is usable without the server: `ServeHandler::serve` takes
//!   a plain `Request<Body>`
//! - Collaborators (filesystem, scripts, upstream, renderer) are injected
//!   as trait objects

pub mod auth;
pub mod data_uri;
pub mod error;
pub mod handler;
pub mod render;
pub mod request;
pub mod response;
pub mod server;

pub use error::{ErrorDescriptor, ServeError};
pub use handler::{ServeHandler, ServeHandlerBuilder};
pub use render::{BasicRenderer, Renderer};
pub use request::X_REQUEST_ID;
pub use server::{AppState, HttpServer};
