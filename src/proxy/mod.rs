//! Reverse-proxy subsystem.
//!
//! # Data Flow
//! ```text
//! Proxy disposition (absolute http(s) target)
//!     → forward.rs (rewrite Host, drop hop-by-hop headers)
//!     → client.rs (UpstreamClient: reqwest, redirects not followed,
//!                  cookies.rs jar when proxyCookieJar is set)
//!     → middleware.rs (only when proxyMiddleware rules match the target:
//!                      buffer, classify MIME, parse HTML via html.rs,
//!                      run named transforms)
//!     → response with filtered headers and custom header rules
//! ```
//!
//! # Design Decisions
//! - Unmatched responses stream straight through without buffering
//! - Middleware signal `Flow::Stop` instead of unwinding to break the chain
//! - The upstream status code is relayed as-is

pub mod client;
pub mod cookies;
pub mod forward;
pub mod html;
pub mod middleware;

pub use client::{ReqwestUpstream, UpstreamBody, UpstreamClient, UpstreamError, UpstreamRequest, UpstreamResponse};
pub use cookies::CookieJar;
pub use forward::{forwards_body, Forwarder};
pub use html::HtmlDocument;
pub use middleware::{Flow, MiddlewareError, MiddlewareRegistry, MimeClass, Payload, ProxyMiddleware};
