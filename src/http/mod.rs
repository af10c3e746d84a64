//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → request.rs (request ID)
//!     → dispatcher.rs (select backend, forward, relay response)
//!     → Send to client
//! ```

pub mod dispatcher;
pub mod request;
pub mod server;

pub use dispatcher::{ProxyDispatcher, ProxyError};
pub use request::{MakeRequestUuid, X_REQUEST_ID};
pub use server::build_router;
