//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to backend:
//!     → retries.rs (deliver through the wrapped sender)
//!     → On connection failure: backoff.rs (sleep initial * exponent^attempt)
//!     → retry until the attempt budget is spent
//! ```
//!
//! HTTP error statuses are answers, not failures: they are never retried.

pub mod backoff;
pub mod retries;

pub use backoff::{calculate_backoff, RetryPolicy};
pub use retries::{BufferedRequest, FragmentMarker, RetryingTransport, SendRequest, TransportError};
