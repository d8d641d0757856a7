//! Utility modules shared by the upstream client and the server.
//!
//! - [`HttpClient`]: reqwest client preconfigured with JSON headers, bearer
//!   credentials and the per-call timeout

mod http;

pub use http::{HttpClient, HttpClientBuilder, DEFAULT_TIMEOUT};
