//! Authenticated App Store Connect REST client
//!
//! One request in, one raw response or one typed error out. Every call mints
//! a fresh bearer token through `asc_auth::TokenMinter`; nothing is cached
//! and nothing is retried. Paged collections are followed through
//! `links.next` by the pagination driver.
//!
//! Response bodies are returned as raw JSON. Shaping them into typed values
//! is the caller's job, via `ApiResponse::decode` or its own models.

pub mod client;
pub mod error;
pub mod metrics;
pub mod pagination;
pub mod request;
pub mod response;

pub use client::ApiClient;
pub use error::{ApiError, Error, Result};
pub use pagination::{Paginated, PaginationState};
pub use request::{ApiRequest, Method};
pub use response::ApiResponse;
