//! Dues API: payload types, HTTP client and cache domains.

pub mod api_types;
pub mod cache;
pub mod client;
mod error;
pub mod types;

pub use client::ApiClient;
pub use error::ApiError;
