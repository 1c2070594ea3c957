//! # Data Retrieval Module
//!
//! This module provides the HTTP plumbing shared by the support portal
//! reader, the destination sheet client and the webhook notifier, so those
//! components only deal with their own payloads.
//!
//! ## Contained Modules:
//!
//! - **`ky_http`**: A generic HTTP `ApiClient` built on `reqwest` and
//!   `reqwest-middleware`, with optional retries using exponential backoff,
//!   bearer or basic authentication, and a response wrapper that keeps
//!   transport, status and decode failures apart.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

/// Generic HTTP API client with retry middleware for resilient network requests.
pub mod ky_http;
