//! HTTP plumbing for the r9s API.

mod client;
mod sse;

pub use client::{BearerToken, HttpClient, Timeouts};
pub use sse::{SseEvent, SseParser};
