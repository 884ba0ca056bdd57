//! Client for the hosted r9s API.
//!
//! Only the surface the CLI needs is modelled: streaming and one-shot chat
//! completions, model listing, and model details. All endpoints are
//! OpenAI-compatible and authenticated with a bearer token.

mod client;
mod error;
pub mod http;
mod types;
mod wire;

pub use client::{ChatApi, R9sClient};
pub use error::{Error, format_api_error};
pub use http::Timeouts;
pub use types::*;
