//! Provider client capability.
//!
//! The executor reaches the cloud only through [`ProviderClient`]. This
//! module defines that interface plus two implementations: an explicit
//! dispatch table of typed handlers and an HTTP gateway client.

mod client;
mod dispatch;
mod http;

pub use client::{ProviderClient, ProviderResult};
#[cfg(test)]
pub use client::MockProviderClient;
pub use dispatch::{DispatchTable, FnHandler, OperationHandler};
pub use http::HttpProviderClient;
