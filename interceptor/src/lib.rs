//! # Interceptor
//!
//! Watches the host page's list and send exchanges and turns what it sees into
//! [`lens_core::MetadataEvent`]s:
//!
//! - list response → `MessagesLoaded`
//! - send request → `UserMessageSent` (immediately, before any response)
//! - send response → `NewMessage` with the composed "requested → actual" model
//!
//! ## Modules
//!
//! - [`endpoint`] – URL / method classification
//! - [`wire`] – payload shapes and parsing
//! - [`exchange`] – captured request/response pairs
//! - [`sink`] – EventSink trait, channel and collecting sinks
//! - [`interceptor`] – the Interceptor

pub mod endpoint;
pub mod exchange;
pub mod interceptor;
pub mod sink;
pub mod wire;

pub use endpoint::{classify, Endpoint};
pub use exchange::Exchange;
pub use interceptor::{Interceptor, RequestedGeneration};
pub use sink::{CollectingSink, EventSink};
