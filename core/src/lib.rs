//! Typed, synchronous client for the RevenueCat subscriber API.
//!
//! # Overview
//! Every operation funnels through one dispatcher, `Client::call`, which
//! builds an authenticated JSON request, runs it through an injected
//! `HttpExecutor`, and decodes either the expected success body or the
//! service's `{code, message}` error.
//!
//! # Design
//! - `Client` holds read-only configuration plus an executor; nothing is
//!   mutated during a call, and there is no retry, cache or rate limiting.
//! - The executor is the I/O seam. `UreqExecutor` is the production one;
//!   tests pass closures or small structs instead.
//! - Instants sent as Unix milliseconds go through `time`, and only at the
//!   serialization boundary.

pub mod client;
pub mod config;
mod endpoints;
pub mod error;
pub mod http;
pub mod requests;
pub mod time;
pub mod transport;
pub mod types;

pub use client::{Client, Json, ResponseBody, NO_BODY};
pub use config::{ClientConfig, ConfigError};
pub use error::{ApiError, Error, Result};
pub use http::{HttpExecutor, HttpMethod, HttpRequest, HttpResponse, TransportError};
pub use requests::{AttributionData, CreatePurchaseOptions, EntitlementDuration, Network};
pub use transport::UreqExecutor;
pub use types::{
    Entitlement, NonSubscription, OwnershipType, PeriodType, Store, Subscriber,
    SubscriberAttribute, Subscription,
};
