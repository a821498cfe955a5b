//! REST API client for the Classification portal.
//!
//! This module provides the `Classification` client with one method per
//! portal endpoint, and `ClassificationParamsProxy` which remembers common
//! parameters between calls.
//!
//! Requests are described as `ApiRequest` values and sent through the
//! session manager, which refreshes an expired token and retries once.
//! Responses are reduced to an optional JSON body by `interpret`.

pub mod client;
pub mod error;
pub mod normalize;
pub mod proxy;
pub mod request;

pub use client::{Classification, ALL_GROUPS};
pub use error::{ClassificationError, Result};
pub use normalize::{interpret, parse_body, to_wire_body, to_wire_list};
pub use proxy::ClassificationParamsProxy;
pub use request::ApiRequest;
