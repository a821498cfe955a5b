//! Authentication module for the portal's OAuth2 session.
//!
//! This module provides:
//! - `Token`: the access/refresh pair and its expiry
//! - `TokenStore`: file persistence of the token
//! - `AuthorizationFlow`: browser login with a one-shot callback listener
//! - `SessionManager`: session lifecycle and refresh-on-expiry retry

pub mod flow;
pub mod session;
pub mod store;
pub mod token;

pub use flow::{AuthorizationFlow, BrowserLauncher, CallbackEndpoint};
pub use session::{AuthorizedClient, SessionManager};
pub use store::TokenStore;
pub use token::{Token, TokenResponse};
