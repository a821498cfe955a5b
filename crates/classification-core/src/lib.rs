//! Client library for the Classification portal REST API.
//!
//! The portal keeps course grades ("classifications") and is protected by
//! OAuth2. This crate handles the login through the system browser, keeps
//! the token on disk, refreshes it when it expires and wraps every portal
//! endpoint in a typed async method.
//!
//! ```no_run
//! use classification_core::{Classification, ClientConfig};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = ClientConfig::load()?;
//! let mut client = Classification::connect(&config, false).await?;
//! let groups = client.get_course_groups("MI-PYT", Some("B171"), None).await?;
//! println!("{:?}", groups);
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod grades;
pub mod logging;
pub mod models;

pub use api::{Classification, ClassificationError, ClassificationParamsProxy, Result};
pub use auth::{CallbackEndpoint, SessionManager, Token, TokenStore};
pub use config::ClientConfig;
pub use grades::{StudentsToTasks, TasksToStudents};
