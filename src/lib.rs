//! # Alert Notification API
//!
//! A Rust client library for sending resource events to the
//! [SAP Alert Notification Service](https://help.sap.com/docs/alert-notification) (ANS).
//!
//! ## Features
//!
//! - Send events to the ANS producer API with a single request
//! - OAuth client-credentials authentication through XSUAA, with token caching
//! - Builder pattern for constructing events
//! - Merging partial event JSON (templates) onto existing events
//! - Mapping of log levels onto ANS severity and category
//!
//! ## Example
//!
//! ```rust,no_run
//! use alert_notification_api::{AnsClient, Event, LogLevel, Resource, ServiceKey};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let key = ServiceKey::from_json(&std::fs::read_to_string("ans-service-key.json")?)?;
//!     let client = AnsClient::from_service_key(&key, Duration::from_secs(10))?;
//!
//!     let mut event = Event::new("PipelineFailure")
//!         .with_level(LogLevel::Error)
//!         .with_subject("Pipeline failed")
//!         .with_body("Stage 'acceptance' failed")
//!         .with_resource(Resource::new("my-pipeline", "pipeline"));
//!
//!     event.merge_with_json(r#"{"tags": {"team": "backend"}}"#)?;
//!
//!     client.send(&event).await?;
//!     Ok(())
//! }
//! ```

mod auth;
mod client;
mod config;
mod errors;
mod level;
mod types;

pub use auth::{AuthHeaderProvider, StaticToken, Xsuaa};
pub use client::{AnsClient, EventSender};
pub use config::Configuration;
pub use errors::{AnsError, AuthError, Result};
pub use level::{classify, LogLevel, UnknownLogLevel};
pub use types::{Category, Event, Resource, ServiceKey, Severity};
