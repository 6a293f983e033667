use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::client::AnsClient;
use crate::errors::{AnsError, Result};
use crate::types::{Event, ServiceKey};

/// User-facing ANS settings
///
/// ```rust
/// use alert_notification_api::Configuration;
///
/// let config = Configuration::from_json(r#"{"eventTemplate": "{\"eventType\": \"Pipeline\"}"}"#).unwrap();
/// let event = config.template_event().unwrap();
/// assert_eq!(event.event_type.as_deref(), Some("Pipeline"));
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Configuration {
    /// Service key JSON as handed out by BTP
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_key: Option<String>,

    /// File holding a partial event JSON used as template
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_template_file_path: Option<PathBuf>,

    /// Inline partial event JSON, applied after the template file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_template: Option<String>,
}

impl Configuration {
    /// Parse the configuration from its JSON representation
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(AnsError::ParseConfiguration)
    }

    /// Build a client from the configured service key
    ///
    /// # Errors
    ///
    /// Returns an error if no service key is set, it cannot be parsed, or
    /// the client cannot be built from it.
    pub fn client(&self, timeout: Duration) -> Result<AnsClient> {
        let service_key = self
            .service_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or(AnsError::MissingServiceKey)?;

        AnsClient::from_service_key(&ServiceKey::from_json(service_key)?, timeout)
    }

    /// Build the event template
    ///
    /// Starts from an empty event, merges the template file (if any) and then
    /// the inline template (if any) on top.
    pub fn template_event(&self) -> Result<Event> {
        let mut event = Event::default();

        if let Some(path) = self
            .event_template_file_path
            .as_ref()
            .filter(|path| !path.as_os_str().is_empty())
        {
            let template = std::fs::read(path).map_err(|source| AnsError::ReadTemplate {
                path: path.clone(),
                source,
            })?;
            event.merge_with_json(template)?;
        }

        if let Some(template) = self
            .event_template
            .as_deref()
            .filter(|template| !template.trim().is_empty())
        {
            event.merge_with_json(template)?;
        }

        Ok(event)
    }
}
