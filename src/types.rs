use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use crate::errors::{AnsError, Result};
use crate::level::{classify, LogLevel};

const INFO_SEVERITY: &str = "INFO";
const NOTICE_SEVERITY: &str = "NOTICE";
const WARNING_SEVERITY: &str = "WARNING";
const ERROR_SEVERITY: &str = "ERROR";
const FATAL_SEVERITY: &str = "FATAL";

const EXCEPTION_CATEGORY: &str = "EXCEPTION";
const ALERT_CATEGORY: &str = "ALERT";
const NOTIFICATION_CATEGORY: &str = "NOTIFICATION";

/// Event severity levels
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Info,
    Notice,
    Warning,
    Error,
    Fatal,
}

impl Severity {
    /// Wire name of the severity
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => INFO_SEVERITY,
            Severity::Notice => NOTICE_SEVERITY,
            Severity::Warning => WARNING_SEVERITY,
            Severity::Error => ERROR_SEVERITY,
            Severity::Fatal => FATAL_SEVERITY,
        }
    }
}

impl Display for Severity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event categories
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Category {
    Exception,
    Alert,
    Notification,
}

impl Category {
    /// Wire name of the category
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Exception => EXCEPTION_CATEGORY,
            Category::Alert => ALERT_CATEGORY,
            Category::Notification => NOTIFICATION_CATEGORY,
        }
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Credentials of an Alert Notification Service instance
///
/// The JSON layout is the one BTP hands out when creating a service key:
///
/// ```rust
/// use alert_notification_api::ServiceKey;
///
/// let key = ServiceKey::from_json(
///     r#"{"url":"https://ans.example.com","client_id":"id","client_secret":"secret","oauth_url":"https://auth.example.com"}"#,
/// )
/// .unwrap();
/// assert_eq!(key.client_id, "id");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceKey {
    /// Base URL of the ANS producer API
    pub url: String,
    /// OAuth client id
    pub client_id: String,
    /// OAuth client secret
    pub client_secret: String,
    /// Base URL of the OAuth authorization server
    pub oauth_url: String,
}

impl ServiceKey {
    /// Parse a service key from its JSON representation
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(AnsError::ParseServiceKey)
    }
}

impl FromStr for ServiceKey {
    type Err = AnsError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_json(s)
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, str::is_empty)
}

fn is_zero<T: Default + PartialEq>(value: &Option<T>) -> bool {
    value.as_ref().map_or(true, |v| *v == T::default())
}

fn is_empty_map(value: &Option<HashMap<String, Value>>) -> bool {
    value.as_ref().map_or(true, HashMap::is_empty)
}

/// Keeps an explicit `null` apart from a missing key: `Some(None)` vs `None`
fn present<'de, D, T>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn apply_tags(target: &mut Option<HashMap<String, Value>>, incoming: Option<Option<HashMap<String, Value>>>) {
    match incoming {
        Some(Some(tags)) => target.get_or_insert_with(HashMap::new).extend(tags),
        Some(None) => *target = None,
        None => {}
    }
}

// Partial payloads. Scalars treat `null` like a missing key; `null` on
// `tags` or `resource` clears the field.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResourcePatch {
    #[serde(default)]
    resource_name: Option<String>,
    #[serde(default)]
    resource_type: Option<String>,
    #[serde(default)]
    resource_instance: Option<String>,
    #[serde(default, deserialize_with = "present")]
    tags: Option<Option<HashMap<String, Value>>>,
}

impl From<Resource> for ResourcePatch {
    fn from(resource: Resource) -> Self {
        Self {
            resource_name: resource.resource_name,
            resource_type: resource.resource_type,
            resource_instance: resource.resource_instance,
            tags: resource.tags.map(Some),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventPatch {
    #[serde(default)]
    event_type: Option<String>,
    #[serde(default)]
    event_timestamp: Option<i64>,
    #[serde(default)]
    severity: Option<Severity>,
    #[serde(default)]
    category: Option<Category>,
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    priority: Option<i64>,
    #[serde(default, deserialize_with = "present")]
    tags: Option<Option<HashMap<String, Value>>>,
    #[serde(default, deserialize_with = "present")]
    resource: Option<Option<ResourcePatch>>,
}

impl From<Event> for EventPatch {
    fn from(event: Event) -> Self {
        Self {
            event_type: event.event_type,
            event_timestamp: event.event_timestamp,
            severity: event.severity,
            category: event.category,
            subject: event.subject,
            body: event.body,
            priority: event.priority,
            tags: event.tags.map(Some),
            resource: event.resource.map(|resource| Some(resource.into())),
        }
    }
}

/// Resource an event refers to
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    /// Name of the affected resource
    #[serde(default, skip_serializing_if = "is_blank")]
    pub resource_name: Option<String>,

    /// Kind of resource (e.g. `pipeline`, `app`)
    #[serde(default, skip_serializing_if = "is_blank")]
    pub resource_type: Option<String>,

    /// Instance identifier of the resource
    #[serde(default, skip_serializing_if = "is_blank")]
    pub resource_instance: Option<String>,

    /// Free-form resource tags
    #[serde(default, skip_serializing_if = "is_empty_map")]
    pub tags: Option<HashMap<String, Value>>,
}

impl Resource {
    /// Create a resource with name and type
    pub fn new(name: &str, resource_type: &str) -> Self {
        Self {
            resource_name: Some(name.to_string()),
            resource_type: Some(resource_type.to_string()),
            ..Self::default()
        }
    }

    /// Set the resource instance
    pub fn with_instance(mut self, instance: &str) -> Self {
        self.resource_instance = Some(instance.to_string());
        self
    }

    /// Add a resource tag
    pub fn with_tag(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.tags
            .get_or_insert_with(HashMap::new)
            .insert(key.to_string(), value.into());
        self
    }

    /// Overwrite every field that is set in `other`
    pub fn merge(&mut self, other: Resource) {
        self.apply(other.into());
    }

    fn apply(&mut self, patch: ResourcePatch) {
        if patch.resource_name.is_some() {
            self.resource_name = patch.resource_name;
        }
        if patch.resource_type.is_some() {
            self.resource_type = patch.resource_type;
        }
        if patch.resource_instance.is_some() {
            self.resource_instance = patch.resource_instance;
        }
        apply_tags(&mut self.tags, patch.tags);
    }
}

/// Alert Notification Service resource event
///
/// Every field is optional. Fields holding a zero value (empty string, `0`,
/// empty map) are left out of the JSON body.
///
/// See: <https://help.sap.com/docs/alert-notification/sap-alert-notification-for-sap-btp/event>
///
/// # Example
///
/// ```rust
/// use alert_notification_api::{Event, LogLevel, Resource};
///
/// let event = Event::new("PipelineFailure")
///     .with_level(LogLevel::Error)
///     .with_subject("Build failed")
///     .with_body("Stage 'integration' failed on main")
///     .with_tag("team", "backend")
///     .with_resource(Resource::new("my-pipeline", "pipeline"));
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Event type, used by ANS subscriptions to match events
    #[serde(default, skip_serializing_if = "is_blank")]
    pub event_type: Option<String>,

    /// Seconds since the Unix epoch
    #[serde(default, skip_serializing_if = "is_zero")]
    pub event_timestamp: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,

    /// Short summary of the event
    #[serde(default, skip_serializing_if = "is_blank")]
    pub subject: Option<String>,

    /// Detailed description
    #[serde(default, skip_serializing_if = "is_blank")]
    pub body: Option<String>,

    /// Priority; ANS treats lower values as more urgent
    #[serde(default, skip_serializing_if = "is_zero")]
    pub priority: Option<i64>,

    /// Free-form event tags
    #[serde(default, skip_serializing_if = "is_empty_map")]
    pub tags: Option<HashMap<String, Value>>,

    /// Resource the event is about
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<Resource>,
}

impl Event {
    /// Create a new event of the given type, stamped with the current time
    pub fn new(event_type: &str) -> Self {
        Self {
            event_type: Some(event_type.to_string()),
            event_timestamp: Some(Utc::now().timestamp()),
            ..Self::default()
        }
    }

    /// Set severity
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    /// Set category
    pub fn with_category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    /// Set severity and category from a log level
    pub fn with_level(self, level: LogLevel) -> Self {
        let (severity, category) = classify(level);
        self.with_severity(severity).with_category(category)
    }

    /// Set subject
    pub fn with_subject(mut self, subject: &str) -> Self {
        self.subject = Some(subject.to_string());
        self
    }

    /// Set body
    pub fn with_body(mut self, body: &str) -> Self {
        self.body = Some(body.to_string());
        self
    }

    /// Set priority
    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Set a custom timestamp
    ///
    /// By default `Event::new` stamps the event with the current time.
    pub fn with_timestamp(mut self, time: DateTime<Utc>) -> Self {
        self.event_timestamp = Some(time.timestamp());
        self
    }

    /// Add a tag
    pub fn with_tag(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.tags
            .get_or_insert_with(HashMap::new)
            .insert(key.to_string(), value.into());
        self
    }

    /// Attach the resource the event is about
    pub fn with_resource(mut self, resource: Resource) -> Self {
        self.resource = Some(resource);
        self
    }

    /// Overwrite every field that is set in `other`
    ///
    /// Unset fields in `other` leave the receiver untouched. Tags are merged
    /// key by key and a nested resource is merged field by field.
    pub fn merge(&mut self, other: Event) {
        self.apply(other.into());
    }

    /// Decode a (partial) event JSON and merge it onto this event
    ///
    /// Only keys present in `json` are applied. `null` leaves scalar fields
    /// untouched but clears `tags` and `resource`. On error the receiver is
    /// left unchanged.
    pub fn merge_with_json(&mut self, json: impl AsRef<[u8]>) -> Result<()> {
        let json = json.as_ref();
        let patch: EventPatch =
            serde_json::from_slice(json).map_err(|source| AnsError::ParseEvent {
                payload: String::from_utf8_lossy(json).into_owned(),
                source,
            })?;
        self.apply(patch);
        Ok(())
    }

    fn apply(&mut self, patch: EventPatch) {
        if patch.event_type.is_some() {
            self.event_type = patch.event_type;
        }
        if patch.event_timestamp.is_some() {
            self.event_timestamp = patch.event_timestamp;
        }
        if patch.severity.is_some() {
            self.severity = patch.severity;
        }
        if patch.category.is_some() {
            self.category = patch.category;
        }
        if patch.subject.is_some() {
            self.subject = patch.subject;
        }
        if patch.body.is_some() {
            self.body = patch.body;
        }
        if patch.priority.is_some() {
            self.priority = patch.priority;
        }
        apply_tags(&mut self.tags, patch.tags);
        match patch.resource {
            Some(Some(resource)) => self
                .resource
                .get_or_insert_with(Resource::default)
                .apply(resource),
            Some(None) => self.resource = None,
            None => {}
        }
    }
}
