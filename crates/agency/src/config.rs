//! Connection configuration.
//!
//! A [`Configuration`] names the transport and carries the optional region,
//! credentials and endpoint override used to construct its client. It is
//! immutable once built; [`Configuration::supplement`] returns a new value
//! with previously unset fields filled in.
//!
//! ## Text form
//!
//! [`Configuration::serialize`] emits one `key=value` line per field, in
//! fixed order, with an empty value for unset fields and no trailing newline:
//!
//! ```text
//! service_name=sqs
//! region_name=us-east-1
//! access_key_id=
//! secret_access_key=
//! endpoint_url=
//! session_token=
//! ```
//!
//! ## Environment scheme
//!
//! Each field `f` is read from `AWS_<F>` (e.g. `AWS_REGION_NAME`). Empty
//! variables count as unset.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::directory::Transport;
use crate::errors::{AgencyError, Result};
use crate::identifiers::ProfileName;

/// Prefix of every environment variable read by [`Configuration::from_env`].
pub const ENV_PREFIX: &str = "AWS";

/// Mask substituted for secret-bearing fields by [`Configuration::redact`].
pub const REDACTION: &str = "**********";

/// Field names in serialization order.
pub const FIELD_NAMES: [&str; 6] = [
    "service_name",
    "region_name",
    "access_key_id",
    "secret_access_key",
    "endpoint_url",
    "session_token",
];

const SECRET_FIELDS: [&str; 3] = ["access_key_id", "secret_access_key", "session_token"];

/// Returns the environment variable backing `field` (e.g. `AWS_REGION_NAME`).
pub fn env_var(field: &str) -> String {
    format!("{ENV_PREFIX}_{}", field.to_uppercase())
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// Where [`Configuration::supplement`] reads missing values from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// Process environment, per the `AWS_<FIELD>` scheme.
    #[serde(rename = "env")]
    Environment,
    /// Credentials file. Reserved; not implemented.
    File,
}

impl FromStr for Source {
    type Err = AgencyError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "env" => Ok(Self::Environment),
            "file" => Ok(Self::File),
            other => Err(AgencyError::config_invalid(format!("unknown configuration source '{other}'"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Transport identifier plus optional region, credentials and endpoint override.
///
/// `Debug` output is redacted; use [`Configuration::serialize`] to see secrets.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    #[serde(rename = "service_name")]
    transport: Transport,
    #[serde(default)]
    region_name: Option<String>,
    #[serde(default)]
    access_key_id: Option<String>,
    #[serde(default)]
    secret_access_key: Option<String>,
    #[serde(default)]
    endpoint_url: Option<String>,
    #[serde(default)]
    session_token: Option<String>,
}

impl Configuration {
    /// Creates a configuration for `transport` with every optional field unset.
    pub fn new(transport: Transport) -> Self {
        Self {
            transport,
            region_name: None,
            access_key_id: None,
            secret_access_key: None,
            endpoint_url: None,
            session_token: None,
        }
    }

    /// Sets the region.
    #[must_use]
    pub fn with_region(mut self, region_name: impl Into<String>) -> Self {
        self.region_name = Some(region_name.into());
        self
    }

    /// Sets the access key id.
    #[must_use]
    pub fn with_access_key_id(mut self, access_key_id: impl Into<String>) -> Self {
        self.access_key_id = Some(access_key_id.into());
        self
    }

    /// Sets the secret access key.
    #[must_use]
    pub fn with_secret_access_key(mut self, secret_access_key: impl Into<String>) -> Self {
        self.secret_access_key = Some(secret_access_key.into());
        self
    }

    /// Sets the endpoint override.
    #[must_use]
    pub fn with_endpoint_url(mut self, endpoint_url: impl Into<String>) -> Self {
        self.endpoint_url = Some(endpoint_url.into());
        self
    }

    /// Sets the session token.
    #[must_use]
    pub fn with_session_token(mut self, session_token: impl Into<String>) -> Self {
        self.session_token = Some(session_token.into());
        self
    }

    pub fn transport(&self) -> Transport {
        self.transport
    }

    pub fn region_name(&self) -> Option<&str> {
        self.region_name.as_deref()
    }

    pub fn access_key_id(&self) -> Option<&str> {
        self.access_key_id.as_deref()
    }

    pub fn secret_access_key(&self) -> Option<&str> {
        self.secret_access_key.as_deref()
    }

    pub fn endpoint_url(&self) -> Option<&str> {
        self.endpoint_url.as_deref()
    }

    pub fn session_token(&self) -> Option<&str> {
        self.session_token.as_deref()
    }

    // -- alternate constructors ---------------------------------------------

    /// Builds a configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds a configuration from an environment-like lookup function.
    ///
    /// `lookup` receives variable names such as `AWS_SERVICE_NAME`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |field: &str| lookup(&env_var(field)).filter(|v| !v.is_empty());
        let transport = read("service_name")
            .ok_or_else(|| AgencyError::config_invalid("Missing service_name."))?
            .parse()?;

        let mut config = Self::new(transport);
        for (field, slot) in config.optional_fields_mut() {
            *slot = read(field);
        }
        Ok(config)
    }

    /// Builds a configuration from a loosely typed JSON object.
    ///
    /// A missing or non-string `service_name` fails with
    /// [`AgencyError::ConfigInvalid`] naming the received type; an unknown
    /// name fails with [`AgencyError::UnsupportedTransport`].
    pub fn from_json(value: &Value) -> Result<Self> {
        let object = value.as_object().ok_or_else(|| {
            AgencyError::config_invalid(format!(
                "Configuration must be an <object>. Received <{}>.",
                json_type_name(value)
            ))
        })?;

        let transport = match object.get("service_name") {
            None | Some(Value::Null) => return Err(AgencyError::config_invalid("Missing service_name.")),
            Some(Value::String(name)) => name.parse()?,
            Some(other) => {
                return Err(AgencyError::config_invalid(format!(
                    "Service name must be a <Transport> or <string>. Received <{}>.",
                    json_type_name(other)
                )))
            }
        };

        let mut config = Self::new(transport);
        for (field, slot) in config.optional_fields_mut() {
            *slot = match object.get(field) {
                None | Some(Value::Null) => None,
                Some(Value::String(s)) if s.is_empty() => None,
                Some(Value::String(s)) => Some(s.clone()),
                Some(other) => {
                    return Err(AgencyError::config_invalid(format!(
                        "{field} must be a <string>. Received <{}>.",
                        json_type_name(other)
                    )))
                }
            };
        }
        Ok(config)
    }

    // -- derived configurations ---------------------------------------------

    /// Returns a copy with unset fields filled from `source`.
    ///
    /// Set fields are never overwritten. [`Source::File`] is reserved and
    /// fails with [`AgencyError::NotImplemented`].
    pub fn supplement(&self, source: Source) -> Result<Self> {
        self.supplement_with(source, |name| std::env::var(name).ok())
    }

    /// Like [`Configuration::supplement`], reading the environment through `lookup`.
    pub fn supplement_with<F>(&self, source: Source, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        match source {
            Source::File => Err(AgencyError::not_implemented("supplementing configuration from file")),
            Source::Environment => {
                let mut supplemented = self.clone();
                for (field, slot) in supplemented.optional_fields_mut() {
                    if slot.is_none() {
                        *slot = lookup(&env_var(field)).filter(|v| !v.is_empty());
                    }
                }
                Ok(supplemented)
            }
        }
    }

    /// Returns a copy with every secret-bearing field replaced by [`REDACTION`].
    ///
    /// Masking is unconditional: unset secrets are masked too, so the redacted
    /// form reveals neither values nor which secrets were present.
    pub fn redact(&self) -> Self {
        let mut redacted = self.clone();
        for (field, slot) in redacted.optional_fields_mut() {
            if SECRET_FIELDS.contains(&field) {
                *slot = Some(REDACTION.to_string());
            }
        }
        redacted
    }

    // -- text form ----------------------------------------------------------

    /// Renders the `key=value` text form.
    pub fn serialize(&self) -> String {
        self.to_string()
    }

    /// Renders the text form under a `[profile]` header.
    pub fn as_file(&self, profile: &ProfileName) -> String {
        format!("[{profile}]\n{self}")
    }

    fn fields(&self) -> [(&'static str, Option<&str>); 6] {
        [
            ("service_name", Some(self.transport.as_str())),
            ("region_name", self.region_name()),
            ("access_key_id", self.access_key_id()),
            ("secret_access_key", self.secret_access_key()),
            ("endpoint_url", self.endpoint_url()),
            ("session_token", self.session_token()),
        ]
    }

    fn optional_fields_mut(&mut self) -> [(&'static str, &mut Option<String>); 5] {
        [
            ("region_name", &mut self.region_name),
            ("access_key_id", &mut self.access_key_id),
            ("secret_access_key", &mut self.secret_access_key),
            ("endpoint_url", &mut self.endpoint_url),
            ("session_token", &mut self.session_token),
        ]
    }
}

impl std::fmt::Display for Configuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, (key, value)) in self.fields().into_iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{key}={}", value.unwrap_or(""))?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Configuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redacted = self.redact();
        f.debug_struct("Configuration")
            .field("service_name", &redacted.transport)
            .field("region_name", &redacted.region_name)
            .field("access_key_id", &redacted.access_key_id)
            .field("secret_access_key", &redacted.secret_access_key)
            .field("endpoint_url", &redacted.endpoint_url)
            .field("session_token", &redacted.session_token)
            .finish()
    }
}

/// Parses the text form produced by [`Configuration::serialize`] or
/// [`Configuration::as_file`]. Empty values parse as unset.
impl FromStr for Configuration {
    type Err = AgencyError;

    fn from_str(s: &str) -> Result<Self> {
        let mut lines = s.lines().peekable();
        if lines.peek().is_some_and(|l| l.starts_with('[') && l.ends_with(']')) {
            lines.next();
        }

        let mut object = serde_json::Map::new();
        for line in lines.filter(|l| !l.trim().is_empty()) {
            let (key, value) = line
                .split_once('=')
                .ok_or_else(|| AgencyError::config_invalid(format!("malformed line '{line}'")))?;
            if !FIELD_NAMES.contains(&key) {
                return Err(AgencyError::config_invalid(format!("unknown field '{key}'")));
            }
            if !value.is_empty() {
                object.insert(key.to_string(), Value::String(value.to_string()));
            }
        }
        Self::from_json(&Value::Object(object))
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
