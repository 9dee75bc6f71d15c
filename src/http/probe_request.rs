use log::debug;
use serde_json::Value;
use thiserror::Error;
use warp::hyper::body::Bytes;

use crate::probe::probe::{Probe, ProbeUpdate};

#[derive(Debug, Error)]
pub enum ParamsError {
    #[error("Missing required parameters: {}", .0.join(", "))]
    Missing(Vec<&'static str>),
    #[error("Invalid value for parameter {0}")]
    InvalidValue(String),
    #[error("Request body must be a JSON object")]
    NotAnObject,
    #[error("Failed to decode JSON object: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Failed to decode form body: {0}")]
    Form(#[from] serde_urlencoded::de::Error),
}

/// Request parameters as received, decoded only once the handler asks for them.
#[derive(Debug, Clone)]
pub struct RawParams {
    query: Vec<(String, String)>,
    content_type: Option<String>,
    body: Bytes,
}

impl RawParams {
    pub fn new(
        query: Vec<(String, String)>,
        content_type: Option<String>,
        body: Bytes,
    ) -> RawParams {
        RawParams {
            query,
            content_type,
            body,
        }
    }

    /// Query values first, then the body, decoded as JSON or as a form
    /// depending on the content type.
    pub fn parse(self) -> Result<ProbeParams, ParamsError> {
        let mut params = ProbeParams::default();
        for (name, value) in self.query {
            params.add(&name, value);
        }

        if self.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(params);
        }

        if is_json(self.content_type.as_deref()) {
            match serde_json::from_slice::<Value>(&self.body)? {
                Value::Object(fields) => {
                    for (name, value) in fields {
                        params.add_json(&name, value)?;
                    }
                }
                _ => return Err(ParamsError::NotAnObject),
            }
        } else {
            let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(&self.body)?;
            for (name, value) in pairs {
                params.add(&name, value);
            }
        }
        Ok(params)
    }
}

fn is_json(content_type: Option<&str>) -> bool {
    content_type
        .and_then(|value| value.split(';').next())
        .map_or(false, |mime| mime.trim().eq_ignore_ascii_case("application/json"))
}

/// Every recognised parameter that was supplied. Scalars keep the last value,
/// lists keep every value in order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProbeParams {
    endpoint: Option<String>,
    identifier: Option<String>,
    keys: Vec<String>,
    versions: Vec<String>,
    ignored: Vec<String>,
}

impl ProbeParams {
    fn add(&mut self, name: &str, value: String) {
        match name {
            "endpoint" => self.endpoint = Some(value),
            "identifier" => self.identifier = Some(value),
            "keys" => self.keys.push(value),
            "versions" => self.versions.push(value),
            other => self.ignore(other),
        }
    }

    fn add_json(&mut self, name: &str, value: Value) -> Result<(), ParamsError> {
        match (name, value) {
            ("endpoint" | "identifier" | "keys" | "versions", Value::Null) => Ok(()),
            ("keys" | "versions", Value::Array(values)) => {
                for value in values {
                    if let Some(value) = json_scalar(name, value)? {
                        self.add(name, value);
                    }
                }
                Ok(())
            }
            ("endpoint" | "identifier" | "keys" | "versions", value) => {
                if let Some(value) = json_scalar(name, value)? {
                    self.add(name, value);
                }
                Ok(())
            }
            (other, _) => {
                self.ignore(other);
                Ok(())
            }
        }
    }

    fn ignore(&mut self, name: &str) {
        if !self.ignored.iter().any(|ignored| ignored == name) {
            self.ignored.push(name.to_string());
        }
    }

    pub fn ignored(&self) -> &[String] {
        &self.ignored
    }

    /// Builds a new probe, reporting every required field that is missing.
    pub fn into_registration(self) -> Result<Probe, ParamsError> {
        self.log_ignored();

        let mut missing = Vec::new();
        if self.endpoint.is_none() {
            missing.push("endpoint");
        }
        if self.identifier.is_none() {
            missing.push("identifier");
        }
        if self.keys.is_empty() {
            missing.push("keys");
        }
        if self.versions.is_empty() {
            missing.push("versions");
        }

        match (self.identifier, self.endpoint) {
            (Some(identifier), Some(endpoint)) if missing.is_empty() => {
                Ok(Probe::new(identifier, endpoint, self.keys, self.versions))
            }
            _ => Err(ParamsError::Missing(missing)),
        }
    }

    /// The identifier is never taken from the parameters of an update.
    pub fn into_update(mut self) -> ProbeUpdate {
        if self.identifier.take().is_some() {
            self.ignore("identifier");
        }
        self.log_ignored();

        ProbeUpdate {
            endpoint: self.endpoint,
            keys: non_empty(self.keys),
            versions: non_empty(self.versions),
        }
    }

    fn log_ignored(&self) {
        if !self.ignored().is_empty() {
            debug!("Ignoring unsupported probe parameters: {}", self.ignored().join(", "));
        }
    }
}

fn json_scalar(name: &str, value: Value) -> Result<Option<String>, ParamsError> {
    match value {
        Value::Null => Ok(None),
        Value::String(value) => Ok(Some(value)),
        Value::Bool(value) => Ok(Some(value.to_string())),
        Value::Number(value) => Ok(Some(value.to_string())),
        Value::Array(_) | Value::Object(_) => Err(ParamsError::InvalidValue(name.to_string())),
    }
}

fn non_empty(values: Vec<String>) -> Option<Vec<String>> {
    if values.is_empty() {
        None
    } else {
        Some(values)
    }
}
