// Reading ARM long-running operation state out of responses.
// The waiting loop itself lives in the client, which owns the transport.
use crate::cloud_functions::HttpResponse;
use crate::error::{Error, Result};
use serde::Deserialize;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
pub struct PollOptions {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            timeout: Duration::from_secs(30 * 60),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OperationStatus {
    InProgress,
    Succeeded,
    Failed,
    Canceled,
}

impl OperationStatus {
    /// Anything that is not a known terminal state counts as still running
    /// (ARM uses Accepted, Creating, Updating, Running, ...)
    pub fn parse(status: &str) -> Self {
        match status.to_ascii_lowercase().as_str() {
            "succeeded" => OperationStatus::Succeeded,
            "failed" => OperationStatus::Failed,
            "canceled" | "cancelled" => OperationStatus::Canceled,
            _ => OperationStatus::InProgress,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationStatus::InProgress => "InProgress",
            OperationStatus::Succeeded => "Succeeded",
            OperationStatus::Failed => "Failed",
            OperationStatus::Canceled => "Canceled",
        }
    }
}

/// Where to look for the outcome of an accepted request
#[derive(Debug, Clone, PartialEq)]
pub enum PollTarget {
    AsyncOperation(String),
    Location(String),
}

pub fn poll_target(response: &HttpResponse) -> Option<PollTarget> {
    if let Some(url) = response.header("Azure-AsyncOperation") {
        return Some(PollTarget::AsyncOperation(url.to_string()));
    }
    if response.status == 202 {
        if let Some(url) = response.header("Location") {
            return Some(PollTarget::Location(url.to_string()));
        }
    }
    None
}

/// `Retry-After` in seconds; the HTTP-date form is not used by ARM
pub fn retry_after(response: &HttpResponse) -> Option<Duration> {
    response.header("Retry-After")
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArmErrorDetail {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Deserialize)]
struct ArmErrorEnvelope {
    error: ArmErrorDetail,
}

#[derive(Deserialize)]
struct OperationBody {
    status: String,
    #[serde(default)]
    error: Option<ArmErrorDetail>,
}

/// Body of an `Azure-AsyncOperation` status URL
pub fn parse_operation_status(body: &str) -> Result<(OperationStatus, Option<ArmErrorDetail>)> {
    let parsed: OperationBody = serde_json::from_str(body)?;
    Ok((OperationStatus::parse(&parsed.status), parsed.error))
}

/// `properties.provisioningState` of a resource body. Resources that do not
/// report one are done as soon as the call returns; an empty body is not.
pub fn provisioning_state(body: &str) -> Result<OperationStatus> {
    if body.trim().is_empty() {
        return Ok(OperationStatus::InProgress);
    }
    let value: serde_json::Value = serde_json::from_str(body)?;
    Ok(value.pointer("/properties/provisioningState")
        .and_then(|s| s.as_str())
        .map(OperationStatus::parse)
        .unwrap_or(OperationStatus::Succeeded))
}

pub fn arm_error(response: &HttpResponse) -> Error {
    match serde_json::from_str::<ArmErrorEnvelope>(&response.body) {
        Ok(envelope) => Error::Arm {
            status: response.status,
            code: envelope.error.code,
            message: envelope.error.message,
        },
        Err(_) => Error::Arm {
            status: response.status,
            code: String::from("Unknown"),
            message: response.body.trim().to_string(),
        },
    }
}

pub fn operation_failed(resource: &str, status: OperationStatus, detail: Option<ArmErrorDetail>) -> Error {
    let detail = detail.unwrap_or_default();
    Error::OperationFailed {
        resource: resource.to_string(),
        status: status.as_str().to_string(),
        code: detail.code,
        message: detail.message,
    }
}

pub struct Deadline {
    started: Instant,
    timeout: Duration,
}

impl Deadline {
    pub fn start(timeout: Duration) -> Self {
        Self { started: Instant::now(), timeout }
    }

    pub fn check(&self, what: &str) -> Result<()> {
        if self.started.elapsed() >= self.timeout {
            Err(Error::Timeout(what.to_string()))
        } else {
            Ok(())
        }
    }
}
