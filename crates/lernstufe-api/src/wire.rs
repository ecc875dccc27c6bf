//! JSON request/response shapes for line-delimited callers.
//!
//! ```text
//! {"op":"next","student_id":"s1"}                          -> {"next_difficulty":3}
//! {"op":"record","student_id":"s1","decision":"3","reward":1} -> {"status":"updated"}
//! {"op":"reset","student_id":"s1"}                         -> {"status":"reset"}
//! {"op":"stats","student_id":"s1"}                         -> {...summary...}
//! ```
//!
//! Failures come back as `{"error": "...", "kind": "validation" | "persistence" | "policy" | "request"}`.
//! An optional `id` on a request is echoed on its response.

use crate::api::{DecisionApi, StudentSummary};
use crate::error::ApiError;
use lernstufe_store::StateBackend;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A decision or reward as sent by callers. Integers and strings are the
/// expected shapes; any other JSON value is kept so it fails validation
/// like any other bad input instead of rejecting the whole request.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Int(i64),
    Text(String),
    Other(Value),
}

impl Scalar {
    fn raw(opt: Option<&Self>) -> String {
        match opt {
            Some(Self::Int(i)) => i.to_string(),
            Some(Self::Text(s)) => s.clone(),
            Some(Self::Other(v)) => v.to_string(),
            None => String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    Next {
        #[serde(default)]
        student_id: Option<String>,
    },
    Record {
        #[serde(default)]
        student_id: Option<String>,
        #[serde(default)]
        decision: Option<Scalar>,
        #[serde(default)]
        reward: Option<Scalar>,
    },
    Reset {
        #[serde(default)]
        student_id: Option<String>,
    },
    Stats {
        #[serde(default)]
        student_id: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
struct RequestEnvelope {
    #[serde(default)]
    id: Option<Value>,
    #[serde(flatten)]
    request: Request,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Response {
    Next { next_difficulty: u8 },
    Status { status: &'static str },
    Stats(StudentSummary),
    Error { error: String, kind: &'static str },
}

impl From<ApiError> for Response {
    fn from(e: ApiError) -> Self {
        Self::Error {
            error: e.to_string(),
            kind: e.kind(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseEnvelope {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(flatten)]
    pub body: Response,
}

/// Executes one typed request.
pub fn dispatch<B: StateBackend>(api: &DecisionApi<B>, request: &Request) -> Response {
    let student = |s: &Option<String>| s.clone().unwrap_or_default();
    let result = match request {
        Request::Next { student_id } => api
            .next(&student(student_id))
            .map(|arm| Response::Next {
                next_difficulty: arm.level(),
            }),
        Request::Record {
            student_id,
            decision,
            reward,
        } => api
            .record(
                &student(student_id),
                &Scalar::raw(decision.as_ref()),
                &Scalar::raw(reward.as_ref()),
            )
            .map(|_| Response::Status { status: "updated" }),
        Request::Reset { student_id } => api
            .reset(&student(student_id))
            .map(|()| Response::Status { status: "reset" }),
        Request::Stats { student_id } => api.stats(&student(student_id)).map(Response::Stats),
    };
    result.unwrap_or_else(Response::from)
}

/// Parses one JSON line, executes it and returns the response envelope.
/// Malformed lines yield a `request` error instead of failing the caller.
pub fn handle_line<B: StateBackend>(api: &DecisionApi<B>, line: &str) -> ResponseEnvelope {
    match serde_json::from_str::<RequestEnvelope>(line) {
        Ok(envelope) => ResponseEnvelope {
            id: envelope.id,
            body: dispatch(api, &envelope.request),
        },
        Err(e) => ResponseEnvelope {
            id: serde_json::from_str::<Value>(line)
                .ok()
                .and_then(|v| v.get("id").cloned()),
            body: Response::Error {
                error: format!("Invalid request: {e}"),
                kind: "request",
            },
        },
    }
}

/// Student a raw request line addresses, after trimming. Callers that fan
/// requests out to workers route on this to keep one student's requests in
/// order. `None` for malformed lines and missing or empty ids.
#[must_use]
pub fn routing_key(line: &str) -> Option<String> {
    let value: Value = serde_json::from_str(line).ok()?;
    let id = value.get("student_id")?.as_str()?.trim();
    (!id.is_empty()).then(|| id.to_string())
}
