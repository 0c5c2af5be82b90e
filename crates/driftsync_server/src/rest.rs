//! REST route dispatch.
//!
//! The gateway is transport-agnostic; this dispatcher maps the REST route
//! table onto it so an embedder (or an in-process test) can drive the whole
//! surface without mounting real HTTP.

use crate::error::ServerError;
use crate::gateway::SyncGateway;
use driftsync_protocol::{ProtocolError, SyncRecord};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// HTTP method of a dispatched request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// Read request.
    Get,
    /// Write request.
    Post,
}

/// A transport-agnostic REST request.
#[derive(Debug, Clone)]
pub struct RestRequest {
    /// The HTTP method.
    pub method: Method,
    /// Path with optional query string, e.g. `/sync/download?userId=u1&since=0`.
    pub target: String,
    /// JSON body, for POST requests.
    pub body: Option<Value>,
}

impl RestRequest {
    /// Creates a GET request.
    pub fn get(target: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            target: target.into(),
            body: None,
        }
    }

    /// Creates a POST request with a JSON body.
    pub fn post(target: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Post,
            target: target.into(),
            body: Some(body),
        }
    }
}

/// Status code plus JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct RestResponse {
    /// HTTP status code.
    pub status: u16,
    /// JSON response body.
    pub body: Value,
}

impl RestResponse {
    fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    fn from_error(error: &ServerError) -> Self {
        let body = match error {
            ServerError::Conflict {
                conflict_id,
                remote,
                ..
            } => json!({
                "error": error.to_string(),
                "conflictId": conflict_id,
                "remoteData": remote.to_value(),
            }),
            other => json!({"error": other.to_string()}),
        };
        Self {
            status: error.status_code(),
            body,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResolveBody {
    user_id: String,
    conflict_id: String,
    resolution: String,
    #[serde(default)]
    resolved_data: Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeviceBody {
    user_id: String,
    device_id: String,
    #[serde(default)]
    device_info: Value,
}

/// Routes REST requests onto the gateway.
pub struct RestDispatcher {
    gateway: Arc<SyncGateway>,
}

impl RestDispatcher {
    /// Creates a dispatcher over the given gateway.
    pub fn new(gateway: Arc<SyncGateway>) -> Self {
        Self { gateway }
    }

    /// Dispatches a request to the matching route.
    ///
    /// Unknown routes are 404; errors surface as their mapped status with a
    /// structured JSON body.
    pub fn dispatch(&self, request: &RestRequest) -> RestResponse {
        let (path, query) = split_target(&request.target);
        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();

        match (request.method, segments.as_slice()) {
            (Method::Post, ["sync", "upload"]) => self.upload(request.body.as_ref()),
            (Method::Get, ["sync", "download"]) => self.download(&query),
            (Method::Get, ["sync", "status", user_id]) => self.status(user_id),
            (Method::Post, ["sync", "resolve-conflict"]) => self.resolve(request.body.as_ref()),
            (Method::Get, ["sync", "devices", user_id]) => self.devices(user_id),
            (Method::Post, ["sync", "device"]) => self.upsert_device(request.body.as_ref()),
            _ => RestResponse {
                status: 404,
                body: json!({"error": "unknown route"}),
            },
        }
    }

    fn upload(&self, body: Option<&Value>) -> RestResponse {
        let record = match parse_body::<SyncRecord>(body) {
            Ok(record) => record,
            Err(response) => return response,
        };
        match self.gateway.upload(record) {
            Ok(ack) => RestResponse::ok(json!({"success": true, "timestamp": ack.timestamp})),
            Err(e) => RestResponse::from_error(&e),
        }
    }

    fn download(&self, query: &HashMap<String, String>) -> RestResponse {
        let user_id = query.get("userId").map(String::as_str).unwrap_or_default();
        let since = query
            .get("since")
            .and_then(|s| s.parse::<i64>().ok())
            .unwrap_or(0);
        let device = query.get("deviceId").map(String::as_str);

        match self.gateway.download(user_id, since, device) {
            Ok(records) => match serde_json::to_value(&records) {
                Ok(body) => RestResponse::ok(body),
                Err(e) => RestResponse::from_error(&ServerError::Internal(e.to_string())),
            },
            Err(e) => RestResponse::from_error(&e),
        }
    }

    fn status(&self, user_id: &str) -> RestResponse {
        match self.gateway.status(user_id) {
            Ok(summary) => match serde_json::to_value(&summary) {
                Ok(body) => RestResponse::ok(body),
                Err(e) => RestResponse::from_error(&ServerError::Internal(e.to_string())),
            },
            Err(e) => RestResponse::from_error(&e),
        }
    }

    fn resolve(&self, body: Option<&Value>) -> RestResponse {
        let resolve = match parse_body::<ResolveBody>(body) {
            Ok(resolve) => resolve,
            Err(response) => return response,
        };
        match self.gateway.resolve_conflict(
            &resolve.user_id,
            &resolve.conflict_id,
            &resolve.resolution,
            resolve.resolved_data,
        ) {
            Ok(()) => RestResponse::ok(json!({"success": true})),
            Err(e) => RestResponse::from_error(&e),
        }
    }

    fn devices(&self, user_id: &str) -> RestResponse {
        match self.gateway.devices(user_id) {
            Ok(devices) => match serde_json::to_value(&devices) {
                Ok(body) => RestResponse::ok(body),
                Err(e) => RestResponse::from_error(&ServerError::Internal(e.to_string())),
            },
            Err(e) => RestResponse::from_error(&e),
        }
    }

    fn upsert_device(&self, body: Option<&Value>) -> RestResponse {
        let device = match parse_body::<DeviceBody>(body) {
            Ok(device) => device,
            Err(response) => return response,
        };
        match self
            .gateway
            .upsert_device(&device.user_id, &device.device_id, device.device_info)
        {
            Ok(()) => RestResponse::ok(json!({"success": true})),
            Err(e) => RestResponse::from_error(&e),
        }
    }
}

fn parse_body<T: serde::de::DeserializeOwned>(body: Option<&Value>) -> Result<T, RestResponse> {
    let Some(body) = body else {
        return Err(RestResponse::from_error(&ServerError::Validation(
            "missing request body".into(),
        )));
    };
    serde_json::from_value(body.clone()).map_err(|e| {
        RestResponse::from_error(&ServerError::Protocol(ProtocolError::InvalidRecord(
            e.to_string(),
        )))
    })
}

fn split_target(target: &str) -> (&str, HashMap<String, String>) {
    match target.split_once('?') {
        Some((path, query)) => (path, parse_query(query)),
        None => (target, HashMap::new()),
    }
}

fn parse_query(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_parsing() {
        let (path, query) = split_target("/sync/download?userId=u1&since=100&deviceId=d1");
        assert_eq!(path, "/sync/download");
        assert_eq!(query.get("userId").unwrap(), "u1");
        assert_eq!(query.get("since").unwrap(), "100");
        assert_eq!(query.get("deviceId").unwrap(), "d1");

        let (path, query) = split_target("/sync/status/u1");
        assert_eq!(path, "/sync/status/u1");
        assert!(query.is_empty());
    }

    #[test]
    fn conflict_response_carries_remote_data() {
        use driftsync_testkit::record;

        let remote = record("u1", "r1").version(3).timestamp(100).build();
        let error = ServerError::Conflict {
            conflict_id: "c1".into(),
            record_id: "r1".into(),
            remote: Box::new(remote),
        };

        let response = RestResponse::from_error(&error);
        assert_eq!(response.status, 409);
        assert_eq!(response.body["conflictId"], "c1");
        assert_eq!(response.body["remoteData"]["version"], 3);
        assert_eq!(response.body["remoteData"]["timestamp"], 100);
    }
}
