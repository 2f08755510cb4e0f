use crate::error::AppError;
use crate::ipc::error::{app_err, err};
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde::de::DeserializeOwned;
use std::path::PathBuf;

pub fn required_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.to_string())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

pub fn optional_str(req: &Request, key: &str) -> Option<String> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.to_string())
}

/// A non-blank filesystem path parameter such as `outPath` or `inPath`.
pub fn required_path(req: &Request, key: &str) -> Result<PathBuf, serde_json::Value> {
    match req.params.get(key).and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => Ok(PathBuf::from(v.trim())),
        _ => Err(err(&req.id, "bad_params", format!("missing {}", key), None)),
    }
}

pub fn db_conn<'a>(state: &'a AppState, req: &Request) -> Result<&'a Connection, serde_json::Value> {
    state
        .db
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

/// Decodes `params` (or `params[key]`) into a typed input.
pub fn decode<T: DeserializeOwned>(req: &Request, key: Option<&str>) -> Result<T, serde_json::Value> {
    let raw = match key {
        Some(k) => match req.params.get(k) {
            Some(v) => v.clone(),
            None => return Err(err(&req.id, "bad_params", format!("missing {}", k), None)),
        },
        None => req.params.clone(),
    };
    serde_json::from_value(raw).map_err(|e| err(&req.id, "bad_params", e.to_string(), None))
}

pub fn fail(req: &Request, e: AppError) -> serde_json::Value {
    app_err(&req.id, &req.method, e)
}
