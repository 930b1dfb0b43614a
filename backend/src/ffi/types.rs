//! JSON conversion helpers for the FFI boundary

use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::control::ControlError;

/// Parse a JSON payload, raising ValueError on malformed input
pub fn from_json<T: DeserializeOwned>(payload: &str, what: &str) -> PyResult<T> {
    serde_json::from_str(payload)
        .map_err(|e| PyValueError::new_err(format!("Invalid {} payload: {}", what, e)))
}

pub fn to_json<T: Serialize>(value: &T) -> PyResult<String> {
    serde_json::to_string(value).map_err(|e| PyRuntimeError::new_err(e.to_string()))
}

/// ValueError whose message is the serialized error body
pub fn control_err(err: ControlError) -> PyErr {
    let body = err.body();
    match serde_json::to_string(&body) {
        Ok(json) => PyValueError::new_err(json),
        Err(_) => PyValueError::new_err(body.message),
    }
}
