//! Raw successful responses

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Error, Result};

/// A 2xx response, body fully read but not validated.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    status: u16,
    body: Bytes,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// The body as untyped JSON. An empty body (e.g. 204) is `Null`.
    pub fn json(&self) -> Result<Value> {
        if self.body.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&self.body)
            .map_err(|e| Error::Decode(format!("response body is not JSON: {e}")))
    }

    /// Decode the body into a caller-defined shape.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| Error::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct AppList {
        data: Vec<AppRef>,
    }

    #[derive(Debug, Deserialize)]
    struct AppRef {
        id: String,
    }

    #[test]
    fn empty_body_is_null_json() {
        let response = ApiResponse::new(204, Bytes::new());
        assert_eq!(response.json().unwrap(), Value::Null);
    }

    #[test]
    fn decode_into_caller_shape() {
        let response = ApiResponse::new(200, r#"{"data":[{"type":"apps","id":"123"}]}"#);
        let list: AppList = response.decode().unwrap();
        assert_eq!(list.data.len(), 1);
        assert_eq!(list.data[0].id, "123");
    }

    #[test]
    fn shape_mismatch_is_decode_error() {
        let response = ApiResponse::new(200, r#"{"data":{"id":"123"}}"#);
        let result: Result<AppList> = response.decode();
        assert!(matches!(result, Err(Error::Decode(_))));
    }

    #[test]
    fn non_json_is_decode_error() {
        let response = ApiResponse::new(200, "plain text");
        assert!(matches!(response.json(), Err(Error::Decode(_))));
    }
}
