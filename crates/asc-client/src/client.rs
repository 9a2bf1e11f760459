//! Request pipeline
//!
//! Each `send` mints a token, issues exactly one HTTP request and turns the
//! answer into either a raw `ApiResponse` or a typed error. Token minting
//! failures abort before anything touches the network.

use std::sync::Arc;
use std::time::Instant;

use asc_auth::{API_BASE_URL, CredentialStore, TokenMinter};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use tracing::{debug, instrument, warn};

use crate::error::{ApiError, Error, Result};
use crate::request::ApiRequest;
use crate::response::ApiResponse;

/// App Store Connect client bound to one credential store.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    minter: TokenMinter,
}

impl ApiClient {
    /// Client for the production API.
    pub fn new(http: reqwest::Client, store: Arc<dyn CredentialStore>) -> Self {
        Self {
            http,
            base_url: API_BASE_URL.to_string(),
            minter: TokenMinter::new(store),
        }
    }

    /// Point the client at a different base URL (mock servers, proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn credential_store(&self) -> &Arc<dyn CredentialStore> {
        self.minter.store()
    }

    /// Send one request.
    ///
    /// Non-2xx responses become `Error::Api`; network failures become
    /// `Error::Transport`. Nothing is retried.
    #[instrument(skip_all, fields(method = %request.method, path = %request.path))]
    pub async fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let result = self.dispatch(request).await;
        if let Err(e) = &result {
            crate::metrics::record_error(e.kind());
        }
        result
    }

    async fn dispatch(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let token = self.minter.mint().await?;

        let mut builder = self
            .http
            .request(request.method.to_reqwest(), self.url_for(&request.path))
            .header(AUTHORIZATION, token.authorization())
            .header(CONTENT_TYPE, "application/json");
        if let Some(body) = request.wire_body() {
            let bytes = serde_json::to_vec(body)
                .map_err(|e| Error::Decode(format!("serializing request body: {e}")))?;
            builder = builder.body(bytes);
        }

        let started = Instant::now();
        let response = builder
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Transport(format!("reading response body: {e}")))?;
        crate::metrics::record_request(
            request.method.as_str(),
            status,
            started.elapsed().as_secs_f64(),
        );

        if !(200..300).contains(&status) {
            let err = ApiError::from_body(status, &body);
            warn!(status, title = %err.title, detail = %err.detail, "request rejected");
            return Err(err.into());
        }

        debug!(status, bytes = body.len(), "request succeeded");
        Ok(ApiResponse::new(status, body))
    }

    pub(crate) fn url_for(&self, path: &str) -> String {
        let path = path.trim();
        if path.is_empty() || path.starts_with('/') || path.starts_with('?') {
            format!("{}{path}", self.base_url)
        } else {
            format!("{}/{path}", self.base_url)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use asc_auth::MemoryCredentialStore;
    use asc_auth::testutil::{TEST_PUBLIC_KEY_PEM, signed_in_store};
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> ApiClient {
        ApiClient::new(reqwest::Client::new(), signed_in_store("AK1", "IS1"))
            .with_base_url(format!("{}/v1", server.uri()))
    }

    #[tokio::test]
    async fn get_sends_bearer_token_and_no_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/apps"))
            .and(header("content-type", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
            .expect(1)
            .mount(&server)
            .await;

        let request = ApiRequest::get("/apps").with_body(json!({"ignored": true}));
        let response = client_for(&server).send(&request).await.unwrap();
        assert_eq!(response.status(), 200);

        let received = server.received_requests().await.unwrap();
        assert_eq!(received.len(), 1);
        assert!(received[0].body.is_empty(), "GET must not carry a body");

        let auth = received[0]
            .headers
            .get("authorization")
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        let jwt = auth.strip_prefix("Bearer ").expect("bearer scheme");
        let header = jsonwebtoken::decode_header(jwt).unwrap();
        assert_eq!(header.kid.as_deref(), Some("AK1"));

        let key = jsonwebtoken::DecodingKey::from_ec_pem(TEST_PUBLIC_KEY_PEM.as_bytes()).unwrap();
        let mut validation = jsonwebtoken::Validation::new(jsonwebtoken::Algorithm::ES256);
        validation.set_audience(&["appstoreconnect-v1"]);
        let claims = jsonwebtoken::decode::<asc_auth::Claims>(jwt, &key, &validation).unwrap();
        assert_eq!(claims.claims.iss, "IS1");
    }

    #[tokio::test]
    async fn patch_sends_json_body() {
        let server = MockServer::start().await;
        let body = json!({
            "data": {
                "type": "builds",
                "id": "b1",
                "attributes": {"expired": true}
            }
        });
        Mock::given(method("PATCH"))
            .and(path("/v1/builds/b1"))
            .and(body_json(body.clone()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"id": "b1"}})))
            .expect(1)
            .mount(&server)
            .await;

        let response = client_for(&server)
            .send(&ApiRequest::patch("/builds/b1", body))
            .await
            .unwrap();
        assert_eq!(response.json().unwrap()["data"]["id"], "b1");
    }

    #[tokio::test]
    async fn delete_with_no_content() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/v1/betaGroups/g1"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let response = client_for(&server)
            .send(&ApiRequest::delete("/betaGroups/g1"))
            .await
            .unwrap();
        assert_eq!(response.status(), 204);
        assert_eq!(response.json().unwrap(), serde_json::Value::Null);
    }

    #[tokio::test]
    async fn error_envelope_first_element_is_raised() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/betaGroups/g1/relationships/builds"))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({
                "errors": [
                    {"status": "409", "title": "Conflict", "detail": "Build already added"},
                    {"status": "409", "title": "Other", "detail": "Ignored"}
                ]
            })))
            .mount(&server)
            .await;

        let request = ApiRequest::post(
            "/betaGroups/g1/relationships/builds",
            json!({"data": [{"type": "builds", "id": "b1"}]}),
        );
        let err = client_for(&server).send(&request).await.unwrap_err();
        match err {
            Error::Api(api) => {
                assert_eq!(api.status, 409);
                assert_eq!(api.title, "Conflict");
                assert_eq!(api.detail, "Build already added");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn server_error_without_envelope_uses_fallback() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/users"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({})))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .send(&ApiRequest::get("/users"))
            .await
            .unwrap_err();
        match err {
            Error::Api(api) => {
                assert_eq!(api.title, "Oh no!");
                assert_eq!(api.detail, "Something went wrong, error code: 500");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unparseable_error_body_embeds_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/apps"))
            .respond_with(ResponseTemplate::new(422).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .send(&ApiRequest::get("/apps"))
            .await
            .unwrap_err();
        match err {
            Error::Api(api) => assert!(api.detail.contains("422"), "got: {}", api.detail),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_credentials_sends_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let store = Arc::new(MemoryCredentialStore::partial(Some("AK1"), None, Some("a2V5")));
        let client = ApiClient::new(reqwest::Client::new(), store)
            .with_base_url(format!("{}/v1", server.uri()));

        let err = client.send(&ApiRequest::get("/apps")).await.unwrap_err();
        assert!(matches!(err, Error::MissingCredentials));
        assert_eq!(server.received_requests().await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn malformed_key_is_signing_failure_before_any_request() {
        let server = MockServer::start().await;
        let store = Arc::new(MemoryCredentialStore::with_credentials(
            asc_auth::Credentials::new("AK1", "IS1", "bm90IGEga2V5"),
        ));
        let client = ApiClient::new(reqwest::Client::new(), store)
            .with_base_url(format!("{}/v1", server.uri()));

        let err = client.send(&ApiRequest::get("/apps")).await.unwrap_err();
        assert!(matches!(err, Error::SigningFailure(_)));
        assert_eq!(server.received_requests().await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn unreachable_host_is_transport_failure() {
        let client = ApiClient::new(reqwest::Client::new(), signed_in_store("AK1", "IS1"))
            .with_base_url("http://127.0.0.1:1/v1");

        let err = client.send(&ApiRequest::get("/apps")).await.unwrap_err();
        assert!(matches!(err, Error::Transport(_)), "got: {err:?}");
    }

    #[test]
    fn url_joining() {
        let client = ApiClient::new(reqwest::Client::new(), signed_in_store("AK1", "IS1"))
            .with_base_url("https://example.test/v1/");
        assert_eq!(client.base_url(), "https://example.test/v1");
        assert_eq!(client.url_for("/apps"), "https://example.test/v1/apps");
        assert_eq!(client.url_for("apps"), "https://example.test/v1/apps");
        assert_eq!(
            client.url_for("/betaGroups/g1/relationships/builds "),
            "https://example.test/v1/betaGroups/g1/relationships/builds"
        );
    }

    #[test]
    fn defaults_to_production_base_url() {
        let client = ApiClient::new(reqwest::Client::new(), signed_in_store("AK1", "IS1"));
        assert_eq!(client.base_url(), "https://api.appstoreconnect.apple.com/v1");
    }
}
