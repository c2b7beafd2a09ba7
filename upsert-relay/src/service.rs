use crate::api::SaveResponse;
use crate::config::Config;
use crate::errors::{RelayError, ValidationError};
use crate::metrics_defs::REQUESTS_INFLIGHT;
use crate::model::SaveRequest;
use crate::relay::Relay;
use http::header::{ALLOW, HeaderValue};
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::{Body, Bytes, Incoming};
use hyper::service::Service;
use hyper::{Method, Request, Response, StatusCode};
use shared::gauge;
use shared::http::{
    CORS_ALLOWED_METHODS, apply_cors_headers, full_body, json_response, make_boxed_error_response,
};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub type ServiceBody = BoxBody<Bytes, RelayError>;

/// HTTP front of the relay: `POST` saves, `OPTIONS` answers CORS preflights.
///
/// Every response from this listener carries the cross-origin headers so
/// that the widget can read failures as well as successes.
#[derive(Clone)]
pub struct SaveService {
    relay: Arc<Relay>,
    save_path: Arc<str>,
    max_body_bytes: usize,
}

impl SaveService {
    pub fn new(relay: Arc<Relay>, config: &Config) -> Self {
        SaveService {
            relay,
            save_path: config.save_path.as_str().into(),
            max_body_bytes: config.limits.max_body_bytes,
        }
    }

    pub async fn handle<B>(&self, req: Request<B>) -> Result<Response<ServiceBody>, RelayError>
    where
        B: Body + Send + 'static,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let mut response = if req.uri().path() != &*self.save_path {
            make_boxed_error_response(StatusCode::NOT_FOUND)
        } else {
            let method = req.method().clone();
            match method {
                Method::OPTIONS => Response::new(full_body(Bytes::new())),
                Method::POST => self.handle_save(req.into_body()).await?,
                _ => {
                    tracing::debug!(method = %method, "Rejected method");
                    let mut response = json(
                        StatusCode::METHOD_NOT_ALLOWED,
                        &SaveResponse::failure(
                            "Method not allowed",
                            format!("expected one of: {CORS_ALLOWED_METHODS}"),
                        ),
                    )?;
                    response
                        .headers_mut()
                        .insert(ALLOW, HeaderValue::from_static(CORS_ALLOWED_METHODS));
                    response
                }
            }
        };

        apply_cors_headers(response.headers_mut());
        Ok(response)
    }

    async fn handle_save<B>(&self, body: B) -> Result<Response<ServiceBody>, RelayError>
    where
        B: Body + Send + 'static,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let result = async {
            self.relay.rowset_url()?;
            let request = self.read_request(body).await?;
            self.relay.save(request).await
        }
        .await;

        match result {
            Ok(saved) => json(StatusCode::OK, &SaveResponse::saved(&saved)),
            Err(e) => json(e.http_status(), &SaveResponse::failed(&e)),
        }
    }

    async fn read_request<B>(&self, body: B) -> Result<SaveRequest, RelayError>
    where
        B: Body + Send + 'static,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let limit = self.max_body_bytes;
        let bytes = Limited::new(body, limit)
            .collect()
            .await
            .map_err(|e| {
                if e.downcast_ref::<LengthLimitError>().is_some() {
                    ValidationError::BodyTooLarge { limit }
                } else {
                    ValidationError::MalformedBody(e.to_string())
                }
            })?
            .to_bytes();

        Ok(serde_json::from_slice(&bytes)
            .map_err(|e| ValidationError::MalformedBody(e.to_string()))?)
    }
}

fn json(status: StatusCode, body: &SaveResponse) -> Result<Response<ServiceBody>, RelayError> {
    json_response(status, body).map_err(|e| RelayError::Internal(e.to_string()))
}

impl Service<Request<Incoming>> for SaveService {
    type Response = Response<ServiceBody>;
    type Error = RelayError;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let service = self.clone();
        Box::pin(async move {
            gauge!(REQUESTS_INFLIGHT).increment(1);
            let result = service.handle(req).await;
            gauge!(REQUESTS_INFLIGHT).decrement(1);
            result
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DataExtensionConfig, Limits, Listener};
    use chrono::{TimeZone, Utc};
    use credentials::{CredentialsConfig, HttpTokenExchange, ManualClock, TokenCache};
    use http::header::{ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_TYPE};
    use http_body_util::{Empty, Full};
    use url::Url;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base: Option<Url>) -> Config {
        Config {
            listener: Listener {
                host: "127.0.0.1".into(),
                port: 8080,
            },
            admin_listener: Listener {
                host: "127.0.0.1".into(),
                port: 8081,
            },
            credentials: CredentialsConfig {
                client_id: Some("client-id".into()),
                client_secret: Some("client-secret".into()),
                subdomain: Some("mc123".into()),
                account_id: None,
                auth_base_url: base.clone(),
                ..Default::default()
            },
            data_extension: DataExtensionConfig {
                external_key: Some("Email_Field_Entries".into()),
                rest_base_url: base,
            },
            limits: Limits {
                max_fields: 50,
                max_body_bytes: 1024,
            },
            save_path: "/save".into(),
            upstream_timeout_secs: 5,
        }
    }

    fn service(config: &Config) -> SaveService {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap(),
        ));
        let client = reqwest::Client::new();
        let exchange = HttpTokenExchange::new(client.clone(), config.credentials.clone());
        let tokens = Arc::new(TokenCache::new(Arc::new(exchange), clock.clone(), 60));
        let relay = Arc::new(Relay::new(config, tokens, clock, client));
        SaveService::new(relay, config)
    }

    fn post(path: &str, body: &str) -> Request<Full<Bytes>> {
        Request::builder()
            .method(Method::POST)
            .uri(path)
            .header(CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from(body.to_string())))
            .unwrap()
    }

    async fn read_json(response: Response<ServiceBody>) -> SaveResponse {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_preflight() {
        let service = service(&config(None));
        let req = Request::builder()
            .method(Method::OPTIONS)
            .uri("/save")
            .body(Empty::<Bytes>::new())
            .unwrap();

        let response = service.handle(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers.get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(), "*");
        assert_eq!(
            headers.get("access-control-allow-methods").unwrap(),
            "POST, OPTIONS"
        );
        assert_eq!(
            headers.get("access-control-allow-headers").unwrap(),
            "Content-Type"
        );
    }

    #[tokio::test]
    async fn test_wrong_method() {
        let service = service(&config(None));
        let req = Request::builder()
            .method(Method::GET)
            .uri("/save")
            .body(Empty::<Bytes>::new())
            .unwrap();

        let response = service.handle(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers().get(ALLOW).unwrap(), "POST, OPTIONS");
        assert!(response.headers().contains_key(ACCESS_CONTROL_ALLOW_ORIGIN));
        assert!(!read_json(response).await.success);
    }

    #[tokio::test]
    async fn test_unknown_path() {
        let service = service(&config(None));
        let response = service.handle(post("/other", "{}")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_validation_failures_are_400() {
        let service = service(&config(None));

        let duplicate = r#"{"emailName": "Welcome Email", "fields": [
            {"name": "subject", "value": "Hi"},
            {"name": "subject", "value": "Hi2"}
        ]}"#;
        let response = service.handle(post("/save", duplicate)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = read_json(response).await;
        assert!(!body.success);
        assert!(body.error.unwrap().contains("duplicate field name"));

        let response = service.handle(post("/save", "not json")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = service
            .handle(post("/save", r#"{"emailName": "Welcome Email", "fields": []}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_body_limit() {
        let service = service(&config(None));
        let big = format!(
            r#"{{"emailName": "Welcome Email", "fields": [{{"name": "body", "value": "{}"}}]}}"#,
            "x".repeat(2048)
        );

        let response = service.handle(post("/save", &big)).await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_missing_config_is_500() {
        let mut config = config(None);
        config.credentials.client_id = None;
        let service = service(&config);

        let response = service
            .handle(post(
                "/save",
                r#"{"emailName": "Welcome Email", "fields": [{"name": "subject", "value": "Hi"}]}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = read_json(response).await;
        assert_eq!(body.message.as_deref(), Some("Relay is not configured"));

        // An unconfigured relay answers the same for requests it would reject.
        let response = service
            .handle(post("/save", r#"{"emailName": "Welcome Email", "fields": []}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let response = service.handle(post("/save", "not json")).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_successful_save() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "tok-1",
                "expires_in": 1080,
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(
                "/hub/v1/dataevents/key:Email_Field_Entries/rowset",
            ))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let service = service(&config(Some(Url::parse(&server.uri()).unwrap())));
        let response = service
            .handle(post(
                "/save",
                r#"{"emailName": "Welcome Email", "fields": [{"name": "subject", "value": "Hi"}]}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(ACCESS_CONTROL_ALLOW_ORIGIN));
        let body = read_json(response).await;
        assert!(body.success);
        assert_eq!(body.rows_inserted, Some(1));
    }

    #[tokio::test]
    async fn test_upsert_failure_is_500() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "tok-1",
                "expires_in": 1080,
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(
                "/hub/v1/dataevents/key:Email_Field_Entries/rowset",
            ))
            .respond_with(ResponseTemplate::new(403).set_body_string("insufficient privileges"))
            .mount(&server)
            .await;

        let service = service(&config(Some(Url::parse(&server.uri()).unwrap())));
        let response = service
            .handle(post(
                "/save",
                r#"{"emailName": "Welcome Email", "fields": [{"name": "subject", "value": "Hi"}]}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = read_json(response).await;
        assert!(!body.success);
        let error = body.error.unwrap();
        assert!(error.contains("403"));
        assert!(error.contains("insufficient privileges"));
    }
}
