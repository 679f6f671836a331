//! # HTTP Backend
//!
//! REST client for the store backend.
//!
//! ## Request Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  HttpBackend                                                            │
//! │    │  cookie jar: session cookie (preloaded or Set-Cookie), csrftoken   │
//! │    │                                                                    │
//! │    ├─ GET  ──────────────────────────────► api/v1/me/ | product/ | cart/│
//! │    │                                                                    │
//! │    └─ POST + "X-CSRFToken: <csrftoken>" ─► api/v1/cart/save/            │
//! │                                            api/v1/transaction/          │
//! │                                                                         │
//! │  Response mapping                                                       │
//! │    2xx            → Ok                                                  │
//! │    3xx            → Unauthorized (login redirect; redirects not followed│
//! │    401 / 403      → Unauthorized                                        │
//! │    other          → Rejected { status, error | detail | message }       │
//! │    send failure   → Transport / Timeout                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

use scanpay_core::{LineItem, Product, Role, Session, TransactionId};

use crate::backend::{Backend, TransactionRequest};
use crate::config::BackendConfig;
use crate::error::{BackendError, BackendResult, SyncError, SyncResult};

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionPayload {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    is_admin: bool,
}

impl From<SessionPayload> for Session {
    fn from(payload: SessionPayload) -> Self {
        let role = Role::parse(payload.role.as_deref().unwrap_or_default(), payload.is_admin);
        let user = payload.name.or(payload.username).unwrap_or_default();
        Session::new(user, role)
    }
}

/// DRF list endpoints answer a bare array, or `{results}` when paginated.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CatalogPayload {
    List(Vec<Product>),
    Page { results: Vec<Product> },
}

#[derive(Debug, Deserialize)]
struct DraftPayload {
    #[serde(default)]
    items: Option<Vec<LineItem>>,
}

#[derive(Debug, serde::Serialize)]
struct DraftBody<'a> {
    items: &'a [LineItem],
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum IdValue {
    Text(String),
    Number(i64),
}

#[derive(Debug, Deserialize)]
struct TransactionPayload {
    #[serde(default, rename = "transactionId", alias = "cart", alias = "id")]
    transaction_id: Option<IdValue>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    error: Option<String>,
    detail: Option<String>,
    message: Option<String>,
}

// =============================================================================
// Endpoints
// =============================================================================

#[derive(Debug, Clone)]
struct Endpoints {
    me: Url,
    products: Url,
    draft: Url,
    draft_save: Url,
    transaction: Url,
}

impl Endpoints {
    fn new(base: &Url) -> SyncResult<Self> {
        Ok(Endpoints {
            me: base.join("api/v1/me/")?,
            products: base.join("api/v1/product/")?,
            draft: base.join("api/v1/cart/")?,
            draft_save: base.join("api/v1/cart/save/")?,
            transaction: base.join("api/v1/transaction/")?,
        })
    }
}

// =============================================================================
// HTTP Backend
// =============================================================================

#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    jar: Arc<Jar>,
    base_url: Url,
    endpoints: Endpoints,
    csrf_cookie: String,
    csrf_header: String,
    csrf_token: Option<String>,
}

impl HttpBackend {
    pub fn new(config: &BackendConfig) -> SyncResult<Self> {
        config.validate()?;

        // Url::join drops the last segment unless the base ends in '/'
        let mut base = config.base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)?;

        let jar = Arc::new(Jar::default());
        if let Some(cookie) = &config.session_cookie {
            jar.add_cookie_str(cookie, &base_url);
        }

        let client = Client::builder()
            .cookie_provider(jar.clone())
            .redirect(reqwest::redirect::Policy::none())
            .timeout(config.request_timeout())
            .user_agent(concat!("scanpay-kiosk/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SyncError::ClientBuild(e.to_string()))?;

        info!(base_url = %base_url, "HTTP backend configured");

        Ok(HttpBackend {
            client,
            jar,
            endpoints: Endpoints::new(&base_url)?,
            base_url,
            csrf_cookie: config.csrf_cookie.clone(),
            csrf_header: config.csrf_header.clone(),
            csrf_token: config.csrf_token.clone(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Current anti-forgery token: the configured one, else the cookie.
    fn csrf_token(&self) -> Option<String> {
        if let Some(token) = &self.csrf_token {
            return Some(token.clone());
        }

        let header = self.jar.cookies(&self.base_url)?;
        let header = header.to_str().ok()?;
        extract_cookie(header, &self.csrf_cookie)
    }

    /// Adds the anti-forgery header to a mutating request.
    fn with_csrf(&self, request: RequestBuilder) -> RequestBuilder {
        match self.csrf_token() {
            Some(token) => request.header(self.csrf_header.as_str(), token),
            None => {
                warn!("No CSRF token available; mutating request may be rejected");
                request
            }
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &Url) -> BackendResult<T> {
        debug!(%url, "GET");
        let response = self.client.get(url.clone()).send().await?;
        let response = check_status(response).await?;
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn current_session(&self) -> BackendResult<Session> {
        debug!("Verifying session");
        let response = self.client.get(self.endpoints.me.clone()).send().await?;
        let response = check_status(response).await?;

        // An HTML login page with 200 means the session is gone
        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.contains("json"))
            .unwrap_or(false);
        if !is_json {
            return Err(BackendError::Unauthorized);
        }

        let payload: SessionPayload = response.json().await?;
        let session = Session::from(payload);
        debug!(user = %session.user, role = ?session.role, "Session verified");
        Ok(session)
    }

    async fn fetch_catalog(&self) -> BackendResult<Vec<Product>> {
        let payload: CatalogPayload = self.get_json(&self.endpoints.products).await?;
        let products = match payload {
            CatalogPayload::List(products) => products,
            CatalogPayload::Page { results } => results,
        };
        debug!(count = products.len(), "Catalog fetched");
        Ok(products)
    }

    async fn fetch_draft(&self) -> BackendResult<Vec<LineItem>> {
        let payload: DraftPayload = self.get_json(&self.endpoints.draft).await?;
        Ok(payload.items.unwrap_or_default())
    }

    async fn save_draft(&self, items: &[LineItem]) -> BackendResult<()> {
        debug!(items = items.len(), "Saving cart draft");
        let request = self
            .client
            .post(self.endpoints.draft_save.clone())
            .json(&DraftBody { items });
        let response = self.with_csrf(request).send().await?;
        check_status(response).await?;
        Ok(())
    }

    async fn submit_transaction(&self, request: &TransactionRequest) -> BackendResult<TransactionId> {
        info!(items = request.items.len(), total = %request.total, "Submitting transaction");
        let builder = self.client.post(self.endpoints.transaction.clone()).json(request);
        let response = self.with_csrf(builder).send().await?;
        let response = check_status(response).await?;

        let payload: TransactionPayload = response.json().await?;
        match payload.transaction_id {
            Some(IdValue::Text(id)) if !id.is_empty() => Ok(TransactionId(id)),
            Some(IdValue::Number(id)) => Ok(TransactionId(id.to_string())),
            _ => Err(BackendError::Decode(
                "transaction response did not include an id".to_string(),
            )),
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Maps non-success statuses to `BackendError`.
async fn check_status(response: Response) -> BackendResult<Response> {
    let status = response.status();

    if status.is_success() {
        return Ok(response);
    }

    if status.is_redirection()
        || status == StatusCode::UNAUTHORIZED
        || status == StatusCode::FORBIDDEN
    {
        debug!(%status, "Backend reports missing or invalid session");
        return Err(BackendError::Unauthorized);
    }

    let body = response.text().await.unwrap_or_default();
    let parsed: ErrorBody = serde_json::from_str(&body).unwrap_or_default();
    let message = parsed
        .error
        .or(parsed.detail)
        .or(parsed.message)
        .filter(|m| !m.trim().is_empty());

    warn!(%status, ?message, "Backend rejected request");
    Err(BackendError::Rejected {
        status: status.as_u16(),
        message,
    })
}

/// Finds `name` in a `Cookie:` header value (`a=1; csrftoken=xyz`).
fn extract_cookie(header: &str, name: &str) -> Option<String> {
    header.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name && !value.is_empty()).then(|| value.to_string())
    })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use scanpay_core::{Money, PaymentMethod, ProductId};
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> BackendConfig {
        BackendConfig {
            base_url: server.uri(),
            ..Default::default()
        }
    }

    fn widget_line(qty: u32) -> LineItem {
        LineItem {
            id: ProductId(1),
            sku: "A1".into(),
            name: "Widget".into(),
            price: Money::from_minor(100),
            qty,
        }
    }

    #[test]
    fn test_extract_cookie() {
        assert_eq!(
            extract_cookie("sessionid=s1; csrftoken=abc", "csrftoken"),
            Some("abc".to_string())
        );
        assert_eq!(extract_cookie("sessionid=s1", "csrftoken"), None);
        assert_eq!(extract_cookie("csrftoken=", "csrftoken"), None);
    }

    #[tokio::test]
    async fn test_current_session_parses_role() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/me/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "username": "sana",
                "role": "Security Staff",
                "isAdmin": false
            })))
            .mount(&server)
            .await;

        let backend = HttpBackend::new(&config_for(&server)).unwrap();
        let session = backend.current_session().await.unwrap();

        assert_eq!(session.user, "sana");
        assert_eq!(session.role, Role::SecurityStaff);
        assert!(session.can_checkout());
    }

    #[tokio::test]
    async fn test_current_session_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/me/"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "detail": "Authentication credentials were not provided."
            })))
            .mount(&server)
            .await;

        let backend = HttpBackend::new(&config_for(&server)).unwrap();
        assert_eq!(
            backend.current_session().await.unwrap_err(),
            BackendError::Unauthorized
        );
    }

    #[tokio::test]
    async fn test_login_redirect_is_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/me/"))
            .respond_with(ResponseTemplate::new(302).insert_header("location", "/login/"))
            .mount(&server)
            .await;

        let backend = HttpBackend::new(&config_for(&server)).unwrap();
        assert_eq!(
            backend.current_session().await.unwrap_err(),
            BackendError::Unauthorized
        );
    }

    #[tokio::test]
    async fn test_fetch_catalog_list_and_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/product/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "count": 1,
                "results": [{"id": 1, "sku": "A1", "name": "Widget", "price": 100, "stock": 4}]
            })))
            .mount(&server)
            .await;

        let backend = HttpBackend::new(&config_for(&server)).unwrap();
        let products = backend.fetch_catalog().await.unwrap();

        assert_eq!(products.len(), 1);
        assert_eq!(products[0].sku, "A1");
        assert_eq!(products[0].price, Money::from_minor(100));
    }

    #[tokio::test]
    async fn test_fetch_draft_tolerates_missing_items() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/cart/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let backend = HttpBackend::new(&config_for(&server)).unwrap();
        assert!(backend.fetch_draft().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_draft_sends_configured_csrf_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/cart/save/"))
            .and(header("X-CSRFToken", "fixed-token"))
            .and(body_json(json!({"items": [{"id": 1, "sku": "A1", "name": "Widget", "price": 100, "qty": 2}]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let config = BackendConfig {
            csrf_token: Some("fixed-token".into()),
            ..config_for(&server)
        };
        let backend = HttpBackend::new(&config).unwrap();
        backend.save_draft(&[widget_line(2)]).await.unwrap();
    }

    #[tokio::test]
    async fn test_csrf_token_read_from_cookie() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/me/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("set-cookie", "csrftoken=from-cookie; Path=/")
                    .set_body_json(json!({"username": "admin", "role": "admin"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v1/transaction/"))
            .and(header("X-CSRFToken", "from-cookie"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"transactionId": "T-9"})))
            .expect(1)
            .mount(&server)
            .await;

        let backend = HttpBackend::new(&config_for(&server)).unwrap();
        backend.current_session().await.unwrap();

        let request = TransactionRequest {
            items: vec![widget_line(1)],
            payment_method: PaymentMethod::Cash,
            total: Money::from_minor(100),
        };
        let id = backend.submit_transaction(&request).await.unwrap();
        assert_eq!(id, TransactionId("T-9".into()));
    }

    #[tokio::test]
    async fn test_transaction_id_from_cart_field() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/transaction/"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"cart": 42})))
            .mount(&server)
            .await;

        let backend = HttpBackend::new(&config_for(&server)).unwrap();
        let request = TransactionRequest {
            items: vec![widget_line(1)],
            payment_method: PaymentMethod::Card,
            total: Money::from_minor(100),
        };
        assert_eq!(
            backend.submit_transaction(&request).await.unwrap(),
            TransactionId("42".into())
        );
    }

    #[tokio::test]
    async fn test_transaction_rejection_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/transaction/"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({"error": "Insufficient stock for Widget"})),
            )
            .mount(&server)
            .await;

        let backend = HttpBackend::new(&config_for(&server)).unwrap();
        let request = TransactionRequest {
            items: vec![widget_line(9)],
            payment_method: PaymentMethod::Cash,
            total: Money::from_minor(900),
        };

        assert_eq!(
            backend.submit_transaction(&request).await.unwrap_err(),
            BackendError::Rejected {
                status: 400,
                message: Some("Insufficient stock for Widget".into())
            }
        );
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transport_error() {
        let config = BackendConfig {
            base_url: "http://127.0.0.1:9/".into(),
            request_timeout_secs: 2,
            ..Default::default()
        };
        let backend = HttpBackend::new(&config).unwrap();
        let err = backend.fetch_catalog().await.unwrap_err();
        assert!(err.is_retryable());
    }
}
