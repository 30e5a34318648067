//! Nacos v1 Open API transport over HTTP.

use super::{ConfigTransport, long_poll_read_timeout};
use crate::core::ListenKey;
use crate::error::{Result, WatchError};
use crate::settings::ClientSettings;
use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use std::time::Duration;

const CONFIG_ENDPOINT: &str = "/v1/cs/configs";
const LISTENER_ENDPOINT: &str = "/v1/cs/configs/listener";
const LISTENING_CONFIGS_PARAM: &str = "Listening-Configs";
const LONG_POLLING_TIMEOUT_HEADER: &str = "Long-Pulling-Timeout";
const APP_NAME_HEADER: &str = "Client-AppName";

/// Authentication method for HTTP requests.
#[derive(Clone)]
pub enum HttpAuth {
    /// No authentication
    None,
    /// Access token passed as the `accessToken` query parameter
    AccessToken(String),
    /// Basic authentication (username, password)
    Basic(String, String),
}

/// Optional metadata sent along with [`NacosHttpTransport::publish_config`].
#[derive(Debug, Clone, Default)]
pub struct PublishOptions {
    /// Content type such as `properties`, `yaml` or `json`.
    pub config_type: Option<String>,
    /// Tags, sent comma separated.
    pub tags: Vec<String>,
    /// Application owning the configuration.
    pub app_name: Option<String>,
    /// Free-form description.
    pub desc: Option<String>,
}

impl PublishOptions {
    /// Options carrying only a content type.
    pub fn typed(config_type: impl Into<String>) -> Self {
        Self {
            config_type: Some(config_type.into()),
            ..Self::default()
        }
    }

    /// Add a tag.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Set the owning application.
    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = Some(app_name.into());
        self
    }

    /// Set the description.
    pub fn with_desc(mut self, desc: impl Into<String>) -> Self {
        self.desc = Some(desc.into());
        self
    }
}

/// [`ConfigTransport`] speaking the Nacos v1 Open API.
///
/// Besides the read and long-poll calls the watch engine needs, it exposes
/// [`publish_config`](Self::publish_config) and
/// [`delete_config`](Self::delete_config).
///
/// # Examples
///
/// ```rust,no_run
/// use nacos_config_watch::transport::NacosHttpTransport;
/// use std::time::Duration;
///
/// # fn example() -> nacos_config_watch::error::Result<()> {
/// let transport = NacosHttpTransport::builder()
///     .with_server_addr("http://127.0.0.1:8848")
///     .with_basic_auth("nacos", "nacos")
///     .with_connect_timeout(Duration::from_secs(5))
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct NacosHttpTransport {
    base_url: String,
    client: Client,
    auth: HttpAuth,
    app_name: String,
}

impl NacosHttpTransport {
    /// Create a new builder for constructing an HTTP transport.
    pub fn builder() -> NacosHttpTransportBuilder {
        NacosHttpTransportBuilder::new()
    }

    /// Build a transport from loaded client settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn from_settings(settings: &ClientSettings) -> Result<Self> {
        let mut builder = Self::builder()
            .with_server_addr(&settings.server_addr)
            .with_context_path(&settings.context_path)
            .with_app_name(&settings.app_name)
            .with_connect_timeout(settings.connection_timeout())
            .with_read_timeout(settings.read_timeout());

        if let Some(token) = &settings.access_token {
            builder = builder.with_access_token(token);
        } else if let (Some(username), Some(password)) = (&settings.username, &settings.password) {
            builder = builder.with_basic_auth(username, password);
        }

        builder.build()
    }

    /// Base URL requests are issued against, e.g. `http://127.0.0.1:8848/nacos`.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Publish `content` under `key`, creating or replacing it.
    ///
    /// Optional metadata (content type, tags, owning application,
    /// description) travels in `options`. Returns the server's verdict.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server answers with a
    /// non-success status.
    pub async fn publish_config(
        &self,
        key: &ListenKey,
        content: &str,
        options: &PublishOptions,
    ) -> Result<bool> {
        let tags = options.tags.join(",");
        let mut params = key_params(key);
        params.push(("content", content));
        if let Some(config_type) = options.config_type.as_deref() {
            params.push(("type", config_type));
        }
        if let Some(app_name) = options.app_name.as_deref() {
            params.push(("appName", app_name));
        }
        if let Some(desc) = options.desc.as_deref() {
            params.push(("desc", desc));
        }
        if !tags.is_empty() {
            params.push(("config_tags", tags.as_str()));
        }

        let response = self
            .request(Method::POST, CONFIG_ENDPOINT)
            .form(&params)
            .send()
            .await
            .map_err(transport_error)?;

        read_boolean(response).await
    }

    /// Delete the configuration stored under `key`. Returns the server's verdict.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server answers with a
    /// non-success status.
    pub async fn delete_config(&self, key: &ListenKey) -> Result<bool> {
        let response = self
            .request(Method::DELETE, CONFIG_ENDPOINT)
            .query(&key_params(key))
            .send()
            .await
            .map_err(transport_error)?;

        read_boolean(response).await
    }

    fn request(&self, method: Method, endpoint: &str) -> RequestBuilder {
        let request = self
            .client
            .request(method, format!("{}{}", self.base_url, endpoint))
            .header(APP_NAME_HEADER, &self.app_name);

        match &self.auth {
            HttpAuth::None => request,
            HttpAuth::AccessToken(token) => request.query(&[("accessToken", token)]),
            HttpAuth::Basic(username, password) => request.basic_auth(username, Some(password)),
        }
    }
}

#[async_trait]
impl ConfigTransport for NacosHttpTransport {
    async fn fetch_content(&self, key: &ListenKey) -> Result<String> {
        let response = self
            .request(Method::GET, CONFIG_ENDPOINT)
            .query(&key_params(key))
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(WatchError::NotFound(key.to_string()));
        }
        if !status.is_success() {
            return Err(status_error(status));
        }

        response.text().await.map_err(transport_error)
    }

    async fn long_poll(&self, listening_configs: &str, timeout: Duration) -> Result<String> {
        let timeout_ms = timeout.as_millis() as u64;
        let body = format!(
            "{}={}",
            LISTENING_CONFIGS_PARAM,
            urlencoding::encode(listening_configs)
        );

        let classify = move |e: reqwest::Error| {
            if e.is_timeout() {
                WatchError::Timeout(timeout_ms)
            } else {
                transport_error(e)
            }
        };

        let response = self
            .request(Method::POST, LISTENER_ENDPOINT)
            .header(LONG_POLLING_TIMEOUT_HEADER, timeout_ms.to_string())
            .header(
                CONTENT_TYPE,
                HeaderValue::from_static("application/x-www-form-urlencoded;charset=UTF-8"),
            )
            .timeout(long_poll_read_timeout(timeout))
            .body(body)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status));
        }

        response.text().await.map_err(classify)
    }
}

/// Builder for constructing a [`NacosHttpTransport`].
pub struct NacosHttpTransportBuilder {
    server_addr: Option<String>,
    context_path: String,
    app_name: String,
    auth: HttpAuth,
    connect_timeout: Duration,
    read_timeout: Duration,
}

impl NacosHttpTransportBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        let defaults = ClientSettings::default();
        Self {
            server_addr: None,
            context_path: defaults.context_path.clone(),
            app_name: defaults.app_name.clone(),
            auth: HttpAuth::None,
            connect_timeout: defaults.connection_timeout(),
            read_timeout: defaults.read_timeout(),
        }
    }

    /// Set the server address, e.g. `http://127.0.0.1:8848`.
    pub fn with_server_addr(mut self, addr: impl Into<String>) -> Self {
        self.server_addr = Some(addr.into());
        self
    }

    /// Set the context path the Open API is mounted under. Default is `/nacos`.
    pub fn with_context_path(mut self, path: impl Into<String>) -> Self {
        self.context_path = path.into();
        self
    }

    /// Set the application name reported to the server.
    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = app_name.into();
        self
    }

    /// Authenticate with an access token.
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.auth = HttpAuth::AccessToken(token.into());
        self
    }

    /// Set Basic authentication.
    pub fn with_basic_auth(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.auth = HttpAuth::Basic(username.into(), password.into());
        self
    }

    /// Set the connection timeout. Default is 60 seconds.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the read timeout for ordinary requests. Default is 3 minutes.
    ///
    /// Long-poll requests derive their own deadline from the long-polling timeout.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Build the HTTP transport.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No server address is provided
    /// - The HTTP client cannot be constructed
    pub fn build(self) -> Result<NacosHttpTransport> {
        let server_addr = self.server_addr.ok_or_else(|| {
            WatchError::Settings("server address is required for NacosHttpTransport".to_string())
        })?;

        let client = Client::builder()
            .connect_timeout(self.connect_timeout)
            .timeout(self.read_timeout)
            .build()
            .map_err(|e| WatchError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(NacosHttpTransport {
            base_url: join_base_url(&server_addr, &self.context_path),
            client,
            auth: self.auth,
            app_name: self.app_name,
        })
    }
}

impl Default for NacosHttpTransportBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn key_params(key: &ListenKey) -> Vec<(&'static str, &str)> {
    let mut params = vec![("dataId", key.data_id()), ("group", key.group())];
    if !key.is_default_namespace() {
        params.push(("tenant", key.namespace_id()));
    }
    params
}

fn join_base_url(server_addr: &str, context_path: &str) -> String {
    let server_addr = server_addr.trim_end_matches('/');
    let context_path = context_path.trim_matches('/');
    if context_path.is_empty() {
        server_addr.to_string()
    } else {
        format!("{}/{}", server_addr, context_path)
    }
}

async fn read_boolean(response: reqwest::Response) -> Result<bool> {
    let status = response.status();
    if !status.is_success() {
        return Err(status_error(status));
    }
    let text = response.text().await.map_err(transport_error)?;
    Ok(text.trim().eq_ignore_ascii_case("true"))
}

fn transport_error(e: reqwest::Error) -> WatchError {
    WatchError::Transport(format!("HTTP request failed: {}", e))
}

fn status_error(status: StatusCode) -> WatchError {
    WatchError::Transport(format!(
        "HTTP request failed with status {}: {}",
        status,
        status.canonical_reason().unwrap_or("Unknown")
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Fingerprint;
    use std::collections::HashMap;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::mpsc;

    /// A request as it arrived on the wire.
    #[derive(Debug)]
    struct Recorded {
        request_line: String,
        headers: HashMap<String, String>,
        body: String,
    }

    /// A reply the stub server sends back.
    struct Canned {
        status: u16,
        body: &'static str,
        delay: Duration,
    }

    impl Canned {
        fn reply(status: u16, body: &'static str) -> Self {
            Self {
                status,
                body,
                delay: Duration::ZERO,
            }
        }

        fn after(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }
    }

    async fn read_request(stream: &mut TcpStream) -> Recorded {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        let header_end = loop {
            let n = stream.read(&mut chunk).await.unwrap();
            assert!(n > 0, "connection closed before the request head");
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };

        let head = String::from_utf8_lossy(&buf[..header_end]).into_owned();
        let mut lines = head.split("\r\n");
        let request_line = lines.next().unwrap_or_default().to_string();
        let headers: HashMap<String, String> = lines
            .filter_map(|line| line.split_once(':'))
            .map(|(name, value)| (name.trim().to_ascii_lowercase(), value.trim().to_string()))
            .collect();

        let length: usize = headers
            .get("content-length")
            .map(|v| v.parse().unwrap())
            .unwrap_or(0);
        while buf.len() < header_end + length {
            let n = stream.read(&mut chunk).await.unwrap();
            assert!(n > 0, "connection closed before the request body");
            buf.extend_from_slice(&chunk[..n]);
        }

        Recorded {
            request_line,
            headers,
            body: String::from_utf8(buf[header_end..header_end + length].to_vec()).unwrap(),
        }
    }

    /// Serve `replies` one connection each and hand back what was received.
    async fn stub_server(
        replies: Vec<Canned>,
        configure: impl FnOnce(NacosHttpTransportBuilder) -> NacosHttpTransportBuilder,
    ) -> (NacosHttpTransport, mpsc::UnboundedReceiver<Recorded>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            for canned in replies {
                let (mut stream, _) = listener.accept().await.unwrap();
                let _ = tx.send(read_request(&mut stream).await);
                tokio::time::sleep(canned.delay).await;
                let response = format!(
                    "HTTP/1.1 {} Stub\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    canned.status,
                    canned.body.len(),
                    canned.body
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });

        let builder = NacosHttpTransport::builder()
            .with_server_addr(format!("http://{}", addr))
            .with_app_name("wire-test");
        (configure(builder).build().unwrap(), rx)
    }

    #[tokio::test]
    async fn test_fetch_content_request_and_reply() {
        let (transport, mut rx) = stub_server(vec![Canned::reply(200, "a=1")], |b| b).await;

        let key = ListenKey::new("", "", "app.properties").unwrap();
        assert_eq!(transport.fetch_content(&key).await.unwrap(), "a=1");

        let request = rx.recv().await.unwrap();
        assert_eq!(
            request.request_line,
            "GET /nacos/v1/cs/configs?dataId=app.properties&group=DEFAULT_GROUP HTTP/1.1"
        );
        assert_eq!(request.headers.get("client-appname").map(String::as_str), Some("wire-test"));
    }

    #[tokio::test]
    async fn test_fetch_content_sends_tenant_and_token() {
        let (transport, mut rx) = stub_server(vec![Canned::reply(200, "url: x")], |b| {
            b.with_access_token("tok123")
        })
        .await;

        let key = ListenKey::new("dev", "infra", "db.yaml").unwrap();
        transport.fetch_content(&key).await.unwrap();

        let request = rx.recv().await.unwrap();
        assert!(request.request_line.starts_with("GET /nacos/v1/cs/configs?"));
        assert!(request.request_line.contains("accessToken=tok123"));
        assert!(request.request_line.contains("dataId=db.yaml&group=infra&tenant=dev"));
    }

    #[tokio::test]
    async fn test_fetch_content_status_mapping() {
        let (transport, _rx) = stub_server(
            vec![
                Canned::reply(404, "config data not exist"),
                Canned::reply(500, "boom"),
            ],
            |b| b,
        )
        .await;

        let key = ListenKey::new("", "", "app.properties").unwrap();
        assert!(matches!(transport.fetch_content(&key).await, Err(WatchError::NotFound(_))));
        assert!(matches!(transport.fetch_content(&key).await, Err(WatchError::Transport(_))));
    }

    #[tokio::test]
    async fn test_long_poll_request_and_reply() {
        let (transport, mut rx) = stub_server(
            vec![Canned::reply(200, "app.properties%02DEFAULT_GROUP%01")],
            |b| b,
        )
        .await;

        let key = ListenKey::new("", "", "app.properties").unwrap();
        let fingerprint = Fingerprint::of("a=1");
        let mut token = String::new();
        key.write_token(&fingerprint, &mut token);

        let raw = transport
            .long_poll(&token, Duration::from_millis(30_000))
            .await
            .unwrap();
        assert_eq!(raw, "app.properties%02DEFAULT_GROUP%01");

        let request = rx.recv().await.unwrap();
        assert_eq!(request.request_line, "POST /nacos/v1/cs/configs/listener HTTP/1.1");
        assert_eq!(request.headers.get("long-pulling-timeout").map(String::as_str), Some("30000"));
        assert!(
            request.headers["content-type"].starts_with("application/x-www-form-urlencoded"),
            "{:?}",
            request.headers
        );
        assert_eq!(
            request.body,
            format!(
                "Listening-Configs=app.properties%02DEFAULT_GROUP%02{}%01",
                fingerprint.as_str()
            )
        );
    }

    #[tokio::test]
    async fn test_long_poll_deadline_exceeds_hold_time() {
        let hold = Duration::from_millis(400);
        let (transport, _rx) = stub_server(
            vec![
                Canned::reply(200, "").after(Duration::from_millis(450)),
                Canned::reply(200, "").after(Duration::from_secs(5)),
            ],
            |b| b,
        )
        .await;

        // A server answering just after the hold time is still heard.
        assert_eq!(transport.long_poll("token", hold).await.unwrap(), "");

        let started = tokio::time::Instant::now();
        let result = transport.long_poll("token", hold).await;
        assert!(matches!(result, Err(WatchError::Timeout(400))));
        assert!(started.elapsed() >= long_poll_read_timeout(hold));
    }

    #[tokio::test]
    async fn test_long_poll_error_status() {
        let (transport, _rx) = stub_server(vec![Canned::reply(403, "forbidden")], |b| b).await;
        let result = transport.long_poll("token", Duration::from_secs(1)).await;
        assert!(matches!(result, Err(WatchError::Transport(_))));
    }

    #[tokio::test]
    async fn test_publish_and_delete_replies() {
        let (transport, mut rx) = stub_server(
            vec![Canned::reply(200, "true"), Canned::reply(200, "false")],
            |b| b,
        )
        .await;

        let key = ListenKey::new("", "", "app.properties").unwrap();
        let options = PublishOptions::typed("properties")
            .with_tag("web")
            .with_tag("blue")
            .with_app_name("shop")
            .with_desc("shop settings");
        assert!(transport.publish_config(&key, "a=1", &options).await.unwrap());
        let publish = rx.recv().await.unwrap();
        assert_eq!(publish.request_line, "POST /nacos/v1/cs/configs HTTP/1.1");
        assert_eq!(
            publish.body,
            "dataId=app.properties&group=DEFAULT_GROUP&content=a%3D1&type=properties\
             &appName=shop&desc=shop+settings&config_tags=web%2Cblue"
        );

        let key = ListenKey::new("dev", "infra", "db.yaml").unwrap();
        assert!(!transport.delete_config(&key).await.unwrap());
        let delete = rx.recv().await.unwrap();
        assert_eq!(
            delete.request_line,
            "DELETE /nacos/v1/cs/configs?dataId=db.yaml&group=infra&tenant=dev HTTP/1.1"
        );
    }

    #[test]
    fn test_builder() {
        let transport = NacosHttpTransport::builder()
            .with_server_addr("http://127.0.0.1:8848/")
            .with_access_token("token123")
            .with_connect_timeout(Duration::from_secs(5))
            .build()
            .unwrap();

        assert_eq!(transport.base_url(), "http://127.0.0.1:8848/nacos");
    }

    #[test]
    fn test_builder_no_server_addr() {
        let result = NacosHttpTransport::builder().build();
        assert!(matches!(result, Err(WatchError::Settings(_))));
    }

    #[test]
    fn test_from_settings_with_basic_auth() {
        let settings = ClientSettings {
            server_addr: "http://config.internal:8848".to_string(),
            context_path: String::new(),
            username: Some("nacos".to_string()),
            password: Some("nacos".to_string()),
            ..ClientSettings::default()
        };

        let transport = NacosHttpTransport::from_settings(&settings).unwrap();
        assert_eq!(transport.base_url(), "http://config.internal:8848");
        assert!(matches!(transport.auth, HttpAuth::Basic(_, _)));
    }

    #[test]
    fn test_key_params_omit_default_namespace() {
        let key = ListenKey::new("", "", "app.properties").unwrap();
        assert_eq!(
            key_params(&key),
            vec![("dataId", "app.properties"), ("group", "DEFAULT_GROUP")]
        );

        let key = ListenKey::new("dev", "infra", "db.yaml").unwrap();
        assert_eq!(
            key_params(&key),
            vec![("dataId", "db.yaml"), ("group", "infra"), ("tenant", "dev")]
        );
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transport_error() {
        let transport = NacosHttpTransport::builder()
            .with_server_addr("http://127.0.0.1:1")
            .with_connect_timeout(Duration::from_millis(200))
            .build()
            .unwrap();

        let key = ListenKey::new("", "", "app.properties").unwrap();
        let result = transport.fetch_content(&key).await;
        assert!(matches!(result, Err(WatchError::Transport(_))));
    }
}
