use std::future::IntoFuture;
use std::net::SocketAddr;

use axum::Router;
use url::Url;

use auth_broker::config::{AppState, Config};
use auth_broker::models::Client;
use auth_broker::repositories::Repositories;
use auth_broker::{admin_router, oauth2_router};

pub const CLIENT_ID: &str = "test";
pub const CLIENT_SECRET: &str = "test-secret";
pub const CLIENT_REDIRECT_URI: &str = "https://client.example/callback";
pub const IDENTITY_PROVIDER_URL: &str = "http://localhost:8888/auth";
pub const CONSENT_PROVIDER_URL: &str = "http://localhost:8888/consent";

/// Both routers on ephemeral listeners, backed by in-memory repositories
/// the tests can inspect directly.
pub struct TestServer {
    pub oauth2_url: String,
    pub admin_url: String,
    pub repositories: Repositories,
    client: reqwest::Client,
}

impl TestServer {
    pub async fn start() -> Self {
        let config = Config {
            database_url: String::new(),
            oauth2_addr: String::new(),
            admin_addr: String::new(),
            identity_provider_url: Url::parse(IDENTITY_PROVIDER_URL).unwrap(),
            consent_provider_url: Url::parse(CONSENT_PROVIDER_URL).unwrap(),
            secure_cookies: false,
            access_token_ttl_secs: 900,
            authorization_code_ttl_secs: 600,
            shutdown_grace_secs: 60,
            seed_client_id: CLIENT_ID.to_string(),
            seed_client_secret: CLIENT_SECRET.to_string(),
            seed_client_redirect_uri: CLIENT_REDIRECT_URI.to_string(),
        };

        let repositories = Repositories::in_memory();
        repositories
            .clients
            .upsert(&Client::new(
                CLIENT_ID.to_string(),
                bcrypt::hash(CLIENT_SECRET, 4).unwrap(),
                CLIENT_REDIRECT_URI.to_string(),
            ))
            .await
            .unwrap();

        let state = AppState::new(config, repositories.clone());
        let oauth2_url = spawn(oauth2_router(state.clone())).await;
        let admin_url = spawn(admin_router(state)).await;

        // the tests follow the redirect chain by hand
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap();

        Self {
            oauth2_url,
            admin_url,
            repositories,
            client,
        }
    }

    /// GET an absolute URL against the oauth2 surface, optionally with
    /// the `r` cookie and a `Referer`.
    pub async fn get(
        &self,
        url: &str,
        cookie: Option<&str>,
        referer: Option<&str>,
    ) -> reqwest::Response {
        let mut request = self.client.get(url);
        if let Some(cookie) = cookie {
            request = request.header("Cookie", format!("r={cookie}"));
        }
        if let Some(referer) = referer {
            request = request.header("Referer", referer);
        }
        request.send().await.unwrap()
    }

    pub async fn authorize(&self, query: &str) -> reqwest::Response {
        self.get(&format!("{}/authorize?{query}", self.oauth2_url), None, None)
            .await
    }

    /// Call an admin RPC method and decode the JSON response body.
    pub async fn rpc(&self, method: &str, body: serde_json::Value) -> serde_json::Value {
        let response = self
            .client
            .post(format!("{}/api/{method}", self.admin_url))
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        response.json().await.unwrap()
    }

    /// Exchange form-encoded parameters at the token endpoint.
    pub async fn token(&self, params: &[(&str, &str)]) -> reqwest::Response {
        self.client
            .post(format!("{}/token", self.oauth2_url))
            .form(params)
            .send()
            .await
            .unwrap()
    }

    pub async fn get_admin(&self, path: &str) -> reqwest::Response {
        self.client
            .get(format!("{}{path}", self.admin_url))
            .send()
            .await
            .unwrap()
    }
}

async fn spawn(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(axum::serve(listener, router).into_future());
    format!("http://{addr}")
}

/// Value of the `r` cookie set by the response.
pub fn request_id_cookie(response: &reqwest::Response) -> String {
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .find_map(|value| {
            let raw = value.to_str().ok()?;
            Some(raw.strip_prefix("r=")?.split(';').next()?.to_string())
        })
        .expect("response sets the r cookie")
}

pub fn location(response: &reqwest::Response) -> String {
    response
        .headers()
        .get("location")
        .expect("response carries a Location header")
        .to_str()
        .unwrap()
        .to_string()
}

pub fn query_param(url: &str, key: &str) -> Option<String> {
    Url::parse(url)
        .unwrap()
        .query_pairs()
        .find(|(name, _)| name == key)
        .map(|(_, value)| value.into_owned())
}
