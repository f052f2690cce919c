//! Request-scope middleware for the OAuth 2.0 surface.
//!
//! Every inbound `/authorize` and `/token` request gets a freshly minted
//! request id, set as the `r` cookie on the response. The cookie the
//! browser presented carries the id of the previous hop, which is how a
//! footprint proves chain continuity. No other endpoint may touch this
//! cookie.

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use url::Url;

use crate::config::AppState;
use crate::models::RequestScope;
use crate::utils::secret::generate_token;

/// Cookie carrying the previous request id.
pub const REQUEST_ID_COOKIE: &str = "r";

pub async fn request_scope_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let request_id = generate_token();

    let previous_request_id =
        cookie_value(request.headers(), REQUEST_ID_COOKIE).unwrap_or_default();

    let referer = request
        .headers()
        .get(header::REFERER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let request_url = match absolute_request_url(state.config.secure_cookies, &request) {
        Ok(url) => url,
        Err(err) => {
            tracing::debug!(%err, "rejecting request with unparseable url");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    request.extensions_mut().insert(RequestScope {
        request_id: request_id.clone(),
        previous_request_id,
        referer,
        request_url,
    });

    let mut response = next.run(request).await;

    let cookie = format!(
        "{REQUEST_ID_COOKIE}={request_id}; Path=/; HttpOnly; SameSite=Lax{}",
        if state.config.secure_cookies {
            "; Secure"
        } else {
            ""
        }
    );
    if let Ok(value) = HeaderValue::from_str(&cookie) {
        response.headers_mut().append(header::SET_COOKIE, value);
    }

    response
}

/// Rebuild the absolute URL of the inbound request from the Host header
/// and the request target.
fn absolute_request_url(secure: bool, request: &Request) -> Result<Url, url::ParseError> {
    let scheme = if secure { "https" } else { "http" };
    let host = request
        .headers()
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("localhost");
    let path_and_query = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    Url::parse(&format!("{scheme}://{host}{path_and_query}"))
}

fn cookie_value(headers: &header::HeaderMap, name: &str) -> Option<String> {
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name).then(|| value.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderMap;

    #[test]
    fn finds_the_request_id_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; r=abc123; lang=en"),
        );
        assert_eq!(
            cookie_value(&headers, REQUEST_ID_COOKIE),
            Some("abc123".to_string())
        );
    }

    #[test]
    fn missing_cookie_reads_as_none() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark"));
        assert_eq!(cookie_value(&headers, REQUEST_ID_COOKIE), None);
        assert_eq!(cookie_value(&HeaderMap::new(), REQUEST_ID_COOKIE), None);
    }

    #[test]
    fn rebuilds_the_absolute_url() {
        let request = Request::builder()
            .uri("/authorize?client_id=test")
            .header(header::HOST, "broker.local:9096")
            .body(axum::body::Body::empty())
            .unwrap();

        let url = absolute_request_url(false, &request).unwrap();
        assert_eq!(
            url.as_str(),
            "http://broker.local:9096/authorize?client_id=test"
        );
    }
}
