use serde::{Deserialize, Serialize};
use url::{Position, Url};

use crate::error::{IntegrityError, IntegrityViolation};

/// Query parameters that must carry identical values between the request
/// that created a challenge and the request that presents its verifier.
/// Comparison uses the first value per key; a missing key reads as the
/// empty string.
const VALIDATED_PARAMS: [&str; 10] = [
    "client_id",
    "response_type",
    "redirect_uri",
    "state",
    "scope",
    "code_challenge",
    "code_challenge_method",
    "prompt",
    "ui_locales",
    "nonce",
];

/// Per-request view assembled by the request-scope middleware.
///
/// `request_id` is freshly minted for this request and set as the `r`
/// cookie on the response; `previous_request_id` is whatever `r` cookie
/// the browser presented, i.e. the id minted by the request one hop back
/// in the redirect chain.
#[derive(Debug, Clone)]
pub struct RequestScope {
    pub request_id: String,
    pub previous_request_id: String,
    pub referer: String,
    pub request_url: Url,
}

impl RequestScope {
    /// First value of a query parameter, if the key is present at all.
    pub fn query_param(&self, key: &str) -> Option<String> {
        first_query_value(&self.request_url, key)
    }

    /// First value of a query parameter; missing keys read as "".
    pub fn query_value(&self, key: &str) -> String {
        self.query_param(key).unwrap_or_default()
    }
}

/// Evidence captured when a challenge is created, re-checked when the
/// browser comes back with the matching verifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Footprint {
    /// Request id of the request that created the challenge, matched
    /// against the returning browser's `r` cookie.
    pub request_id: String,
    /// Full URL the browser was redirected to, i.e. the provider URL.
    /// Its scheme and host bind the `Referer` of the returning request.
    pub redirect_url: String,
    /// Full URL of the inbound request that caused challenge creation.
    pub request_url: String,
}

impl Footprint {
    /// Capture a footprint for the current request, about to be redirected
    /// to `redirect_url`.
    pub fn capture(scope: &RequestScope, redirect_url: &Url) -> Self {
        Self {
            request_id: scope.request_id.clone(),
            redirect_url: redirect_url.to_string(),
            request_url: scope.request_url.to_string(),
        }
    }

    /// Check the returning request against the captured evidence.
    ///
    /// Holds iff the request chain is continuous (`r` cookie equals the
    /// recorded request id), the `Referer` begins with the scheme+host of
    /// the recorded redirect URL, and every validated query parameter is
    /// unchanged.
    pub fn validate(&self, scope: &RequestScope) -> Result<(), IntegrityError> {
        if scope.previous_request_id != self.request_id {
            return Err(IntegrityError::Violation(IntegrityViolation::RequestChain));
        }

        let redirect_url = Url::parse(&self.redirect_url)?;
        let origin = &redirect_url[..Position::BeforePath];
        if !scope.referer.starts_with(origin) {
            return Err(IntegrityError::Violation(IntegrityViolation::Referer));
        }

        let recorded_url = Url::parse(&self.request_url)?;
        for param in VALIDATED_PARAMS {
            let recorded = first_query_value(&recorded_url, param).unwrap_or_default();
            if recorded != scope.query_value(param) {
                return Err(IntegrityError::Violation(IntegrityViolation::Parameter(
                    param,
                )));
            }
        }

        Ok(())
    }
}

fn first_query_value(url: &Url, key: &str) -> Option<String> {
    url.query_pairs()
        .find(|(name, _)| name == key)
        .map(|(_, value)| value.into_owned())
}
