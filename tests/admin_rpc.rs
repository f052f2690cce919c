//! Error surface of the admin RPC endpoints and isolation of the
//! request-id cookie.

mod common;

use common::*;
use reqwest::StatusCode;

#[tokio::test]
async fn unknown_challenges_report_errors_in_the_body() {
    let server = TestServer::start().await;

    let verify = server
        .rpc(
            "IdentityService.Verify",
            serde_json::json!({ "challengeID": "missing", "subjectID": "alice" }),
        )
        .await;
    assert_eq!(verify["error"], "challenge not found");
    assert_eq!(verify["redirectURL"], "");

    let shown = server
        .rpc(
            "ConsentService.ShowConsentChallenge",
            serde_json::json!({ "consentChallenge": "missing" }),
        )
        .await;
    assert_eq!(shown["error"], "challenge not found");

    let granted = server
        .rpc(
            "ConsentService.GrantConsent",
            serde_json::json!({ "challengeID": "missing", "scopes": ["read"] }),
        )
        .await;
    assert_eq!(granted["error"], "challenge not found");
}

#[tokio::test]
async fn undecodable_bodies_are_client_errors() {
    let server = TestServer::start().await;

    let response = reqwest::Client::new()
        .post(format!("{}/api/IdentityService.Verify", server.admin_url))
        .header("Content-Type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn admin_surface_never_touches_the_request_id_cookie() {
    let server = TestServer::start().await;

    let response = server.get_admin("/health").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .get_all("set-cookie")
        .iter()
        .all(|value| !value.to_str().unwrap_or_default().starts_with("r=")));

    let rpc = reqwest::Client::new()
        .post(format!(
            "{}/api/ConsentService.ShowConsentChallenge",
            server.admin_url
        ))
        .json(&serde_json::json!({ "consentChallenge": "missing" }))
        .send()
        .await
        .unwrap();
    assert!(rpc.headers().get("set-cookie").is_none());
}

#[tokio::test]
async fn oauth2_surface_resets_the_cookie_on_every_request() {
    let server = TestServer::start().await;

    let first = server.authorize("client_id=test").await;
    let second = server.authorize("client_id=test").await;
    assert_ne!(request_id_cookie(&first), request_id_cookie(&second));
}
