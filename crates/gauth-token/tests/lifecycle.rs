// SPDX-FileCopyrightText: 2026 Gauth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end credential lifecycle against a mock token endpoint:
//! initial exchange, preemptive refresh, key rotation, verification,
//! and revocation, with the production JSON-lines audit sink.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use gauth_audit::{AuditEntry, AuditEvent, JsonlAuditLog};
use gauth_config::model::{KDF_ITERATION_FLOOR, OauthConfig, RefreshConfig};
use gauth_core::{AuthState, GauthError, HealthStatus, TokenRecord};
use gauth_token::{AuthFacade, GoogleTokenClient, RefreshScheduler};
use gauth_vault::rotate::KeyRotator;
use gauth_vault::{BackupStore, CredentialStore, StorePaths};
use secrecy::SecretString;
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Harness {
    dir: TempDir,
    store: Arc<CredentialStore>,
    facade: AuthFacade,
    rotator: KeyRotator,
}

fn secret() -> SecretString {
    SecretString::from("operator secret".to_string())
}

async fn harness(server: &MockServer) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let audit = Arc::new(JsonlAuditLog::open(dir.path().join("audit.jsonl")).unwrap());
    let store = Arc::new(
        CredentialStore::open(
            StorePaths::new(dir.path().join("credentials.json")),
            &secret(),
            KDF_ITERATION_FLOOR,
            audit.clone(),
        )
        .unwrap(),
    );

    let oauth = OauthConfig {
        client_id: Some("client-id".into()),
        client_secret: Some("client-secret".into()),
        token_url: format!("{}/token", server.uri()),
        redirect_uri: "urn:ietf:wg:oauth:2.0:oob".into(),
        scopes: vec!["drive".into()],
    };
    let exchange = Arc::new(GoogleTokenClient::new(&oauth, Duration::from_secs(5)).unwrap());
    let scheduler = Arc::new(
        RefreshScheduler::new(
            store.clone(),
            exchange,
            audit.clone(),
            RefreshConfig::default(),
        )
        .await,
    );
    let facade = AuthFacade::new(store.clone(), scheduler, 600);
    let rotator = KeyRotator::new(
        store.clone(),
        BackupStore::new(dir.path().join("backups"), 5),
        KDF_ITERATION_FLOOR,
    );

    Harness {
        dir,
        store,
        facade,
        rotator,
    }
}

fn audited_events(h: &Harness) -> Vec<AuditEvent> {
    let content = std::fs::read_to_string(h.dir.path().join("audit.jsonl")).unwrap();
    content
        .lines()
        .map(|line| serde_json::from_str::<AuditEntry>(line).unwrap().event)
        .collect()
}

#[tokio::test]
async fn full_lifecycle_exchange_rotate_verify_revoke() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "ya29.initial",
            "refresh_token": "1//refresh",
            "expires_in": 3600,
            "scope": "drive",
            "token_type": "Bearer",
        })))
        .mount(&server)
        .await;

    let h = harness(&server).await;

    // Initial exchange.
    h.facade
        .scheduler()
        .complete_initial_exchange("4/code")
        .await
        .unwrap();
    assert_eq!(
        h.facade.get_valid_access_token().await.unwrap(),
        "ya29.initial"
    );
    let report = h.facade.health().await;
    assert_eq!(report.status, HealthStatus::Healthy);
    assert_eq!(report.key_version, 1);

    // Rotation to a new secret keeps the record readable under the new
    // key version.
    let new_secret = SecretString::from("rotated secret".to_string());
    let outcome = h.rotator.rotate(&new_secret, false).await.unwrap();
    assert_eq!(outcome.new_version, 2);
    assert_eq!(
        h.facade.get_valid_access_token().await.unwrap(),
        "ya29.initial"
    );
    assert_eq!(h.facade.health().await.key_version, 2);

    // The live blob still decrypts; the retained backup predates the
    // rotation, so it verifies with the secret that sealed it.
    assert_eq!(h.rotator.verify(&secret()).await.unwrap(), 1);

    // Revocation wipes the store.
    assert!(h.facade.revoke_all_tokens().await.unwrap());
    assert_eq!(h.facade.health().await.status, HealthStatus::Unhealthy);

    assert_eq!(
        audited_events(&h),
        vec![
            AuditEvent::TokenAcquired,
            AuditEvent::KeyRotated,
            AuditEvent::TokenRevoked,
        ]
    );
}

#[tokio::test]
async fn near_expiry_token_is_refreshed_through_the_facade() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=1%2F%2Frefresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "ya29.renewed",
            "expires_in": 3600,
            "scope": "drive",
            "token_type": "Bearer",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(&server).await;
    h.store
        .save(
            &TokenRecord {
                access_token: "ya29.stale".into(),
                refresh_token: "1//refresh".into(),
                scope: "drive".into(),
                token_type: "Bearer".into(),
                expires_at: Utc::now() + chrono::Duration::seconds(60),
            },
            AuditEvent::TokenAcquired,
        )
        .await
        .unwrap();

    assert_eq!(
        h.facade.get_valid_access_token().await.unwrap(),
        "ya29.renewed"
    );
    // The omitted refresh token was carried forward.
    let stored = h.store.load().await.unwrap().unwrap();
    assert_eq!(stored.refresh_token, "1//refresh");
    assert!(audited_events(&h).contains(&AuditEvent::TokenRefreshed));
}

#[tokio::test]
async fn revoked_grant_ends_in_revoked_state() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": "invalid_grant",
            "error_description": "Token has been expired or revoked.",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(&server).await;
    h.store
        .save(
            &TokenRecord {
                access_token: "ya29.stale".into(),
                refresh_token: "1//dead".into(),
                scope: "drive".into(),
                token_type: "Bearer".into(),
                expires_at: Utc::now() + chrono::Duration::seconds(60),
            },
            AuditEvent::TokenAcquired,
        )
        .await
        .unwrap();

    let result = h.facade.get_valid_access_token().await;
    assert!(matches!(result, Err(GauthError::AuthenticationRequired(_))));
    assert_eq!(h.facade.scheduler().state(), AuthState::Revoked);
    assert_eq!(h.facade.health().await.status, HealthStatus::Unhealthy);

    // Terminal: a second request must not hit upstream again (the mock
    // expects exactly one call).
    assert!(h.facade.get_valid_access_token().await.is_err());
    assert!(audited_events(&h).contains(&AuditEvent::TokenRevoked));
}

#[tokio::test]
async fn corrupted_blob_is_unhealthy_and_requires_reauth() {
    let server = MockServer::start().await;
    let h = harness(&server).await;
    h.store
        .save(
            &TokenRecord {
                access_token: "ya29.ok".into(),
                refresh_token: "1//refresh".into(),
                scope: "drive".into(),
                token_type: "Bearer".into(),
                expires_at: Utc::now() + chrono::Duration::seconds(3600),
            },
            AuditEvent::TokenAcquired,
        )
        .await
        .unwrap();

    std::fs::write(h.dir.path().join("credentials.json"), b"not a blob").unwrap();

    let result = h.facade.get_valid_access_token().await;
    assert!(matches!(result, Err(GauthError::AuthenticationRequired(_))));

    let report = h.facade.health().await;
    assert_eq!(report.status, HealthStatus::Unhealthy);
    assert!(report.last_error.is_some());
}
