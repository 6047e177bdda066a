#![allow(clippy::unwrap_used)]
// Integration tests for the section and collection reconcilers using wiremock.

use serde_json::{Value, json};
use wiremock::matchers::{body_json, body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use seerr_core::settings::general::GeneralSettings;
use seerr_core::settings::services::SonarrSettings;
use seerr_core::{CoreError, ROOT_TREE, ReconcileContext, SeerrClient, Section, Settings};

const SONARR_TREE: &str = "seerr.settings.services.sonarr";

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup(dry_run: bool) -> (MockServer, ReconcileContext) {
    let server = MockServer::start().await;
    let client = SeerrClient::from_reqwest(&server.uri(), reqwest::Client::new())
        .unwrap()
        .with_api_key("test-key".to_string().into())
        .with_dry_run(dry_run);
    (server, ReconcileContext::new(client))
}

fn remote_main() -> Value {
    json!({
        "applicationTitle": "Jellyseerr",
        "applicationUrl": "",
        "trustProxy": false,
        "csrfProtection": false,
        "cacheImages": false,
        "locale": "en",
        "region": "",
        "originalLanguage": "",
        "hideAvailable": false,
        "partialRequestsEnabled": true,
        "localLogin": true,
        "newPlexLogin": true,
        "defaultQuotas": { "movie": { "quotaDays": 7 }, "tv": { "quotaDays": 7 } },
        "defaultPermissions": 32
    })
}

async fn mount_main(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/v1/settings/main"))
        .respond_with(ResponseTemplate::new(200).set_body_json(remote_main()))
        .mount(server)
        .await;
}

fn remote_sonarr(id: i64, name: &str, hostname: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "isDefault": true,
        "is4k": false,
        "hostname": hostname,
        "port": 8989,
        "useSsl": false,
        "baseUrl": "",
        "syncEnabled": false,
        "preventSearch": false,
        "apiKey": "key-a",
        "activeDirectory": "/tv",
        "activeProfileId": 4,
        "activeProfileName": "HD-1080p",
        "activeLanguageProfileId": 1,
        "tags": [],
        "activeAnimeDirectory": "",
        "animeTags": [],
        "enableSeasonFolders": true
    })
}

async fn mount_sonarr(server: &MockServer, entries: Value) {
    Mock::given(method("GET"))
        .and(path("/api/v1/settings/sonarr"))
        .respond_with(ResponseTemplate::new(200).set_body_json(entries))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/settings/sonarr/test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "rootFolders": [{ "id": 1, "path": "/tv" }],
            "profiles": [{ "id": 4, "name": "HD-1080p" }],
            "languageProfiles": [{ "id": 1, "name": "English" }],
            "tags": []
        })))
        .mount(server)
        .await;
}

fn desired_sonarr(definitions: Value, delete_unmanaged: bool) -> SonarrSettings {
    serde_json::from_value(json!({
        "delete_unmanaged": delete_unmanaged,
        "definitions": definitions,
    }))
    .unwrap()
}

fn sonarr_definition(hostname: &str, port: u16, quality_profile: &str) -> Value {
    json!({
        "is_default_server": true,
        "hostname": hostname,
        "port": port,
        "api_key": "key-a",
        "root_folder": "/tv",
        "quality_profile": quality_profile,
        "language_profile": "English",
        "enable_season_folders": true
    })
}

// ── Single-object sections ──────────────────────────────────────────

#[tokio::test]
async fn test_section_pushes_only_changed_attributes() {
    let (server, ctx) = setup(false).await;
    mount_main(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/v1/settings/main"))
        .and(body_json(json!({ "applicationTitle": "Seerr" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let tree = "seerr.settings.general";
    let remote = GeneralSettings::from_remote(tree, &ctx).await.unwrap();
    let desired = GeneralSettings {
        application_title: "Seerr".into(),
        ..remote.clone()
    };
    assert!(desired.update_remote(tree, &ctx, &remote).await.unwrap());
}

#[tokio::test]
async fn test_section_without_changes_sends_nothing() {
    let (server, ctx) = setup(false).await;
    mount_main(&server).await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let tree = "seerr.settings.general";
    let remote = GeneralSettings::from_remote(tree, &ctx).await.unwrap();
    assert_eq!(remote, GeneralSettings::default());
    assert!(
        !GeneralSettings::default()
            .update_remote(tree, &ctx, &remote)
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn test_dry_run_reports_change_without_mutating() {
    let (server, ctx) = setup(true).await;
    mount_main(&server).await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let tree = "seerr.settings.general";
    let remote = GeneralSettings::from_remote(tree, &ctx).await.unwrap();
    let desired = GeneralSettings {
        hide_available_media: true,
        ..remote.clone()
    };
    assert!(desired.update_remote(tree, &ctx, &remote).await.unwrap());
}

// ── Named collections ───────────────────────────────────────────────

#[tokio::test]
async fn test_collection_updates_changed_and_creates_missing() {
    let (server, ctx) = setup(false).await;
    mount_sonarr(
        &server,
        json!([
            remote_sonarr(1, "A", "sonarr"),
            remote_sonarr(3, "C", "sonarr-old")
        ]),
    )
    .await;
    Mock::given(method("PUT"))
        .and(path("/api/v1/settings/sonarr/1"))
        .and(body_partial_json(json!({ "name": "A", "port": 8990, "activeProfileId": 4 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/settings/sonarr"))
        .and(body_partial_json(json!({ "name": "B", "hostname": "sonarr-4k" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": 4 })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let remote = SonarrSettings::from_remote(SONARR_TREE, &ctx).await.unwrap();
    assert_eq!(
        remote.definitions.keys().collect::<Vec<_>>(),
        vec!["A", "C"]
    );
    let desired = desired_sonarr(
        json!({
            "A": sonarr_definition("sonarr", 8990, "HD-1080p"),
            "B": sonarr_definition("sonarr-4k", 8989, "HD-1080p"),
        }),
        false,
    );
    assert!(desired.update_remote(SONARR_TREE, &ctx, &remote).await.unwrap());
}

#[tokio::test]
async fn test_collection_unchanged_entry_is_not_sent() {
    let (server, ctx) = setup(false).await;
    mount_sonarr(&server, json!([remote_sonarr(1, "A", "sonarr")])).await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let remote = SonarrSettings::from_remote(SONARR_TREE, &ctx).await.unwrap();
    let desired = desired_sonarr(
        json!({ "A": sonarr_definition("sonarr", 8989, "HD-1080p") }),
        false,
    );
    assert!(!desired.update_remote(SONARR_TREE, &ctx, &remote).await.unwrap());
}

#[tokio::test]
async fn test_collection_deletes_unmanaged_when_enabled() {
    let (server, ctx) = setup(false).await;
    mount_sonarr(
        &server,
        json!([
            remote_sonarr(1, "A", "sonarr"),
            remote_sonarr(3, "C", "sonarr-old")
        ]),
    )
    .await;
    Mock::given(method("DELETE"))
        .and(path("/api/v1/settings/sonarr/3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let remote = SonarrSettings::from_remote(SONARR_TREE, &ctx).await.unwrap();
    let desired = desired_sonarr(
        json!({ "A": sonarr_definition("sonarr", 8989, "HD-1080p") }),
        true,
    );
    assert!(desired.update_remote(SONARR_TREE, &ctx, &remote).await.unwrap());
}

#[tokio::test]
async fn test_collection_rejects_unknown_reference() {
    let (server, ctx) = setup(false).await;
    mount_sonarr(&server, json!([])).await;
    Mock::given(method("POST"))
        .and(path("/api/v1/settings/sonarr"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let remote = SonarrSettings::from_remote(SONARR_TREE, &ctx).await.unwrap();
    let desired = desired_sonarr(
        json!({ "A": sonarr_definition("sonarr", 8989, "Nonexistent") }),
        false,
    );
    let err = desired
        .update_remote(SONARR_TREE, &ctx, &remote)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation { .. }), "got: {err:?}");
    assert!(
        err.to_string().ends_with(
            "Invalid quality profile name 'Nonexistent' (expected one of: \"HD-1080p\" (4))"
        ),
        "got: {err}"
    );
}

#[tokio::test]
async fn test_collection_dry_run_still_probes() {
    let (server, ctx) = setup(true).await;
    mount_sonarr(&server, json!([])).await;
    Mock::given(method("POST"))
        .and(path("/api/v1/settings/sonarr"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let remote = SonarrSettings::from_remote(SONARR_TREE, &ctx).await.unwrap();
    let desired = desired_sonarr(
        json!({ "A": sonarr_definition("sonarr", 8989, "HD-1080p") }),
        false,
    );
    assert!(desired.update_remote(SONARR_TREE, &ctx, &remote).await.unwrap());

    let probes = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.url.path() == "/api/v1/settings/sonarr/test")
        .count();
    assert_eq!(probes, 1);
}

#[tokio::test]
async fn test_duplicate_remote_names_are_rejected() {
    let (server, ctx) = setup(false).await;
    mount_sonarr(
        &server,
        json!([
            remote_sonarr(1, "A", "sonarr"),
            remote_sonarr(2, "A", "sonarr-copy")
        ]),
    )
    .await;

    let err = SonarrSettings::from_remote(SONARR_TREE, &ctx)
        .await
        .unwrap_err();
    assert!(
        err.to_string().contains("several remote entries share this name (IDs 1 and 2)"),
        "got: {err}"
    );
}

// ── Bootstrap ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_bootstrap_lists_missing_attributes_before_any_call() {
    let (server, ctx) = setup(false).await;

    let err = Settings::default()
        .initialize(ROOT_TREE, &ctx)
        .await
        .unwrap_err();
    let message = err.to_string();
    for attr in ["server_url", "username", "password", "email_address", "libraries"] {
        assert!(
            message.contains(&format!("'seerr.settings.jellyfin.{attr}'")),
            "missing {attr} in: {message}"
        );
    }
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_bootstrap_detects_lost_session() {
    let (server, ctx) = setup(false).await;
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/jellyfin"))
        .respond_with(
            ResponseTemplate::new(500)
                .set_body_json(json!({ "message": "Jellyfin hostname already configured" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let settings: Settings = serde_json::from_value(json!({
        "jellyfin": {
            "server_url": "http://jellyfin:8096",
            "username": "admin",
            "password": "hunter2",
            "email_address": "admin@example.com",
            "libraries": ["Movies"]
        }
    }))
    .unwrap();
    let err = settings.initialize(ROOT_TREE, &ctx).await.unwrap_err();
    assert!(matches!(err, CoreError::AlreadyConfigured), "got: {err:?}");
}

#[tokio::test]
async fn test_bootstrap_runs_full_sequence() {
    let (server, ctx) = setup(false).await;
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/jellyfin"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 1 })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/settings/jellyfin/library"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "m1", "name": "Movies", "enabled": false },
            { "id": "s1", "name": "Shows", "enabled": false }
        ])))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/settings/initialize"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "initialized": true })))
        .expect(1)
        .mount(&server)
        .await;

    let settings: Settings = serde_json::from_value(json!({
        "jellyfin": {
            "server_url": "http://jellyfin:8096",
            "username": "admin",
            "password": "hunter2",
            "email_address": "admin@example.com",
            "libraries": ["Movies"]
        }
    }))
    .unwrap();
    settings.initialize(ROOT_TREE, &ctx).await.unwrap();

    let enable = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter_map(|r| r.url.query().map(str::to_owned))
        .collect::<Vec<_>>();
    assert_eq!(enable, vec!["sync=true", "enable=m1"]);
}

// ── Full pass ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_failed_section_does_not_stop_the_pass() {
    let (server, ctx) = setup(false).await;
    mount_main(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/v1/settings/jellyfin/library"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/settings/sonarr"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/settings/sonarr/test"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({ "message": "connection refused" })),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/settings/main"))
        .and(body_json(json!({ "applicationTitle": "Seerr" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let mut desired: Settings = serde_json::from_value(json!({
        "services": {
            "sonarr": {
                "definitions": { "A": sonarr_definition("sonarr", 8989, "HD-1080p") }
            }
        }
    }))
    .unwrap();
    desired.general.application_title = "Seerr".into();

    let err = desired
        .update_remote(ROOT_TREE, &ctx, &Settings::default())
        .await
        .unwrap_err();
    let CoreError::SectionsFailed { failures } = err else {
        panic!("expected SectionsFailed, got: {err:?}");
    };
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].tree, "seerr.settings.services");
    assert_eq!(failures[0].error.api_status(), Some(500));
}
