use anyhow::Result;
use bullhorn_plecto_sync::core::snapshot::{CSV_SNAPSHOT, JSON_SNAPSHOT};
use bullhorn_plecto_sync::domain::model::Registration;
use bullhorn_plecto_sync::domain::ports::{SecretStore, Storage};
use bullhorn_plecto_sync::{
    FileSecretStore, LocalStorage, MemorySecretStore, SyncConfig, SyncEngine, SyncError,
    SyncPipeline,
};
use chrono::{TimeZone, Utc};
use httpmock::prelude::*;
use tempfile::TempDir;

const NOW_MS: i64 = 1_700_000_000_000;
const HOUR_MS: i64 = 3_600_000;

fn config_toml(server: &MockServer, extra_fetch: &str, extra_plecto: &str) -> String {
    format!(
        r#"
[bullhorn]
client_id = "client"
client_secret = "secret"
auth_base_url = "{base}"
login_base_url = "{base}"
initial_refresh_token = "initial"

[fetch]
entity = "appointment"
{extra_fetch}

[plecto]
base_url = "{base}"
email = "sync@example.com"
password = "pw"
{extra_plecto}

[secrets]
backend = "memory"
"#,
        base = server.base_url(),
        extra_fetch = extra_fetch,
        extra_plecto = extra_plecto,
    )
}

fn mock_auth(server: &MockServer) {
    server.mock(|when, then| {
        when.method(POST).path("/oauth/token");
        then.status(200).json_body(serde_json::json!({
            "access_token": "access-1",
            "refresh_token": "rotated-1",
            "expires_in": 600
        }));
    });
    let rest_url = server.url("/rest-services/corp");
    server.mock(|when, then| {
        when.method(POST)
            .path("/rest-services/login")
            .query_param("access_token", "access-1");
        then.status(200).json_body(serde_json::json!({
            "BhRestToken": "rest-token",
            "restUrl": rest_url
        }));
    });
}

fn appointment(id: i64, date_added: i64) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "owner": {"id": 7, "firstName": "A", "lastName": "B"},
        "dateAdded": date_added,
        "dateBegin": date_added + HOUR_MS
    })
}

/// 250 records over pages of 100/100/50 plus an empty page end up in three Plecto batches.
#[tokio::test]
async fn test_full_sync_of_250_appointments() -> Result<()> {
    let server = MockServer::start();
    mock_auth(&server);

    let mut query_mocks = Vec::new();
    for (start, ids) in [(0i64, 0..100i64), (100, 100..200), (200, 200..250), (300, 0..0)] {
        let data: Vec<_> = ids.map(|id| appointment(id, NOW_MS - id)).collect();
        query_mocks.push(server.mock(|when, then| {
            when.method(GET)
                .path("/rest-services/corp/query/Appointment")
                .query_param("BhRestToken", "rest-token")
                .query_param("fields", "id,owner,dateAdded,dateBegin")
                .query_param("where", "id>0")
                .query_param("start", start.to_string())
                .query_param("count", "100");
            then.status(200).json_body(serde_json::json!({ "data": data }));
        }));
    }
    let upload_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/api/v2/registrations/")
            .header_exists("authorization")
            .body_contains("\"data_source\":\"ds-1\"");
        then.status(201).json_body(serde_json::json!([]));
    });

    let config = SyncConfig::from_toml_str(&config_toml(&server, "", "data_source_id = \"ds-1\""))?;
    let secrets = MemorySecretStore::new();
    let pipeline = SyncPipeline::new(config, secrets, None::<LocalStorage>)?;
    let summary = SyncEngine::new(pipeline).run().await?;

    for mock in &query_mocks {
        mock.assert_hits(1);
    }
    upload_mock.assert_hits(3);
    assert_eq!(summary.fetched, 250);
    assert_eq!(summary.transformed, 250);
    assert_eq!(summary.batches, 3);
    assert_eq!(summary.uploaded, 250);
    Ok(())
}

/// With a lookback window, only in-window records are uploaded and older pages are never requested.
#[tokio::test]
async fn test_windowed_sync_stops_at_boundary_and_snapshots() -> Result<()> {
    let server = MockServer::start();
    mock_auth(&server);

    let first_page = server.mock(|when, then| {
        when.method(GET)
            .path("/rest-services/corp/query/Appointment")
            .query_param("orderBy", "-dateAdded")
            .query_param("start", "0");
        then.status(200).json_body(serde_json::json!({
            "data": [
                appointment(30, NOW_MS - HOUR_MS),
                appointment(20, NOW_MS - 5 * HOUR_MS),
                appointment(10, NOW_MS - 30 * HOUR_MS)
            ]
        }));
    });
    let later_pages = server.mock(|when, then| {
        when.method(GET)
            .path("/rest-services/corp/query/Appointment")
            .query_param("start", "100");
        then.status(200).json_body(serde_json::json!({ "data": [appointment(5, NOW_MS - 40 * HOUR_MS)] }));
    });
    let upload_mock = server.mock(|when, then| {
        when.method(POST).path("/api/v2/registrations/");
        then.status(201);
    });

    let temp_dir = TempDir::new()?;
    let config = SyncConfig::from_toml_str(&config_toml(
        &server,
        "lookback_hours = 24",
        "data_source_id = \"ds-1\"",
    ))?;
    let snapshots = LocalStorage::new(temp_dir.path());
    let now = Utc.timestamp_millis_opt(NOW_MS).unwrap();
    let pipeline =
        SyncPipeline::new(config, MemorySecretStore::new(), Some(snapshots.clone()))?.with_now(now);

    let summary = SyncEngine::new(pipeline).run().await?;

    first_page.assert_hits(1);
    later_pages.assert_hits(0);
    upload_mock.assert_hits(1);
    assert_eq!(summary.fetched, 2);

    let json = snapshots.read_file(JSON_SNAPSHOT).await?;
    let registrations: Vec<Registration> = serde_json::from_slice(&json)?;
    let ids: Vec<_> = registrations.iter().map(|r| r.external_id.as_str()).collect();
    assert_eq!(ids, vec!["30", "20"]);
    assert_eq!(registrations[0].member_name, "A B");
    assert_eq!(registrations[0].fields["appointment_id"], "30");
    assert!(registrations[0].date_added.is_some());

    let csv = String::from_utf8(snapshots.read_file(CSV_SNAPSHOT).await?)?;
    assert_eq!(csv.lines().count(), 3);
    Ok(())
}

/// Without a configured data source id, one is created first and used for every registration.
#[tokio::test]
async fn test_sync_creates_data_source_when_missing() -> Result<()> {
    let server = MockServer::start();
    mock_auth(&server);

    server.mock(|when, then| {
        when.method(GET)
            .path("/rest-services/corp/query/Note")
            .query_param("start", "0");
        then.status(200).json_body(serde_json::json!({
            "data": [
                {"id": 1, "commentingPerson": {"id": 9, "firstName": "Eva", "lastName": "Berg"},
                 "dateAdded": NOW_MS, "action": "Interview"},
                {"id": 2, "commentingPerson": {"id": 9}, "dateAdded": NOW_MS, "action": "Call"}
            ]
        }));
    });
    server.mock(|when, then| {
        when.method(GET)
            .path("/rest-services/corp/query/Note")
            .query_param("start", "100");
        then.status(200).json_body(serde_json::json!({ "data": [] }));
    });
    let create_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/api/v2/datasources/")
            .body_contains("\"title\":\"Bullhorn Meeting Notes\"")
            .body_contains("\"name\":\"action\"");
        then.status(201).json_body(serde_json::json!({"id": "new-ds"}));
    });
    let upload_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/api/v2/registrations/")
            .body_contains("\"data_source\":\"new-ds\"")
            .body_contains("\"action\":\"Interview\"")
            .body_contains("\"note_id\":\"1\"");
        then.status(201);
    });

    let mut config = SyncConfig::from_toml_str(&config_toml(&server, "action_filter = \"Interview\"", ""))?;
    config.fetch.entity = bullhorn_plecto_sync::domain::model::EntityKind::Note;
    let pipeline = SyncPipeline::new(config, MemorySecretStore::new(), None::<LocalStorage>)?;

    let summary = SyncEngine::new(pipeline).run().await?;

    create_mock.assert_hits(1);
    upload_mock.assert_hits(1);
    assert_eq!(summary.uploaded, 1);
    Ok(())
}

/// A rejected batch aborts the run; the rotated token is still persisted.
#[tokio::test]
async fn test_upload_failure_is_fatal_after_token_rotation() -> Result<()> {
    let server = MockServer::start();
    mock_auth(&server);

    let data: Vec<_> = (0..5).map(|id| appointment(id, NOW_MS)).collect();
    server.mock(|when, then| {
        when.method(GET)
            .path("/rest-services/corp/query/Appointment")
            .query_param("start", "0");
        then.status(200).json_body(serde_json::json!({ "data": data }));
    });
    server.mock(|when, then| {
        when.method(GET)
            .path("/rest-services/corp/query/Appointment")
            .query_param("start", "2");
        then.status(200).json_body(serde_json::json!({ "data": [] }));
    });
    let upload_mock = server.mock(|when, then| {
        when.method(POST).path("/api/v2/registrations/");
        then.status(400).body("{\"detail\":\"Unknown data source\"}");
    });

    let temp_dir = TempDir::new()?;
    let secrets_path = temp_dir.path().join("secrets.json");
    let config = SyncConfig::from_toml_str(&config_toml(
        &server,
        "page_size = 2\nmax_pages = 1",
        "data_source_id = \"ds-1\"\nbatch_size = 2",
    ))?;
    let pipeline = SyncPipeline::new(
        config,
        FileSecretStore::new(&secrets_path),
        None::<LocalStorage>,
    )?;

    let result = SyncEngine::new(pipeline).run().await;

    upload_mock.assert_hits(1);
    assert!(matches!(
        result,
        Err(SyncError::UploadError { batch: 0, status: 400, .. })
    ));
    let persisted = FileSecretStore::new(&secrets_path)
        .get("BullhornRefreshToken")
        .await?;
    assert_eq!(persisted.as_deref(), Some("rotated-1"));
    Ok(())
}

/// A failing login stops the run before any record is requested.
#[tokio::test]
async fn test_session_failure_aborts_before_fetch() -> Result<()> {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/oauth/token");
        then.status(200).json_body(serde_json::json!({
            "access_token": "access-1",
            "refresh_token": "rotated-1"
        }));
    });
    server.mock(|when, then| {
        when.method(POST).path("/rest-services/login");
        then.status(500);
    });
    let query_mock = server.mock(|when, then| {
        when.method(GET).path_contains("/query/");
        then.status(200).json_body(serde_json::json!({ "data": [] }));
    });

    let config = SyncConfig::from_toml_str(&config_toml(&server, "", "data_source_id = \"ds-1\""))?;
    let pipeline = SyncPipeline::new(config, MemorySecretStore::new(), None::<LocalStorage>)?;

    let result = SyncEngine::new(pipeline).run().await;

    query_mock.assert_hits(0);
    assert!(matches!(result, Err(SyncError::SessionError { .. })));
    Ok(())
}

/// A lookback too large for the calendar is rejected before any token is refreshed.
#[tokio::test]
async fn test_out_of_range_lookback_fails_before_token_refresh() -> Result<()> {
    let server = MockServer::start();
    let token_mock = server.mock(|when, then| {
        when.method(POST).path("/oauth/token");
        then.status(200).json_body(serde_json::json!({
            "access_token": "access-1",
            "refresh_token": "rotated-1"
        }));
    });

    let config = SyncConfig::from_toml_str(&config_toml(
        &server,
        "lookback_hours = 10000000000",
        "data_source_id = \"ds-1\"",
    ))?;
    let pipeline = SyncPipeline::new(config, MemorySecretStore::new(), None::<LocalStorage>)?;

    let result = SyncEngine::new(pipeline).run().await;

    token_mock.assert_hits(0);
    assert!(matches!(
        result,
        Err(SyncError::InvalidConfigValueError { ref field, .. }) if field == "fetch.lookback_hours"
    ));
    Ok(())
}
