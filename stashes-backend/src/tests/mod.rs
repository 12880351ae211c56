use crate::entity::{file, file_version, stash};
use crate::storage::DbLocation;
use crate::versioning::FileWrite;
use crate::{build_app, AppState};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::*;
use serde_json::json;
use stashes_shared::content::ContentType;
use stashes_shared::file::{FileChanges, NewFile, RevertRequest};
use stashes_shared::stash::NewStash;
use stashes_shared::USER_HEADER;
use std::path::PathBuf;
use std::sync::{Arc, Once};
use tokio::sync::RwLock;
use tracing::debug;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use uuid::Uuid;

static INIT: Once = Once::new();

async fn setup_test_server() -> TestServer {
    INIT.call_once(|| {
        tracing_subscriber::registry()
            .with(tracing_subscriber::EnvFilter::new(
                "stashes_backend=debug,tower_http=debug,debug",
            ))
            .with(tracing_subscriber::fmt::layer())
            .init();
    });
    let appstate = AppState::test().await;
    let shared_state = Arc::new(RwLock::new(appstate));
    let app = build_app(&shared_state);

    let config = TestServerConfig {
        expect_success_by_default: true,
        restrict_requests_with_http_schema: false,
        default_content_type: None,
        default_scheme: Some("http".into()),
        ..Default::default()
    };

    TestServer::new_with_config(app, config).expect("Failed to start test server")
}

fn user_header() -> HeaderName {
    HeaderName::from_static(USER_HEADER)
}

fn as_user(user: Uuid) -> HeaderValue {
    HeaderValue::from_str(&user.to_string()).expect("uuid is a valid header value")
}

async fn create_stash(server: &TestServer, user: Uuid, name: &str) -> stash::Model {
    server
        .post("/api/v1/stash")
        .add_header(user_header(), as_user(user))
        .json(&NewStash {
            name: name.to_string(),
            description: None,
        })
        .await
        .json::<stash::Model>()
}

async fn create_file(server: &TestServer, user: Uuid, stash_id: Uuid, new: &NewFile) -> FileWrite {
    server
        .post(&format!("/api/v1/stash/{}/file", stash_id))
        .add_header(user_header(), as_user(user))
        .json(new)
        .await
        .json::<FileWrite>()
}

#[tokio::test]
async fn test_failing_setup_server() {
    // I sure hope this path isn't writeable!
    crate::storage::start_db(
        &DbLocation::SqlitePath(PathBuf::from(format!(
            "/asdfasdf{}/asd{}fsadfdf",
            Uuid::new_v4(),
            Uuid::new_v4()
        ))),
        None,
    )
    .await
    .expect_err("Should fail to open DB");
}

#[tokio::test]
async fn test_api_file_versioning() {
    let server = setup_test_server().await;
    let user = Uuid::new_v4();

    let stash = create_stash(&server, user, "notes").await;
    assert_eq!(stash.user_id, user);

    let created = create_file(&server, user, stash.id, &NewFile::new("readme.md", "hello")).await;
    let version = created.version.expect("creation writes version 1");
    assert_eq!(version.version, 1);
    assert_eq!(version.content, "hello");
    assert_eq!(version.created_by, user);
    let file_id = created.file.id;

    let updated = server
        .put(&format!("/api/v1/file/{}", file_id))
        .add_header(user_header(), as_user(user))
        .json(&FileChanges::content("hello world"))
        .await
        .json::<FileWrite>();
    assert_eq!(updated.file.content, "hello world");
    assert_eq!(
        updated.version.map(|v| v.version),
        Some(2),
        "content change should allocate version 2"
    );

    // metadata only, no new version
    let renamed = server
        .put(&format!("/api/v1/file/{}", file_id))
        .add_header(user_header(), as_user(user))
        .json(&FileChanges::rename("README.md"))
        .await
        .json::<FileWrite>();
    assert_eq!(renamed.file.name, "README.md");
    assert!(renamed.version.is_none());

    let fetched = server
        .get(&format!("/api/v1/file/{}", file_id))
        .add_header(user_header(), as_user(user))
        .await
        .json::<file::Model>();
    assert_eq!(fetched.content, "hello world");
    assert_eq!(fetched.name, "README.md");

    let versions = server
        .get(&format!("/api/v1/file/{}/versions", file_id))
        .add_header(user_header(), as_user(user))
        .await
        .json::<Vec<file_version::Model>>();
    let numbers: Vec<i32> = versions.iter().map(|v| v.version).collect();
    assert_eq!(numbers, vec![2, 1], "history is newest first");

    let latest = server
        .get(&format!("/api/v1/file/{}/versions/latest", file_id))
        .add_header(user_header(), as_user(user))
        .await
        .json::<file_version::Model>();
    assert_eq!(latest.version, 2);
    assert_eq!(latest.content, fetched.content);

    let first = server
        .get(&format!("/api/v1/file/{}/version/1", file_id))
        .add_header(user_header(), as_user(user))
        .await
        .json::<file_version::Model>();
    assert_eq!(first.content, "hello");

    server
        .get(&format!("/api/v1/file/{}/version/99", file_id))
        .add_header(user_header(), as_user(user))
        .expect_failure()
        .await
        .assert_status(StatusCode::NOT_FOUND);

    let files = server
        .get(&format!("/api/v1/stash/{}/files", stash.id))
        .add_header(user_header(), as_user(user))
        .await
        .json::<Vec<file::Model>>();
    assert_eq!(files.len(), 1);
    debug!("Files: {:?}", files);
}

#[tokio::test]
async fn test_api_revert_appends_version() {
    let server = setup_test_server().await;
    let user = Uuid::new_v4();
    let stash = create_stash(&server, user, "drafts").await;
    let file_id = create_file(&server, user, stash.id, &NewFile::new("draft.md", "a"))
        .await
        .file
        .id;

    for content in ["b", "c"] {
        server
            .put(&format!("/api/v1/file/{}", file_id))
            .add_header(user_header(), as_user(user))
            .json(&FileChanges::content(content))
            .await
            .assert_status_ok();
    }

    let reverted = server
        .post(&format!("/api/v1/file/{}/revert", file_id))
        .add_header(user_header(), as_user(user))
        .json(&RevertRequest { version: 1 })
        .await
        .json::<FileWrite>();
    assert_eq!(reverted.file.content, "a");
    let version = reverted.version.expect("revert always writes a version");
    assert_eq!(version.version, 4);
    assert_eq!(version.content, "a");

    let versions = server
        .get(&format!("/api/v1/file/{}/versions", file_id))
        .add_header(user_header(), as_user(user))
        .await
        .json::<Vec<file_version::Model>>();
    assert_eq!(versions.len(), 4, "old versions are kept");

    server
        .post(&format!("/api/v1/file/{}/revert", file_id))
        .add_header(user_header(), as_user(user))
        .json(&RevertRequest { version: 42 })
        .expect_failure()
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_api_requires_user() {
    let server = setup_test_server().await;

    server
        .get("/api/v1/stashes")
        .expect_failure()
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    server
        .post("/api/v1/stash")
        .add_header(user_header(), HeaderValue::from_static("bob"))
        .json(&json!({"name": "nope"}))
        .expect_failure()
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_api_other_users_data_is_hidden() {
    let server = setup_test_server().await;
    let alice = Uuid::new_v4();
    let mallory = Uuid::new_v4();

    let stash = create_stash(&server, alice, "private").await;
    let file_id = create_file(&server, alice, stash.id, &NewFile::new("secret.md", "s3cret"))
        .await
        .file
        .id;

    server
        .get(&format!("/api/v1/stash/{}", stash.id))
        .add_header(user_header(), as_user(mallory))
        .expect_failure()
        .await
        .assert_status(StatusCode::NOT_FOUND);

    server
        .get(&format!("/api/v1/file/{}", file_id))
        .add_header(user_header(), as_user(mallory))
        .expect_failure()
        .await
        .assert_status(StatusCode::NOT_FOUND);

    server
        .put(&format!("/api/v1/file/{}", file_id))
        .add_header(user_header(), as_user(mallory))
        .json(&FileChanges::content("pwned"))
        .expect_failure()
        .await
        .assert_status(StatusCode::NOT_FOUND);

    server
        .post(&format!("/api/v1/stash/{}/file", stash.id))
        .add_header(user_header(), as_user(mallory))
        .json(&NewFile::new("sneaky.md", ""))
        .expect_failure()
        .await
        .assert_status(StatusCode::NOT_FOUND);

    let stashes = server
        .get("/api/v1/stashes")
        .add_header(user_header(), as_user(mallory))
        .await
        .json::<Vec<stash::Model>>();
    assert!(stashes.is_empty());

    let untouched = server
        .get(&format!("/api/v1/file/{}", file_id))
        .add_header(user_header(), as_user(alice))
        .await
        .json::<file::Model>();
    assert_eq!(untouched.content, "s3cret");
}

#[tokio::test]
async fn test_api_content_type_validation() {
    let server = setup_test_server().await;
    let user = Uuid::new_v4();
    let stash = create_stash(&server, user, "data").await;

    let mut bad = NewFile::new("data.json", "{not json");
    bad.content_type = ContentType::Json;
    server
        .post(&format!("/api/v1/stash/{}/file", stash.id))
        .add_header(user_header(), as_user(user))
        .json(&bad)
        .expect_failure()
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let mut good = NewFile::new("data.jsonl", "{\"a\":1}\n{\"b\":2}\n");
    good.content_type = ContentType::Jsonl;
    let created = create_file(&server, user, stash.id, &good).await;
    assert_eq!(created.file.content_type, ContentType::Jsonl);

    server
        .put(&format!("/api/v1/file/{}", created.file.id))
        .add_header(user_header(), as_user(user))
        .json(&FileChanges::content("{\"a\":1}\nnope\n"))
        .expect_failure()
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    server
        .post(&format!("/api/v1/stash/{}/file", stash.id))
        .add_header(user_header(), as_user(user))
        .json(&NewFile::new("  ", "nameless"))
        .expect_failure()
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_api_delete_stash_cascades() {
    let server = setup_test_server().await;
    let user = Uuid::new_v4();
    let stash = create_stash(&server, user, "scratch").await;
    let file_id = create_file(&server, user, stash.id, &NewFile::new("tmp.md", "x"))
        .await
        .file
        .id;

    server
        .delete(&format!("/api/v1/stash/{}", stash.id))
        .add_header(user_header(), as_user(user))
        .await
        .assert_status_ok();

    server
        .get(&format!("/api/v1/file/{}", file_id))
        .add_header(user_header(), as_user(user))
        .expect_failure()
        .await
        .assert_status(StatusCode::NOT_FOUND);

    server
        .get(&format!("/api/v1/stash/{}", stash.id))
        .add_header(user_header(), as_user(user))
        .expect_failure()
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_api_delete_file() {
    let server = setup_test_server().await;
    let user = Uuid::new_v4();
    let stash = create_stash(&server, user, "scratch").await;
    let file_id = create_file(&server, user, stash.id, &NewFile::new("tmp.md", "x"))
        .await
        .file
        .id;

    server
        .delete(&format!("/api/v1/file/{}", file_id))
        .add_header(user_header(), as_user(user))
        .await
        .assert_status_ok();

    server
        .get(&format!("/api/v1/file/{}/versions", file_id))
        .add_header(user_header(), as_user(user))
        .expect_failure()
        .await
        .assert_status(StatusCode::NOT_FOUND);

    server
        .delete(&format!("/api/v1/file/{}", file_id))
        .add_header(user_header(), as_user(user))
        .expect_failure()
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_openapi_served() {
    let server = setup_test_server().await;
    let doc = server.get("/api/v1/openapi.json").await.json::<serde_json::Value>();
    assert!(doc["paths"]["/api/v1/file/{id}/revert"].is_object());
}
