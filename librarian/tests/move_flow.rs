use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use librarian::{
    CacheLookup, DriveKind, HttpDrive, Library, LibrarianConfig, MoveError, PageCache,
    SqliteCache,
};
use librarian_core::DriveClient;
use serde_json::json;
use sqlx::SqlitePool;
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const FOLDER: &str = "application/vnd.google-apps.folder";

async fn mount_listing(server: &MockServer, folder_id: &str, files: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .and(query_param(
            "q",
            format!("'{folder_id}' in parents and trashed = false"),
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "files": files })))
        .mount(server)
        .await;
}

async fn mount_drive(server: &MockServer) {
    mount_listing(
        server,
        "root-1",
        json!([
            {"id": "f-21", "name": "Article 21.2", "mimeType": FOLDER, "parents": ["root-1"]},
            {"id": "f-10", "name": "Article 10.1", "mimeType": FOLDER, "parents": ["root-1"]}
        ]),
    )
    .await;
    mount_listing(
        server,
        "f-21",
        json!([
            {
                "id": "afia",
                "name": "Article AFIA",
                "mimeType": "application/vnd.google-apps.document",
                "parents": ["f-21"],
                "modifiedTime": "2024-03-01T12:00:00Z"
            }
        ]),
    )
    .await;
    mount_listing(
        server,
        "f-10",
        json!([
            {"id": "team-1", "name": "Team Folder 1", "mimeType": FOLDER, "parents": ["f-10"]}
        ]),
    )
    .await;
    mount_listing(server, "team-1", json!([])).await;
}

fn config(server: &MockServer) -> LibrarianConfig {
    LibrarianConfig {
        drive_id: "root-1".into(),
        drive_name: "Library".into(),
        drive_kind: DriveKind::Team,
        api_base: Url::parse(&server.uri()).unwrap(),
        token: Some("test-token".into()),
        trash_folder_id: Some("trash-id".into()),
        cache_db: PathBuf::from("unused.db"),
        remote_timeout: Duration::from_secs(5),
        page_size: 50,
        log_filter: "info".into(),
    }
}

async fn make_library(server: &MockServer) -> (Library, Arc<SqliteCache>) {
    let client = DriveClient::with_base_url(&server.uri(), "test-token").unwrap();
    let remote = Arc::new(HttpDrive::new(client, 50));
    let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
    let cache = Arc::new(SqliteCache::from_pool(pool));
    cache.init().await.unwrap();
    let library = Library::assemble(config(server), remote, cache.clone())
        .await
        .unwrap();
    (library, cache)
}

#[tokio::test]
async fn move_rewrites_cache_under_new_path() {
    let server = MockServer::start().await;
    mount_drive(&server).await;
    Mock::given(method("PATCH"))
        .and(path("/drive/v3/files/afia"))
        .and(query_param("addParents", "team-1"))
        .and(query_param("removeParents", "f-21"))
        .and(query_param("corpora", "teamDrive"))
        .and(query_param("teamDriveId", "root-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "afia",
            "name": "Article AFIA",
            "mimeType": "application/vnd.google-apps.document",
            "parents": ["team-1"]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (library, cache) = make_library(&server).await;
    cache
        .add("afia", 1, "/article-21-2/article-afia", Some("<h1>AFIA</h1>"))
        .await
        .unwrap();

    let redirect = library
        .move_file("afia", "team-1", DriveKind::Team)
        .await
        .unwrap();

    assert_eq!(redirect, "/article-10-1/team-folder-1/article-afia");
    assert_eq!(
        cache.lookup(&redirect).await.unwrap(),
        CacheLookup::Found("<h1>AFIA</h1>".into())
    );
    assert_eq!(
        cache.lookup("/article-21-2/article-afia").await.unwrap(),
        CacheLookup::Miss
    );
    assert_eq!(
        library.index().get_meta("afia").await.unwrap().path,
        redirect
    );
}

#[tokio::test]
async fn remote_rejection_redirects_home() {
    let server = MockServer::start().await;
    mount_drive(&server).await;
    Mock::given(method("PATCH"))
        .and(path("/drive/v3/files/afia"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
        .mount(&server)
        .await;

    let (library, cache) = make_library(&server).await;
    cache
        .add("afia", 1, "/article-21-2/article-afia", Some("<h1>AFIA</h1>"))
        .await
        .unwrap();

    let redirect = library
        .move_file("afia", "team-1", DriveKind::Shared)
        .await
        .unwrap();

    assert_eq!(redirect, "/");
    assert_eq!(cache.len().await.unwrap(), 1);
}

#[tokio::test]
async fn trash_and_validation_paths() {
    let server = MockServer::start().await;
    mount_drive(&server).await;

    let (library, _cache) = make_library(&server).await;

    assert_eq!(
        library
            .move_file("afia", "trash-id", DriveKind::Shared)
            .await
            .unwrap(),
        "/"
    );
    assert_eq!(
        library
            .move_file("root-1", "team-1", DriveKind::Shared)
            .await,
        Err(MoveError::RootIsSource("root-1".into()))
    );

    let folders = library.get_folders().await;
    assert_eq!(folders.len(), 1);
    assert_eq!(folders[0].pretty_name, "Library");
}
