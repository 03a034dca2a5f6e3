use super::*;
use crate::cache::{CachePolicy, TorrentCache};
use crate::catalog::CatalogOptions;
use crate::constants::{DEFAULT_NAMESPACE, TORRENT_CONTENT_TYPE};
use crate::manifest::{ManifestResolver, MissingBlobPolicy, ModelName};
use crate::metainfo::TorrentDescriptor;
use crate::test_support::StoreFixture;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use tower::ServiceExt;

fn catalog(fixture: &StoreFixture, store_torrent: bool) -> Arc<ModelCatalog> {
    let resolver = ManifestResolver::new(
        fixture.store.clone(),
        DEFAULT_NAMESPACE,
        MissingBlobPolicy::Fail,
    );
    let cache = TorrentCache::new(fixture.dir.path().join("torrents"), CachePolicy::Content);
    let options = CatalogOptions {
        announce: "http://127.0.0.1:8081/ollama/announce".to_string(),
        label: "models".to_string(),
        model_piece_length: 1024,
        store_piece_length: 4096,
        max_concurrent_builds: 2,
        store_torrent,
    };
    Arc::new(ModelCatalog::new(resolver, cache, options))
}

async fn get(router: Router, uri: &str) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let response = router
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, headers, body.to_vec())
}

fn error_code(body: &[u8]) -> String {
    let value: serde_json::Value = serde_json::from_slice(body).unwrap();
    value["code"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health_reports_model_count() {
    let fixture = StoreFixture::new();
    fixture.add_model("llama3", "8b", &[b"weights"]);
    let catalog = catalog(&fixture, false);
    catalog.refresh().await.unwrap();

    let (status, _, body) = get(create_router(AppState::new(catalog)), "/health").await;
    assert_eq!(status, StatusCode::OK);
    let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(value["status"], "ok");
    assert_eq!(value["models"], 1);
}

#[tokio::test]
async fn test_list_models() {
    let fixture = StoreFixture::new();
    fixture.add_model("phi3", "mini", &[b"phi"]);
    fixture.add_model("llama3", "8b", &[b"weights", b"template"]);
    let catalog = catalog(&fixture, false);
    catalog.refresh().await.unwrap();

    let (status, _, body) = get(create_router(AppState::new(catalog)), "/api/models").await;
    assert_eq!(status, StatusCode::OK);

    let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
    let models = value.as_array().unwrap();
    assert_eq!(models.len(), 2);
    assert_eq!(models[0]["name"], "llama3:8b");
    assert_eq!(models[1]["name"], "phi3:mini");
    assert!(models[0]["info_hash"].as_str().unwrap().len() == 40);
}

#[tokio::test]
async fn test_model_torrent_download() {
    let fixture = StoreFixture::new();
    fixture.add_model("llama3", "8b", &[b"weights"]);
    let catalog = catalog(&fixture, false);
    let snapshot = catalog.refresh().await.unwrap();
    let model = snapshot.get("llama3:8b").unwrap().clone();

    let (status, headers, body) = get(
        create_router(AppState::new(catalog)),
        "/api/models/llama3:8b/torrent",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], TORRENT_CONTENT_TYPE);
    assert_eq!(
        headers[header::CONTENT_DISPOSITION],
        "attachment; filename=\"llama3_8b.torrent\"; filename*=UTF-8''llama3%3A8b.torrent"
    );
    assert_eq!(body, std::fs::read(model.torrent_file.unwrap()).unwrap());

    let descriptor = TorrentDescriptor::from_bytes(&body).unwrap();
    assert_eq!(descriptor.info_hash().unwrap().to_hex(), model.info_hash.unwrap());
}

#[tokio::test]
async fn test_download_names_underscored_model() {
    let fixture = StoreFixture::new();
    fixture.add_model("foo_bar", "x", &[b"first"]);
    fixture.add_model("foo", "bar_x", &[b"second"]);
    let catalog = catalog(&fixture, false);
    let snapshot = catalog.refresh().await.unwrap();
    let model = snapshot.get("foo:bar_x").unwrap().clone();
    let stem = ModelName::parse("foo:bar_x").unwrap().file_stem();

    let (status, headers, body) = get(
        create_router(AppState::new(catalog)),
        "/api/models/foo:bar_x/torrent",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        headers[header::CONTENT_DISPOSITION],
        format!("attachment; filename=\"{stem}.torrent\"; filename*=UTF-8''foo%3Abar_x.torrent")
            .as_str()
    );

    let descriptor = TorrentDescriptor::from_bytes(&body).unwrap();
    assert_eq!(descriptor.comment.as_deref(), Some("Model: foo:bar_x"));
    assert_eq!(descriptor.info_hash().unwrap().to_hex(), model.info_hash.unwrap());
}

#[tokio::test]
async fn test_untagged_name_resolves_latest() {
    let fixture = StoreFixture::new();
    fixture.add_model("mistral", "latest", &[b"weights"]);
    let catalog = catalog(&fixture, false);
    catalog.refresh().await.unwrap();

    let (status, _, _) = get(
        create_router(AppState::new(catalog)),
        "/api/models/mistral/torrent",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_unknown_model_is_not_found() {
    let fixture = StoreFixture::new();
    let catalog = catalog(&fixture, false);
    catalog.refresh().await.unwrap();

    let (status, _, body) = get(
        create_router(AppState::new(catalog)),
        "/api/models/ghost:1b/torrent",
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_code(&body), "MODEL_NOT_FOUND");
}

#[tokio::test]
async fn test_invalid_name_is_rejected() {
    let fixture = StoreFixture::new();
    let catalog = catalog(&fixture, false);

    let (status, _, body) = get(
        create_router(AppState::new(catalog)),
        "/api/models/..:latest/torrent",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "INVALID_MODEL_NAME");
}

#[tokio::test]
async fn test_failed_build_has_no_torrent() {
    let fixture = StoreFixture::new();
    let digest = fixture.add_blob(b"weights");
    std::fs::remove_file(fixture.store.blob_path(&digest)).unwrap();
    fixture.add_manifest(
        crate::manifest::ManifestLayout::Flat,
        "broken",
        "latest",
        &[(digest, 7)],
    );
    let catalog = catalog(&fixture, false);
    let snapshot = catalog.refresh().await.unwrap();
    assert!(snapshot.get("broken:latest").unwrap().torrent_file.is_none());

    let (status, _, body) = get(
        create_router(AppState::new(catalog)),
        "/api/models/broken/torrent",
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_code(&body), "TORRENT_NOT_FOUND");
}

#[tokio::test]
async fn test_artifact_removed_after_refresh() {
    let fixture = StoreFixture::new();
    fixture.add_model("llama3", "8b", &[b"weights"]);
    let catalog = catalog(&fixture, false);
    let snapshot = catalog.refresh().await.unwrap();
    let artifact = snapshot.get("llama3:8b").unwrap().torrent_file.clone().unwrap();
    std::fs::remove_file(artifact).unwrap();

    let (status, _, body) = get(
        create_router(AppState::new(catalog)),
        "/api/models/llama3:8b/torrent",
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_code(&body), "TORRENT_NOT_FOUND");
}

#[tokio::test]
async fn test_store_torrent() {
    let fixture = StoreFixture::new();
    fixture.add_model("llama3", "8b", &[b"weights"]);

    let disabled = catalog(&fixture, false);
    disabled.refresh().await.unwrap();
    let (status, _, _) = get(create_router(AppState::new(disabled)), "/api/store/torrent").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let enabled = catalog(&fixture, true);
    enabled.refresh().await.unwrap();
    let (status, headers, body) =
        get(create_router(AppState::new(enabled)), "/api/store/torrent").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        headers[header::CONTENT_DISPOSITION],
        "attachment; filename=\"models.torrent\"; filename*=UTF-8''models.torrent"
    );
    let descriptor = TorrentDescriptor::from_bytes(&body).unwrap();
    assert_eq!(descriptor.info.files.len(), 2);
}
