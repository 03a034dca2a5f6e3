use super::*;
use crate::cache::CachePolicy;
use crate::constants::DEFAULT_NAMESPACE;
use crate::manifest::{ManifestLayout, MissingBlobPolicy};
use crate::store::Digest;
use crate::test_support::{manifest_json, StoreFixture};
use std::time::Duration;

const ANNOUNCE: &str = "http://127.0.0.1:8081/ollama/announce";

fn options(store_torrent: bool, max_concurrent_builds: usize) -> CatalogOptions {
    CatalogOptions {
        announce: ANNOUNCE.to_string(),
        label: "models".to_string(),
        model_piece_length: 1024,
        store_piece_length: 4096,
        max_concurrent_builds,
        store_torrent,
    }
}

fn catalog_with(
    fixture: &StoreFixture,
    policy: CachePolicy,
    options: CatalogOptions,
) -> Arc<ModelCatalog> {
    let resolver = ManifestResolver::new(
        fixture.store.clone(),
        DEFAULT_NAMESPACE,
        MissingBlobPolicy::Fail,
    );
    let cache = TorrentCache::new(fixture.dir.path().join("torrents"), policy);
    Arc::new(ModelCatalog::new(resolver, cache, options))
}

fn catalog(fixture: &StoreFixture) -> Arc<ModelCatalog> {
    catalog_with(fixture, CachePolicy::Content, options(false, 1))
}

fn blob(len: usize, seed: u8) -> Vec<u8> {
    (0..len).map(|i| (i as u8).wrapping_mul(7).wrapping_add(seed)).collect()
}

fn read_torrent(path: &Path) -> TorrentDescriptor {
    TorrentDescriptor::from_bytes(&std::fs::read(path).unwrap()).unwrap()
}

#[tokio::test]
async fn test_refresh_builds_every_model() {
    let fixture = StoreFixture::new();
    let a = blob(3000, 1);
    let b = blob(500, 2);
    let manifest = fixture.add_model("llama3", "8b", &[&a, &b]);
    fixture.add_model("phi3", "mini", &[&blob(10, 3)]);

    let catalog = catalog(&fixture);
    assert!(catalog.snapshot().is_empty());

    let snapshot = catalog.refresh().await.unwrap();
    assert_eq!(snapshot.len(), 2);
    assert_eq!(snapshot.built(), 2);
    assert!(Arc::ptr_eq(&snapshot, &catalog.snapshot()));

    let model = snapshot.get("llama3:8b").unwrap();
    let manifest_len = std::fs::metadata(&manifest).unwrap().len();
    assert_eq!(model.size, manifest_len + 3500);
    assert_eq!(model.path, manifest);

    let artifact = model.torrent_file.as_ref().unwrap();
    assert_eq!(artifact, &fixture.dir.path().join("torrents/llama3_8b.torrent"));

    let torrent = read_torrent(artifact);
    assert_eq!(torrent.announce, ANNOUNCE);
    assert_eq!(torrent.comment.as_deref(), Some("Model: llama3:8b"));
    assert_eq!(torrent.info.name, "models");
    assert!(torrent.info.private);
    assert_eq!(torrent.info.files.len(), 3);
    assert_eq!(torrent.info.piece_length, 1024);
    assert_eq!(torrent.info.total_length(), model.size);
    assert_eq!(
        model.info_hash.as_deref(),
        Some(torrent.info_hash().unwrap().to_hex().as_str())
    );
}

#[tokio::test]
async fn test_missing_blob_lists_model_without_torrent() {
    let fixture = StoreFixture::new();
    fixture.add_model("good", "1", &[&blob(100, 1)]);

    let present = fixture.add_blob(&blob(50, 2));
    let absent = Digest::parse(&"ef".repeat(32)).unwrap();
    fixture.add_manifest(
        ManifestLayout::Flat,
        "broken",
        "1",
        &[(present, 50), (absent, 70)],
    );

    let snapshot = catalog(&fixture).refresh().await.unwrap();
    assert_eq!(snapshot.len(), 2);

    let broken = snapshot.get("broken:1").unwrap();
    assert_eq!(broken.torrent_file, None);
    assert_eq!(broken.info_hash, None);
    assert!(broken.size > 120);
    assert!(!fixture.dir.path().join("torrents/broken_1.torrent").exists());

    let good = snapshot.get("good:1").unwrap();
    assert!(good.torrent_file.as_ref().unwrap().is_file());
}

#[tokio::test]
async fn test_unparseable_and_stray_manifests_are_omitted() {
    let fixture = StoreFixture::new();
    fixture.add_model("ok", "1", &[&blob(10, 1)]);
    fixture.write_manifest(ManifestLayout::Flat, "bad", "1", b"{ nope");

    let stray = fixture
        .store
        .manifests_dir()
        .join(DEFAULT_NAMESPACE)
        .join("user/model/tag");
    std::fs::create_dir_all(stray.parent().unwrap()).unwrap();
    std::fs::write(&stray, manifest_json(&[])).unwrap();

    let snapshot = catalog(&fixture).refresh().await.unwrap();
    let names: Vec<&str> = snapshot.models.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["ok:1"]);
}

#[tokio::test]
async fn test_name_collision_prefers_flat_layout() {
    let fixture = StoreFixture::new();
    let digest = fixture.add_blob(b"shared");
    let flat = fixture.add_manifest(ManifestLayout::Flat, "m", "t", &[(digest.clone(), 6)]);
    let nested = fixture.add_manifest(ManifestLayout::Namespaced, "m", "t", &[(digest, 6)]);

    let discovered = discover(&fixture.store, DEFAULT_NAMESPACE).await.unwrap();
    assert_eq!(discovered.len(), 1);
    assert_eq!(discovered[0].location.path, flat);
    assert_eq!(discovered[0].shadowed, vec![nested]);

    let snapshot = catalog(&fixture).refresh().await.unwrap();
    assert_eq!(snapshot.get("m:t").unwrap().path, flat);
}

#[tokio::test]
async fn test_refresh_and_build_agree_on_manifest() {
    // "qwen" sorts after "library", so path order alone would pick the
    // nested manifest while lookups by name pick the flat one.
    let fixture = StoreFixture::new();
    let flat_blob = fixture.add_blob(&blob(700, 1));
    let nested_blob = fixture.add_blob(&blob(900, 2));
    let flat = fixture.add_manifest(ManifestLayout::Flat, "qwen", "7b", &[(flat_blob, 700)]);
    fixture.add_manifest(ManifestLayout::Namespaced, "qwen", "7b", &[(nested_blob, 900)]);

    let catalog = catalog(&fixture);
    let snapshot = catalog.refresh().await.unwrap();
    let listed = snapshot.get("qwen:7b").unwrap();
    assert_eq!(listed.path, flat);

    let located = catalog.resolver.locate("qwen:7b").await.unwrap();
    assert_eq!(located.path, listed.path);

    let built = catalog.build("qwen:7b").await.unwrap();
    assert_eq!(Some(&built.path), listed.torrent_file.as_ref());
    assert_eq!(Some(&built.info_hash), listed.info_hash.as_ref());
}

#[tokio::test]
async fn test_underscored_names_get_separate_artifacts() {
    let fixture = StoreFixture::new();
    fixture.add_model("foo_bar", "x", &[&blob(300, 1)]);
    fixture.add_model("foo", "bar_x", &[&blob(400, 2)]);

    let catalog = catalog(&fixture);
    let snapshot = catalog.refresh().await.unwrap();
    let a = snapshot.get("foo_bar:x").unwrap();
    let b = snapshot.get("foo:bar_x").unwrap();
    assert_ne!(a.torrent_file, b.torrent_file);
    assert_ne!(a.info_hash, b.info_hash);

    for model in [a, b] {
        let torrent = read_torrent(model.torrent_file.as_ref().unwrap());
        let comment = format!("Model: {}", model.name);
        assert_eq!(torrent.comment.as_deref(), Some(comment.as_str()));
        assert_eq!(
            torrent.info_hash().unwrap().to_hex(),
            *model.info_hash.as_ref().unwrap()
        );
    }

    // Reuse on the next pass: neither build evicts the other.
    let again = catalog.refresh().await.unwrap();
    assert_eq!(again.get("foo_bar:x").unwrap().info_hash, a.info_hash);
    assert_eq!(again.get("foo:bar_x").unwrap().info_hash, b.info_hash);
}

#[test]
fn test_select_is_order_independent() {
    let root = Path::new("/s/manifests");
    let paths = [
        "/s/manifests/a.example/m/t",
        "/s/manifests/registry.ollama.ai/m/t.json",
        "/s/manifests/registry.ollama.ai/m/t",
        "/s/manifests/registry.ollama.ai/library/m/t",
        "/s/manifests/registry.ollama.ai/other/latest",
        "/s/manifests/registry.ollama.ai/too/deep/path/here",
    ];

    let forward: Vec<PathBuf> = paths.iter().map(PathBuf::from).collect();
    let mut backward = forward.clone();
    backward.reverse();

    let a = select(root, DEFAULT_NAMESPACE, forward);
    let b = select(root, DEFAULT_NAMESPACE, backward);
    assert_eq!(a, b);

    let names: Vec<String> = a.iter().map(|d| d.location.name.to_string()).collect();
    assert_eq!(names, vec!["m:t", "other:latest"]);
    assert_eq!(
        a[0].location.path,
        PathBuf::from("/s/manifests/registry.ollama.ai/m/t")
    );
    assert_eq!(
        a[0].shadowed,
        vec![
            PathBuf::from("/s/manifests/registry.ollama.ai/m/t.json"),
            PathBuf::from("/s/manifests/registry.ollama.ai/library/m/t"),
            PathBuf::from("/s/manifests/a.example/m/t"),
        ]
    );
}

#[cfg(unix)]
#[tokio::test]
async fn test_symlink_cycle_is_walked_once() {
    let fixture = StoreFixture::new();
    fixture.add_model("m", "t", &[&blob(100, 1)]);
    let namespace_dir = fixture.store.manifests_dir().join(DEFAULT_NAMESPACE);
    std::os::unix::fs::symlink(&namespace_dir, namespace_dir.join("m").join("loop")).unwrap();
    std::os::unix::fs::symlink(fixture.store.blobs_dir(), fixture.store.blobs_dir().join("self"))
        .unwrap();

    let discovered = discover(&fixture.store, DEFAULT_NAMESPACE).await.unwrap();
    assert_eq!(discovered.len(), 1);
    assert!(discovered[0].shadowed.is_empty());

    let files = store_files(&fixture.store).await.unwrap();
    assert_eq!(files.len(), 2);
}

#[tokio::test]
async fn test_unchanged_store_reuses_artifacts() {
    let fixture = StoreFixture::new();
    fixture.add_model("m", "t", &[&blob(5000, 1)]);
    let catalog = catalog(&fixture);

    let first = catalog.refresh().await.unwrap();
    let artifact = first.get("m:t").unwrap().torrent_file.clone().unwrap();
    let bytes = std::fs::read(&artifact).unwrap();
    let modified = std::fs::metadata(&artifact).unwrap().modified().unwrap();

    tokio::time::sleep(Duration::from_millis(1100)).await;

    let second = catalog.refresh().await.unwrap();
    let model = second.get("m:t").unwrap();
    assert_eq!(model.torrent_file.as_ref(), Some(&artifact));
    assert_eq!(model.info_hash, first.get("m:t").unwrap().info_hash);
    assert_eq!(std::fs::read(&artifact).unwrap(), bytes);
    assert_eq!(
        std::fs::metadata(&artifact).unwrap().modified().unwrap(),
        modified
    );

    let built = catalog.build("m:t").await.unwrap();
    assert_eq!(built.path, artifact);
    assert_eq!(std::fs::read(&artifact).unwrap(), bytes);
}

#[tokio::test]
async fn test_changed_manifest_invalidates_artifact() {
    let fixture = StoreFixture::new();
    let first_blob = blob(2000, 1);
    fixture.add_model("m", "t", &[&first_blob]);
    let catalog = catalog(&fixture);

    let before = catalog.refresh().await.unwrap();
    let before_hash = before.get("m:t").unwrap().info_hash.clone().unwrap();

    fixture.add_model("m", "t", &[&first_blob, &blob(300, 9)]);

    let after = catalog.refresh().await.unwrap();
    let model = after.get("m:t").unwrap();
    assert_ne!(model.info_hash.as_deref(), Some(before_hash.as_str()));

    let torrent = read_torrent(model.torrent_file.as_ref().unwrap());
    assert_eq!(torrent.info.files.len(), 3);
    assert_eq!(torrent.info_hash().unwrap().to_hex(), model.info_hash.clone().unwrap());
}

#[tokio::test]
async fn test_existence_policy_keeps_stale_artifact() {
    let fixture = StoreFixture::new();
    let first_blob = blob(2000, 1);
    fixture.add_model("m", "t", &[&first_blob]);
    let catalog = catalog_with(&fixture, CachePolicy::Existence, options(false, 1));

    let before = catalog.refresh().await.unwrap();
    let artifact = before.get("m:t").unwrap().torrent_file.clone().unwrap();
    let bytes = std::fs::read(&artifact).unwrap();

    fixture.add_model("m", "t", &[&first_blob, &blob(300, 9)]);
    catalog.refresh().await.unwrap();

    assert_eq!(std::fs::read(&artifact).unwrap(), bytes);
}

#[tokio::test]
async fn test_corrupt_cached_artifact_is_rebuilt() {
    let fixture = StoreFixture::new();
    fixture.add_model("m", "t", &[&blob(100, 1)]);
    let catalog = catalog_with(&fixture, CachePolicy::Existence, options(false, 1));

    let artifact = catalog.cache().artifact_path("m_t");
    std::fs::create_dir_all(artifact.parent().unwrap()).unwrap();
    std::fs::write(&artifact, b"garbage").unwrap();

    let snapshot = catalog.refresh().await.unwrap();
    assert!(snapshot.get("m:t").unwrap().info_hash.is_some());
    assert!(read_torrent(&artifact).info.private);
}

#[tokio::test]
async fn test_parallel_builds() {
    let fixture = StoreFixture::new();
    for i in 0..6u8 {
        fixture.add_model(&format!("model{i}"), "latest", &[&blob(4000 + i as usize, i)]);
    }

    let snapshot = catalog_with(&fixture, CachePolicy::Content, options(false, 4))
        .refresh()
        .await
        .unwrap();

    assert_eq!(snapshot.len(), 6);
    assert_eq!(snapshot.built(), 6);
    let names: Vec<&str> = snapshot.models.iter().map(|m| m.name.as_str()).collect();
    let mut sorted = names.clone();
    sorted.sort();
    assert_eq!(names, sorted);
}

#[tokio::test]
async fn test_store_torrent_covers_whole_store() {
    let fixture = StoreFixture::new();
    fixture.add_model("a", "1", &[&blob(3000, 1)]);
    fixture.add_model("b", "1", &[&blob(2000, 2), &blob(10, 3)]);

    let snapshot = catalog_with(&fixture, CachePolicy::Content, options(true, 1))
        .refresh()
        .await
        .unwrap();

    let store = snapshot.store_torrent.as_ref().unwrap();
    assert!(store.path.ends_with("torrents/models.torrent"));

    let torrent = read_torrent(&store.path);
    assert_eq!(torrent.comment.as_deref(), Some("Model store: models"));
    assert_eq!(torrent.info.files.len(), 5);
    assert_eq!(torrent.info.piece_length, 4096);
    assert_eq!(torrent.info.total_length(), store.size);

    let paths: Vec<&Vec<String>> = torrent.info.files.iter().map(|f| &f.path).collect();
    let mut sorted = paths.clone();
    sorted.sort();
    assert_eq!(paths, sorted);
    assert_eq!(paths[0][0], "blobs");
    assert_eq!(paths[4][0], "manifests");
}

#[tokio::test]
async fn test_missing_store_is_fatal() {
    let dir = tempfile::TempDir::new().unwrap();
    let resolver = ManifestResolver::new(
        BlobStore::new(dir.path().join("absent")),
        DEFAULT_NAMESPACE,
        MissingBlobPolicy::Fail,
    );
    let cache = TorrentCache::new(dir.path().join("torrents"), CachePolicy::Content);
    let catalog = Arc::new(ModelCatalog::new(resolver, cache, options(false, 1)));

    let err = catalog.refresh().await.unwrap_err();
    assert!(matches!(err, CatalogError::StoreUnreadable(_)));
    assert!(catalog.snapshot().is_empty());
}

#[tokio::test]
async fn test_build_unknown_model() {
    let fixture = StoreFixture::new();
    let err = catalog(&fixture).build("ghost").await.unwrap_err();
    assert!(matches!(
        err,
        BuildError::Manifest(crate::manifest::ManifestError::NotFound { .. })
    ));
}

#[test]
fn test_store_label() {
    assert_eq!(store_label(Path::new("/var/lib/ollama/models")), "models");
    assert_eq!(store_label(Path::new("/srv/llm-store")), "llm-store");
    assert_eq!(store_label(Path::new("/")), "models");
}

#[test]
fn test_snapshot_lookup() {
    let model = |name: &str| Model {
        name: name.to_string(),
        size: 1,
        path: PathBuf::from("/m"),
        torrent_file: None,
        info_hash: None,
        created_at: 0,
    };
    let snapshot = CatalogSnapshot {
        models: vec![model("a:1"), model("b:1"), model("c:1")],
        store_torrent: None,
        published_at: 0,
    };
    assert_eq!(snapshot.get("b:1").unwrap().name, "b:1");
    assert!(snapshot.get("d:1").is_none());
    assert_eq!(snapshot.built(), 0);
}
