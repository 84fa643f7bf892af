//! Client tests against an in-memory transport.


use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use self::mock::MockTransport;
use super::{AssetClient, ClientOptions};
use crate::config::DEFAULT_MAX_MASTER_UPLOAD_BYTES;
use crate::error::AssetError;
use crate::model::{AssetId, AssetRef, Destination, MetadataPolicy, RenditionDescriptor, RenditionKind};
use crate::storage;
use crate::transfer::{CancelStatus, Priority, Transfer, TransferOutcome, TransferState};
use crate::transport::Transport;

const TWO_MB: usize = 2 * 1024 * 1024;

fn write_file(dir: &Path, name: &str, len: usize) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, vec![0xABu8; len]).unwrap();
    path
}

fn client_for(mock: &Arc<MockTransport>, dir: &Path) -> AssetClient {
    client_with(mock, ClientOptions::new(dir.join("cache")))
}

fn client_with(mock: &Arc<MockTransport>, options: ClientOptions) -> AssetClient {
    let transport: Arc<dyn Transport> = Arc::clone(mock) as Arc<dyn Transport>;
    AssetClient::new(transport, options)
}

fn collection() -> Destination {
    Destination::Collection("C".into())
}

async fn completed<T: Send + 'static>(transfer: Transfer<T>) -> T {
    match transfer.await {
        TransferOutcome::Completed(v) => v,
        other => panic!("expected completion, got {:?}", other.map(|_| ())),
    }
}

async fn failed<T: Send + 'static>(transfer: Transfer<T>) -> AssetError {
    match transfer.await {
        TransferOutcome::Failed(e) => e,
        other => panic!("expected failure, got {:?}", other.map(|_| ())),
    }
}

async fn create_jpeg(client: &AssetClient, dir: &Path) -> AssetRef {
    let path = write_file(dir, "img1.jpg", TWO_MB);
    completed(client.create("img1.jpg", &collection(), &path, "image/jpeg").unwrap()).await
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn create_registers_asset_with_auto_renditions() {
    let dir = TempDir::new().unwrap();
    let mock = Arc::new(MockTransport::new());
    let client = client_for(&mock, dir.path());

    let asset = create_jpeg(&client, dir.path()).await;
    assert_eq!(asset.name, "img1.jpg");
    assert_eq!(asset.size, TWO_MB as u64);
    assert!(asset.master_data_exists);
    for kind in RenditionKind::AUTO {
        assert!(asset.rendition(kind).is_some_and(|d| d.available), "{kind} missing");
    }
    assert_eq!(mock.count("create"), 1);
    assert_eq!(mock.count("generate"), 0);

    assert_eq!(client.asset(&asset.id), Some(asset.clone()));
    let listed: Vec<AssetId> = client.assets_in(&collection()).into_iter().map(|a| a.id).collect();
    assert_eq!(listed, vec![asset.id]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn create_generates_missing_auto_renditions() {
    let dir = TempDir::new().unwrap();
    let mock = Arc::new(MockTransport::with_create_kinds(vec![RenditionKind::Thumbnail2x]));
    let client = client_for(&mock, dir.path());

    let asset = create_jpeg(&client, dir.path()).await;
    assert_eq!(mock.count("generate"), 1);
    let requests = mock.generate_requests();
    assert_eq!(
        requests[0].kinds,
        vec![RenditionKind::Image2048, RenditionKind::Image1280]
    );
    assert_eq!(requests[0].metadata, MetadataPolicy::ExtractNone);
    for kind in RenditionKind::AUTO {
        assert!(asset.rendition(kind).is_some(), "{kind} missing");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failed_auto_generation_keeps_created_asset() {
    let dir = TempDir::new().unwrap();
    let mock = Arc::new(MockTransport::with_create_kinds(vec![RenditionKind::Thumbnail2x]));
    mock.fail_generate(true);
    let client = client_for(&mock, dir.path());
    let path = write_file(dir.path(), "img1.jpg", 1024);

    let err = failed(client.create("img1.jpg", &collection(), &path, "image/jpeg").unwrap()).await;
    assert!(matches!(err, AssetError::Server { status: 503, .. }), "{err}");
    assert_eq!(mock.count("create"), 1);
    assert_eq!(mock.count("generate"), 1);

    let listed = client.assets_in(&collection());
    assert_eq!(listed.len(), 1);
    let asset = &listed[0];
    assert!(asset.master_data_exists);
    assert_eq!(asset.size, 1024);
    assert!(asset.rendition(RenditionKind::Thumbnail2x).is_some());
    assert!(asset.rendition(RenditionKind::Image2048).is_none());

    // The recorded asset is usable: generation can be retried by the caller.
    mock.fail_generate(false);
    let descriptors = completed(
        client
            .generate_renditions(
                &asset.id,
                &[RenditionKind::Image2048, RenditionKind::Image1280],
                Priority::Normal,
            )
            .unwrap(),
    )
    .await;
    assert_eq!(descriptors.len(), 2);
    let updated = client.asset(&asset.id).unwrap();
    for kind in RenditionKind::AUTO {
        assert!(updated.rendition(kind).is_some(), "{kind} missing");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn create_rejects_bad_arguments_without_network() {
    let dir = TempDir::new().unwrap();
    let mock = Arc::new(MockTransport::new());
    let client = client_for(&mock, dir.path());
    let jpeg = write_file(dir.path(), "ok.jpg", 16);

    let cases = [
        ("", jpeg.clone(), "image/jpeg"),
        ("a.jpg", jpeg.clone(), ""),
        ("a.png", jpeg.clone(), "image/png"),
        ("a.jpg", dir.path().join("missing.jpg"), "image/jpeg"),
        ("a.jpg", dir.path().to_path_buf(), "image/jpeg"),
    ];
    for (name, path, content_type) in cases {
        let err = client.create(name, &collection(), &path, content_type).unwrap_err();
        assert!(matches!(err, AssetError::InvalidArgument(_)), "{name:?} {content_type:?}: {err}");
    }
    assert_eq!(mock.calls(), 0);
    assert!(client.assets_in(&collection()).is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn create_accepts_content_type_case_insensitively() {
    let dir = TempDir::new().unwrap();
    let mock = Arc::new(MockTransport::new());
    let client = client_for(&mock, dir.path());
    let path = write_file(dir.path(), "upper.jpg", 64);

    let asset = completed(client.create("upper.jpg", &collection(), &path, "IMAGE/JPEG").unwrap()).await;
    assert_eq!(asset.content_type, "image/jpeg");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn snapshots_are_independent_values() {
    let dir = TempDir::new().unwrap();
    let mock = Arc::new(MockTransport::new());
    let client = client_for(&mock, dir.path());
    let asset = create_jpeg(&client, dir.path()).await;

    let mut copy = client.asset(&asset.id).unwrap();
    copy.name = "renamed".into();
    copy.renditions.clear();
    let current = client.asset(&asset.id).unwrap();
    assert_eq!(current.name, "img1.jpg");
    assert_eq!(current.renditions.len(), RenditionKind::AUTO.len());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn delete_twice_reports_not_found() {
    let dir = TempDir::new().unwrap();
    let mock = Arc::new(MockTransport::new());
    let client = client_for(&mock, dir.path());
    let asset = create_jpeg(&client, dir.path()).await;

    completed(client.delete(&asset.id).unwrap()).await;
    assert!(client.asset(&asset.id).is_none());
    assert!(client.assets_in(&collection()).is_empty());

    let err = failed(client.delete(&asset.id).unwrap()).await;
    assert!(err.is_not_found(), "{err}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn refresh_not_found_keeps_local_snapshot() {
    let dir = TempDir::new().unwrap();
    let mock = Arc::new(MockTransport::new());
    let client = client_for(&mock, dir.path());
    let asset = create_jpeg(&client, dir.path()).await;

    mock.remove_remote(&asset.id);
    let err = failed(client.refresh(&asset.id).unwrap()).await;
    assert!(matches!(err, AssetError::NotFound(_)), "{err}");
    assert_eq!(client.asset(&asset.id), Some(asset));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn generate_full_size_extracts_all_metadata() {
    let dir = TempDir::new().unwrap();
    let mock = Arc::new(MockTransport::new());
    let client = client_for(&mock, dir.path());
    let asset = create_jpeg(&client, dir.path()).await;

    let descriptors = completed(
        client
            .generate_renditions(&asset.id, &[RenditionKind::FullSize], Priority::Normal)
            .unwrap(),
    )
    .await;
    assert_eq!(descriptors.len(), 1);
    assert_eq!(descriptors[0].kind, RenditionKind::FullSize);
    assert_eq!(descriptors[0].metadata, MetadataPolicy::ExtractAll);
    assert_eq!(mock.generate_requests()[0].metadata, MetadataPolicy::ExtractAll);

    let updated = client.asset(&asset.id).unwrap();
    assert_eq!(
        updated.rendition(RenditionKind::FullSize).map(|d| d.metadata),
        Some(MetadataPolicy::ExtractAll)
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn generate_rejects_empty_kind_list() {
    let dir = TempDir::new().unwrap();
    let mock = Arc::new(MockTransport::new());
    let client = client_for(&mock, dir.path());

    let err = client
        .generate_renditions(&AssetId::new("a1"), &[], Priority::Normal)
        .unwrap_err();
    assert!(matches!(err, AssetError::InvalidArgument(_)));
    assert_eq!(mock.calls(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn master_download_requires_master_data() {
    let dir = TempDir::new().unwrap();
    let mock = Arc::new(MockTransport::new());
    let client = client_for(&mock, dir.path());

    let mut bare = AssetRef::new("bare-1", "bare.jpg", "image/jpeg");
    bare.revision = Some("r1".into());
    mock.seed(bare.clone());
    completed(client.refresh(&bare.id).unwrap()).await;
    let calls = mock.calls();

    let err = client.download_master_data(&bare.id, Priority::Normal).unwrap_err();
    assert!(matches!(err, AssetError::PreconditionFailed(_)), "{err}");
    let err = client.download_proxy_data(&bare.id, Priority::Normal).unwrap_err();
    assert!(matches!(err, AssetError::PreconditionFailed(_)), "{err}");
    let err = client
        .download_master_data_to_file(&bare.id, &dir.path().join("m.jpg"), Priority::Normal)
        .unwrap_err();
    assert!(matches!(err, AssetError::PreconditionFailed(_)), "{err}");

    let unknown = AssetId::new("never-seen");
    let err = client.download_master_data(&unknown, Priority::Normal).unwrap_err();
    assert!(matches!(err, AssetError::PreconditionFailed(_)), "{err}");
    assert_eq!(mock.calls(), calls);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn rendition_downloads_of_inert_asset_fail_without_network() {
    let dir = TempDir::new().unwrap();
    let mock = Arc::new(MockTransport::new());
    let client = client_for(&mock, dir.path());

    let mut inert = AssetRef::new("inert", "inert.jpg", "image/jpeg");
    inert.revision = Some("r1".into());
    inert.merge_renditions([RenditionDescriptor::new(RenditionKind::Thumbnail2x)]);
    mock.seed(inert.clone());
    mock.seed_rendition(&inert.id, RenditionKind::Thumbnail2x, b"thumb");
    completed(client.refresh(&inert.id).unwrap()).await;
    assert!(client.asset(&inert.id).unwrap().is_transfer_inert());
    let calls = mock.calls();

    let err = client
        .download_rendition(&inert.id, RenditionKind::Thumbnail2x, Priority::Normal)
        .unwrap_err();
    assert!(matches!(err, AssetError::PreconditionFailed(_)), "{err}");
    let err = client
        .download_rendition_to_file(
            &inert.id,
            RenditionKind::Thumbnail2x,
            &dir.path().join("t.jpg"),
            Priority::Normal,
        )
        .unwrap_err();
    assert!(matches!(err, AssetError::PreconditionFailed(_)), "{err}");
    assert_eq!(mock.calls(), calls);
    assert!(!dir.path().join("t.jpg").exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn master_upload_over_limit_fails_before_network() {
    let dir = TempDir::new().unwrap();
    let mock = Arc::new(MockTransport::new());
    let client = client_for(&mock, dir.path());

    let path = dir.path().join("huge.dng");
    let file = fs::File::create(&path).unwrap();
    file.set_len(DEFAULT_MAX_MASTER_UPLOAD_BYTES + 1).unwrap();
    drop(file);

    let err = client
        .upload_master_data(&AssetId::new("a1"), &path, Priority::Normal, false)
        .unwrap_err();
    assert!(matches!(err, AssetError::PayloadTooLarge(_)), "{err}");
    assert_eq!(mock.calls(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn master_upload_limit_comes_from_options() {
    let dir = TempDir::new().unwrap();
    let mock = Arc::new(MockTransport::new());
    let mut options = ClientOptions::new(dir.path().join("cache"));
    options.max_master_upload_bytes = 10;
    let client = client_with(&mock, options);

    let at_limit = write_file(dir.path(), "ten.jpg", 10);
    let over = write_file(dir.path(), "eleven.jpg", 11);
    let id = AssetId::new("a1");
    assert!(matches!(
        client.upload_master_data(&id, &over, Priority::Normal, false),
        Err(AssetError::PayloadTooLarge(_))
    ));
    // Accepted locally; the mock then rejects the unknown asset.
    let err = failed(client.upload_master_data(&id, &at_limit, Priority::Normal, false).unwrap()).await;
    assert!(err.is_not_found());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn master_upload_chains_auto_generation() {
    let dir = TempDir::new().unwrap();
    let mock = Arc::new(MockTransport::with_create_kinds(Vec::new()));
    let client = client_for(&mock, dir.path());
    let path = write_file(dir.path(), "m.jpg", 128);
    // Created without renditions, so create itself generates them once.
    let asset = create_jpeg(&client, dir.path()).await;
    assert_eq!(mock.count("generate"), 1);

    let upload = completed(
        client
            .upload_master_data(&asset.id, &path, Priority::High, true)
            .unwrap(),
    )
    .await;
    assert!(upload.asset.master_data_exists);
    assert_eq!(upload.asset.size, 128);
    let chained = upload.renditions.expect("generation should be chained");
    assert_eq!(chained.handle().priority(), Priority::High);
    let descriptors = completed(chained).await;
    let kinds: Vec<RenditionKind> = descriptors.iter().map(|d| d.kind).collect();
    assert_eq!(kinds, RenditionKind::AUTO.to_vec());
    assert_eq!(mock.count("generate"), 2);

    let without = completed(
        client
            .upload_master_data(&asset.id, &path, Priority::Normal, false)
            .unwrap(),
    )
    .await;
    assert!(without.renditions.is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn fresh_cached_rendition_needs_no_network() {
    let dir = TempDir::new().unwrap();
    let mock = Arc::new(MockTransport::new());
    let client = client_for(&mock, dir.path());
    let asset = create_jpeg(&client, dir.path()).await;

    let first = completed(
        client
            .download_rendition(&asset.id, RenditionKind::Thumbnail2x, Priority::Normal)
            .unwrap(),
    )
    .await;
    assert!(!first.from_cache);
    assert_eq!(first.bytes, b"thumbnail2x@r1");
    let calls = mock.calls();

    let second = client
        .download_rendition(&asset.id, RenditionKind::Thumbnail2x, Priority::Normal)
        .unwrap();
    assert_eq!(second.handle().state(), TransferState::Completed);
    let second = completed(second).await;
    assert!(second.from_cache);
    assert_eq!(second.bytes, first.bytes);
    assert_eq!(second.revision.as_deref(), Some("r1"));
    assert_eq!(mock.calls(), calls);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn invalidated_rendition_is_downloaded_once_more() {
    let dir = TempDir::new().unwrap();
    let mock = Arc::new(MockTransport::new());
    let client = client_for(&mock, dir.path());
    let asset = create_jpeg(&client, dir.path()).await;
    let kind = RenditionKind::Image1280;

    completed(client.download_rendition(&asset.id, kind, Priority::Normal).unwrap()).await;
    assert_eq!(client.invalidate_renditions(&asset.id), 1);
    let before = mock.count("download");

    let data = completed(client.download_rendition(&asset.id, kind, Priority::Normal).unwrap()).await;
    assert!(!data.from_cache);
    assert_eq!(mock.count("download"), before + 1);
    let data = completed(client.download_rendition(&asset.id, kind, Priority::Normal).unwrap()).await;
    assert!(data.from_cache);
    assert_eq!(mock.count("download"), before + 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn refresh_with_new_revision_invalidates_cached_renditions() {
    let dir = TempDir::new().unwrap();
    let mock = Arc::new(MockTransport::new());
    let client = client_for(&mock, dir.path());
    let asset = create_jpeg(&client, dir.path()).await;
    let kind = RenditionKind::Image2048;

    completed(client.download_rendition(&asset.id, kind, Priority::Normal).unwrap()).await;
    let cached = client
        .shared
        .state()
        .cache
        .lookup(&asset.id, kind)
        .unwrap()
        .location;
    assert_eq!(client.shared.state().cache.len(), 1);
    assert!(cached.is_file());

    // Same revision: nothing changes.
    completed(client.refresh(&asset.id).unwrap()).await;
    assert_eq!(client.shared.state().cache.len(), 1);

    assert_eq!(mock.bump_revision(&asset.id), "r2");
    let refreshed = completed(client.refresh(&asset.id).unwrap()).await;
    assert_eq!(refreshed.revision.as_deref(), Some("r2"));
    assert!(client.shared.state().cache.is_empty());
    assert!(!cached.exists());

    let data = completed(client.download_rendition(&asset.id, kind, Priority::Normal).unwrap()).await;
    assert!(!data.from_cache);
    assert_eq!(data.revision.as_deref(), Some("r2"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn download_finishing_after_revision_change_is_not_cached() {
    let dir = TempDir::new().unwrap();
    let mock = Arc::new(MockTransport::new());
    let client = client_for(&mock, dir.path());
    let asset = create_jpeg(&client, dir.path()).await;
    let kind = RenditionKind::Image2048;

    mock.hold_downloads(true);
    let late = client.download_rendition(&asset.id, kind, Priority::Normal).unwrap();
    let progress = late.progress();
    wait_until(|| progress.borrow().bytes_done > 0).await;

    // The service moves on while the r1 bytes are still in flight.
    assert_eq!(mock.bump_revision(&asset.id), "r2");
    completed(client.refresh(&asset.id).unwrap()).await;
    mock.hold_downloads(false);

    let data = completed(late).await;
    assert!(!data.from_cache);
    assert_eq!(data.revision.as_deref(), Some("r1"));
    {
        let state = client.shared.state();
        assert!(state.cache.is_empty());
        assert_eq!(state.cache.observed_revision(&asset.id), Some("r2"));
    }

    let before = mock.count("download");
    let fresh = completed(client.download_rendition(&asset.id, kind, Priority::Normal).unwrap()).await;
    assert!(!fresh.from_cache);
    assert_eq!(fresh.revision.as_deref(), Some("r2"));
    assert_eq!(mock.count("download"), before + 1);
    let again = completed(client.download_rendition(&asset.id, kind, Priority::Normal).unwrap()).await;
    assert!(again.from_cache);
    assert_eq!(again.revision.as_deref(), Some("r2"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn ids_that_sanitize_alike_do_not_share_cache_entries() {
    let dir = TempDir::new().unwrap();
    let mock = Arc::new(MockTransport::new());
    let client = client_for(&mock, dir.path());
    let kind = RenditionKind::Thumbnail2x;

    let ids = ["a/b", "a_b", "../a_b"];
    for id in ids {
        let mut asset = AssetRef::new(id, "x.jpg", "image/jpeg");
        asset.master_data_exists = true;
        asset.revision = Some("r1".into());
        mock.seed(asset);
        mock.seed_rendition(&AssetId::new(id), kind, id.as_bytes());
    }

    for id in ids {
        let data = completed(client.download_rendition(&AssetId::new(id), kind, Priority::Normal).unwrap()).await;
        assert!(!data.from_cache, "{id}");
        assert_eq!(data.bytes, id.as_bytes());
    }
    for id in ids {
        let data = completed(client.download_rendition(&AssetId::new(id), kind, Priority::Normal).unwrap()).await;
        assert!(data.from_cache, "{id}");
        assert_eq!(data.bytes, id.as_bytes(), "cached bytes of {id}");
    }
    assert_eq!(mock.count("download"), ids.len());

    // Dropping one asset's entries leaves the others readable.
    assert_eq!(client.invalidate_renditions(&AssetId::new("a/b")), 1);
    let data = completed(client.download_rendition(&AssetId::new("a_b"), kind, Priority::Normal).unwrap()).await;
    assert!(data.from_cache);
    assert_eq!(data.bytes, b"a_b");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn rendition_upload_drops_its_cache_entry() {
    let dir = TempDir::new().unwrap();
    let mock = Arc::new(MockTransport::new());
    let client = client_for(&mock, dir.path());
    let asset = create_jpeg(&client, dir.path()).await;
    let kind = RenditionKind::Thumbnail2x;

    completed(client.download_rendition(&asset.id, kind, Priority::Normal).unwrap()).await;
    completed(client.download_rendition(&asset.id, RenditionKind::Image1280, Priority::Normal).unwrap()).await;
    assert_eq!(client.shared.state().cache.len(), 2);

    let replacement = write_file(dir.path(), "thumb.jpg", 32);
    let updated = completed(
        client
            .upload_rendition(&asset.id, &RenditionDescriptor::new(kind), &replacement, Priority::Normal)
            .unwrap(),
    )
    .await;
    assert!(updated.rendition(kind).is_some_and(|d| d.available && d.size == 32));
    assert_eq!(client.shared.state().cache.len(), 1);

    let data = completed(client.download_rendition(&asset.id, kind, Priority::Normal).unwrap()).await;
    assert!(!data.from_cache);
    assert_eq!(data.bytes, vec![0xABu8; 32]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn master_download_to_file_leaves_no_part_file() {
    let dir = TempDir::new().unwrap();
    let mock = Arc::new(MockTransport::new());
    let client = client_for(&mock, dir.path());
    let asset = create_jpeg(&client, dir.path()).await;

    let dest = dir.path().join("out").join("master.jpg");
    let transfer = client
        .download_master_data_to_file(&asset.id, &dest, Priority::Normal)
        .unwrap();
    let progress = transfer.progress();
    let written = completed(transfer).await;
    assert_eq!(written, TWO_MB as u64);
    assert_eq!(fs::metadata(&dest).unwrap().len(), TWO_MB as u64);
    assert!(!storage::temp_path(&dest).exists());
    assert_eq!(progress.borrow().bytes_done, TWO_MB as u64);

    let bytes = completed(client.download_master_data(&asset.id, Priority::Normal).unwrap()).await;
    assert_eq!(bytes.len(), TWO_MB);

    assert!(matches!(
        client.download_master_data_to_file(&asset.id, dir.path(), Priority::Normal),
        Err(AssetError::InvalidArgument(_))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn rendition_download_to_file_bypasses_cache() {
    let dir = TempDir::new().unwrap();
    let mock = Arc::new(MockTransport::new());
    let client = client_for(&mock, dir.path());
    let asset = create_jpeg(&client, dir.path()).await;
    let dest = dir.path().join("thumb.jpg");

    for _ in 0..2 {
        completed(
            client
                .download_rendition_to_file(&asset.id, RenditionKind::Thumbnail2x, &dest, Priority::Low)
                .unwrap(),
        )
        .await;
    }
    assert_eq!(mock.count("download"), 2);
    assert!(client.shared.state().cache.is_empty());
    assert_eq!(fs::read(&dest).unwrap(), b"thumbnail2x@r1");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancelling_running_file_download_removes_part_file() {
    let dir = TempDir::new().unwrap();
    let mock = Arc::new(MockTransport::new());
    let client = client_for(&mock, dir.path());
    let asset = create_jpeg(&client, dir.path()).await;
    mock.stall_downloads(true);

    let dest = dir.path().join("master.jpg");
    let part = storage::temp_path(&dest);
    let transfer = client
        .download_master_data_to_file(&asset.id, &dest, Priority::High)
        .unwrap();
    let handle = transfer.handle().clone();
    wait_until(|| part.exists()).await;

    assert_eq!(handle.state(), TransferState::Running);
    assert_eq!(handle.cancel(), CancelStatus::AbortRequested);
    assert!(transfer.await.is_cancelled());
    assert_eq!(handle.state(), TransferState::Cancelled);
    assert!(!part.exists());
    assert!(!dest.exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn shutdown_cancels_queued_and_running_work() {
    let dir = TempDir::new().unwrap();
    let mock = Arc::new(MockTransport::new());
    let mut options = ClientOptions::new(dir.path().join("cache"));
    options.max_concurrent_transfers = 1;
    let client = client_with(&mock, options);
    let asset = create_jpeg(&client, dir.path()).await;
    mock.stall_downloads(true);

    let running = client.download_master_data(&asset.id, Priority::Normal).unwrap();
    let running_handle = running.handle().clone();
    wait_until(|| running_handle.state() == TransferState::Running).await;
    let queued = client.refresh(&asset.id).unwrap();
    assert_eq!(queued.handle().state(), TransferState::Queued);

    client.shutdown().await;
    assert!(queued.await.is_cancelled());
    assert!(running.await.is_cancelled());
    assert!(matches!(
        client.refresh(&asset.id),
        Err(AssetError::PreconditionFailed(_))
    ));
}
