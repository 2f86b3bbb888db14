//! Integration test: upload → share link → download with an in-memory server
//!
//! Verifies the full pipeline: read → encrypt → pack → store → parse link →
//! fetch → decrypt → byte-equal output, and that the server only ever holds
//! ciphertext and metadata.

use std::path::Path;
use std::sync::{Arc, Mutex};

use tempfile::TempDir;

use zkdrop_core::config::ProgressConfig;
use zkdrop_core::{Lifetime, PlaintextFile, ShareError, SizePolicy};
use zkdrop_transfer::file_io::{read_plaintext, target_path, write_plaintext};
use zkdrop_transfer::{
    Direction, DownloadTransfer, MemoryBackend, Phase, ProgressFn, ProgressSnapshot,
    ProgressTracker, UploadResult, UploadTransfer,
};

fn tracker(direction: Direction) -> ProgressTracker {
    ProgressTracker::new(direction, &ProgressConfig::default(), None)
}

fn recording_tracker(direction: Direction) -> (ProgressTracker, Arc<Mutex<Vec<ProgressSnapshot>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink_seen = Arc::clone(&seen);
    let sink: ProgressFn = Arc::new(move |snap| sink_seen.lock().unwrap().push(snap));
    (
        ProgressTracker::new(direction, &ProgressConfig::default(), Some(sink)),
        seen,
    )
}

async fn upload(backend: &MemoryBackend, file: PlaintextFile) -> UploadResult {
    UploadTransfer::new(
        file,
        Lifetime::OneDay,
        SizePolicy::default(),
        tracker(Direction::Upload),
    )
    .run(backend)
    .await
    .expect("upload should succeed")
}

fn write_test_file(dir: &Path, name: &str, content: &[u8]) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).expect("write test file");
    path
}

#[tokio::test]
async fn roundtrip_via_disk() {
    let tmp = TempDir::new().unwrap();
    let backend = MemoryBackend::default();
    let original = b"hello world, this is a small test file for a zkdrop round-trip";
    let src = write_test_file(tmp.path(), "small.txt", original);

    let file = read_plaintext(&src, &SizePolicy::default()).await.unwrap();
    let done = upload(&backend, file).await;

    let link = done.link.to_string();
    let transfer =
        DownloadTransfer::from_link(&link, None, None, tracker(Direction::Download)).unwrap();
    assert_eq!(transfer.origin(), Some("https://share.test"));

    let received = transfer.fetch(&backend).await.unwrap();
    assert_eq!(received.data(), original);
    assert_eq!(received.name(), "small.txt");
    assert_eq!(received.mime_type(), "text/plain");

    let dst = target_path(Some(tmp.path().join("out/copy.txt").as_path()), received);
    write_plaintext(&dst, received, false).await.unwrap();
    assert_eq!(std::fs::read(&dst).unwrap(), original);
}

#[tokio::test]
async fn roundtrip_binary_and_empty() {
    let backend = MemoryBackend::default();
    for data in [Vec::new(), (0..=255u8).cycle().take(300_000).collect::<Vec<_>>()] {
        let done = upload(
            &backend,
            PlaintextFile::new("blob.bin", "application/octet-stream", data.clone()),
        )
        .await;
        let transfer = DownloadTransfer::from_link(
            &done.link.to_string(),
            None,
            None,
            tracker(Direction::Download),
        )
        .unwrap();
        assert_eq!(transfer.fetch(&backend).await.unwrap().data(), &data[..]);
    }
}

#[tokio::test]
async fn server_never_sees_key_material() {
    let backend = MemoryBackend::default();
    let plaintext = b"top secret quarterly numbers".to_vec();
    let done = upload(
        &backend,
        PlaintextFile::new("q3.txt", "text/plain", plaintext.clone()),
    )
    .await;

    let stored = backend.stored(done.uuid).unwrap();
    let km = &done.link.key_material;
    for field in [&stored.file_name, &stored.mime_type] {
        assert!(!field.contains(&km.key));
        assert!(!field.contains(&km.iv));
    }
    assert_ne!(stored.ciphertext, plaintext);
    assert!(!stored
        .ciphertext
        .windows(plaintext.len())
        .any(|w| w == &plaintext[..]));
    assert_eq!(stored.ciphertext.len(), plaintext.len() + zkdrop_crypto::TAG_SIZE);

    let key = zkdrop_crypto::decode_base64url(&km.key).unwrap();
    assert!(!stored.ciphertext.windows(key.len()).any(|w| w == &key[..]));
}

#[tokio::test]
async fn same_file_twice_gets_fresh_keys() {
    let backend = MemoryBackend::default();
    let file = PlaintextFile::new("same.txt", "text/plain", b"identical".to_vec());
    let a = upload(&backend, file.clone()).await;
    let b = upload(&backend, file).await;

    assert_ne!(a.uuid, b.uuid);
    assert_ne!(a.link.key_material, b.link.key_material);
    assert_ne!(
        backend.stored(a.uuid).unwrap().ciphertext,
        backend.stored(b.uuid).unwrap().ciphertext
    );
}

#[tokio::test]
async fn tampered_ciphertext_fails_decryption() {
    let backend = MemoryBackend::default();
    let done = upload(
        &backend,
        PlaintextFile::new("a.txt", "text/plain", b"integrity matters".to_vec()),
    )
    .await;
    assert!(backend.tamper(done.uuid, |ct| ct[0] ^= 0x01));

    let (progress, seen) = recording_tracker(Direction::Download);
    let transfer =
        DownloadTransfer::from_link(&done.link.to_string(), None, None, progress.clone()).unwrap();

    let err = transfer.fetch(&backend).await.unwrap_err();
    assert!(matches!(err, ShareError::DecryptionFailure));
    assert!(transfer.result().is_none());

    assert_eq!(progress.snapshot().phase, Phase::Failed);
    assert!(!progress.is_ticking());
    assert_eq!(seen.lock().unwrap().last().unwrap().phase, Phase::Failed);
}

#[tokio::test]
async fn wrong_fragment_fails_decryption() {
    let backend = MemoryBackend::default();
    let a = upload(&backend, PlaintextFile::new("a", "text/plain", b"aaa".to_vec())).await;
    let b = upload(&backend, PlaintextFile::new("b", "text/plain", b"bbb".to_vec())).await;

    // a's id with b's key
    let mixed = format!(
        "{}#{}",
        a.link.redacted(),
        b.link.key_material.fragment()
    );
    let transfer =
        DownloadTransfer::from_link(&mixed, None, None, tracker(Direction::Download)).unwrap();
    assert!(matches!(
        transfer.fetch(&backend).await,
        Err(ShareError::DecryptionFailure)
    ));
}

#[tokio::test]
async fn upload_progress_reaches_100() {
    let backend = MemoryBackend::default();
    let (progress, seen) = recording_tracker(Direction::Upload);
    UploadTransfer::new(
        PlaintextFile::new("p.bin", "application/octet-stream", vec![7u8; 10_000]),
        Lifetime::TwentyEightDays,
        SizePolicy::default(),
        progress,
    )
    .run(&backend)
    .await
    .unwrap();

    let seen = seen.lock().unwrap();
    assert!(seen.windows(2).all(|w| w[1].percent >= w[0].percent));
    let last = seen.last().unwrap();
    assert_eq!(last.phase, Phase::Complete);
    assert_eq!(last.percent, 100.0);
}

#[tokio::test]
async fn download_progress_reserves_headroom_then_completes() {
    let backend = MemoryBackend::default();
    let done = upload(
        &backend,
        PlaintextFile::new("p.bin", "application/octet-stream", vec![1u8; 4096]),
    )
    .await;

    let (progress, seen) = recording_tracker(Direction::Download);
    DownloadTransfer::from_link(&done.link.to_string(), None, None, progress)
        .unwrap()
        .fetch(&backend)
        .await
        .unwrap();

    let seen = seen.lock().unwrap();
    assert!(seen.windows(2).all(|w| w[1].percent >= w[0].percent));
    let transferring: Vec<_> = seen
        .iter()
        .filter(|s| s.phase == Phase::Transferring)
        .collect();
    assert!(transferring.iter().all(|s| s.percent <= 80.0));
    assert_eq!(transferring.last().unwrap().percent, 80.0);
    assert_eq!(seen.last().unwrap().percent, 100.0);
}

#[tokio::test]
async fn download_without_length_still_completes() {
    let backend = MemoryBackend::default().without_content_length();
    let done = upload(
        &backend,
        PlaintextFile::new("p.bin", "application/octet-stream", vec![1u8; 512]),
    )
    .await;

    let progress = tracker(Direction::Download);
    let transfer =
        DownloadTransfer::from_link(&done.link.to_string(), None, None, progress.clone()).unwrap();
    transfer.fetch(&backend).await.unwrap();

    assert_eq!(progress.snapshot().phase, Phase::Complete);
    assert_eq!(progress.snapshot().percent, 100.0);
    assert!(!progress.is_ticking());
}

#[tokio::test]
async fn concurrent_uploads_are_independent() {
    let backend = MemoryBackend::default();
    let files: Vec<_> = (0..8u8)
        .map(|i| PlaintextFile::new(format!("f{i}.bin"), "application/octet-stream", vec![i; 1000 + i as usize]))
        .collect();

    let trackers: Vec<_> = files.iter().map(|_| tracker(Direction::Upload)).collect();
    let results = futures::future::join_all(files.iter().cloned().zip(trackers.iter().cloned()).map(
        |(file, progress)| {
            UploadTransfer::new(file, Lifetime::OneDay, SizePolicy::default(), progress)
                .run(&backend)
        },
    ))
    .await;

    let mut keys = std::collections::HashSet::new();
    for (i, result) in results.into_iter().enumerate() {
        let done = result.unwrap();
        assert!(keys.insert(done.link.key_material.key.clone()));
        assert_eq!(trackers[i].snapshot().phase, Phase::Complete);

        let received = DownloadTransfer::from_link(
            &done.link.to_string(),
            None,
            None,
            tracker(Direction::Download),
        )
        .unwrap();
        assert_eq!(received.fetch(&backend).await.unwrap(), &files[i]);
    }
}

#[tokio::test]
async fn offline_upload_is_transport_error() {
    let backend = MemoryBackend::default();
    backend.set_offline(true);
    let progress = tracker(Direction::Upload);
    let err = UploadTransfer::new(
        PlaintextFile::new("x", "text/plain", b"x".to_vec()),
        Lifetime::OneDay,
        SizePolicy::default(),
        progress.clone(),
    )
    .run(&backend)
    .await
    .unwrap_err();

    assert!(matches!(err, ShareError::Transport(_)));
    assert_eq!(progress.snapshot().phase, Phase::Failed);
    assert!(backend.stored_ids().is_empty());
}
