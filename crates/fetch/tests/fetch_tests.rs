use async_std::task;
use hubward_core::protocol::TransferEvent;
use hubward_core::HubwardError;
use hubward_fetch::{CatalogEntry, ModelFetcher, StaticCatalog};
use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const CHECKPOINT: &[u8] = b"PK\x03\x04 fake torch checkpoint payload";

#[derive(Clone, Default)]
struct Origin {
    hits: Arc<AtomicUsize>,
}

impl Origin {
    fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

/// Spawns a local artifact server and returns its base URL.
async fn spawn_origin() -> (String, Origin) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind origin");
    let base = format!("http://{}", listener.local_addr().unwrap());
    let origin = Origin::default();

    let mut app = tide::with_state(origin.clone());
    app.at("/models/small.pt")
        .get(|req: tide::Request<Origin>| async move {
            req.state().hits.fetch_add(1, Ordering::SeqCst);
            Ok(tide::Response::builder(200).body(CHECKPOINT.to_vec()).build())
        });
    app.at("/moved/small.pt")
        .get(|req: tide::Request<Origin>| async move {
            req.state().hits.fetch_add(1, Ordering::SeqCst);
            Ok(tide::Redirect::new("/models/small.pt"))
        });
    app.at("/missing.pt")
        .get(|req: tide::Request<Origin>| async move {
            req.state().hits.fetch_add(1, Ordering::SeqCst);
            Ok(tide::Response::builder(404).body("no such blob").build())
        });

    task::spawn(app.listen(listener));
    (base, origin)
}

fn fetcher_for(base: &str, path: &str) -> ModelFetcher<StaticCatalog> {
    ModelFetcher::new(StaticCatalog::from_entries(
        "pt",
        vec![CatalogEntry {
            name: "small".to_string(),
            url: format!("{}{}", base, path),
        }],
    ))
}

#[async_std::test]
async fn test_fetch_writes_checkpoint_into_new_directory() {
    let (base, origin) = spawn_origin().await;
    let tmp = tempfile::tempdir().unwrap();
    let output_dir = tmp.path().join("models");
    let fetcher = fetcher_for(&base, "/models/small.pt");

    let mut events = Vec::new();
    let path = fetcher
        .fetch("small", &output_dir, |event| events.push(event))
        .await
        .expect("fetch should succeed");

    assert_eq!(path, output_dir.join("small.pt"));
    assert_eq!(std::fs::read(&path).unwrap(), CHECKPOINT);
    assert_eq!(origin.hits(), 1);

    let total = CHECKPOINT.len() as u64;
    assert_eq!(events.first(), Some(&TransferEvent::Started("small.pt".to_string())));
    assert!(events.contains(&TransferEvent::Progress(total, total)));
    assert!(matches!(events.last(), Some(TransferEvent::Complete(_))));
}

#[async_std::test]
async fn test_unknown_model_fails_before_any_request() {
    let (base, origin) = spawn_origin().await;
    let tmp = tempfile::tempdir().unwrap();
    let output_dir = tmp.path().join("models");
    let fetcher = fetcher_for(&base, "/models/small.pt");

    let err = fetcher
        .fetch("bogus-model", &output_dir, |_| {})
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<HubwardError>(),
        Some(HubwardError::UnknownModel { .. })
    ));
    assert_eq!(origin.hits(), 0);
    assert!(!output_dir.exists(), "no directory may be created");
}

#[async_std::test]
async fn test_fetch_follows_redirects() {
    let (base, origin) = spawn_origin().await;
    let tmp = tempfile::tempdir().unwrap();
    let fetcher = fetcher_for(&base, "/moved/small.pt");

    let path = fetcher.fetch("small", tmp.path(), |_| {}).await.unwrap();

    assert_eq!(std::fs::read(&path).unwrap(), CHECKPOINT);
    assert_eq!(origin.hits(), 2);
}

#[async_std::test]
async fn test_http_error_is_reported_and_no_file_written() {
    let (base, _origin) = spawn_origin().await;
    let tmp = tempfile::tempdir().unwrap();
    let fetcher = fetcher_for(&base, "/missing.pt");

    let err = fetcher.fetch("small", tmp.path(), |_| {}).await.unwrap_err();

    match err.downcast_ref::<HubwardError>() {
        Some(HubwardError::Remote { status, .. }) => assert_eq!(*status, 404),
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(!tmp.path().join("small.pt").exists());
}

#[async_std::test]
async fn test_output_dir_creation_is_single_level() {
    let (base, origin) = spawn_origin().await;
    let tmp = tempfile::tempdir().unwrap();
    let nested = tmp.path().join("a").join("b");
    let fetcher = fetcher_for(&base, "/models/small.pt");

    let result = fetcher.fetch("small", &nested, |_| {}).await;

    assert!(result.is_err());
    assert!(!nested.exists());
    assert_eq!(origin.hits(), 0);
}

#[async_std::test]
async fn test_existing_file_is_overwritten() {
    let (base, _origin) = spawn_origin().await;
    let tmp = tempfile::tempdir().unwrap();
    let stale = tmp.path().join("small.pt");
    std::fs::write(&stale, vec![0u8; 4096]).unwrap();
    let fetcher = fetcher_for(&base, "/models/small.pt");

    let path = fetcher.fetch("small", tmp.path(), |_| {}).await.unwrap();

    assert_eq!(path, stale);
    assert_eq!(std::fs::read(&path).unwrap(), CHECKPOINT);
}
