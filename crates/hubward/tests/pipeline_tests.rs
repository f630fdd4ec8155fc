use anyhow::Result;
use hubward::core::manifest::PublishConfig;
use hubward::core::protocol::PipelineEvent;
use hubward::core::HubwardError;
use hubward::fetch::{CatalogEntry, StaticCatalog};
use hubward::hub::mock::{MockHub, MockUpload, MOCK_TOKEN};
use hubward::hub::Credentials;
use hubward::Pipeline;
use std::path::Path;

const CHECKPOINT: &[u8] = b"\x80\x02 whisper small checkpoint bytes";

fn catalog(hub: &MockHub) -> StaticCatalog {
    StaticCatalog::from_entries(
        "pt",
        vec![CatalogEntry {
            name: "small".to_string(),
            url: hub.artifact_url("small.pt"),
        }],
    )
}

fn config(hub: &MockHub, model: &str, output_dir: &Path) -> PublishConfig {
    PublishConfig {
        repo_id: "tester/whisper".parse().unwrap(),
        model: model.to_string(),
        output_dir: output_dir.to_path_buf(),
        endpoint: hub.endpoint().to_string(),
        ..Default::default()
    }
}

fn pipeline(hub: &MockHub, config: PublishConfig) -> Pipeline<StaticCatalog> {
    Pipeline::new(config, Credentials::new(MOCK_TOKEN).unwrap(), catalog(hub))
}

#[async_std::test]
async fn test_publish_small_end_to_end() -> Result<()> {
    let hub = MockHub::start().await?;
    hub.add_artifact("small.pt", CHECKPOINT);
    let tmp = tempfile::tempdir()?;
    let output_dir = tmp.path().join("models");

    let mut events = Vec::new();
    let report = pipeline(&hub, config(&hub, "small", &output_dir))
        .run(|event| events.push(event))
        .await?;

    let local = output_dir.join("small.pt");
    assert_eq!(report.local_path, local);
    assert_eq!(std::fs::read(&local)?, CHECKPOINT);
    assert_eq!(report.hub_path, "small.pt");
    assert_eq!(report.repo_url.as_str(), format!("{}/tester/whisper", hub.endpoint()));
    assert_eq!(report.commit.message, "Upload model small.pt");

    let recorded = hub.recorded();
    assert_eq!(recorded.create_requests.len(), 1);
    assert_eq!(recorded.artifact_hits, 1);
    assert_eq!(recorded.commits.len(), 1);
    let operations: Vec<_> = recorded.commits[0]
        .iter()
        .filter(|line| line["key"] != "header")
        .collect();
    assert_eq!(operations.len(), 1);
    assert_eq!(operations[0]["value"]["path"], "small.pt");

    let stages: Vec<&str> = events
        .iter()
        .filter_map(|event| match event {
            PipelineEvent::Initializing(_) => Some("init"),
            PipelineEvent::Downloading { .. } => Some("download"),
            PipelineEvent::Uploading { .. } => Some("upload"),
            _ => None,
        })
        .collect();
    assert_eq!(stages, vec!["init", "download", "upload"]);
    assert!(events.contains(&PipelineEvent::Downloading {
        file: "small.pt".to_string(),
        url: hub.artifact_url("small.pt"),
    }));
    Ok(())
}

#[async_std::test]
async fn test_rerun_against_existing_repository() -> Result<()> {
    let hub = MockHub::start().await?;
    hub.add_artifact("small.pt", CHECKPOINT);
    hub.set_upload(MockUpload::LfsBasic);
    let tmp = tempfile::tempdir()?;
    let pipeline = pipeline(&hub, config(&hub, "small", &tmp.path().join("models")));

    let first = pipeline.run(|_| {}).await?;
    let second = pipeline.run(|_| {}).await?;

    assert_eq!(first.repo_url, second.repo_url);
    assert_eq!(hub.recorded().commits.len(), 2);
    assert_eq!(hub.recorded().basic_uploads.len(), 2);
    Ok(())
}

#[async_std::test]
async fn test_unknown_model_makes_no_calls() -> Result<()> {
    let hub = MockHub::start().await?;
    let tmp = tempfile::tempdir()?;
    let output_dir = tmp.path().join("models");

    let mut events = Vec::new();
    let err = pipeline(&hub, config(&hub, "bogus-model", &output_dir))
        .run(|event| events.push(event))
        .await
        .unwrap_err();

    match err.downcast_ref::<HubwardError>() {
        Some(HubwardError::UnknownModel { name, known }) => {
            assert_eq!(name, "bogus-model");
            assert_eq!(known, &vec!["small".to_string()]);
        }
        other => panic!("unexpected error: {:?}", other),
    }
    let recorded = hub.recorded();
    assert_eq!(recorded.hub_requests, 0);
    assert_eq!(recorded.artifact_hits, 0);
    assert!(events.is_empty());
    assert!(!output_dir.exists());
    Ok(())
}

#[async_std::test]
async fn test_failed_download_leaves_repository_in_place() -> Result<()> {
    let hub = MockHub::start().await?;
    let tmp = tempfile::tempdir()?;
    let output_dir = tmp.path().join("models");

    let err = pipeline(&hub, config(&hub, "small", &output_dir))
        .run(|_| {})
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<HubwardError>(),
        Some(HubwardError::Remote { status: 404, .. })
    ));
    let recorded = hub.recorded();
    assert_eq!(recorded.create_requests.len(), 1);
    assert!(recorded.commits.is_empty());
    assert!(output_dir.is_dir());
    Ok(())
}

#[async_std::test]
async fn test_hub_path_template_is_applied() -> Result<()> {
    let hub = MockHub::start().await?;
    hub.add_artifact("small.pt", CHECKPOINT);
    let tmp = tempfile::tempdir()?;
    let config = PublishConfig {
        hub_path: "checkpoints/{model}.{ext}".to_string(),
        ..config(&hub, "small", tmp.path())
    };

    let report = pipeline(&hub, config).run(|_| {}).await?;

    assert_eq!(report.hub_path, "checkpoints/small.pt");
    assert_eq!(
        hub.recorded().commits[0][0]["value"]["summary"],
        "Upload model checkpoints/small.pt"
    );
    Ok(())
}
