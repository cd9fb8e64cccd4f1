//! `GenerationService` surface: admission, routing and lookups.

mod common;

use common::{batch, scripts, ConfigBuilder, FakeGateway, TestService};
use voiceforge::error::ServiceError;
use voiceforge::history::{HistoryFilter, RecordStatus};
use voiceforge::job::{
    AudioFormat, ExecutionPolicy, JobKind, OutputNaming, VoiceAssignment, VoiceRef,
};
use voiceforge::notify::JobOutcome;
use voiceforge::service::{BatchSubmission, SubmittedItem};

#[tokio::test(start_paused = true)]
async fn nothing_admitted_creates_no_job() {
    let t = TestService::new(FakeGateway::new(), ConfigBuilder::new().build());

    let mut items = scripts(2);
    items[0].name = "cover.png".to_string();
    items[0].declared_type = Some("image/png".to_string());
    items[1].text = "   ".to_string();
    let submission = BatchSubmission::batch(items, VoiceRef::new("v"), ExecutionPolicy::Concurrent);

    match t.service.submit(submission) {
        Err(ServiceError::NothingAdmitted(rejected)) => {
            assert_eq!(rejected.len(), 2);
            assert_eq!(rejected[0].error.reason(), "unsupported type");
            assert_eq!(rejected[1].error.reason(), "empty script");
        }
        other => panic!("expected NothingAdmitted, got {:?}", other.map(|r| r.job_id)),
    }
    assert!(t.service.active_jobs().is_empty());
    assert_eq!(t.gateway.calls(), 0);
    assert_eq!(t.sink.count(), 0);
}

#[tokio::test(start_paused = true)]
async fn empty_and_malformed_submissions_rejected() {
    let t = TestService::new(FakeGateway::new(), ConfigBuilder::new().build());

    let empty = BatchSubmission::batch(vec![], VoiceRef::new("v"), ExecutionPolicy::Sequential);
    assert!(matches!(
        t.service.submit(empty),
        Err(ServiceError::EmptySubmission)
    ));

    let mut single = BatchSubmission::single(SubmittedItem::script("a.txt", "Hi."), VoiceRef::new("v"));
    single.items = scripts(2);
    assert!(matches!(
        t.service.submit(single),
        Err(ServiceError::InvalidSubmission(_))
    ));
}

#[test]
fn submit_outside_runtime_is_an_error() {
    let t = TestService::new(FakeGateway::new(), ConfigBuilder::new().build());
    assert!(matches!(
        t.service.submit(batch(1, ExecutionPolicy::Sequential)),
        Err(ServiceError::NoRuntime)
    ));
}

#[tokio::test(start_paused = true)]
async fn voices_and_output_names_follow_batch_settings() {
    let t = TestService::new(FakeGateway::new(), ConfigBuilder::new().build());

    let items = vec![
        SubmittedItem::script("intro.txt", "Welcome!").with_voice(VoiceRef::new("alice")),
        SubmittedItem::script("outro.txt", "Goodbye   now."),
    ];
    let mut submission =
        BatchSubmission::batch(items, VoiceRef::new("narrator"), ExecutionPolicy::Sequential);
    submission.voice_assignment = VoiceAssignment::PerItem;
    submission.output.format = AudioFormat::Wav;
    submission.output.naming = OutputNaming::Pattern("episode-{index}-{name}".to_string());

    let receipt = t.service.submit(submission).unwrap();
    let progress = t.service.progress(&receipt.job_id).unwrap();
    assert_eq!(progress.kind, JobKind::Batch);
    assert_eq!(progress.items[0].output_name, "episode-001-intro.wav");
    assert_eq!(progress.items[1].output_name, "episode-002-outro.wav");

    t.service.wait(&receipt.job_id).await.unwrap();
    let requests = t.gateway.requests();
    assert_eq!(requests[0].voice, VoiceRef::new("alice"));
    assert_eq!(requests[1].voice, VoiceRef::new("narrator"));
    assert_eq!(requests[1].text, "Goodbye now.");
    assert_eq!(requests[0].format, AudioFormat::Wav);
}

#[tokio::test(start_paused = true)]
async fn same_voice_overrides_item_voices() {
    let t = TestService::new(FakeGateway::new(), ConfigBuilder::new().build());

    let items = vec![SubmittedItem::script("a.txt", "One.").with_voice(VoiceRef::new("alice"))];
    let submission = BatchSubmission::batch(items, VoiceRef::new("narrator"), ExecutionPolicy::Sequential);

    let receipt = t.service.submit(submission).unwrap();
    t.service.wait(&receipt.job_id).await.unwrap();
    assert_eq!(t.gateway.requests()[0].voice, VoiceRef::new("narrator"));
}

#[tokio::test(start_paused = true)]
async fn finished_jobs_leave_the_registry() {
    let t = TestService::new(FakeGateway::new(), ConfigBuilder::new().build());
    let receipt = t
        .service
        .submit(batch(2, ExecutionPolicy::Concurrent))
        .unwrap();
    assert_eq!(t.service.active_jobs(), vec![receipt.job_id.clone()]);

    let record = t.service.wait(&receipt.job_id).await.unwrap();
    // Let the job task run its cleanup.
    tokio::task::yield_now().await;

    assert!(t.service.active_jobs().is_empty());
    assert!(t.service.progress(&receipt.job_id).is_none());
    assert_eq!(t.service.wait(&receipt.job_id).await.unwrap(), record);
    assert!(!t.service.cancel(&receipt.job_id).unwrap());
}

async fn run_with_crashing_item(policy: ExecutionPolicy) -> TestService {
    let t = TestService::new(
        FakeGateway::new().panic_on("item2.txt"),
        ConfigBuilder::new().build(),
    );
    let receipt = t.service.submit(batch(3, policy)).unwrap();

    let record = t.service.wait(&receipt.job_id).await.unwrap();
    tokio::task::yield_now().await;

    assert_eq!(record.status, RecordStatus::Completed);
    assert_eq!(record.item_count, 3);
    assert_eq!(record.succeeded_count, 2);
    assert_eq!(record.failed_count, 1);
    assert_eq!(record.skipped_count, 0);

    assert!(t.service.active_jobs().is_empty());
    let history = t.service.history(HistoryFilter::All);
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].job_id, receipt.job_id);
    assert_eq!(t.sink.count_for(&receipt.job_id), 1);
    assert_eq!(t.sink.last().unwrap().outcome, JobOutcome::PartiallyFailed);
    assert_eq!(t.gateway.in_flight(), 0);
    t
}

#[tokio::test(start_paused = true)]
async fn crashing_item_fails_alone_in_sequential_job() {
    let t = run_with_crashing_item(ExecutionPolicy::Sequential).await;
    assert_eq!(t.gateway.completion_order(), vec!["item1.txt", "item3.txt"]);
}

#[tokio::test(start_paused = true)]
async fn crashing_item_fails_alone_in_concurrent_job() {
    let t = run_with_crashing_item(ExecutionPolicy::Concurrent).await;
    assert_eq!(t.gateway.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn unknown_jobs_are_reported() {
    let t = TestService::new(FakeGateway::new(), ConfigBuilder::new().build());

    assert!(t.service.progress("missing").is_none());
    assert!(matches!(
        t.service.cancel("missing"),
        Err(ServiceError::UnknownJob(_))
    ));
    assert!(matches!(
        t.service.wait("missing").await,
        Err(ServiceError::UnknownJob(_))
    ));
    assert!(!t.service.remove_history("missing").unwrap());
    assert!(t.service.history(HistoryFilter::All).is_empty());
}

#[test]
fn invalid_config_refused() {
    let gateway = std::sync::Arc::new(FakeGateway::new());
    let history = std::sync::Arc::new(voiceforge::HistoryStore::in_memory().unwrap());
    let sink = std::sync::Arc::new(voiceforge::LogNotifier);
    let config = ConfigBuilder::new().max_concurrency(0).build();

    let result = voiceforge::GenerationService::new(config, gateway, history, sink);
    assert!(matches!(result, Err(ServiceError::Config(_))));
}
