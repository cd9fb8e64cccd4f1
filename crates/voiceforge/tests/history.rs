//! History durability across restarts.

mod common;

use std::sync::Arc;

use tempfile::TempDir;

use common::{batch, ConfigBuilder, FakeGateway, TestService};
use voiceforge::history::{HistoryFilter, HistoryStore, RecordStatus};
use voiceforge::job::ExecutionPolicy;

#[tokio::test(start_paused = true)]
async fn records_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("data").join("history.db");

    let job_id = {
        let history = Arc::new(HistoryStore::open(&path).unwrap());
        let t = TestService::with_history(
            FakeGateway::new().fail("item2.txt"),
            ConfigBuilder::new().build(),
            history,
        );
        let receipt = t
            .service
            .submit(batch(3, ExecutionPolicy::Concurrent))
            .unwrap();
        t.service.wait(&receipt.job_id).await.unwrap();
        receipt.job_id
    };

    let reopened = HistoryStore::open(&path).unwrap();
    assert_eq!(reopened.len(), 1);
    let record = reopened.get(&job_id).unwrap();
    assert_eq!(record.status, RecordStatus::Completed);
    assert_eq!((record.succeeded_count, record.failed_count), (2, 1));
    assert_eq!(
        record.output.download_ref,
        Some(format!("generations/{}.zip", job_id))
    );
    assert!(record.size_bytes.unwrap() > 0);
    assert_eq!(record.duration_secs, Some(2.0));
}

#[test]
fn remove_twice_leaves_same_state() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("history.db");

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .start_paused(true)
        .build()
        .unwrap();

    let ids: Vec<String> = rt.block_on(async {
        let history = Arc::new(HistoryStore::open(&path).unwrap());
        let t = TestService::with_history(FakeGateway::new(), ConfigBuilder::new().build(), history);
        let mut ids = Vec::new();
        for _ in 0..2 {
            let receipt = t
                .service
                .submit(batch(1, ExecutionPolicy::Sequential))
                .unwrap();
            t.service.wait(&receipt.job_id).await.unwrap();
            ids.push(receipt.job_id);
        }

        assert!(t.service.remove_history(&ids[0]).unwrap());
        let after_once = t.service.history(HistoryFilter::All);
        assert!(!t.service.remove_history(&ids[0]).unwrap());
        assert_eq!(t.service.history(HistoryFilter::All), after_once);
        ids
    });

    let reopened = HistoryStore::open(&path).unwrap();
    assert_eq!(reopened.len(), 1);
    assert!(reopened.get(&ids[0]).is_none());
    assert!(reopened.get(&ids[1]).is_some());
}
