mod helpers;

use helpers::{compactor, fact, facts_json, memory, open_store, ScriptedClient, ScriptedOperator};
use quill::error::is_stopped;
use quill::memory::store::MemoryStore;
use quill::memory::types::MemoryUpdate;
use quill::operator::CompactionChoice;
use std::sync::Arc;
use tempfile::TempDir;

/// Five 25-char facts: 125 chars, above the 100-char high-water mark.
fn oversized() -> Vec<String> {
    ['a', 'b', 'c', 'd', 'e'].iter().map(|&c| fact(c, 25)).collect()
}

fn backups(dir: &std::path::Path) -> Vec<std::path::PathBuf> {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| p.file_name().unwrap().to_string_lossy().starts_with("memory_backup_"))
        .collect()
}

#[tokio::test]
async fn small_store_is_left_alone() {
    let tmp = TempDir::new().unwrap();
    let client = ScriptedClient::new(&[]);
    let operator = Arc::new(ScriptedOperator::default());
    let mut store = open_store(tmp.path(), &[fact('a', 50), fact('b', 50)]);

    let report = compactor(client.clone(), operator, tmp.path())
        .enforce(&mut store)
        .await
        .unwrap();

    assert!(client.requests().is_empty());
    assert_eq!(report.rounds_attempted, 0);
    assert_eq!(store.char_len(), 100);
    assert!(backups(tmp.path()).is_empty());
}

#[tokio::test]
async fn round_below_floor_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let too_short = facts_json(&[fact('x', 10)]);
    let good = facts_json(&[fact('m', 30), fact('n', 30)]);
    let client = ScriptedClient::new(&[&too_short, &good]);
    let operator = Arc::new(ScriptedOperator::default());
    let mut store = open_store(tmp.path(), &oversized());

    let report = compactor(client.clone(), operator.clone(), tmp.path())
        .enforce(&mut store)
        .await
        .unwrap();

    assert_eq!(report.rounds_attempted, 2);
    assert!(report.compacted);
    assert!(!report.pruned);
    assert_eq!(store.facts(), [fact('m', 30), fact('n', 30)]);
    assert_eq!(operator.compaction_prompts(), 0);

    let requests = client.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests.iter().all(|r| r.json_output && r.task == "memory compaction"));
}

#[tokio::test]
async fn store_is_backed_up_before_compaction() {
    let tmp = TempDir::new().unwrap();
    let client = ScriptedClient::new(&[&facts_json(&[fact('m', 60)])]);
    let operator = Arc::new(ScriptedOperator::default());
    let mut store = open_store(tmp.path(), &oversized());

    let report = compactor(client, operator, tmp.path())
        .enforce(&mut store)
        .await
        .unwrap();

    let backup = report.backup.unwrap();
    assert_eq!(backups(tmp.path()), vec![backup.clone()]);
    assert_eq!(MemoryStore::open(&backup).facts(), oversized().as_slice());
}

#[tokio::test]
async fn compacted_store_above_ceiling_is_pruned() {
    let tmp = TempDir::new().unwrap();
    let compacted = facts_json(&[fact('m', 30), fact('n', 30), fact('o', 30)]);
    let pruned = facts_json(&[fact('m', 30), fact('n', 30)]);
    let client = ScriptedClient::new(&[&compacted, &pruned]);
    let operator = Arc::new(ScriptedOperator::default());
    let mut store = open_store(tmp.path(), &oversized());

    let report = compactor(client.clone(), operator, tmp.path())
        .enforce(&mut store)
        .await
        .unwrap();

    assert!(report.compacted);
    assert!(report.pruned);
    assert_eq!(report.chars_after, 60);

    let prune = &client.requests()[1];
    assert_eq!(prune.task, "memory pruning");
    // 90 chars over 3 facts, 30 over the 60-char target
    assert!(prune.messages[0].content.contains("about 2 facts"));
}

#[tokio::test]
async fn operator_can_send_failed_compaction_to_pruning() {
    let tmp = TempDir::new().unwrap();
    let pruned = facts_json(&[fact('m', 30), fact('n', 30)]);
    let client = ScriptedClient::new(&["not json", "{\"count\": 1}", "[]", &pruned]);
    let operator = Arc::new(ScriptedOperator::with_choices(&[CompactionChoice::Prune]));
    let mut store = open_store(tmp.path(), &oversized());

    let report = compactor(client, operator.clone(), tmp.path())
        .enforce(&mut store)
        .await
        .unwrap();

    assert_eq!(operator.compaction_prompts(), 1);
    assert_eq!(report.rounds_attempted, 3);
    assert!(!report.compacted);
    assert!(report.pruned);
    assert_eq!(store.char_len(), 60);
}

#[tokio::test]
async fn operator_retry_runs_another_batch() {
    let tmp = TempDir::new().unwrap();
    let good = facts_json(&[fact('m', 60)]);
    let client = ScriptedClient::new(&["x", "y", "z", &good]);
    let operator = Arc::new(ScriptedOperator::with_choices(&[CompactionChoice::Retry]));
    let mut store = open_store(tmp.path(), &oversized());

    let report = compactor(client, operator.clone(), tmp.path())
        .enforce(&mut store)
        .await
        .unwrap();

    assert_eq!(operator.compaction_prompts(), 1);
    assert_eq!(report.rounds_attempted, 4);
    assert!(report.compacted);
}

#[tokio::test]
async fn still_oversized_after_pruning_goes_to_manual_edit() {
    let tmp = TempDir::new().unwrap();
    let compacted = facts_json(&[fact('m', 30), fact('n', 30), fact('o', 30)]);
    let below_floor = facts_json(&[fact('m', 10)]);
    let client = ScriptedClient::new(&[&compacted, &below_floor]);
    let operator = Arc::new(ScriptedOperator {
        manual_facts: vec![fact('h', 25), fact('i', 25)],
        ..Default::default()
    });
    let mut store = open_store(tmp.path(), &oversized());

    let report = compactor(client, operator.clone(), tmp.path())
        .enforce(&mut store)
        .await
        .unwrap();

    assert!(report.compacted);
    assert!(!report.pruned);
    assert!(report.manual_edit);
    assert_eq!(operator.manual_edits(), 1);
    assert_eq!(store.facts(), [fact('h', 25), fact('i', 25)]);
    assert_eq!(report.chars_after, 50);
}

#[tokio::test]
async fn operator_manual_edit_skips_pruning() {
    let tmp = TempDir::new().unwrap();
    let client = ScriptedClient::new(&["x", "y", "z"]);
    let operator = Arc::new(ScriptedOperator {
        manual_facts: vec![fact('h', 50)],
        ..ScriptedOperator::with_choices(&[CompactionChoice::ManualEdit])
    });
    let mut store = open_store(tmp.path(), &oversized());

    let report = compactor(client.clone(), operator.clone(), tmp.path())
        .enforce(&mut store)
        .await
        .unwrap();

    assert!(report.manual_edit);
    assert_eq!(client.requests().len(), 3);
    assert_eq!(store.facts(), [fact('h', 50)]);
}

#[tokio::test]
async fn operator_abort_stops_and_keeps_the_store() {
    let tmp = TempDir::new().unwrap();
    let client = ScriptedClient::new(&["x", "y", "z"]);
    let operator = Arc::new(ScriptedOperator::with_choices(&[CompactionChoice::Abort]));
    let mut store = open_store(tmp.path(), &oversized());

    let err = compactor(client, operator, tmp.path())
        .enforce(&mut store)
        .await
        .unwrap_err();

    assert!(is_stopped(&err));
    assert_eq!(store.facts(), oversized().as_slice());
}

#[tokio::test]
async fn transport_stop_propagates() {
    let tmp = TempDir::new().unwrap();
    let operator = Arc::new(ScriptedOperator::default());
    let mut store = open_store(tmp.path(), &oversized());

    let err = compactor(ScriptedClient::stopping(), operator, tmp.path())
        .enforce(&mut store)
        .await
        .unwrap_err();

    assert!(is_stopped(&err));
}

#[tokio::test]
async fn growing_past_high_water_triggers_compaction() {
    let tmp = TempDir::new().unwrap();
    let client = ScriptedClient::new(&[&facts_json(&[fact('m', 60)])]);
    let operator = Arc::new(ScriptedOperator::default());
    let start: Vec<String> = ['a', 'b', 'c', 'd'].iter().map(|&c| fact(c, 25)).collect();
    let mut memory = memory(tmp.path(), &start, client.clone(), operator);

    memory
        .apply(&MemoryUpdate {
            add: vec![fact('z', 30)],
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(client.requests().len(), 1);
    assert_eq!(memory.store.facts(), [fact('m', 60)]);
}

#[tokio::test]
async fn forced_pass_runs_below_high_water() {
    let tmp = TempDir::new().unwrap();
    let client = ScriptedClient::new(&[&facts_json(&[fact('m', 45)])]);
    let operator = Arc::new(ScriptedOperator::default());
    let mut memory = memory(tmp.path(), &[fact('a', 30), fact('b', 30)], client, operator);

    let report = memory.compact_now().await.unwrap();

    assert!(report.compacted);
    assert_eq!((report.chars_before, report.chars_after), (60, 45));
}
