use anyhow::Result;
use std::sync::Arc;

use quill::config::QuillConfig;
use quill::memory::store::MemoryStore;
use quill::operator::{Operator, TerminalOperator};

use super::{build_client, open_memory};

/// Print every fact in the profile.
pub fn show(config: &QuillConfig) -> Result<()> {
    let store = MemoryStore::open(config.profile_path());
    println!("Memory profile: {}", store.path().display());
    println!("{}", "=".repeat(40));
    if store.is_empty() {
        println!("  (empty)");
    }
    for (i, fact) in store.facts().iter().enumerate() {
        println!("  {:>3}. {fact}", i + 1);
    }
    Ok(())
}

/// Print the profile size against the compaction thresholds.
pub fn stats(config: &QuillConfig) -> Result<()> {
    let store = MemoryStore::open(config.profile_path());
    let policy = &config.memory;

    println!("Memory Statistics");
    println!("{}", "=".repeat(40));
    println!("  Facts:               {}", store.len());
    println!("  Characters:          {}", store.char_len());
    println!();
    println!("Thresholds:");
    println!("  Compaction starts:   > {}", policy.high_water_chars);
    println!("  Prune above:         > {}", policy.ceiling_chars);
    println!("  Prune target:        {}", policy.prune_target_chars);
    println!("  Minimum result:      {}", policy.floor_chars);
    println!("  Auto-compaction:     {}", if policy.enabled { "on" } else { "off" });
    Ok(())
}

/// Run a compaction pass regardless of size.
pub async fn compact(config: &QuillConfig) -> Result<()> {
    config.validate()?;
    let operator: Arc<dyn Operator> = Arc::new(TerminalOperator);
    let client = build_client(config, operator.clone())?;
    let mut memory = open_memory(config, client, operator);

    let report = memory.compact_now().await?;
    println!("Compaction finished");
    println!("{}", "=".repeat(40));
    println!("  Characters:          {} -> {}", report.chars_before, report.chars_after);
    println!("  Rounds:              {}", report.rounds_attempted);
    println!("  Compacted:           {}", report.compacted);
    println!("  Pruned:              {}", report.pruned);
    println!("  Manual edit:         {}", report.manual_edit);
    if let Some(backup) = &report.backup {
        println!("  Backup:              {}", backup.display());
    }
    Ok(())
}
