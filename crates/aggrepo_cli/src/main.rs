//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `aggrepo_core` linkage.
//! - Run one add/commit/get round trip against an in-memory store.
//! - Write its log to `AGGREPO_LOG_DIR`, or `<temp>/aggrepo-logs` when unset.

use aggrepo_core::{
    init_logging, logging_status, new_sequential_id, AggregateRoot, Entity, EntityId,
    LoggingConfig, RepoResult, Repository, RepositoryContext, SqliteStore, TimestampLayout,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
struct SmokeRecord {
    id: EntityId,
    label: String,
}

impl Entity for SmokeRecord {
    fn id(&self) -> EntityId {
        self.id
    }
}

impl AggregateRoot for SmokeRecord {
    const KIND: &'static str = "smoke_record";
}

fn main() -> RepoResult<()> {
    let logging = LoggingConfig::from_env().unwrap_or_else(|| {
        LoggingConfig::with_default_level(std::env::temp_dir().join("aggrepo-logs"))
    });
    match init_logging(&logging) {
        Ok(()) => {
            if let Some((level, log_dir)) = logging_status() {
                println!(
                    "aggrepo_core logging=on level={level} log_dir={}",
                    log_dir.display()
                );
            }
        }
        // The smoke run still proceeds without a log file.
        Err(err) => eprintln!("aggrepo_core logging=off error={err}"),
    }

    println!("aggrepo_core ping={}", aggrepo_core::ping());
    println!("aggrepo_core version={}", aggrepo_core::core_version());

    let id = new_sequential_id(TimestampLayout::TimeFirst);
    println!("aggrepo_core sequential_id={id}");

    let context = RepositoryContext::new(SqliteStore::open_in_memory()?);
    let records = context.repository::<SmokeRecord>();
    records.add(&SmokeRecord {
        id,
        label: "smoke".to_string(),
    })?;
    context.commit()?;

    let loaded = records.get_by_key(id)?;
    println!("aggrepo_core round_trip={}", loaded.label);
    context.close()
}
