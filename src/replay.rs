//! Offline replay of a recorded backend event log.

use crate::error::{ErrorKind, Result};
use buildcache_model::event::BackendEvent;
use buildcache_model::{CacheKind, Phase, ProtectedVersions, VersionEntry, Versions, facts};
use buildcache_store::{Reconciled, Reconciler, Store};
use exn::ResultExt;
use serde::Deserialize;
use std::fmt;
use std::io::BufRead;
use std::path::Path;

/// One line of an event log.
#[derive(Debug, Deserialize)]
struct Record {
    event: String,
    payload: serde_json::Value,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ReplayStats {
    pub applied: u64,
    pub ignored: u64,
}

pub fn read_versions(path: &Path) -> Result<Vec<VersionEntry>> {
    let name = || path.display().to_string();
    let contents = std::fs::read_to_string(path).or_raise(|| ErrorKind::Read(name()))?;
    let versions: Versions = serde_json::from_str(&contents).or_raise(|| ErrorKind::Parse(name()))?;
    Ok(versions.versions)
}

/// Feed every record of a JSON-lines event log through `reconciler`. Blank
/// lines are skipped; anything else that is not a known event is an error.
pub fn replay(reconciler: &Reconciler, log: impl BufRead) -> Result<ReplayStats> {
    let mut stats = ReplayStats::default();
    for (index, line) in log.lines().enumerate() {
        let number = index + 1;
        let line = line.or_raise(|| ErrorKind::Read(format!("event log line {number}")))?;
        if line.trim().is_empty() {
            continue;
        }
        let record: Record = serde_json::from_str(&line).or_raise(|| ErrorKind::Event(number))?;
        let event = BackendEvent::decode_value(&record.event, record.payload).or_raise(|| ErrorKind::Event(number))?;
        match reconciler.apply(event) {
            Reconciled::Applied => stats.applied += 1,
            Reconciled::Ignored(reason) => {
                tracing::debug!(line = number, %reason, "Event ignored");
                stats.ignored += 1;
            },
        }
    }
    Ok(stats)
}

/// One cache of one build, as printed.
#[derive(Clone, Debug, PartialEq)]
pub struct AuditLine {
    pub label: String,
    pub kind: CacheKind,
    pub phase: Phase,
    pub size: Option<String>,
    pub expected: Option<String>,
    /// Corrupt items counted even when also missing.
    pub corrupt: bool,
    pub missing: usize,
    pub protected: bool,
}

impl fmt::Display for AuditLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<28} {:<8} {:<10} {:>8} / {:<8} GB  corrupt={:<5} missing={}",
            self.label,
            self.kind,
            self.phase,
            self.size.as_deref().unwrap_or("-"),
            self.expected.as_deref().unwrap_or("-"),
            self.corrupt,
            self.missing,
        )?;
        if self.protected {
            write!(f, "  (protected)")?;
        }
        Ok(())
    }
}

/// Audit every visible build, both kinds.
pub fn audit(store: &Store, versions: &[VersionEntry], protected: &ProtectedVersions) -> Vec<AuditLine> {
    versions
        .iter()
        .filter(|version| !version.hidden)
        .flat_map(|version| {
            CacheKind::ALL.into_iter().map(move |kind| {
                let state = store.get(version.uuid, kind);
                AuditLine {
                    label: version.label(),
                    kind,
                    phase: state.phase(),
                    size: facts::format_gigabytes(facts::validated_size(&state)),
                    expected: facts::format_gigabytes(facts::expected_total(version, kind)),
                    corrupt: facts::is_corrupt(&state, true),
                    missing: facts::missing_items(&state).len(),
                    protected: protected.contains(&version.uuid),
                }
            })
        })
        .collect()
}
