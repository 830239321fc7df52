use chrono::{DateTime, Utc};
use invrec_core::{EntityKind, MatchTier, Outcome, Warning};
use serde::Serialize;
use uuid::Uuid;

/// One processed file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecapEntry {
    pub file: String,
    pub entity_kind: EntityKind,
    pub hostname: Option<String>,
    pub outcome: Outcome,
    pub tier: Option<MatchTier>,
    pub warnings: Vec<Warning>,
    pub content_sha256: Option<String>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RecapCounts {
    pub total: usize,
    pub updated: usize,
    pub inserted: usize,
    pub highlighted: usize,
    pub skipped: usize,
    pub failed: usize,
    pub physical_success: usize,
    pub virtual_success: usize,
    pub warnings: usize,
}

/// Per-run summary of every file's outcome.
#[derive(Debug, Clone, Serialize)]
pub struct Recap {
    pub run_id: Uuid,
    pub mode: String,
    pub profile: String,
    pub table: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub entries: Vec<RecapEntry>,
}

impl Recap {
    pub fn new(mode: impl Into<String>, profile: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            mode: mode.into(),
            profile: profile.into(),
            table: table.into(),
            started_at: Utc::now(),
            finished_at: None,
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, entry: RecapEntry) {
        self.entries.push(entry);
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn counts(&self) -> RecapCounts {
        let mut counts = RecapCounts {
            total: self.entries.len(),
            ..RecapCounts::default()
        };
        for entry in &self.entries {
            match entry.outcome {
                Outcome::Updated { .. } => counts.updated += 1,
                Outcome::Inserted { .. } => counts.inserted += 1,
                Outcome::Highlighted { .. } => counts.highlighted += 1,
                Outcome::Skipped { .. } => counts.skipped += 1,
                Outcome::Failed { .. } => counts.failed += 1,
            }
            if entry.outcome.is_success() {
                match entry.entity_kind {
                    EntityKind::Physical => counts.physical_success += 1,
                    EntityKind::Virtual => counts.virtual_success += 1,
                    EntityKind::Unknown => {}
                }
            }
            counts.warnings += entry.warnings.len();
        }
        counts
    }

    /// Share of files that reached the table, in percent.
    pub fn success_rate(&self) -> f64 {
        let counts = self.counts();
        if counts.total == 0 {
            return 0.0;
        }
        let ok = counts.updated + counts.inserted + counts.highlighted;
        ok as f64 * 100.0 / counts.total as f64
    }

    /// `(file, reason)` for every skipped or failed file, in processing order.
    pub fn reasons(&self) -> Vec<(&str, String)> {
        self.entries
            .iter()
            .filter_map(|e| e.outcome.reason().map(|r| (e.file.as_str(), r)))
            .collect()
    }

    pub fn duration_ms(&self) -> i64 {
        self.finished_at
            .map(|end| (end - self.started_at).num_milliseconds())
            .unwrap_or_default()
    }

    pub fn render_markdown(&self) -> String {
        let counts = self.counts();
        let mut out = format!(
            "# Reconciliation Recap\n\n- Run ID: `{}`\n- Mode: {}\n- Profile: {}\n- Table: {}\n- Started: {}\n- Duration: {} ms\n\n## Summary\n\n| Outcome | Files |\n|---|---|\n| Updated | {} |\n| Inserted | {} |\n| Highlighted | {} |\n| Skipped | {} |\n| Failed | {} |\n| **Total** | {} |\n\nPhysical ok: {}, virtual ok: {}, success rate: {:.1}%\n",
            self.run_id,
            self.mode,
            self.profile,
            self.table,
            self.started_at,
            self.duration_ms(),
            counts.updated,
            counts.inserted,
            counts.highlighted,
            counts.skipped,
            counts.failed,
            counts.total,
            counts.physical_success,
            counts.virtual_success,
            self.success_rate(),
        );

        let done: Vec<_> = self
            .entries
            .iter()
            .filter(|e| e.outcome.is_success())
            .collect();
        if !done.is_empty() {
            out.push_str("\n## Written\n\n");
            for entry in done {
                let host = entry.hostname.as_deref().unwrap_or("-");
                let detail = match (&entry.outcome, entry.tier) {
                    (Outcome::Inserted { row, parent_found }, _) => {
                        format!("inserted at row {row} (parent found: {parent_found})")
                    }
                    (outcome, Some(tier)) => {
                        format!("row {} via {tier}", outcome.row().unwrap_or_default())
                    }
                    (outcome, None) => format!("row {}", outcome.row().unwrap_or_default()),
                };
                out.push_str(&format!("- `{}` ({host}): {detail}\n", entry.file));
            }
        }

        let warned: Vec<_> = self.entries.iter().filter(|e| !e.warnings.is_empty()).collect();
        if !warned.is_empty() {
            out.push_str("\n## Warnings\n\n");
            for entry in warned {
                for warning in &entry.warnings {
                    out.push_str(&format!("- `{}`: {warning}\n", entry.file));
                }
            }
        }

        let reasons = self.reasons();
        if !reasons.is_empty() {
            out.push_str("\n## Not Written\n\n");
            for (file, reason) in reasons {
                out.push_str(&format!("- `{file}`: {reason}\n"));
            }
        }
        out
    }
}
