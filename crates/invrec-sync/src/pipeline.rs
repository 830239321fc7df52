//! Batch runs over a directory of reports.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use invrec_core::{EntityKind, Outcome, Record};
use invrec_rules::{basename, classify_filename, extract, filename_identifiers, resolve_profile, Profile};
use invrec_sheets::{GoogleSheetsGateway, Rgb, TableGateway};
use regex::Regex;
use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::{info, warn};

use crate::recap::{Recap, RecapEntry};
use crate::reconcile::{Reconciled, Reconciler};
use crate::{BatchAborted, ReconcileError, SyncConfig};

/// Files directly under `dir` whose name matches `pattern`, sorted by path.
pub async fn discover_reports(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let matcher = Regex::new(pattern).with_context(|| format!("compiling file pattern {pattern}"))?;
    let mut entries = fs::read_dir(dir)
        .await
        .with_context(|| format!("reading {}", dir.display()))?;
    let mut files = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .with_context(|| format!("listing {}", dir.display()))?
    {
        let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
        let name = entry.file_name();
        if is_file && matcher.is_match(&name.to_string_lossy()) {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

/// Report text from raw bytes: UTF-16 when a BOM says so, otherwise lossy UTF-8.
pub fn decode_report(bytes: &[u8]) -> String {
    fn utf16(body: &[u8], to_unit: fn([u8; 2]) -> u16) -> String {
        let units = body.chunks_exact(2).map(|pair| to_unit([pair[0], pair[1]]));
        char::decode_utf16(units)
            .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
            .collect()
    }
    match bytes {
        [0xFF, 0xFE, body @ ..] => utf16(body, u16::from_le_bytes),
        [0xFE, 0xFF, body @ ..] => utf16(body, u16::from_be_bytes),
        [0xEF, 0xBB, 0xBF, body @ ..] => String::from_utf8_lossy(body).into_owned(),
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}

pub fn content_sha256(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

fn kind_rank(kind: EntityKind) -> u8 {
    match kind {
        EntityKind::Physical => 0,
        EntityKind::Virtual => 1,
        EntityKind::Unknown => 2,
    }
}

/// Physical reports first, then virtual ones, then the rest; stable otherwise.
pub fn order_for_sync(files: &[PathBuf]) -> Vec<PathBuf> {
    let mut ordered = files.to_vec();
    ordered.sort_by_key(|path| kind_rank(classify_filename(&file_label(path))));
    ordered
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| basename(&path.to_string_lossy()).to_string())
}

/// Reads and extracts one report without touching any table.
pub async fn extract_file(profile: &Profile, path: &Path) -> Result<Record> {
    let bytes = fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let content = decode_report(&bytes);
    let record = extract(&profile.rule_set, &content, &file_label(path))
        .with_context(|| format!("extracting {}", path.display()))?;
    Ok(record)
}

pub struct SyncPipeline {
    profile: Profile,
    gateway: Arc<dyn TableGateway>,
    continue_on_error: bool,
    highlight_color: Rgb,
}

impl SyncPipeline {
    pub fn new(profile: Profile, gateway: Arc<dyn TableGateway>) -> Self {
        Self {
            profile,
            gateway,
            continue_on_error: true,
            highlight_color: Rgb::default(),
        }
    }

    pub fn continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = continue_on_error;
        self
    }

    pub fn highlight_color(mut self, color: Rgb) -> Self {
        self.highlight_color = color;
        self
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    /// Extracts and reconciles every file, one at a time.
    pub async fn run_sync(&self, files: &[PathBuf]) -> Result<Recap, BatchAborted> {
        let reconciler = Reconciler::new(self.gateway.as_ref(), &self.profile.layout);
        let mut recap = Recap::new("sync", &self.profile.name, self.gateway.table_id());
        info!(run_id = %recap.run_id, files = files.len(), profile = %self.profile.name, "sync started");

        for path in order_for_sync(files) {
            let entry = self.sync_file(&reconciler, &path).await;
            self.record(&mut recap, entry)?;
        }
        recap.finish();
        info!(run_id = %recap.run_id, counts = ?recap.counts(), "sync finished");
        Ok(recap)
    }

    /// Colours the row each file's name points at; report bodies are not read.
    pub async fn run_highlight(&self, files: &[PathBuf]) -> Result<Recap, BatchAborted> {
        let reconciler = Reconciler::new(self.gateway.as_ref(), &self.profile.layout);
        let mut recap = Recap::new("highlight", &self.profile.name, self.gateway.table_id());
        info!(run_id = %recap.run_id, files = files.len(), "highlight started");

        for path in files {
            let started = Instant::now();
            let file = file_label(path);
            let derived = filename_identifiers(&file, self.profile.rule_set.identity());
            let result = reconciler
                .highlight(&derived.identifiers, self.highlight_color)
                .await;
            let entry = entry_for(
                file,
                derived.identifiers.entity_kind,
                derived.hostname,
                None,
                result,
                started,
            );
            self.record(&mut recap, entry)?;
        }
        recap.finish();
        info!(run_id = %recap.run_id, counts = ?recap.counts(), "highlight finished");
        Ok(recap)
    }

    fn record(&self, recap: &mut Recap, entry: RecapEntry) -> Result<(), BatchAborted> {
        let failure = match &entry.outcome {
            Outcome::Failed { failure } => Some((entry.file.clone(), failure.message.clone())),
            _ => None,
        };
        recap.push(entry);
        match failure {
            Some((file, message)) if !self.continue_on_error => {
                recap.finish();
                Err(BatchAborted {
                    recap: Box::new(recap.clone()),
                    file,
                    message,
                })
            }
            _ => Ok(()),
        }
    }

    async fn sync_file(&self, reconciler: &Reconciler<'_>, path: &Path) -> RecapEntry {
        let started = Instant::now();
        let file = file_label(path);
        let fallback_kind = classify_filename(&file);

        let bytes = match fs::read(path).await {
            Ok(bytes) => bytes,
            Err(source) => {
                let err = ReconcileError::Io {
                    file: file.clone(),
                    source,
                };
                return entry_for(file, fallback_kind, None, None, Err(err), started);
            }
        };
        let sha = content_sha256(&bytes);
        let content = decode_report(&bytes);

        let record = match extract(&self.profile.rule_set, &content, &file) {
            Ok(record) => record,
            Err(err) => {
                return entry_for(file, fallback_kind, None, Some(sha), Err(err.into()), started)
            }
        };
        let result = reconciler.reconcile(&record).await;
        entry_for(
            file,
            record.identifiers().entity_kind,
            record.hostname().map(String::from),
            Some(sha),
            result,
            started,
        )
    }
}

fn entry_for(
    file: String,
    entity_kind: EntityKind,
    hostname: Option<String>,
    content_sha256: Option<String>,
    result: Result<Reconciled, ReconcileError>,
    started: Instant,
) -> RecapEntry {
    let (outcome, tier, warnings) = match result {
        Ok(done) => (done.outcome, done.tier, done.warnings),
        Err(err) => {
            warn!(file = %file, error = %err, "file failed");
            (Outcome::failed(err.failure_kind(), err.to_string()), None, Vec::new())
        }
    };
    RecapEntry {
        file,
        entity_kind,
        hostname,
        outcome,
        tier,
        warnings,
        content_sha256,
        duration_ms: started.elapsed().as_millis() as u64,
    }
}

/// Writes `recap.json` and `recap.md` under `<reports_dir>/<run_id>/`.
pub async fn write_recap(recap: &Recap, reports_dir: &Path) -> Result<PathBuf> {
    let dir = reports_dir.join(recap.run_id.to_string());
    fs::create_dir_all(&dir)
        .await
        .with_context(|| format!("creating {}", dir.display()))?;

    let json = serde_json::to_vec_pretty(recap).context("serializing recap")?;
    fs::write(dir.join("recap.json"), json)
        .await
        .context("writing recap.json")?;
    fs::write(dir.join("recap.md"), recap.render_markdown())
        .await
        .context("writing recap.md")?;
    Ok(dir)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Sync,
    Highlight,
}

/// Loads profile and gateway from `config`, runs the batch and writes the recap.
///
/// An aborted batch still writes its partial recap before the error is returned.
pub async fn run_from_config(config: &SyncConfig, mode: RunMode) -> Result<(Recap, PathBuf)> {
    let profile = resolve_profile(&config.profile, &config.profiles_dir)?;
    let gateway = GoogleSheetsGateway::new(config.sheets_config()?)?;
    let files = discover_reports(&config.directory, &config.file_pattern).await?;
    let pipeline = SyncPipeline::new(profile, Arc::new(gateway))
        .continue_on_error(config.continue_on_error)
        .highlight_color(config.highlight_color);

    let result = match mode {
        RunMode::Sync => pipeline.run_sync(&files).await,
        RunMode::Highlight => pipeline.run_highlight(&files).await,
    };
    match result {
        Ok(recap) => {
            let dir = write_recap(&recap, &config.reports_dir).await?;
            Ok((recap, dir))
        }
        Err(aborted) => {
            write_recap(&aborted.recap, &config.reports_dir).await?;
            Err(aborted.into())
        }
    }
}
