//! Identity resolution, placement, reconciliation and batch runs against a table gateway.

use invrec_core::{FailureKind, LayoutError};
use invrec_rules::ExtractError;
use invrec_sheets::GatewayError;
use thiserror::Error;

mod census;
mod config;
mod pipeline;
mod placement;
mod recap;
mod reconcile;
mod resolve;

pub use census::{census, Census, FolderCount, ParentCount, TypeCounts, DEFAULT_PARENTS};
pub use config::SyncConfig;
pub use pipeline::{
    content_sha256, decode_report, discover_reports, extract_file, order_for_sync,
    run_from_config, write_recap, RunMode, SyncPipeline,
};
pub use placement::{place, still_anchors, Anchor, Placement};
pub use recap::{Recap, RecapCounts, RecapEntry};
pub use reconcile::{Reconciled, Reconciler};
pub use resolve::resolve;

pub const CRATE_NAME: &str = "invrec-sync";

/// Why a single file could not be applied to the table.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Extract(#[from] ExtractError),
    #[error("table gateway: {0}")]
    Gateway(#[from] GatewayError),
    #[error("layout: {0}")]
    Layout(#[from] LayoutError),
    #[error("row {row} inserted but left blank: {source}")]
    OrphanRow {
        row: u32,
        #[source]
        source: GatewayError,
    },
    #[error("reading {file}: {source}")]
    Io {
        file: String,
        #[source]
        source: std::io::Error,
    },
}

impl ReconcileError {
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            ReconcileError::Extract(ExtractError::MissingField(_)) => FailureKind::MissingField,
            ReconcileError::Extract(_) | ReconcileError::Layout(_) => FailureKind::Config,
            ReconcileError::Gateway(_) | ReconcileError::OrphanRow { .. } => FailureKind::Gateway,
            ReconcileError::Io { .. } => FailureKind::Io,
        }
    }
}

/// Returned instead of a recap when a failure stops the batch early.
#[derive(Debug, Error)]
#[error("batch aborted at {file}: {message}")]
pub struct BatchAborted {
    pub recap: Box<Recap>,
    pub file: String,
    pub message: String,
}
