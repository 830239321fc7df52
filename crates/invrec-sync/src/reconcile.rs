//! Drives one record through resolve/place and the gateway writes.

use invrec_core::{
    Column, Identifiers, EntityKind, LayoutError, MatchTier, Outcome, Record, SheetLayout,
    SkipReason, TableSnapshot, Warning,
};
use invrec_sheets::{GatewayError, RangeSpec, Rgb, TableGateway};
use serde::Serialize;
use tracing::{info, info_span, warn, Instrument};

use crate::placement::{place, still_anchors, Placement};
use crate::resolve::resolve;
use crate::ReconcileError;

/// Outcome of one file plus everything worth surfacing about how it was reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reconciled {
    pub outcome: Outcome,
    pub tier: Option<MatchTier>,
    pub warnings: Vec<Warning>,
}

impl Reconciled {
    fn skipped(reason: SkipReason) -> Self {
        Self {
            outcome: Outcome::Skipped { reason },
            tier: None,
            warnings: Vec::new(),
        }
    }
}

/// Applies records to one table through its gateway. Holds no row indices
/// between calls: every operation starts from a fresh read.
pub struct Reconciler<'a> {
    gateway: &'a dyn TableGateway,
    layout: &'a SheetLayout,
}

impl<'a> Reconciler<'a> {
    pub fn new(gateway: &'a dyn TableGateway, layout: &'a SheetLayout) -> Self {
        Self { gateway, layout }
    }

    fn identity_range(&self, row: Option<u32>) -> RangeSpec {
        let last = self.layout.identity_last_column();
        match row {
            Some(row) => RangeSpec::row(row, Column(0), last),
            None => RangeSpec::columns(Column(0), last),
        }
    }

    /// Reads the identity columns of the whole table.
    pub async fn snapshot(&self) -> Result<TableSnapshot, GatewayError> {
        let rows = self.gateway.read_range(&self.identity_range(None)).await?;
        Ok(TableSnapshot::new(rows, self.layout.header_rows))
    }

    pub async fn reconcile(&self, record: &Record) -> Result<Reconciled, ReconcileError> {
        let ids = record.identifiers();
        let span = info_span!(
            "reconcile",
            file = record.source_file(),
            kind = %ids.entity_kind,
            search = %ids.search_label(),
        );
        self.apply(record).instrument(span).await
    }

    async fn apply(&self, record: &Record) -> Result<Reconciled, ReconcileError> {
        let ids = record.identifiers();
        if ids.entity_kind == EntityKind::Unknown || !ids.is_usable() {
            info!("skipping record without usable identity");
            return Ok(Reconciled::skipped(SkipReason::NoUsableIdentifier));
        }
        let values = record.row_values();
        if values.len() != self.layout.total_block_width() {
            return Err(ReconcileError::Layout(LayoutError::WidthMismatch {
                cells: self.layout.total_block_width(),
                fields: values.len(),
            }));
        }
        match ids.entity_kind {
            EntityKind::Physical => self.update_physical(ids, &values).await,
            _ => self.insert_virtual(ids, &values).await,
        }
    }

    async fn update_physical(
        &self,
        ids: &Identifiers,
        values: &[String],
    ) -> Result<Reconciled, ReconcileError> {
        let snapshot = self.snapshot().await?;
        let Some(hit) = resolve(&snapshot, self.layout, ids) else {
            info!("no matching row");
            return Ok(Reconciled::skipped(SkipReason::NoMatchingRow));
        };
        self.write_blocks(hit.row, values).await?;
        info!(row = hit.row, tier = %hit.tier, "row updated");
        Ok(Reconciled {
            outcome: Outcome::Updated { row: hit.row },
            tier: Some(hit.tier),
            warnings: hit.warning.into_iter().collect(),
        })
    }

    async fn insert_virtual(
        &self,
        ids: &Identifiers,
        values: &[String],
    ) -> Result<Reconciled, ReconcileError> {
        let snapshot = self.snapshot().await?;
        let (placement, mut warnings) = self.confirm(ids, place(&snapshot, self.layout, ids)).await?;

        self.gateway.insert_row_at(placement.insert_index).await?;
        self.write_blocks(placement.new_row, values)
            .await
            .map_err(|source| {
                warn!(row = placement.new_row, error = %source, "inserted row left blank");
                ReconcileError::OrphanRow {
                    row: placement.new_row,
                    source,
                }
            })?;

        if placement.using_fallback {
            warn!(row = placement.new_row, "parent row not found; appended");
            warnings.push(Warning::PlacementFallback {
                row: placement.new_row,
            });
        }
        info!(
            row = placement.new_row,
            parent_row = placement.parent_row,
            "row inserted"
        );
        Ok(Reconciled {
            outcome: Outcome::Inserted {
                row: placement.new_row,
                parent_found: placement.parent_found(),
            },
            tier: None,
            warnings,
        })
    }

    /// Re-reads the parent row right before the insert; when it no longer
    /// anchors the record the table is re-read and the placement recomputed.
    async fn confirm(
        &self,
        ids: &Identifiers,
        placement: Placement,
    ) -> Result<(Placement, Vec<Warning>), ReconcileError> {
        let (Some(parent_row), Some(anchor)) = (placement.parent_row, placement.anchor) else {
            return Ok((placement, Vec::new()));
        };
        let cells = self
            .gateway
            .read_range(&self.identity_range(Some(parent_row)))
            .await?
            .into_iter()
            .next()
            .unwrap_or_default();
        if still_anchors(&cells, self.layout, ids, anchor) {
            return Ok((placement, Vec::new()));
        }

        let snapshot = self.snapshot().await?;
        let replaced = place(&snapshot, self.layout, ids);
        warn!(
            previous_row = parent_row,
            current_row = replaced.parent_row,
            "parent row shifted before insert"
        );
        let warning = Warning::ParentShifted {
            previous_row: parent_row,
            current_row: replaced.parent_row,
        };
        Ok((replaced, vec![warning]))
    }

    /// Writes `values` across the layout's blocks of `row`, in declared order.
    async fn write_blocks(&self, row: u32, values: &[String]) -> Result<(), GatewayError> {
        let mut offset = 0;
        for block in &self.layout.write_blocks {
            let width = block.width();
            let chunk = values[offset..offset + width].to_vec();
            self.gateway
                .update_range(&RangeSpec::row(row, block.start, block.end), vec![chunk])
                .await?;
            offset += width;
        }
        Ok(())
    }

    /// Colours the row matched by `ids` without touching its values.
    pub async fn highlight(
        &self,
        ids: &Identifiers,
        color: Rgb,
    ) -> Result<Reconciled, ReconcileError> {
        let span = info_span!("highlight", search = %ids.search_label());
        self.paint(ids, color).instrument(span).await
    }

    async fn paint(&self, ids: &Identifiers, color: Rgb) -> Result<Reconciled, ReconcileError> {
        if !ids.is_usable() {
            return Ok(Reconciled::skipped(SkipReason::NoUsableIdentifier));
        }
        let snapshot = self.snapshot().await?;
        let Some(hit) = resolve(&snapshot, self.layout, ids) else {
            info!("no matching row");
            return Ok(Reconciled::skipped(SkipReason::NoMatchingRow));
        };
        self.gateway.highlight_row(hit.row, color).await?;
        info!(row = hit.row, tier = %hit.tier, %color, "row highlighted");
        Ok(Reconciled {
            outcome: Outcome::Highlighted {
                row: hit.row,
                tier: hit.tier,
            },
            tier: Some(hit.tier),
            warnings: hit.warning.into_iter().collect(),
        })
    }
}
