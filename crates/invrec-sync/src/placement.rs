//! Where a new virtual row goes relative to its host.

use invrec_core::{cell_in, range_head, Identifiers, SheetLayout, TableSnapshot};
use serde::Serialize;
use tracing::debug;

/// Which signal tied the record to its parent row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Anchor {
    Location,
    Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Placement {
    /// 1-based parent row, absent when appending.
    pub parent_row: Option<u32>,
    pub anchor: Option<Anchor>,
    /// Zero-based index handed to the insert primitive.
    pub insert_index: u32,
    /// 1-based number of the row the insert creates.
    pub new_row: u32,
    pub using_fallback: bool,
}

impl Placement {
    fn after(parent_row: u32, anchor: Anchor) -> Self {
        Self {
            parent_row: Some(parent_row),
            anchor: Some(anchor),
            insert_index: parent_row,
            new_row: parent_row + 1,
            using_fallback: false,
        }
    }

    fn append(last_row: u32) -> Self {
        Self {
            parent_row: None,
            anchor: None,
            insert_index: last_row,
            new_row: last_row + 1,
            using_fallback: true,
        }
    }

    pub fn parent_found(&self) -> bool {
        self.parent_row.is_some()
    }
}

/// Host and guest share a location when rack and slot agree on their range heads.
fn co_located(cells: &[String], layout: &SheetLayout, rack: &str, slot: &str) -> bool {
    let (Some(row_rack), Some(row_slot)) = (
        cell_in(cells, layout.rack_column),
        cell_in(cells, layout.slot_column),
    ) else {
        return false;
    };
    range_head(row_rack) == range_head(rack) && range_head(row_slot) == range_head(slot)
}

/// True when `cells` still anchor `ids` the way `anchor` says they did.
pub fn still_anchors(cells: &[String], layout: &SheetLayout, ids: &Identifiers, anchor: Anchor) -> bool {
    match anchor {
        Anchor::Location => ids
            .location()
            .is_some_and(|(rack, slot)| co_located(cells, layout, rack, slot)),
        Anchor::Address => match (layout.address_column, ids.parent_address.as_deref()) {
            (Some(column), Some(address)) => {
                cell_in(cells, column).is_some_and(|cell| cell.contains(address))
            }
            _ => false,
        },
    }
}

/// Computes the insertion point for a virtual record: after the co-located
/// host, else after the row carrying the parent address, else at the end.
pub fn place(snapshot: &TableSnapshot, layout: &SheetLayout, ids: &Identifiers) -> Placement {
    for anchor in [Anchor::Location, Anchor::Address] {
        let hit = snapshot
            .data_rows()
            .find(|(_, cells)| still_anchors(cells, layout, ids, anchor));
        if let Some((row, _)) = hit {
            debug!(parent_row = row, ?anchor, "parent row found");
            return Placement::after(row, anchor);
        }
    }
    debug!(last_row = snapshot.last_row(), "no parent row; appending");
    Placement::append(snapshot.last_row())
}
