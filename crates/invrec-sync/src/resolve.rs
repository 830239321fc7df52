//! Tiered identity matching over a snapshot of the identity columns.

use invrec_core::{
    cell_in, range_head, Identifiers, MatchResult, MatchTier, SheetLayout, TableSnapshot, Warning,
};
use tracing::{debug, warn};

/// Rack of `cells` equals `rack` exactly; the slot also matches on its range
/// head so a `22-23` row answers to slot `22`.
pub(crate) fn location_matches(cells: &[String], layout: &SheetLayout, rack: &str, slot: &str) -> bool {
    let (Some(row_rack), Some(row_slot)) = (
        cell_in(cells, layout.rack_column),
        cell_in(cells, layout.slot_column),
    ) else {
        return false;
    };
    row_rack == rack.trim() && (row_slot == slot || range_head(row_slot) == range_head(slot))
}

fn serial_matches(cells: &[String], layout: &SheetLayout, serial: &str) -> bool {
    cell_in(cells, layout.serial_column) == Some(serial)
}

/// Finds the existing row for `ids`, strongest tier first.
///
/// 1. serial, rack and slot all agree
/// 2. rack and slot agree; a differing serial on the row is reported as stale
/// 3. serial agrees; the lowest row wins and duplicates are reported
pub fn resolve(
    snapshot: &TableSnapshot,
    layout: &SheetLayout,
    ids: &Identifiers,
) -> Option<MatchResult> {
    let serial = ids.serial_number.as_deref();
    let location = ids.location();

    if let (Some(sn), Some((rack, slot))) = (serial, location) {
        let hit = snapshot.data_rows().find(|(_, cells)| {
            serial_matches(cells, layout, sn) && location_matches(cells, layout, rack, slot)
        });
        if let Some((row, _)) = hit {
            debug!(row, serial = sn, rack, slot, "exact match");
            return Some(MatchResult {
                row,
                tier: MatchTier::ExactTriple,
                warning: None,
            });
        }
    }

    if let Some((rack, slot)) = location {
        let hit = snapshot
            .data_rows()
            .find(|(_, cells)| location_matches(cells, layout, rack, slot));
        if let Some((row, cells)) = hit {
            let warning = match (serial, cell_in(cells, layout.serial_column)) {
                (Some(expected), Some(found)) if expected != found => {
                    warn!(row, expected, found, "serial differs from location match");
                    Some(Warning::StaleSerial {
                        row,
                        expected: expected.to_string(),
                        found: found.to_string(),
                    })
                }
                _ => None,
            };
            debug!(row, rack, slot, "location match");
            return Some(MatchResult {
                row,
                tier: MatchTier::Location,
                warning,
            });
        }
    }

    let sn = serial?;
    let rows: Vec<u32> = snapshot
        .data_rows()
        .filter(|(_, cells)| serial_matches(cells, layout, sn))
        .map(|(row, _)| row)
        .collect();
    let row = *rows.first()?;
    let warning = if rows.len() > 1 {
        warn!(serial = sn, count = rows.len(), "duplicate serial rows");
        Some(Warning::DuplicateSerial {
            serial: sn.to_string(),
            count: rows.len(),
            rows: rows.clone(),
        })
    } else {
        None
    };
    debug!(row, serial = sn, "serial match");
    Some(MatchResult {
        row,
        tier: MatchTier::SerialOnly,
        warning,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use invrec_core::{Column, ColumnBlock, EntityKind};

    // Identity columns: A serial, B rack, C slot.
    fn layout() -> SheetLayout {
        SheetLayout {
            header_rows: 1,
            serial_column: Column(0),
            rack_column: Column(1),
            slot_column: Column(2),
            address_column: None,
            write_blocks: vec![ColumnBlock {
                start: Column(3),
                end: Column(3),
            }],
        }
    }

    fn table(rows: &[[&str; 3]]) -> TableSnapshot {
        let mut all = vec![vec!["SN".to_string(), "Rack".to_string(), "U".to_string()]];
        all.extend(rows.iter().map(|r| r.iter().map(|c| c.to_string()).collect()));
        TableSnapshot::new(all, 1)
    }

    fn ids(serial: Option<&str>, rack: Option<&str>, slot: Option<&str>) -> Identifiers {
        Identifiers {
            serial_number: serial.map(String::from),
            rack_number: rack.map(String::from),
            slot_number: slot.map(String::from),
            entity_kind: EntityKind::Physical,
            parent_address: None,
        }
    }

    #[test]
    fn exact_triple_beats_an_earlier_location_only_row() {
        let snapshot = table(&[["OLD1", "5", "22"], ["ABC", "5", "22"]]);
        let hit = resolve(&snapshot, &layout(), &ids(Some("ABC"), Some("5"), Some("22")))
            .expect("match");
        assert_eq!(hit.row, 3);
        assert_eq!(hit.tier, MatchTier::ExactTriple);
        assert!(hit.warning.is_none());
    }

    #[test]
    fn location_match_flags_stale_serial() {
        let snapshot = table(&[["X1", "1", "1"], ["OLD1", "5", "22-23"]]);
        let hit = resolve(&snapshot, &layout(), &ids(Some("NEW9"), Some("5"), Some("22")))
            .expect("match");
        assert_eq!(hit.row, 3);
        assert_eq!(hit.tier, MatchTier::Location);
        assert_eq!(
            hit.warning.map(|w| w.to_string()).as_deref(),
            Some("SN mismatch at row 3: expected NEW9, found OLD1")
        );
    }

    #[test]
    fn location_match_without_row_serial_has_no_warning() {
        let snapshot = table(&[["", "5", "22"]]);
        let hit = resolve(&snapshot, &layout(), &ids(Some("NEW9"), Some("5"), Some("22")))
            .expect("match");
        assert_eq!(hit.tier, MatchTier::Location);
        assert!(hit.warning.is_none());
    }

    #[test]
    fn duplicate_serials_pick_the_lowest_row() {
        let snapshot = table(&[["A", "1", "1"], ["DUP", "2", "2"], ["B", "3", "3"], ["DUP", "4", "4"]]);
        let hit = resolve(&snapshot, &layout(), &ids(Some("DUP"), None, None)).expect("match");
        assert_eq!(hit.row, 3);
        assert_eq!(hit.tier, MatchTier::SerialOnly);
        assert_eq!(hit.duplicate_count(), 2);
        assert_eq!(
            hit.warning,
            Some(Warning::DuplicateSerial {
                serial: "DUP".to_string(),
                count: 2,
                rows: vec![3, 5],
            })
        );
    }

    #[test]
    fn serial_only_when_location_misses() {
        let snapshot = table(&[["ABC", "7", "10"]]);
        let hit = resolve(&snapshot, &layout(), &ids(Some("ABC"), Some("5"), Some("22")))
            .expect("match");
        assert_eq!(hit.row, 2);
        assert_eq!(hit.tier, MatchTier::SerialOnly);
        assert_eq!(hit.duplicate_count(), 1);
    }

    #[test]
    fn rack_ranges_on_the_row_do_not_match_a_single_rack() {
        let snapshot = table(&[["OLD1", "5-6", "22"]]);
        assert!(resolve(&snapshot, &layout(), &ids(Some("NEW9"), Some("5"), Some("22"))).is_none());

        let snapshot = table(&[["OLD1", "5", "22-23"]]);
        let hit = resolve(&snapshot, &layout(), &ids(None, Some("5"), Some("22"))).expect("match");
        assert_eq!(hit.tier, MatchTier::Location);
    }

    #[test]
    fn header_row_is_never_matched() {
        let snapshot = TableSnapshot::new(vec![vec!["ABC".to_string()]], 1);
        assert!(resolve(&snapshot, &layout(), &ids(Some("ABC"), None, None)).is_none());
        assert!(resolve(&table(&[]), &layout(), &ids(None, Some("1"), Some("1"))).is_none());
    }
}
