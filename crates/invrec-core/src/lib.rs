//! Core domain model for inventory report reconciliation.
//!
//! Records, derived identifiers, match/placement results and per-file outcomes
//! live here so that the extraction engine, the table gateway and the
//! reconciliation pipeline share one vocabulary.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CRATE_NAME: &str = "invrec-core";

/// Rendered cell value for a field that could not be extracted.
pub const NOT_AVAILABLE: &str = "N/A";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("duplicate field `{0}` in rule set")]
    DuplicateField(String),
    #[error("field `{field}` is not declared by rule set `{rule_set}`")]
    UnknownField { field: String, rule_set: String },
    #[error("rule set `{rule_set}` declares {expected} fields but {actual} values were supplied")]
    FieldCount {
        rule_set: String,
        expected: usize,
        actual: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    #[error("invalid column reference `{0}`")]
    InvalidColumn(String),
    #[error("write block {start}:{end} ends before it starts")]
    InvertedBlock { start: String, end: String },
    #[error("write blocks overlap or are out of order at {0}")]
    OverlappingBlocks(String),
    #[error("write blocks cover {cells} cells but the rule set declares {fields} fields")]
    WidthMismatch { cells: usize, fields: usize },
    #[error("layout declares no write blocks")]
    NoBlocks,
}

/// Where a pattern is applied: the report body or its file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    #[default]
    Content,
    Filename,
}

/// Provenance pointer attached to extracted values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceRef {
    pub strategy: String,
    pub scope: Scope,
}

/// Extracted field wrapper with optional value + evidence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Field {
    pub value: Option<String>,
    pub evidence: Option<EvidenceRef>,
}

impl Field {
    pub fn empty() -> Self {
        Self {
            value: None,
            evidence: None,
        }
    }

    pub fn with_value_and_evidence(value: String, evidence: EvidenceRef) -> Self {
        Self {
            value: Some(value),
            evidence: Some(evidence),
        }
    }

    /// Cell text for this field, falling back to the sentinel.
    pub fn rendered(&self) -> &str {
        self.value.as_deref().unwrap_or(NOT_AVAILABLE)
    }
}

/// Ordered field names declared by one rule set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSchema {
    rule_set: String,
    fields: Vec<String>,
    index: HashMap<String, usize>,
}

impl RecordSchema {
    pub fn new(rule_set: impl Into<String>, fields: Vec<String>) -> Result<Self, ModelError> {
        let mut index = HashMap::with_capacity(fields.len());
        for (pos, name) in fields.iter().enumerate() {
            if index.insert(name.clone(), pos).is_some() {
                return Err(ModelError::DuplicateField(name.clone()));
            }
        }
        Ok(Self {
            rule_set: rule_set.into(),
            fields,
            index,
        })
    }

    pub fn rule_set(&self) -> &str {
        &self.rule_set
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn position(&self, field: &str) -> Result<usize, ModelError> {
        self.index
            .get(field)
            .copied()
            .ok_or_else(|| ModelError::UnknownField {
                field: field.to_string(),
                rule_set: self.rule_set.clone(),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Physical,
    Virtual,
    #[default]
    Unknown,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Physical => f.write_str("physical"),
            EntityKind::Virtual => f.write_str("virtual"),
            EntityKind::Unknown => f.write_str("unknown"),
        }
    }
}

/// Identity fields derived once per report; they drive matching and placement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Identifiers {
    pub serial_number: Option<String>,
    pub rack_number: Option<String>,
    pub slot_number: Option<String>,
    pub entity_kind: EntityKind,
    pub parent_address: Option<String>,
}

impl Identifiers {
    /// A serial number, or both rack and slot, must be present to search the table.
    pub fn is_usable(&self) -> bool {
        self.serial_number.is_some() || self.location().is_some()
    }

    pub fn location(&self) -> Option<(&str, &str)> {
        match (&self.rack_number, &self.slot_number) {
            (Some(rack), Some(slot)) => Some((rack.as_str(), slot.as_str())),
            _ => None,
        }
    }

    /// Short description of what a search keyed on.
    pub fn search_label(&self) -> String {
        match (&self.serial_number, self.location()) {
            (Some(sn), _) => format!("SN: {sn}"),
            (None, Some((rack, slot))) => format!("Rack: {rack}, U: {slot}"),
            (None, None) => "none".to_string(),
        }
    }
}

/// Structured result of extracting one report.
#[derive(Debug, Clone)]
pub struct Record {
    schema: Arc<RecordSchema>,
    fields: Vec<Field>,
    identifiers: Identifiers,
    hostname: Option<String>,
    source_file: String,
    processed_at: DateTime<Utc>,
}

impl Record {
    pub fn new(
        schema: Arc<RecordSchema>,
        fields: Vec<Field>,
        identifiers: Identifiers,
        hostname: Option<String>,
        source_file: impl Into<String>,
        processed_at: DateTime<Utc>,
    ) -> Result<Self, ModelError> {
        if fields.len() != schema.len() {
            return Err(ModelError::FieldCount {
                rule_set: schema.rule_set().to_string(),
                expected: schema.len(),
                actual: fields.len(),
            });
        }
        Ok(Self {
            schema,
            fields,
            identifiers,
            hostname,
            source_file: source_file.into(),
            processed_at,
        })
    }

    pub fn schema(&self) -> &RecordSchema {
        &self.schema
    }

    pub fn field(&self, name: &str) -> Result<&Field, ModelError> {
        let pos = self.schema.position(name)?;
        Ok(&self.fields[pos])
    }

    pub fn value(&self, name: &str) -> Result<Option<&str>, ModelError> {
        Ok(self.field(name)?.value.as_deref())
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Field)> {
        self.schema
            .fields()
            .iter()
            .map(String::as_str)
            .zip(self.fields.iter())
    }

    /// Values in declared order, sentinel for absent ones.
    pub fn row_values(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.rendered().to_string()).collect()
    }

    pub fn identifiers(&self) -> &Identifiers {
        &self.identifiers
    }

    pub fn hostname(&self) -> Option<&str> {
        self.hostname.as_deref()
    }

    pub fn source_file(&self) -> &str {
        &self.source_file
    }

    pub fn processed_at(&self) -> DateTime<Utc> {
        self.processed_at
    }

    pub fn to_view(&self) -> RecordView {
        RecordView {
            rule_set: self.schema.rule_set().to_string(),
            source_file: self.source_file.clone(),
            processed_at: self.processed_at,
            hostname: self.hostname.clone(),
            identifiers: self.identifiers.clone(),
            fields: self
                .fields()
                .map(|(name, field)| NamedField {
                    name: name.to_string(),
                    value: field.value.clone(),
                    evidence: field.evidence.clone(),
                })
                .collect(),
        }
    }
}

/// Serializable view of a record for reports and debugging output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordView {
    pub rule_set: String,
    pub source_file: String,
    pub processed_at: DateTime<Utc>,
    pub hostname: Option<String>,
    pub identifiers: Identifiers,
    pub fields: Vec<NamedField>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedField {
    pub name: String,
    pub value: Option<String>,
    pub evidence: Option<EvidenceRef>,
}

/// Priority level that produced a match (1 = strongest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    ExactTriple,
    Location,
    SerialOnly,
}

impl MatchTier {
    pub fn rank(self) -> u8 {
        match self {
            MatchTier::ExactTriple => 1,
            MatchTier::Location => 2,
            MatchTier::SerialOnly => 3,
        }
    }
}

impl fmt::Display for MatchTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchTier::ExactTriple => f.write_str("serial + rack + slot"),
            MatchTier::Location => f.write_str("rack + slot"),
            MatchTier::SerialOnly => f.write_str("serial only"),
        }
    }
}

/// Non-fatal condition surfaced alongside a successful match or insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    StaleSerial {
        row: u32,
        expected: String,
        found: String,
    },
    DuplicateSerial {
        serial: String,
        count: usize,
        rows: Vec<u32>,
    },
    PlacementFallback {
        row: u32,
    },
    ParentShifted {
        previous_row: u32,
        current_row: Option<u32>,
    },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::StaleSerial {
                row,
                expected,
                found,
            } => write!(f, "SN mismatch at row {row}: expected {expected}, found {found}"),
            Warning::DuplicateSerial {
                serial,
                count,
                rows,
            } => {
                let list = rows
                    .iter()
                    .map(u32::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "Found {count} duplicate entries for SN {serial} (rows {list})")
            }
            Warning::PlacementFallback { row } => {
                write!(f, "parent row not found; appended at row {row}")
            }
            Warning::ParentShifted {
                previous_row,
                current_row: Some(current),
            } => write!(f, "parent row moved from {previous_row} to {current} before insert"),
            Warning::ParentShifted {
                previous_row,
                current_row: None,
            } => write!(f, "parent row {previous_row} vanished before insert"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    /// 1-based sheet row number.
    pub row: u32,
    pub tier: MatchTier,
    pub warning: Option<Warning>,
}

impl MatchResult {
    pub fn duplicate_count(&self) -> usize {
        match &self.warning {
            Some(Warning::DuplicateSerial { count, .. }) => *count,
            _ => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    #[serde(rename = "no usable identifier")]
    NoUsableIdentifier,
    #[serde(rename = "no matching row")]
    NoMatchingRow,
}

impl SkipReason {
    pub fn as_str(self) -> &'static str {
        match self {
            SkipReason::NoUsableIdentifier => "no usable identifier",
            SkipReason::NoMatchingRow => "no matching row",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    MissingField,
    Gateway,
    Io,
    Config,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Exactly one outcome is recorded per input file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Updated { row: u32 },
    Inserted { row: u32, parent_found: bool },
    Highlighted { row: u32, tier: MatchTier },
    Skipped { reason: SkipReason },
    Failed { failure: Failure },
}

impl Outcome {
    pub fn failed(kind: FailureKind, message: impl Into<String>) -> Self {
        Outcome::Failed {
            failure: Failure {
                kind,
                message: message.into(),
            },
        }
    }

    pub fn row(&self) -> Option<u32> {
        match self {
            Outcome::Updated { row }
            | Outcome::Inserted { row, .. }
            | Outcome::Highlighted { row, .. } => Some(*row),
            Outcome::Skipped { .. } | Outcome::Failed { .. } => None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.row().is_some()
    }

    /// Literal reason string for skipped and failed outcomes.
    pub fn reason(&self) -> Option<String> {
        match self {
            Outcome::Skipped { reason } => Some(reason.to_string()),
            Outcome::Failed { failure } => Some(failure.message.clone()),
            _ => None,
        }
    }
}

/// Column reference held as a 0-based offset, written as spreadsheet letters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Column(pub usize);

impl Column {
    pub fn index(self) -> usize {
        self.0
    }

    pub fn letters(self) -> String {
        column_letter(self.0)
    }
}

impl TryFrom<String> for Column {
    type Error = LayoutError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        column_index(&value)
            .map(Column)
            .ok_or(LayoutError::InvalidColumn(value))
    }
}

impl From<Column> for String {
    fn from(value: Column) -> Self {
        value.letters()
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.letters())
    }
}

/// 0 -> A, 25 -> Z, 26 -> AA.
pub fn column_letter(mut index: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push(b'A' + (index % 26) as u8);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

pub fn column_index(letters: &str) -> Option<usize> {
    let letters = letters.trim();
    if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let mut index = 0usize;
    for c in letters.chars() {
        let digit = (c.to_ascii_uppercase() as u8 - b'A') as usize + 1;
        index = index.checked_mul(26)?.checked_add(digit)?;
    }
    Some(index - 1)
}

/// First element of a hyphenated range such as `22-23`.
pub fn range_head(value: &str) -> &str {
    value.split('-').next().unwrap_or(value).trim()
}

/// Inclusive run of contiguous columns written as one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnBlock {
    pub start: Column,
    pub end: Column,
}

impl ColumnBlock {
    pub fn width(&self) -> usize {
        self.end.0.saturating_sub(self.start.0) + 1
    }
}

fn default_header_rows() -> u32 {
    1
}

/// Which columns identify a row and which columns receive record values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetLayout {
    #[serde(default = "default_header_rows")]
    pub header_rows: u32,
    pub serial_column: Column,
    pub rack_column: Column,
    pub slot_column: Column,
    #[serde(default)]
    pub address_column: Option<Column>,
    pub write_blocks: Vec<ColumnBlock>,
}

impl SheetLayout {
    /// Last column that identity matching and placement need to read.
    pub fn identity_last_column(&self) -> Column {
        [
            Some(self.serial_column),
            Some(self.rack_column),
            Some(self.slot_column),
            self.address_column,
        ]
        .into_iter()
        .flatten()
        .max()
        .unwrap_or(Column(0))
    }

    pub fn total_block_width(&self) -> usize {
        self.write_blocks.iter().map(ColumnBlock::width).sum()
    }

    pub fn validate(&self, field_count: usize) -> Result<(), LayoutError> {
        if self.write_blocks.is_empty() {
            return Err(LayoutError::NoBlocks);
        }
        let mut previous_end: Option<Column> = None;
        for block in &self.write_blocks {
            if block.end < block.start {
                return Err(LayoutError::InvertedBlock {
                    start: block.start.letters(),
                    end: block.end.letters(),
                });
            }
            if let Some(prev) = previous_end {
                if block.start <= prev {
                    return Err(LayoutError::OverlappingBlocks(block.start.letters()));
                }
            }
            previous_end = Some(block.end);
        }
        let cells = self.total_block_width();
        if cells != field_count {
            return Err(LayoutError::WidthMismatch {
                cells,
                fields: field_count,
            });
        }
        Ok(())
    }
}

/// Identity columns of the table as read at one instant.
///
/// Row numbers are 1-based and only valid until the next structural insert.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TableSnapshot {
    header_rows: u32,
    rows: Vec<Vec<String>>,
}

impl TableSnapshot {
    pub fn new(rows: Vec<Vec<String>>, header_rows: u32) -> Self {
        Self { header_rows, rows }
    }

    /// Number of the last row the read returned (0 for an empty table).
    pub fn last_row(&self) -> u32 {
        self.rows.len() as u32
    }

    pub fn row(&self, row: u32) -> Option<&[String]> {
        let idx = row.checked_sub(1)? as usize;
        self.rows.get(idx).map(Vec::as_slice)
    }

    pub fn cell(&self, row: u32, column: Column) -> Option<&str> {
        self.row(row).and_then(|cells| cell_in(cells, column))
    }

    /// Rows below the header, paired with their sheet row number.
    pub fn data_rows(&self) -> impl Iterator<Item = (u32, &[String])> {
        self.rows
            .iter()
            .enumerate()
            .skip(self.header_rows as usize)
            .map(|(idx, cells)| (idx as u32 + 1, cells.as_slice()))
    }
}

/// Trimmed, non-empty cell text.
pub fn cell_in(cells: &[String], column: Column) -> Option<&str> {
    cells
        .get(column.0)
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Arc<RecordSchema> {
        Arc::new(
            RecordSchema::new(
                "linux",
                vec!["Rack Number".to_string(), "Hostname".to_string()],
            )
            .expect("schema"),
        )
    }

    #[test]
    fn column_letters_round_trip_across_boundaries() {
        assert_eq!(column_letter(0), "A");
        assert_eq!(column_letter(18), "S");
        assert_eq!(column_letter(25), "Z");
        assert_eq!(column_letter(26), "AA");
        assert_eq!(column_letter(41), "AP");
        assert_eq!(column_letter(701), "ZZ");
        assert_eq!(column_letter(702), "AAA");
        for idx in [0, 11, 37, 50, 701, 702] {
            assert_eq!(column_index(&column_letter(idx)), Some(idx));
        }
        assert_eq!(column_index("al"), Some(37));
        assert_eq!(column_index("A1"), None);
        assert_eq!(column_index(""), None);
    }

    #[test]
    fn schema_rejects_duplicate_fields() {
        let err = RecordSchema::new("x", vec!["A".into(), "A".into()]).unwrap_err();
        assert_eq!(err, ModelError::DuplicateField("A".into()));
    }

    #[test]
    fn record_lookup_by_undeclared_name_is_an_error() {
        let record = Record::new(
            schema(),
            vec![
                Field::with_value_and_evidence(
                    "5".into(),
                    EvidenceRef {
                        strategy: "pattern".into(),
                        scope: Scope::Filename,
                    },
                ),
                Field::empty(),
            ],
            Identifiers::default(),
            None,
            "sn.X_r5.txt",
            Utc::now(),
        )
        .expect("record");

        assert_eq!(record.value("Rack Number").unwrap(), Some("5"));
        assert_eq!(record.value("Hostname").unwrap(), None);
        assert!(matches!(
            record.value("Hostnme"),
            Err(ModelError::UnknownField { .. })
        ));
        assert_eq!(record.row_values(), vec!["5".to_string(), NOT_AVAILABLE.to_string()]);
    }

    #[test]
    fn record_requires_one_field_per_declared_name() {
        let err = Record::new(
            schema(),
            vec![Field::empty()],
            Identifiers::default(),
            None,
            "f.txt",
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, ModelError::FieldCount { expected: 2, actual: 1, .. }));
    }

    #[test]
    fn identifiers_need_serial_or_full_location() {
        let mut ids = Identifiers {
            rack_number: Some("5".into()),
            ..Default::default()
        };
        assert!(!ids.is_usable());
        ids.slot_number = Some("22".into());
        assert!(ids.is_usable());
        assert_eq!(ids.search_label(), "Rack: 5, U: 22");
        ids.serial_number = Some("ABC".into());
        assert_eq!(ids.search_label(), "SN: ABC");
    }

    #[test]
    fn layout_validation_checks_blocks_against_field_count() {
        let layout: SheetLayout = linux_layout();
        assert_eq!(layout.total_block_width(), 27);
        assert!(layout.validate(27).is_ok());
        assert_eq!(
            layout.validate(26),
            Err(LayoutError::WidthMismatch { cells: 27, fields: 26 })
        );
        assert_eq!(layout.identity_last_column(), Column(37));

        let mut overlapping = layout.clone();
        overlapping.write_blocks[1].start = Column(30);
        assert!(matches!(
            overlapping.validate(27),
            Err(LayoutError::OverlappingBlocks(_))
        ));
    }

    fn linux_layout() -> SheetLayout {
        SheetLayout {
            header_rows: 1,
            serial_column: Column::try_from("L".to_string()).unwrap(),
            rack_column: Column::try_from("E".to_string()).unwrap(),
            slot_column: Column::try_from("F".to_string()).unwrap(),
            address_column: Some(Column::try_from("AL".to_string()).unwrap()),
            write_blocks: vec![
                ColumnBlock {
                    start: Column(18),
                    end: Column(41),
                },
                ColumnBlock {
                    start: Column(48),
                    end: Column(50),
                },
            ],
        }
    }

    #[test]
    fn snapshot_rows_are_one_based_and_skip_headers() {
        let snapshot = TableSnapshot::new(
            vec![
                vec!["No".into(), "Name".into()],
                vec!["1".into(), "  host-a ".into()],
                vec![],
                vec!["3".into(), "".into()],
            ],
            1,
        );
        assert_eq!(snapshot.last_row(), 4);
        let rows: Vec<u32> = snapshot.data_rows().map(|(n, _)| n).collect();
        assert_eq!(rows, vec![2, 3, 4]);
        assert_eq!(snapshot.cell(2, Column(1)), Some("host-a"));
        assert_eq!(snapshot.cell(3, Column(1)), None);
        assert_eq!(snapshot.cell(4, Column(1)), None);
        assert_eq!(snapshot.cell(0, Column(0)), None);
    }

    #[test]
    fn outcome_reasons_are_literal_strings() {
        let skipped = Outcome::Skipped {
            reason: SkipReason::NoUsableIdentifier,
        };
        assert_eq!(skipped.reason().as_deref(), Some("no usable identifier"));
        assert!(!skipped.is_success());

        let inserted = Outcome::Inserted {
            row: 8,
            parent_found: true,
        };
        assert_eq!(inserted.row(), Some(8));
        assert!(inserted.reason().is_none());

        let failed = Outcome::failed(FailureKind::MissingField, "missing required field: Hostname");
        assert_eq!(failed.reason().as_deref(), Some("missing required field: Hostname"));
    }

    #[test]
    fn range_head_takes_first_value() {
        assert_eq!(range_head("22-23"), "22");
        assert_eq!(range_head("7"), "7");
    }
}
