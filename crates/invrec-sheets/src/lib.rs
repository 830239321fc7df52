//! Table gateway contract, A1 range addressing and the two gateway backends
//! (in-memory and Google Sheets REST).

use std::fmt;

use async_trait::async_trait;
use invrec_core::Column;
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod google;
mod memory;

pub use google::{
    classify_reqwest_error, classify_status, BackoffPolicy, GoogleSheetsGateway,
    RetryDisposition, SheetsConfig,
};
pub use memory::{GatewayCall, MemoryTable};

pub const CRATE_NAME: &str = "invrec-sheets";

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("request failed after retries: {0}")]
    Request(#[from] reqwest::Error),
    #[error("http status {status} for {url}: {body}")]
    HttpStatus {
        status: u16,
        url: String,
        body: String,
    },
    #[error("worksheet `{0}` not found in spreadsheet")]
    WorksheetNotFound(String),
    #[error("invalid range: {0}")]
    InvalidRange(String),
    #[error("unexpected response: {0}")]
    Decode(String),
    #[error("table unavailable: {0}")]
    Unavailable(String),
}

/// 1-based, inclusive row selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowSpan {
    All,
    Single(u32),
    Between(u32, u32),
}

/// Rectangular block addressed by 0-based column offsets and 1-based rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeSpec {
    pub first_column: Column,
    pub last_column: Column,
    pub rows: RowSpan,
}

impl RangeSpec {
    pub fn columns(first_column: Column, last_column: Column) -> Self {
        Self {
            first_column,
            last_column,
            rows: RowSpan::All,
        }
    }

    pub fn row(row: u32, first_column: Column, last_column: Column) -> Self {
        Self {
            first_column,
            last_column,
            rows: RowSpan::Single(row),
        }
    }

    pub fn width(&self) -> usize {
        self.last_column.0.saturating_sub(self.first_column.0) + 1
    }

    /// First row the range covers.
    pub fn first_row(&self) -> u32 {
        match self.rows {
            RowSpan::All => 1,
            RowSpan::Single(row) | RowSpan::Between(row, _) => row,
        }
    }

    pub fn validate(&self) -> Result<(), GatewayError> {
        let rows_ok = match self.rows {
            RowSpan::All => true,
            RowSpan::Single(row) => row >= 1,
            RowSpan::Between(start, end) => start >= 1 && end >= start,
        };
        if !rows_ok || self.last_column < self.first_column {
            return Err(GatewayError::InvalidRange(format!("{self:?}")));
        }
        Ok(())
    }

    /// A1 notation, e.g. `'SIBER PD'!S5:AP5`.
    pub fn to_a1(&self, sheet: &str) -> String {
        let first = self.first_column.letters();
        let last = self.last_column.letters();
        let cells = match self.rows {
            RowSpan::All => format!("{first}:{last}"),
            RowSpan::Single(row) => format!("{first}{row}:{last}{row}"),
            RowSpan::Between(start, end) => format!("{first}{start}:{last}{end}"),
        };
        format!("{}!{cells}", quote_sheet(sheet))
    }
}

pub fn quote_sheet(title: &str) -> String {
    format!("'{}'", title.replace('\'', "''"))
}

/// Row background colour, channels in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgb {
    pub red: f32,
    pub green: f32,
    pub blue: f32,
}

impl Default for Rgb {
    fn default() -> Self {
        Self {
            red: 1.0,
            green: 0.8,
            blue: 0.6,
        }
    }
}

impl Rgb {
    /// Parses `#RRGGBB` (leading `#` optional).
    pub fn parse_hex(raw: &str) -> Option<Self> {
        let hex = raw.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |i: usize| {
            u8::from_str_radix(&hex[i..i + 2], 16)
                .ok()
                .map(|v| f32::from(v) / 255.0)
        };
        Some(Self {
            red: channel(0)?,
            green: channel(2)?,
            blue: channel(4)?,
        })
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let byte = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        write!(
            f,
            "#{:02X}{:02X}{:02X}",
            byte(self.red),
            byte(self.green),
            byte(self.blue)
        )
    }
}

/// Narrow read/update/insert contract over one worksheet.
///
/// Reads omit trailing empty cells and rows; updates overwrite the addressed
/// block exactly; inserts shift every row at or below the index down by one.
#[async_trait]
pub trait TableGateway: Send + Sync {
    /// Human-readable identity of the bound table, for logs and reports.
    fn table_id(&self) -> String;

    async fn read_range(&self, range: &RangeSpec) -> Result<Vec<Vec<String>>, GatewayError>;

    async fn update_range(
        &self,
        range: &RangeSpec,
        values: Vec<Vec<String>>,
    ) -> Result<(), GatewayError>;

    /// Inserts one blank row at a zero-based index without inheriting formatting.
    async fn insert_row_at(&self, index: u32) -> Result<(), GatewayError>;

    /// Paints the background of a 1-based row.
    async fn highlight_row(&self, row: u32, color: Rgb) -> Result<(), GatewayError>;
}
