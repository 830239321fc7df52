use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::{GatewayError, RangeSpec, Rgb, RowSpan, TableGateway};

/// One gateway invocation, recorded in call order.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayCall {
    Read(String),
    Update(String),
    Insert(u32),
    Highlight(u32, Rgb),
}

impl GatewayCall {
    pub fn is_write(&self) -> bool {
        !matches!(self, GatewayCall::Read(_))
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    rows: Vec<Vec<String>>,
    calls: Vec<GatewayCall>,
    unavailable: Option<String>,
}

/// In-process table with the same observable contract as a spreadsheet.
#[derive(Debug)]
pub struct MemoryTable {
    title: String,
    state: Mutex<MemoryState>,
}

fn trim_trailing_empty(mut cells: Vec<String>) -> Vec<String> {
    while cells.last().is_some_and(|c| c.is_empty()) {
        cells.pop();
    }
    cells
}

impl MemoryTable {
    pub fn new(title: impl Into<String>) -> Self {
        Self::with_rows(title, Vec::new())
    }

    pub fn with_rows(title: impl Into<String>, rows: Vec<Vec<String>>) -> Self {
        Self {
            title: title.into(),
            state: Mutex::new(MemoryState {
                rows,
                ..MemoryState::default()
            }),
        }
    }

    /// Current contents with trailing empty cells removed.
    pub async fn rows(&self) -> Vec<Vec<String>> {
        let state = self.state.lock().await;
        state.rows.iter().cloned().map(trim_trailing_empty).collect()
    }

    pub async fn row_count(&self) -> usize {
        self.state.lock().await.rows.len()
    }

    pub async fn calls(&self) -> Vec<GatewayCall> {
        self.state.lock().await.calls.clone()
    }

    pub async fn write_count(&self) -> usize {
        self.state
            .lock()
            .await
            .calls
            .iter()
            .filter(|c| c.is_write())
            .count()
    }

    /// Makes every subsequent call fail until cleared with `None`.
    pub async fn set_unavailable(&self, reason: Option<&str>) {
        self.state.lock().await.unavailable = reason.map(String::from);
    }

    fn check(state: &MemoryState) -> Result<(), GatewayError> {
        match &state.unavailable {
            Some(reason) => Err(GatewayError::Unavailable(reason.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl TableGateway for MemoryTable {
    fn table_id(&self) -> String {
        format!("memory:{}", self.title)
    }

    async fn read_range(&self, range: &RangeSpec) -> Result<Vec<Vec<String>>, GatewayError> {
        range.validate()?;
        let mut state = self.state.lock().await;
        state.calls.push(GatewayCall::Read(range.to_a1(&self.title)));
        Self::check(&state)?;

        let (start, end) = match range.rows {
            RowSpan::All => (1, state.rows.len() as u32),
            RowSpan::Single(row) => (row, row),
            RowSpan::Between(start, end) => (start, end),
        };
        let first = range.first_column.0;
        let mut out: Vec<Vec<String>> = (start..=end)
            .map_while(|row| state.rows.get(row as usize - 1))
            .map(|cells| {
                let slice = cells
                    .iter()
                    .skip(first)
                    .take(range.width())
                    .cloned()
                    .collect();
                trim_trailing_empty(slice)
            })
            .collect();
        while out.last().is_some_and(Vec::is_empty) {
            out.pop();
        }
        Ok(out)
    }

    async fn update_range(
        &self,
        range: &RangeSpec,
        values: Vec<Vec<String>>,
    ) -> Result<(), GatewayError> {
        range.validate()?;
        let mut state = self.state.lock().await;
        state.calls.push(GatewayCall::Update(range.to_a1(&self.title)));
        Self::check(&state)?;

        if let Some(wide) = values.iter().find(|row| row.len() > range.width()) {
            return Err(GatewayError::InvalidRange(format!(
                "{} values for a {}-column range",
                wide.len(),
                range.width()
            )));
        }
        if let RowSpan::Single(_) = range.rows {
            if values.len() > 1 {
                return Err(GatewayError::InvalidRange(format!(
                    "{} rows for a single-row range",
                    values.len()
                )));
            }
        }

        let first_row = range.first_row() as usize - 1;
        let first_col = range.first_column.0;
        for (offset, row_values) in values.into_iter().enumerate() {
            let idx = first_row + offset;
            if state.rows.len() <= idx {
                state.rows.resize_with(idx + 1, Vec::new);
            }
            let cells = &mut state.rows[idx];
            let needed = first_col + row_values.len();
            if cells.len() < needed {
                cells.resize(needed, String::new());
            }
            for (col, value) in row_values.into_iter().enumerate() {
                cells[first_col + col] = value;
            }
        }
        debug!(table = %self.title, "memory range updated");
        Ok(())
    }

    async fn insert_row_at(&self, index: u32) -> Result<(), GatewayError> {
        let mut state = self.state.lock().await;
        state.calls.push(GatewayCall::Insert(index));
        Self::check(&state)?;

        let index = index as usize;
        if state.rows.len() < index {
            state.rows.resize_with(index, Vec::new);
        }
        state.rows.insert(index, Vec::new());
        Ok(())
    }

    async fn highlight_row(&self, row: u32, color: Rgb) -> Result<(), GatewayError> {
        if row == 0 {
            return Err(GatewayError::InvalidRange("row 0".to_string()));
        }
        let mut state = self.state.lock().await;
        state.calls.push(GatewayCall::Highlight(row, color));
        Self::check(&state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use invrec_core::Column;

    fn strings(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    fn sample() -> MemoryTable {
        MemoryTable::with_rows(
            "Sheet1",
            vec![
                strings(&["No", "Host", "Serial"]),
                strings(&["1", "a", "SN1", "", ""]),
                strings(&["2", "b"]),
                Vec::new(),
            ],
        )
    }

    #[tokio::test]
    async fn reads_omit_trailing_cells_and_rows() {
        let table = sample();
        let rows = table
            .read_range(&RangeSpec::columns(Column(0), Column(4)))
            .await
            .expect("read");
        assert_eq!(
            rows,
            vec![
                strings(&["No", "Host", "Serial"]),
                strings(&["1", "a", "SN1"]),
                strings(&["2", "b"]),
            ]
        );

        let past_end = table
            .read_range(&RangeSpec::row(40, Column(0), Column(2)))
            .await
            .expect("read");
        assert!(past_end.is_empty());

        let offset = table
            .read_range(&RangeSpec::row(2, Column(1), Column(2)))
            .await
            .expect("read");
        assert_eq!(offset, vec![strings(&["a", "SN1"])]);
    }

    #[tokio::test]
    async fn update_overwrites_exactly_and_extends_grid() {
        let table = sample();
        table
            .update_range(&RangeSpec::row(3, Column(3), Column(4)), vec![strings(&["x", "y"])])
            .await
            .expect("update");
        table
            .update_range(&RangeSpec::row(6, Column(0), Column(0)), vec![strings(&["z"])])
            .await
            .expect("update");

        let rows = table.rows().await;
        assert_eq!(rows[2], strings(&["2", "b", "", "x", "y"]));
        assert_eq!(rows[4], Vec::<String>::new());
        assert_eq!(rows[5], strings(&["z"]));

        let too_wide = table
            .update_range(&RangeSpec::row(2, Column(0), Column(0)), vec![strings(&["1", "2"])])
            .await;
        assert!(matches!(too_wide, Err(GatewayError::InvalidRange(_))));
    }

    #[tokio::test]
    async fn insert_shifts_rows_at_and_below_index() {
        let table = sample();
        table.insert_row_at(2).await.expect("insert");
        let rows = table.rows().await;
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[1], strings(&["1", "a", "SN1"]));
        assert!(rows[2].is_empty());
        assert_eq!(rows[3], strings(&["2", "b"]));
        assert_eq!(
            table.calls().await,
            vec![GatewayCall::Insert(2)]
        );
    }

    #[tokio::test]
    async fn unavailable_table_fails_every_call() {
        let table = sample();
        table.set_unavailable(Some("quota exceeded")).await;
        let err = table
            .read_range(&RangeSpec::columns(Column(0), Column(1)))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "table unavailable: quota exceeded");
        assert!(table.insert_row_at(1).await.is_err());
        assert_eq!(table.row_count().await, 4);
    }
}
