use serde::Serialize;

use crate::error::{DashboardError, Result};

/// A loosely-typed sheet: one header row plus string cells
///
/// Rows are always exactly as wide as the header: short rows are padded with
/// empty strings and extra trailing cells are dropped.
#[derive(Clone, Debug, Default, Serialize)]
pub struct RawTable {
    /// Identifier of the source sheet (used in messages and as cache key)
    pub name: String,

    /// Column names in sheet order
    pub headers: Vec<String>,

    /// Data rows, each `headers.len()` cells wide
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    /// Parse CSV text into a table
    ///
    /// The first record is the header. Fields are trimmed, a leading UTF-8
    /// byte order mark is ignored and ragged rows are accepted. Rows where
    /// every cell is blank are skipped.
    ///
    /// # Errors
    /// * `DashboardError::EmptySheet` when there is no header row
    /// * `DashboardError::Csv` when the text is not valid CSV
    ///
    /// # Examples
    /// ```
    /// use benefits_dashboard::table::RawTable;
    ///
    /// let table = RawTable::from_csv_str("demo", "Mês,Custo\nJan,\"R$ 1,00\"\nFev").unwrap();
    /// assert_eq!(table.headers, vec!["Mês", "Custo"]);
    /// assert_eq!(table.rows[1], vec!["Fev".to_string(), String::new()]);
    /// ```
    pub fn from_csv_str(name: &str, text: &str) -> Result<Self> {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(text.as_bytes());

        let mut records = reader.records();

        let headers: Vec<String> = match records.next() {
            Some(record) => record?.iter().map(str::to_string).collect(),
            None => return Err(DashboardError::EmptySheet(name.to_string())),
        };

        if headers.iter().all(|h| h.is_empty()) {
            return Err(DashboardError::EmptySheet(name.to_string()));
        }

        let width = headers.len();
        let mut rows = Vec::new();

        for record in records {
            let record = record?;
            if record.iter().all(|cell| cell.is_empty()) {
                continue;
            }

            let mut row: Vec<String> = record.iter().take(width).map(str::to_string).collect();
            row.resize(width, String::new());
            rows.push(row);
        }

        Ok(RawTable {
            name: name.to_string(),
            headers,
            rows,
        })
    }

    /// Position of a column by its exact name.
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == column)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoted_currency_cells_keep_their_commas() {
        let text = "Unidade,Custo Realizado\nSP,\"R$ 1.234,56\"\nRJ,\"R$ 10,00\"\n";
        let table = RawTable::from_csv_str("beneficios", text).unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[0][1], "R$ 1.234,56");
        assert_eq!(table.column_index("Custo Realizado"), Some(1));
    }

    #[test]
    fn ragged_and_blank_rows_are_normalized() {
        let text = "\u{feff}A,B,C\n1,2,3,4\n,,\n5\n";
        let table = RawTable::from_csv_str("t", text).unwrap();

        assert_eq!(table.headers, vec!["A", "B", "C"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0], vec!["1", "2", "3"]);
        assert_eq!(table.rows[1], vec!["5", "", ""]);
    }

    #[test]
    fn empty_text_is_an_empty_sheet() {
        assert!(matches!(
            RawTable::from_csv_str("vazia", ""),
            Err(DashboardError::EmptySheet(_))
        ));
    }
}
