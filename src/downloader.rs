use crate::error::{DashboardError, Result};
use crate::pivot::Matrix;

const TOTAL_LABEL: &str = "Total";

/// Header row shared by both exports: row dimension, columns, total.
fn header_row(matrix: &Matrix) -> Vec<String> {
    let mut header = Vec::with_capacity(matrix.column_labels.len() + 2);
    header.push(matrix.row_dimension.label().to_string());
    header.extend(matrix.column_labels.iter().cloned());
    header.push(TOTAL_LABEL.to_string());
    header
}

fn amount(value: f64) -> String {
    format!("{:.2}", value)
}

/// Convert a pivot matrix to CSV
///
/// The first row names the row dimension followed by every column label and
/// `Total`; each matrix row follows with its row total, and a final `Total`
/// row carries the column totals and the grand total. Amounts use a dot as
/// decimal separator and two decimals.
///
/// # Arguments
/// * `matrix` - The matrix currently displayed
///
/// # Returns
/// * `Result<Vec<u8>>` - UTF-8 CSV bytes
///
/// # Examples
/// ```
/// use benefits_dashboard::benefits::{BenefitRecord, Dimension, Measure};
/// use benefits_dashboard::downloader::matrix_to_csv;
/// use benefits_dashboard::pivot::Matrix;
///
/// let records = vec![BenefitRecord {
///     unit: Some("SP".into()),
///     month: Some("Jan".into()),
///     realized: 10.0,
///     ..Default::default()
/// }];
/// let matrix = Matrix::build(&records, Dimension::Unit, Dimension::Month, Measure::Realized);
/// let csv = String::from_utf8(matrix_to_csv(&matrix).unwrap()).unwrap();
/// assert!(csv.starts_with("Unidade,Jan,Total\n"));
/// ```
pub fn matrix_to_csv(matrix: &Matrix) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(header_row(matrix))?;

    for (label, (cells, total)) in matrix
        .row_labels
        .iter()
        .zip(matrix.cells.iter().zip(&matrix.row_totals))
    {
        let mut record = vec![label.clone()];
        record.extend(cells.iter().map(|v| amount(*v)));
        record.push(amount(*total));
        writer.write_record(&record)?;
    }

    let mut totals = vec![TOTAL_LABEL.to_string()];
    totals.extend(matrix.column_totals.iter().map(|v| amount(*v)));
    totals.push(amount(matrix.grand_total));
    writer.write_record(&totals)?;

    writer
        .into_inner()
        .map_err(|e| DashboardError::Export(e.to_string()))
}

/// Convert a pivot matrix to XLSX
///
/// Same layout as [`matrix_to_csv`], on a single worksheet named after the
/// measure, with bold header/total rows and numeric cells.
///
/// # Returns
/// * `Result<Vec<u8>>` - XLSX file content as bytes
#[cfg(feature = "web")]
pub fn matrix_to_xlsx(matrix: &Matrix) -> Result<Vec<u8>> {
    use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};

    fn build(matrix: &Matrix) -> std::result::Result<Vec<u8>, XlsxError> {
        let mut workbook = Workbook::new();
        let mut worksheet = Worksheet::new();
        worksheet.set_name(matrix.measure.label())?;

        let bold = Format::new().set_bold();
        let money = Format::new().set_num_format("#,##0.00");
        let bold_money = Format::new().set_bold().set_num_format("#,##0.00");

        for (c, title) in header_row(matrix).iter().enumerate() {
            worksheet.write_string_with_format(0, c as u16, title.as_str(), &bold)?;
        }

        let last_col = matrix.column_labels.len() as u16 + 1;
        for (r, label) in matrix.row_labels.iter().enumerate() {
            let row = r as u32 + 1;
            worksheet.write_string(row, 0, label.as_str())?;
            for (c, value) in matrix.cells[r].iter().enumerate() {
                worksheet.write_number_with_format(row, c as u16 + 1, *value, &money)?;
            }
            worksheet.write_number_with_format(row, last_col, matrix.row_totals[r], &bold_money)?;
        }

        let total_row = matrix.row_labels.len() as u32 + 1;
        worksheet.write_string_with_format(total_row, 0, TOTAL_LABEL, &bold)?;
        for (c, value) in matrix.column_totals.iter().enumerate() {
            worksheet.write_number_with_format(total_row, c as u16 + 1, *value, &bold_money)?;
        }
        worksheet.write_number_with_format(total_row, last_col, matrix.grand_total, &bold_money)?;

        workbook.push_worksheet(worksheet);
        workbook.save_to_buffer()
    }

    build(matrix).map_err(|e| DashboardError::Export(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::benefits::{BenefitRecord, Dimension, Measure};

    fn matrix() -> Matrix {
        let record = |unit: &str, month: &str, realized: f64| BenefitRecord {
            unit: Some(unit.to_string()),
            month: Some(month.to_string()),
            realized,
            ..BenefitRecord::default()
        };
        let records = vec![
            record("SP", "Jan", 100.0),
            record("SP", "Fev", 50.5),
            record("Rio, Centro", "Jan", 20.0),
        ];
        Matrix::build(&records, Dimension::Unit, Dimension::Month, Measure::Realized)
    }

    #[test]
    fn csv_has_header_rows_and_totals() {
        let csv = String::from_utf8(matrix_to_csv(&matrix()).unwrap()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(
            lines,
            vec![
                "Unidade,Jan,Fev,Total",
                "\"Rio, Centro\",20.00,0.00,20.00",
                "SP,100.00,50.50,150.50",
                "Total,120.00,50.50,170.50",
            ]
        );
    }

    #[test]
    fn csv_of_an_empty_matrix_has_only_header_and_total() {
        let empty = Matrix::build(&[], Dimension::Benefit, Dimension::Month, Measure::Budgeted);
        let csv = String::from_utf8(matrix_to_csv(&empty).unwrap()).unwrap();

        assert_eq!(csv, "Benefício,Total\nTotal,0.00\n");
    }

    #[cfg(feature = "web")]
    #[test]
    fn xlsx_is_a_zip_container() {
        let bytes = matrix_to_xlsx(&matrix()).unwrap();
        assert!(bytes.starts_with(b"PK"));
    }
}
