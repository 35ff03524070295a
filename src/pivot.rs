use serde::Serialize;
use std::collections::HashMap;

use crate::benefits::{BenefitRecord, Dimension, Measure, compare_months};

/// Label used for records without a value in the grouped dimension.
pub const UNSET_LABEL: &str = "Não informado";

/// Sum of `values`, `0.0` (never `-0.0`) when empty.
pub fn total<I: IntoIterator<Item = f64>>(values: I) -> f64 {
    values.into_iter().fold(0.0, |acc, v| acc + v)
}

fn label_of(record: &BenefitRecord, dim: Dimension) -> &str {
    record.dimension(dim).unwrap_or(UNSET_LABEL)
}

fn sort_labels(labels: &mut [String], dim: Dimension) {
    match dim {
        Dimension::Month => labels.sort_by(|a, b| compare_months(a, b)),
        _ => labels.sort(),
    }
}

/// Total of `measure` per value of `dim`
///
/// Records without a value are grouped under [`UNSET_LABEL`], so the group
/// totals always add up to the ungrouped total. Months come back in calendar
/// order; other dimensions by descending total.
///
/// # Examples
/// ```
/// use benefits_dashboard::benefits::{BenefitRecord, Dimension, Measure};
/// use benefits_dashboard::pivot::group_sum;
///
/// let records = vec![
///     BenefitRecord { unit: Some("SP".into()), realized: 10.0, ..Default::default() },
///     BenefitRecord { unit: Some("RJ".into()), realized: 30.0, ..Default::default() },
///     BenefitRecord { unit: Some("SP".into()), realized: 5.0, ..Default::default() },
/// ];
/// let groups = group_sum(&records, Dimension::Unit, Measure::Realized);
/// assert_eq!(groups, vec![("RJ".to_string(), 30.0), ("SP".to_string(), 15.0)]);
/// ```
pub fn group_sum(records: &[BenefitRecord], dim: Dimension, measure: Measure) -> Vec<(String, f64)> {
    let mut totals: HashMap<&str, f64> = HashMap::new();
    for record in records {
        *totals.entry(label_of(record, dim)).or_insert(0.0) += record.measure(measure);
    }

    let mut groups: Vec<(String, f64)> = totals
        .into_iter()
        .map(|(label, total)| (label.to_string(), total))
        .collect();

    match dim {
        Dimension::Month => groups.sort_by(|a, b| compare_months(&a.0, &b.0)),
        _ => groups.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0))),
    }
    groups
}

/// Pivot table of one measure over two dimensions, with totals
#[derive(Clone, Debug, Serialize)]
pub struct Matrix {
    pub row_dimension: Dimension,
    pub column_dimension: Dimension,
    pub measure: Measure,
    pub row_labels: Vec<String>,
    pub column_labels: Vec<String>,
    /// `cells[r][c]`, zero where no record falls
    pub cells: Vec<Vec<f64>>,
    pub row_totals: Vec<f64>,
    pub column_totals: Vec<f64>,
    pub grand_total: f64,
    #[serde(skip)]
    max_abs: f64,
}

impl Matrix {
    /// Build the matrix
    ///
    /// Row and column labels are the distinct values present in `records`
    /// (calendar order for months, alphabetical otherwise).
    pub fn build(
        records: &[BenefitRecord],
        rows: Dimension,
        columns: Dimension,
        measure: Measure,
    ) -> Self {
        let mut row_labels: Vec<String> = Vec::new();
        let mut column_labels: Vec<String> = Vec::new();
        for record in records {
            let r = label_of(record, rows);
            if !row_labels.iter().any(|l| l == r) {
                row_labels.push(r.to_string());
            }
            let c = label_of(record, columns);
            if !column_labels.iter().any(|l| l == c) {
                column_labels.push(c.to_string());
            }
        }
        sort_labels(&mut row_labels, rows);
        sort_labels(&mut column_labels, columns);

        let row_pos: HashMap<&str, usize> = row_labels
            .iter()
            .enumerate()
            .map(|(i, l)| (l.as_str(), i))
            .collect();
        let column_pos: HashMap<&str, usize> = column_labels
            .iter()
            .enumerate()
            .map(|(i, l)| (l.as_str(), i))
            .collect();

        let mut cells = vec![vec![0.0; column_labels.len()]; row_labels.len()];
        for record in records {
            let r = row_pos[label_of(record, rows)];
            let c = column_pos[label_of(record, columns)];
            cells[r][c] += record.measure(measure);
        }

        let row_totals: Vec<f64> = cells.iter().map(|row| total(row.iter().copied())).collect();
        let column_totals: Vec<f64> = (0..column_labels.len())
            .map(|c| total(cells.iter().map(|row| row[c])))
            .collect();
        let grand_total = total(row_totals.iter().copied());
        let max_abs = cells
            .iter()
            .flatten()
            .fold(0.0_f64, |acc, v| acc.max(v.abs()));

        Matrix {
            row_dimension: rows,
            column_dimension: columns,
            measure,
            row_labels,
            column_labels,
            cells,
            row_totals,
            column_totals,
            grand_total,
            max_abs,
        }
    }

    /// Heat-map shade of a cell in `[0, 1]`, relative to the largest cell.
    pub fn intensity(&self, row: usize, column: usize) -> f64 {
        if self.max_abs <= f64::EPSILON {
            return 0.0;
        }
        self.cells
            .get(row)
            .and_then(|r| r.get(column))
            .map(|v| v.abs() / self.max_abs)
            .unwrap_or(0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.row_labels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(month: &str, unit: Option<&str>, benefit: &str, budgeted: f64, realized: f64) -> BenefitRecord {
        BenefitRecord {
            month: Some(month.to_string()),
            unit: unit.map(str::to_string),
            benefit: Some(benefit.to_string()),
            budgeted,
            realized,
            ..BenefitRecord::default()
        }
    }

    fn sample() -> Vec<BenefitRecord> {
        vec![
            record("Fev", Some("SP"), "Saúde", 1000.0, 1100.25),
            record("Jan", Some("SP"), "Saúde", 1000.0, 950.5),
            record("Jan", Some("RJ"), "Odonto", 200.0, 180.0),
            record("Mar", None, "Vale Refeição", 800.0, 812.3),
            record("Fev", Some("RJ"), "Saúde", 600.0, 0.0),
        ]
    }

    #[test]
    fn grouped_totals_add_up_to_the_column_total() {
        let records = sample();
        let ungrouped: f64 = records.iter().map(|r| r.realized).sum();

        for dim in Dimension::ALL {
            let grouped: f64 = group_sum(&records, dim, Measure::Realized)
                .iter()
                .map(|(_, total)| total)
                .sum();
            assert!((grouped - ungrouped).abs() < 1e-9, "{:?}", dim);

            let regrouped: f64 = group_sum(&records, dim, Measure::Realized)
                .iter()
                .map(|(_, total)| total)
                .sum();
            assert_eq!(grouped, regrouped);
        }
    }

    #[test]
    fn month_groups_follow_the_calendar() {
        let groups = group_sum(&sample(), Dimension::Month, Measure::Budgeted);
        let labels: Vec<&str> = groups.iter().map(|(l, _)| l.as_str()).collect();

        assert_eq!(labels, vec!["Jan", "Fev", "Mar"]);
        assert_eq!(groups[1].1, 1600.0);
    }

    #[test]
    fn missing_values_get_their_own_group() {
        let groups = group_sum(&sample(), Dimension::Unit, Measure::Realized);
        assert!(groups.iter().any(|(l, v)| l == UNSET_LABEL && (*v - 812.3).abs() < 1e-9));
        assert_eq!(groups.len(), 3);
    }

    #[test]
    fn matrix_totals_are_consistent() {
        let matrix = Matrix::build(&sample(), Dimension::Benefit, Dimension::Month, Measure::Variance);

        assert_eq!(matrix.row_labels, vec!["Odonto", "Saúde", "Vale Refeição"]);
        assert_eq!(matrix.column_labels, vec!["Jan", "Fev", "Mar"]);

        let saude = &matrix.cells[1];
        assert!((saude[0] - 49.5).abs() < 1e-9);
        assert!((saude[1] - 499.75).abs() < 1e-9);
        assert_eq!(saude[2], 0.0);

        let by_rows: f64 = matrix.row_totals.iter().sum();
        let by_columns: f64 = matrix.column_totals.iter().sum();
        assert!((by_rows - matrix.grand_total).abs() < 1e-9);
        assert!((by_columns - matrix.grand_total).abs() < 1e-9);
    }

    #[test]
    fn intensity_is_relative_to_the_largest_cell() {
        let matrix = Matrix::build(&sample(), Dimension::Unit, Dimension::Benefit, Measure::Realized);
        let max = (0..matrix.row_labels.len())
            .flat_map(|r| (0..matrix.column_labels.len()).map(move |c| (r, c)))
            .map(|(r, c)| matrix.intensity(r, c))
            .fold(0.0_f64, f64::max);

        assert_eq!(max, 1.0);
        assert_eq!(matrix.intensity(99, 99), 0.0);
        assert!(Matrix::build(&[], Dimension::Unit, Dimension::Month, Measure::Realized).is_empty());
    }

    #[test]
    fn empty_totals_are_positive_zero() {
        let matrix = Matrix::build(&[], Dimension::Unit, Dimension::Month, Measure::Variance);

        assert!(matrix.grand_total.is_sign_positive());
        assert!(total(Vec::new()).is_sign_positive());
        assert_eq!(total(vec![1.5, -0.5]), 1.0);
    }
}
