use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::benefits::BenefitRecord;
use crate::pivot::total;

/// Headline indicators for the filtered records.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Kpis {
    pub total_budgeted: f64,
    pub total_realized: f64,
    /// Budgeted minus realized; positive means under budget
    pub variance: f64,
    /// Realized as a percentage of budgeted, when there is a budget
    pub execution_pct: Option<f64>,
    /// Realized as a percentage of the fixed annual budget, when configured
    pub annual_consumption_pct: Option<f64>,
    pub records: usize,
    pub units: usize,
    pub benefits: usize,
    /// Distinct collaborator IDs, when the sheet has an ID column
    pub lives: Option<usize>,
    pub average_realized: f64,
    /// Record count per status value
    pub by_status: BTreeMap<String, usize>,
}

impl Kpis {
    /// Compute the indicators
    ///
    /// # Arguments
    /// * `records` - Records that passed the filters
    /// * `has_ids` - Whether the sheet has an ID column (enables `lives`)
    /// * `annual_budget` - Fixed annual budget, if configured
    ///
    /// # Examples
    /// ```
    /// use benefits_dashboard::benefits::BenefitRecord;
    /// use benefits_dashboard::kpi::Kpis;
    ///
    /// let records = vec![
    ///     BenefitRecord { budgeted: 100.0, realized: 80.0, ..Default::default() },
    ///     BenefitRecord { budgeted: 100.0, realized: 120.0, ..Default::default() },
    /// ];
    /// let kpis = Kpis::compute(&records, false, None);
    /// assert_eq!(kpis.total_realized, 200.0);
    /// assert_eq!(kpis.execution_pct, Some(100.0));
    /// ```
    pub fn compute(records: &[BenefitRecord], has_ids: bool, annual_budget: Option<f64>) -> Self {
        let total_budgeted = total(records.iter().map(|r| r.budgeted));
        let total_realized = total(records.iter().map(|r| r.realized));

        let distinct = |values: Vec<&str>| values.into_iter().collect::<BTreeSet<_>>().len();

        let mut by_status = BTreeMap::new();
        for status in records.iter().filter_map(|r| r.status.as_deref()) {
            *by_status.entry(status.to_string()).or_insert(0) += 1;
        }

        Kpis {
            total_budgeted,
            total_realized,
            variance: total_budgeted - total_realized,
            execution_pct: percentage(total_realized, total_budgeted),
            annual_consumption_pct: annual_budget.and_then(|b| percentage(total_realized, b)),
            records: records.len(),
            units: distinct(records.iter().filter_map(|r| r.unit.as_deref()).collect()),
            benefits: distinct(records.iter().filter_map(|r| r.benefit.as_deref()).collect()),
            lives: has_ids
                .then(|| distinct(records.iter().filter_map(|r| r.id.as_deref()).collect())),
            average_realized: if records.is_empty() {
                0.0
            } else {
                total_realized / records.len() as f64
            },
            by_status,
        }
    }
}

fn percentage(part: f64, whole: f64) -> Option<f64> {
    (whole.abs() > f64::EPSILON).then(|| part / whole * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(unit: &str, id: &str, status: &str, budgeted: f64, realized: f64) -> BenefitRecord {
        BenefitRecord {
            unit: Some(unit.to_string()),
            id: Some(id.to_string()),
            status: Some(status.to_string()),
            budgeted,
            realized,
            ..BenefitRecord::default()
        }
    }

    #[test]
    fn totals_variance_and_counts() {
        let records = vec![
            record("SP", "1", "Ativo", 1000.0, 900.0),
            record("SP", "1", "Ativo", 500.0, 650.0),
            record("RJ", "2", "Suspenso", 300.0, 0.0),
        ];
        let kpis = Kpis::compute(&records, true, Some(15_500.0));

        assert_eq!(kpis.total_budgeted, 1800.0);
        assert_eq!(kpis.total_realized, 1550.0);
        assert_eq!(kpis.variance, 250.0);
        assert_eq!(kpis.records, 3);
        assert_eq!(kpis.units, 2);
        assert_eq!(kpis.lives, Some(2));
        assert!((kpis.annual_consumption_pct.unwrap() - 10.0).abs() < 1e-9);
        assert_eq!(kpis.by_status.get("Ativo"), Some(&2));
        assert!((kpis.average_realized - 516.666).abs() < 0.01);
    }

    #[test]
    fn no_budget_means_no_execution_rate() {
        let records = vec![record("SP", "1", "Ativo", 0.0, 10.0)];
        let kpis = Kpis::compute(&records, false, None);

        assert_eq!(kpis.execution_pct, None);
        assert_eq!(kpis.annual_consumption_pct, None);
        assert_eq!(kpis.lives, None);
    }

    #[test]
    fn empty_selection_is_all_zero() {
        let kpis = Kpis::compute(&[], true, Some(1000.0));

        assert_eq!(kpis.total_realized, 0.0);
        assert_eq!(kpis.average_realized, 0.0);
        assert_eq!(kpis.annual_consumption_pct, Some(0.0));
        assert_eq!(kpis.lives, Some(0));
        assert!(kpis.total_budgeted.is_sign_positive());
        assert!(kpis.total_realized.is_sign_positive());
        assert!(kpis.variance.is_sign_positive());
    }
}
