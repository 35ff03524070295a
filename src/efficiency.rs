use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::benefits::{BenefitRecord, Dimension, MONTH_TERMS, UNIT_TERMS};
use crate::cleaning::{find_column, find_column_excluding, normalize_text, parse_currency};
use crate::error::{DashboardError, Result};
use crate::filter::FilterState;
use crate::table::RawTable;

const LIVES_TERMS: &[&str] = &["vidas", "beneficiarios", "colaboradores", "titulares", "lives"];
const CONSULTATION_TERMS: &[&str] = &["consultas", "atendimentos", "utilizacoes", "consultations"];

/// Detected columns of the consultations feed.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ConsultationColumns {
    pub unit: Option<String>,
    pub month: Option<String>,
    pub lives: Option<String>,
    pub consultations: Option<String>,
}

impl ConsultationColumns {
    pub fn detect(headers: &[String]) -> Self {
        let unit = find_column(headers, UNIT_TERMS);
        let taken: Vec<&str> = unit.iter().map(String::as_str).collect();
        let month = find_column_excluding(headers, MONTH_TERMS, &taken);
        let lives = find_column_excluding(headers, LIVES_TERMS, &taken);
        let consultations = find_column_excluding(headers, CONSULTATION_TERMS, &taken);

        ConsultationColumns {
            unit,
            month,
            lives,
            consultations,
        }
    }
}

/// One row of the consultations feed.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ConsultationRecord {
    pub unit: String,
    pub month: Option<String>,
    /// Covered individuals reported on this row
    pub lives: f64,
    /// Consultations on this row; `1` per row when the feed has no count column
    pub consultations: f64,
}

#[derive(Clone, Debug, Default)]
pub struct ConsultationDataset {
    pub columns: ConsultationColumns,
    pub records: Vec<ConsultationRecord>,
}

impl ConsultationDataset {
    /// Detect columns and build records; rows without a unit are skipped
    ///
    /// # Errors
    /// * `DashboardError::MissingColumn` when no unit column exists, since
    ///   there is nothing to join on
    pub fn from_table(table: &RawTable) -> Result<Self> {
        let columns = ConsultationColumns::detect(&table.headers);
        let index = |column: &Option<String>| {
            column
                .as_deref()
                .and_then(|name| table.column_index(name))
        };

        let unit_idx = index(&columns.unit).ok_or(DashboardError::MissingColumn("unidade"))?;
        let month_idx = index(&columns.month);
        let lives_idx = index(&columns.lives);
        let consultations_idx = index(&columns.consultations);

        let records = table
            .rows
            .iter()
            .filter_map(|row| {
                let unit = row.get(unit_idx).map(|u| u.trim()).filter(|u| !u.is_empty())?;
                let month = month_idx
                    .and_then(|i| row.get(i))
                    .map(|m| m.trim())
                    .filter(|m| !m.is_empty())
                    .map(str::to_string);
                let lives = lives_idx
                    .and_then(|i| row.get(i))
                    .map(|v| parse_currency(v))
                    .unwrap_or(0.0);
                let consultations = match consultations_idx {
                    Some(i) => row.get(i).map(|v| parse_currency(v)).unwrap_or(0.0),
                    None => 1.0,
                };

                Some(ConsultationRecord {
                    unit: unit.to_string(),
                    month,
                    lives,
                    consultations,
                })
            })
            .collect();

        Ok(ConsultationDataset { columns, records })
    }

    /// Records restricted to the selected months
    ///
    /// Without a month column, or with no month selected, every record is kept.
    pub fn for_months(&self, months: &[String]) -> Vec<ConsultationRecord> {
        if months.is_empty() || self.columns.month.is_none() {
            return self.records.clone();
        }
        self.records
            .iter()
            .filter(|r| r.month.as_ref().is_some_and(|m| months.contains(m)))
            .cloned()
            .collect()
    }

    /// Records matching the dashboard filters
    ///
    /// Months filter the feed directly. The feed has no benefit, tier or
    /// status of its own, so once any dimension other than the month is
    /// constrained only units present in the filtered benefit `records` stay.
    pub fn for_filters(
        &self,
        filters: &FilterState,
        records: &[BenefitRecord],
    ) -> Vec<ConsultationRecord> {
        let feed = self.for_months(&filters.months);
        let narrowed = Dimension::ALL
            .iter()
            .any(|dim| *dim != Dimension::Month && !filters.selection(*dim).is_empty());
        if !narrowed {
            return feed;
        }

        let units: HashSet<String> = records
            .iter()
            .filter_map(|r| r.unit.as_deref())
            .map(normalize_text)
            .collect();
        feed.into_iter()
            .filter(|r| units.contains(&normalize_text(&r.unit)))
            .collect()
    }
}

/// Position of a unit relative to the average unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Quadrant {
    /// Below-average cost per capita, above-average utilization
    Efficient,
    /// Below-average cost and utilization
    Underused,
    /// Above-average cost and utilization
    HighDemand,
    /// Above-average cost, below-average utilization
    Attention,
}

impl Quadrant {
    pub fn label(&self) -> &'static str {
        match self {
            Quadrant::Efficient => "Eficiente",
            Quadrant::Underused => "Baixo uso",
            Quadrant::HighDemand => "Alta demanda",
            Quadrant::Attention => "Atenção",
        }
    }
}

/// Cost and utilization of one unit
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EfficiencyRow {
    pub unit: String,
    /// Realized benefits cost
    pub cost: f64,
    /// Covered individuals, `None` when the consultations feed has no data for the unit
    pub lives: Option<f64>,
    pub consultations: f64,
    /// Cost divided by lives
    pub per_capita: Option<f64>,
    /// Consultations divided by lives
    pub utilization: Option<f64>,
    pub quadrant: Option<Quadrant>,
}

#[derive(Default)]
struct UnitAccumulator {
    label: Option<String>,
    cost: f64,
    consultations: f64,
    seen_in_feed: bool,
    lives_total: f64,
    lives_by_month: BTreeMap<String, f64>,
}

/// Join benefit costs with the consultations feed, per unit
///
/// Units are matched on their normalized name, so `"São Paulo"` and
/// `"SAO PAULO"` are the same unit. When the feed is monthly, lives are the
/// average monthly headcount rather than the sum of all months.
pub fn efficiency_map(
    benefits: &[BenefitRecord],
    consultations: &[ConsultationRecord],
) -> Vec<EfficiencyRow> {
    let mut units: HashMap<String, UnitAccumulator> = HashMap::new();

    for record in benefits {
        let Some(unit) = record.unit.as_deref() else {
            continue;
        };
        let acc = units.entry(normalize_text(unit)).or_default();
        acc.label.get_or_insert_with(|| unit.to_string());
        acc.cost += record.realized;
    }

    for record in consultations {
        let acc = units.entry(normalize_text(&record.unit)).or_default();
        acc.label.get_or_insert_with(|| record.unit.clone());
        acc.seen_in_feed = true;
        acc.consultations += record.consultations;
        match &record.month {
            Some(month) => *acc.lives_by_month.entry(month.clone()).or_insert(0.0) += record.lives,
            None => acc.lives_total += record.lives,
        }
    }

    let mut rows: Vec<EfficiencyRow> = units
        .into_iter()
        .map(|(key, acc)| {
            let lives = acc.seen_in_feed.then(|| {
                if acc.lives_by_month.is_empty() {
                    acc.lives_total
                } else {
                    let monthly: f64 = acc.lives_by_month.values().sum();
                    monthly / acc.lives_by_month.len() as f64 + acc.lives_total
                }
            });
            let per = |value: f64| lives.filter(|l| *l > 0.0).map(|l| value / l);

            EfficiencyRow {
                unit: acc.label.unwrap_or(key),
                cost: acc.cost,
                lives,
                consultations: acc.consultations,
                per_capita: per(acc.cost),
                utilization: per(acc.consultations),
                quadrant: None,
            }
        })
        .collect();

    assign_quadrants(&mut rows);

    rows.sort_by(|a, b| match (a.per_capita, b.per_capita) {
        (Some(x), Some(y)) => y.total_cmp(&x).then_with(|| a.unit.cmp(&b.unit)),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.unit.cmp(&b.unit),
    });
    rows
}

fn assign_quadrants(rows: &mut [EfficiencyRow]) {
    let measured: Vec<(f64, f64)> = rows
        .iter()
        .filter_map(|r| Some((r.per_capita?, r.utilization?)))
        .collect();
    if measured.is_empty() {
        return;
    }

    let n = measured.len() as f64;
    let mean_cost = measured.iter().map(|(c, _)| c).sum::<f64>() / n;
    let mean_use = measured.iter().map(|(_, u)| u).sum::<f64>() / n;

    for row in rows.iter_mut() {
        if let (Some(cost), Some(usage)) = (row.per_capita, row.utilization) {
            row.quadrant = Some(match (cost > mean_cost, usage >= mean_use) {
                (false, true) => Quadrant::Efficient,
                (false, false) => Quadrant::Underused,
                (true, true) => Quadrant::HighDemand,
                (true, false) => Quadrant::Attention,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn benefit(unit: &str, realized: f64) -> BenefitRecord {
        BenefitRecord {
            unit: Some(unit.to_string()),
            realized,
            ..BenefitRecord::default()
        }
    }

    fn feed(csv: &str) -> ConsultationDataset {
        ConsultationDataset::from_table(&RawTable::from_csv_str("consultas", csv).unwrap()).unwrap()
    }

    #[test]
    fn detects_feed_columns() {
        let ds = feed("Mês,Filial,Vidas,Consultas\nJan,SP,10,4\n");

        assert_eq!(ds.columns.unit.as_deref(), Some("Filial"));
        assert_eq!(ds.columns.month.as_deref(), Some("Mês"));
        assert_eq!(ds.columns.lives.as_deref(), Some("Vidas"));
        assert_eq!(ds.columns.consultations.as_deref(), Some("Consultas"));
        assert_eq!(ds.records[0].lives, 10.0);
    }

    #[test]
    fn feed_without_unit_column_is_rejected() {
        let table = RawTable::from_csv_str("consultas", "Mês,Consultas\nJan,3\n").unwrap();
        assert!(matches!(
            ConsultationDataset::from_table(&table),
            Err(DashboardError::MissingColumn(_))
        ));
    }

    #[test]
    fn per_capita_and_utilization_join_on_normalized_unit() {
        let ds = feed("Unidade,Vidas,Consultas\nSão Paulo,50,25\nRio,20,30\n");
        let benefits = vec![
            benefit("SAO PAULO", 4000.0),
            benefit("São Paulo", 1000.0),
            benefit("Rio", 1000.0),
        ];

        let rows = efficiency_map(&benefits, &ds.records);
        assert_eq!(rows.len(), 2);

        let sp = &rows[0];
        assert_eq!(sp.unit, "SAO PAULO");
        assert_eq!(sp.cost, 5000.0);
        assert_eq!(sp.per_capita, Some(100.0));
        assert_eq!(sp.utilization, Some(0.5));
        assert_eq!(sp.quadrant, Some(Quadrant::Attention));

        let rio = &rows[1];
        assert_eq!(rio.per_capita, Some(50.0));
        assert_eq!(rio.utilization, Some(1.5));
        assert_eq!(rio.quadrant, Some(Quadrant::Efficient));
    }

    #[test]
    fn monthly_feed_averages_headcount() {
        let ds = feed("Mês,Unidade,Vidas,Consultas\nJan,SP,10,5\nFev,SP,30,15\n");
        let rows = efficiency_map(&[benefit("SP", 2000.0)], &ds.records);

        assert_eq!(rows[0].lives, Some(20.0));
        assert_eq!(rows[0].consultations, 20.0);
        assert_eq!(rows[0].per_capita, Some(100.0));
        assert_eq!(rows[0].utilization, Some(1.0));
    }

    #[test]
    fn each_row_counts_as_a_consultation_without_a_count_column() {
        let ds = feed("Unidade,Paciente\nSP,a\nSP,b\nRJ,c\n");
        let rows = efficiency_map(&[], &ds.records);

        let sp = rows.iter().find(|r| r.unit == "SP").unwrap();
        assert_eq!(sp.consultations, 2.0);
        assert_eq!(sp.lives, Some(0.0));
        assert_eq!(sp.per_capita, None);
    }

    #[test]
    fn units_missing_from_the_feed_have_no_ratios() {
        let rows = efficiency_map(&[benefit("BH", 300.0)], &[]);

        assert_eq!(rows[0].lives, None);
        assert_eq!(rows[0].per_capita, None);
        assert_eq!(rows[0].quadrant, None);
    }

    #[test]
    fn month_selection_restricts_the_feed() {
        let ds = feed("Mês,Unidade,Consultas\nJan,SP,5\nFev,SP,7\n");

        assert_eq!(ds.for_months(&[]).len(), 2);
        assert_eq!(ds.for_months(&["Fev".to_string()]).len(), 1);
    }

    #[test]
    fn filtered_out_units_leave_the_feed() {
        let ds = feed("Mês,Unidade,Vidas,Consultas\nJan,SP,10,5\nJan,Rio,5,10\nFev,Rio,5,2\n");
        let sp = vec![benefit("SP", 100.0)];

        let by_unit = FilterState {
            units: vec!["SP".to_string()],
            ..FilterState::default()
        };
        let kept = ds.for_filters(&by_unit, &sp);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].unit, "SP");

        let rows = efficiency_map(&sp, &kept);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].per_capita, Some(10.0));

        let by_month = FilterState {
            months: vec!["Jan".to_string()],
            ..FilterState::default()
        };
        assert_eq!(ds.for_filters(&by_month, &sp).len(), 2);
    }
}
