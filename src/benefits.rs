use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::cleaning::{find_column_exact, find_column_excluding, normalize_text, parse_currency};
use crate::table::RawTable;

lazy_static! {
    static ref MONTH_YEAR_REGEX: Regex = Regex::new(r"^(\d{1,2})[/\-.](\d{4})$").unwrap();
    static ref YEAR_MONTH_REGEX: Regex = Regex::new(r"^(\d{4})[/\-.](\d{1,2})").unwrap();
    static ref YEAR_REGEX: Regex = Regex::new(r"(\d{4})").unwrap();
}

pub(crate) const MONTH_TERMS: &[&str] = &["mes", "competencia", "periodo", "month"];
pub(crate) const UNIT_TERMS: &[&str] = &["unidade", "filial", "setor", "departamento", "unit"];
const BENEFIT_TERMS: &[&str] = &["beneficio", "plano", "produto", "benefit"];
const TIER_TERMS: &[&str] = &["tier", "nivel", "categoria", "faixa"];
const BUDGETED_TERMS: &[&str] = &["orcado", "orcamento", "previsto", "budget"];
const REALIZED_TERMS: &[&str] = &["realizado", "executado", "gasto", "actual"];
const COST_FALLBACK_TERMS: &[&str] = &["custo", "valor"];
const STATUS_TERMS: &[&str] = &["status", "situacao"];
const ID_TERMS: &[&str] = &["id", "matricula", "cpf"];
const NAME_TERMS: &[&str] = &["nome", "colaborador"];
const EMAIL_TERMS: &[&str] = &["email", "e-mail"];

const MONTH_PREFIXES: &[(&str, u32)] = &[
    ("jan", 1),
    ("fev", 2),
    ("feb", 2),
    ("mar", 3),
    ("abr", 4),
    ("apr", 4),
    ("mai", 5),
    ("may", 5),
    ("jun", 6),
    ("jul", 7),
    ("ago", 8),
    ("aug", 8),
    ("set", 9),
    ("sep", 9),
    ("out", 10),
    ("oct", 10),
    ("nov", 11),
    ("dez", 12),
    ("dec", 12),
];

/// A categorical axis of the benefits table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Month,
    Unit,
    Benefit,
    /// Plan level, e.g. Gold or Silver
    Tier,
    Status,
}

impl Dimension {
    pub const ALL: [Dimension; 5] = [
        Dimension::Month,
        Dimension::Unit,
        Dimension::Benefit,
        Dimension::Tier,
        Dimension::Status,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Dimension::Month => "Mês",
            Dimension::Unit => "Unidade",
            Dimension::Benefit => "Benefício",
            Dimension::Tier => "Tier",
            Dimension::Status => "Status",
        }
    }

    /// Query-string key, also used by `parse`.
    pub fn key(&self) -> &'static str {
        match self {
            Dimension::Month => "month",
            Dimension::Unit => "unit",
            Dimension::Benefit => "benefit",
            Dimension::Tier => "tier",
            Dimension::Status => "status",
        }
    }

    pub fn parse(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.key() == key)
    }
}

/// A numeric quantity that can be summed over records.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Measure {
    Realized,
    Budgeted,
    /// Budgeted minus realized
    Variance,
}

impl Measure {
    pub const ALL: [Measure; 3] = [Measure::Realized, Measure::Budgeted, Measure::Variance];

    pub fn label(&self) -> &'static str {
        match self {
            Measure::Realized => "Custo Realizado",
            Measure::Budgeted => "Custo Orçado",
            Measure::Variance => "Saldo (Orçado - Realizado)",
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            Measure::Realized => "realized",
            Measure::Budgeted => "budgeted",
            Measure::Variance => "variance",
        }
    }

    pub fn parse(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.key() == key)
    }
}

/// Which sheet column was detected for each role
///
/// Every role is optional: detection is a best-effort guess over whatever
/// headers the sheet happens to have.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct BenefitColumns {
    pub month: Option<String>,
    pub unit: Option<String>,
    pub benefit: Option<String>,
    pub tier: Option<String>,
    pub budgeted: Option<String>,
    pub realized: Option<String>,
    pub status: Option<String>,
    pub id: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
}

impl BenefitColumns {
    /// Guess column roles from header names
    ///
    /// Roles are claimed in a fixed order and a claimed column is never
    /// reused, so a generic "Custo" fallback for the realized cost cannot
    /// steal the column already picked as the budget.
    ///
    /// # Examples
    /// ```
    /// use benefits_dashboard::benefits::BenefitColumns;
    ///
    /// let headers: Vec<String> = ["Mês", "Unidade", "Benefício", "Custo Orçado", "Custo"]
    ///     .iter()
    ///     .map(|s| s.to_string())
    ///     .collect();
    /// let columns = BenefitColumns::detect(&headers);
    /// assert_eq!(columns.budgeted.as_deref(), Some("Custo Orçado"));
    /// assert_eq!(columns.realized.as_deref(), Some("Custo"));
    /// assert_eq!(columns.status, None);
    /// ```
    pub fn detect(headers: &[String]) -> Self {
        let mut taken: Vec<String> = Vec::new();

        let month = claim(headers, MONTH_TERMS, &mut taken);
        let unit = claim(headers, UNIT_TERMS, &mut taken);
        let benefit = claim(headers, BENEFIT_TERMS, &mut taken);
        let tier = claim(headers, TIER_TERMS, &mut taken);
        let budgeted = claim(headers, BUDGETED_TERMS, &mut taken);
        let realized = claim(headers, REALIZED_TERMS, &mut taken)
            .or_else(|| claim(headers, COST_FALLBACK_TERMS, &mut taken));
        let status = claim(headers, STATUS_TERMS, &mut taken);

        let id = find_column_exact(headers, ID_TERMS).filter(|c| !taken.contains(c));
        if let Some(col) = &id {
            taken.push(col.clone());
        }
        let name = claim(headers, NAME_TERMS, &mut taken);
        let email = claim(headers, EMAIL_TERMS, &mut taken);

        BenefitColumns {
            month,
            unit,
            benefit,
            tier,
            budgeted,
            realized,
            status,
            id,
            name,
            email,
        }
    }

    pub fn dimension(&self, dim: Dimension) -> Option<&str> {
        match dim {
            Dimension::Month => self.month.as_deref(),
            Dimension::Unit => self.unit.as_deref(),
            Dimension::Benefit => self.benefit.as_deref(),
            Dimension::Tier => self.tier.as_deref(),
            Dimension::Status => self.status.as_deref(),
        }
    }

    pub fn has_costs(&self) -> bool {
        self.budgeted.is_some() || self.realized.is_some()
    }

    pub fn has_measure(&self, measure: Measure) -> bool {
        match measure {
            Measure::Realized => self.realized.is_some(),
            Measure::Budgeted => self.budgeted.is_some(),
            Measure::Variance => self.budgeted.is_some() && self.realized.is_some(),
        }
    }
}

fn claim(headers: &[String], terms: &[&str], taken: &mut Vec<String>) -> Option<String> {
    let excluded: Vec<&str> = taken.iter().map(String::as_str).collect();
    let found = find_column_excluding(headers, terms, &excluded);
    if let Some(column) = &found {
        taken.push(column.clone());
    }
    found
}

/// One cleaned row of the benefits sheet.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct BenefitRecord {
    /// Index of the source row in the raw table
    pub row: usize,
    pub month: Option<String>,
    pub unit: Option<String>,
    pub benefit: Option<String>,
    pub tier: Option<String>,
    pub status: Option<String>,
    pub id: Option<String>,
    pub budgeted: f64,
    pub realized: f64,
}

impl BenefitRecord {
    pub fn dimension(&self, dim: Dimension) -> Option<&str> {
        match dim {
            Dimension::Month => self.month.as_deref(),
            Dimension::Unit => self.unit.as_deref(),
            Dimension::Benefit => self.benefit.as_deref(),
            Dimension::Tier => self.tier.as_deref(),
            Dimension::Status => self.status.as_deref(),
        }
    }

    pub fn measure(&self, measure: Measure) -> f64 {
        match measure {
            Measure::Realized => self.realized,
            Measure::Budgeted => self.budgeted,
            Measure::Variance => self.budgeted - self.realized,
        }
    }
}

/// Distinct values offered by each filter.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct FilterOptions {
    pub months: Vec<String>,
    pub units: Vec<String>,
    pub benefits: Vec<String>,
    pub tiers: Vec<String>,
    pub statuses: Vec<String>,
}

impl FilterOptions {
    pub fn values(&self, dim: Dimension) -> &[String] {
        match dim {
            Dimension::Month => &self.months,
            Dimension::Unit => &self.units,
            Dimension::Benefit => &self.benefits,
            Dimension::Tier => &self.tiers,
            Dimension::Status => &self.statuses,
        }
    }
}

/// The benefits sheet after column detection and cleaning.
#[derive(Clone, Debug)]
pub struct BenefitDataset {
    pub columns: BenefitColumns,
    pub records: Vec<BenefitRecord>,
    pub table: Arc<RawTable>,
}

impl BenefitDataset {
    /// Detect the columns of `table` and coerce every row into a record
    ///
    /// Text dimensions are trimmed and blank cells become `None`; cost cells
    /// go through [`parse_currency`], so anything unparsable counts as zero.
    pub fn from_table(table: Arc<RawTable>) -> Self {
        let columns = BenefitColumns::detect(&table.headers);
        let index = |column: &Option<String>| {
            column
                .as_deref()
                .and_then(|name| table.column_index(name))
        };

        let month = index(&columns.month);
        let unit = index(&columns.unit);
        let benefit = index(&columns.benefit);
        let tier = index(&columns.tier);
        let status = index(&columns.status);
        let id = index(&columns.id);
        let budgeted = index(&columns.budgeted);
        let realized = index(&columns.realized);

        let text = |row: &[String], idx: Option<usize>| {
            idx.and_then(|i| row.get(i))
                .map(|cell| cell.trim())
                .filter(|cell| !cell.is_empty())
                .map(str::to_string)
        };
        let number = |row: &[String], idx: Option<usize>| {
            idx.and_then(|i| row.get(i))
                .map(|cell| parse_currency(cell))
                .unwrap_or(0.0)
        };

        let records = table
            .rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let row = row.as_slice();
                BenefitRecord {
                    row: i,
                    month: text(row, month),
                    unit: text(row, unit),
                    benefit: text(row, benefit),
                    tier: text(row, tier),
                    status: text(row, status),
                    id: text(row, id),
                    budgeted: number(row, budgeted),
                    realized: number(row, realized),
                }
            })
            .collect();

        BenefitDataset {
            columns,
            records,
            table,
        }
    }

    /// Sorted distinct values per filterable dimension
    ///
    /// Months are in calendar order; the other dimensions are alphabetical.
    pub fn options(&self) -> FilterOptions {
        let distinct = |dim: Dimension| -> Vec<String> {
            self.records
                .iter()
                .filter_map(|r| r.dimension(dim))
                .map(str::to_string)
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect()
        };

        let mut months = distinct(Dimension::Month);
        sort_months(&mut months);

        FilterOptions {
            months,
            units: distinct(Dimension::Unit),
            benefits: distinct(Dimension::Benefit),
            tiers: distinct(Dimension::Tier),
            statuses: distinct(Dimension::Status),
        }
    }

    /// Messages for every missing column that disables part of the page.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        let c = &self.columns;

        if !c.has_costs() {
            warnings.push(
                "Nenhuma coluna de custo encontrada: indicadores, gráficos e matriz desativados."
                    .to_string(),
            );
        } else if c.budgeted.is_none() {
            warnings.push(
                "Coluna de custo orçado não encontrada: comparação orçado x realizado desativada."
                    .to_string(),
            );
        } else if c.realized.is_none() {
            warnings.push(
                "Coluna de custo realizado não encontrada: exibindo apenas valores orçados."
                    .to_string(),
            );
        }

        for dim in Dimension::ALL {
            if c.dimension(dim).is_none() {
                warnings.push(format!(
                    "Coluna \"{}\" não encontrada: filtro e gráficos por {} desativados.",
                    dim.label(),
                    dim.label().to_lowercase()
                ));
            }
        }

        warnings
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Calendar position of a month label as `(year, month)`
///
/// Accepts `MM/YYYY`, `YYYY-MM[-DD]` and names or abbreviations in Portuguese
/// or English (`Jan`, `Fevereiro/2024`, `março`). The year is `0` when the
/// label carries none.
///
/// # Examples
/// ```
/// use benefits_dashboard::benefits::month_rank;
///
/// assert_eq!(month_rank("Março"), Some((0, 3)));
/// assert_eq!(month_rank("02/2024"), Some((2024, 2)));
/// assert_eq!(month_rank("2023-11-01"), Some((2023, 11)));
/// assert_eq!(month_rank("Total"), None);
/// ```
pub fn month_rank(label: &str) -> Option<(i32, u32)> {
    let normalized = normalize_text(label);

    if let Some(caps) = MONTH_YEAR_REGEX.captures(&normalized) {
        let month: u32 = caps[1].parse().ok()?;
        let year: i32 = caps[2].parse().ok()?;
        return (1..=12).contains(&month).then_some((year, month));
    }

    if let Some(caps) = YEAR_MONTH_REGEX.captures(&normalized) {
        let year: i32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        return (1..=12).contains(&month).then_some((year, month));
    }

    let month = MONTH_PREFIXES
        .iter()
        .find(|(prefix, _)| normalized.starts_with(prefix))
        .map(|(_, month)| *month)?;

    let year = YEAR_REGEX
        .captures(&normalized)
        .and_then(|caps| caps[1].parse().ok())
        .unwrap_or(0);

    Some((year, month))
}

/// Order two month labels: recognized months by calendar, others after them.
pub fn compare_months(a: &str, b: &str) -> Ordering {
    match (month_rank(a), month_rank(b)) {
        (Some(ra), Some(rb)) => ra.cmp(&rb).then_with(|| a.cmp(b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

pub fn sort_months(months: &mut [String]) {
    months.sort_by(|a, b| compare_months(a, b));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset(csv: &str) -> BenefitDataset {
        BenefitDataset::from_table(Arc::new(RawTable::from_csv_str("t", csv).unwrap()))
    }

    #[test]
    fn detects_every_role_on_a_typical_sheet() {
        let ds = dataset(
            "ID,Nome,E-mail,Competência,Unidade,Benefício,Nível,Custo Orçado,Custo Realizado,Situação\n\
             1,Ana,ana@x.com,Jan,SP,Saúde,Gold,\"R$ 1.000,00\",\"R$ 900,50\",Ativo\n",
        );
        let c = &ds.columns;

        assert_eq!(c.id.as_deref(), Some("ID"));
        assert_eq!(c.name.as_deref(), Some("Nome"));
        assert_eq!(c.email.as_deref(), Some("E-mail"));
        assert_eq!(c.month.as_deref(), Some("Competência"));
        assert_eq!(c.unit.as_deref(), Some("Unidade"));
        assert_eq!(c.benefit.as_deref(), Some("Benefício"));
        assert_eq!(c.tier.as_deref(), Some("Nível"));
        assert_eq!(c.budgeted.as_deref(), Some("Custo Orçado"));
        assert_eq!(c.realized.as_deref(), Some("Custo Realizado"));
        assert_eq!(c.status.as_deref(), Some("Situação"));
        assert!(ds.warnings().is_empty());

        let r = &ds.records[0];
        assert_eq!(r.budgeted, 1000.0);
        assert_eq!(r.realized, 900.5);
        assert_eq!(r.unit.as_deref(), Some("SP"));
        assert_eq!(r.tier.as_deref(), Some("Gold"));
    }

    #[test]
    fn blank_and_garbage_cells_are_soft() {
        let ds = dataset("Mês,Unidade,Custo\nJan,,abc\nFev,RJ,\n");

        assert_eq!(ds.records[0].unit, None);
        assert_eq!(ds.records[0].realized, 0.0);
        assert_eq!(ds.records[1].realized, 0.0);
        assert_eq!(ds.records[0].budgeted, 0.0);
    }

    #[test]
    fn missing_columns_produce_warnings() {
        let ds = dataset("Descrição,Observação\nx,y\n");
        let warnings = ds.warnings();

        assert!(!ds.columns.has_costs());
        assert_eq!(warnings.len(), 6);
        assert!(warnings[0].contains("custo"));
    }

    #[test]
    fn options_are_distinct_and_months_calendar_ordered() {
        let ds = dataset(
            "Mês,Unidade,Custo\nMarço,SP,1\nJaneiro,RJ,1\nFevereiro,SP,1\nJaneiro,BH,1\n",
        );
        let options = ds.options();

        assert_eq!(options.months, vec!["Janeiro", "Fevereiro", "Março"]);
        assert_eq!(options.units, vec!["BH", "RJ", "SP"]);
        assert!(options.statuses.is_empty());
        assert!(options.tiers.is_empty());
    }

    #[test]
    fn tier_column_becomes_a_dimension() {
        let ds = dataset(
            "ID,Nome,Email,Unidade,Tier,Status,Custo\n\
             1,Ana,ana@x.com,SP,Gold,Ativo,\"R$ 10,00\"\n\
             2,Rui,rui@x.com,RJ,Silver,Ativo,\"R$ 20,00\"\n\
             3,Bia,bia@x.com,RJ,Gold,Inativo,\"R$ 5,00\"\n",
        );

        assert_eq!(ds.columns.tier.as_deref(), Some("Tier"));
        assert_eq!(ds.columns.realized.as_deref(), Some("Custo"));
        assert_eq!(ds.options().tiers, vec!["Gold", "Silver"]);
        assert_eq!(ds.records[1].dimension(Dimension::Tier), Some("Silver"));
    }

    #[test]
    fn month_labels_with_years_sort_across_years() {
        let mut months = vec![
            "Jan/2025".to_string(),
            "Total".to_string(),
            "12/2024".to_string(),
            "Fev/2025".to_string(),
        ];
        sort_months(&mut months);
        assert_eq!(months, vec!["12/2024", "Jan/2025", "Fev/2025", "Total"]);
    }

    #[test]
    fn invalid_numeric_months_are_unranked() {
        assert_eq!(month_rank("13/2024"), None);
        assert_eq!(month_rank("2024-00"), None);
        assert_eq!(month_rank("Setembro"), Some((0, 9)));
        assert_eq!(month_rank("Oct 2023"), Some((2023, 10)));
    }

    #[test]
    fn dimension_and_measure_keys_round_trip() {
        for dim in Dimension::ALL {
            assert_eq!(Dimension::parse(dim.key()), Some(dim));
        }
        assert_eq!(Measure::parse("variance"), Some(Measure::Variance));
        assert_eq!(Measure::parse("nope"), None);
    }
}
