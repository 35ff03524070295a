use serde::Serialize;
use std::collections::BTreeSet;

use crate::benefits::{BenefitDataset, BenefitRecord, Dimension};
use crate::cleaning::normalize_text;

/// Selected values per dimension
///
/// An empty selection places no constraint on that dimension, so the default
/// state shows every record.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct FilterState {
    pub months: Vec<String>,
    pub units: Vec<String>,
    pub benefits: Vec<String>,
    pub tiers: Vec<String>,
    pub statuses: Vec<String>,
}

impl FilterState {
    pub fn selection(&self, dim: Dimension) -> &[String] {
        match dim {
            Dimension::Month => &self.months,
            Dimension::Unit => &self.units,
            Dimension::Benefit => &self.benefits,
            Dimension::Tier => &self.tiers,
            Dimension::Status => &self.statuses,
        }
    }

    /// Whether any dimension is constrained.
    pub fn is_active(&self) -> bool {
        Dimension::ALL
            .iter()
            .any(|dim| !self.selection(*dim).is_empty())
    }

    /// Whether a record passes every non-empty selection
    ///
    /// A record with no value for a constrained dimension is rejected.
    pub fn matches(&self, record: &BenefitRecord) -> bool {
        Dimension::ALL.iter().all(|dim| {
            let selected = self.selection(*dim);
            if selected.is_empty() {
                return true;
            }
            match record.dimension(*dim) {
                Some(value) => selected.iter().any(|s| s == value),
                None => false,
            }
        })
    }

    /// Records that pass the filters, in sheet order.
    pub fn apply(&self, records: &[BenefitRecord]) -> Vec<BenefitRecord> {
        records
            .iter()
            .filter(|record| self.matches(record))
            .cloned()
            .collect()
    }
}

/// Raw rows matching a collaborator search.
#[derive(Clone, Debug, Default, Serialize)]
pub struct SearchResult {
    /// False when the sheet has no name, e-mail or ID column to search in
    pub available: bool,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// Number of distinct collaborators (IDs) among the matches
    pub collaborators: usize,
}

/// Look a collaborator up by name, e-mail or ID
///
/// Name and e-mail match case- and accent-insensitively on a substring; the
/// ID matches as plain substring of its text. The search runs over the whole
/// sheet, ignoring the dashboard filters.
pub fn search(dataset: &BenefitDataset, query: &str) -> SearchResult {
    let table = &dataset.table;
    let columns = &dataset.columns;
    let index = |column: &Option<String>| {
        column
            .as_deref()
            .and_then(|name| table.column_index(name))
    };

    let name_idx = index(&columns.name);
    let email_idx = index(&columns.email);
    let id_idx = index(&columns.id);

    let mut result = SearchResult {
        available: name_idx.is_some() || email_idx.is_some() || id_idx.is_some(),
        headers: table.headers.clone(),
        ..SearchResult::default()
    };

    let query = query.trim();
    if query.is_empty() || !result.available {
        return result;
    }

    let needle = normalize_text(query);
    let contains_text = |row: &[String], idx: Option<usize>| {
        idx.and_then(|i| row.get(i))
            .is_some_and(|cell| normalize_text(cell).contains(&needle))
    };

    let mut ids = BTreeSet::new();
    for row in &table.rows {
        let row = row.as_slice();
        let id_match = id_idx
            .and_then(|i| row.get(i))
            .is_some_and(|cell| cell.contains(query));

        if contains_text(row, name_idx) || contains_text(row, email_idx) || id_match {
            if let Some(id) = id_idx.and_then(|i| row.get(i)) {
                ids.insert(id.clone());
            }
            result.rows.push(row.to_vec());
        }
    }

    result.collaborators = if id_idx.is_some() {
        ids.len()
    } else {
        result.rows.len()
    };
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::RawTable;
    use std::sync::Arc;

    fn dataset() -> BenefitDataset {
        let csv = "ID,Nome,Email,Mês,Unidade,Benefício,Tier,Status,Custo\n\
                   101,Ana Souza,ana@empresa.com,Jan,SP,Saúde,Gold,Ativo,\"R$ 100,00\"\n\
                   101,Ana Souza,ana@empresa.com,Jan,SP,Odonto,Gold,Ativo,\"R$ 30,00\"\n\
                   202,João Lima,joao@empresa.com,Fev,RJ,Saúde,Silver,Inativo,\"R$ 80,00\"\n\
                   303,Márcia Dias,marcia@empresa.com,Fev,,Saúde,Gold,Ativo,\"R$ 50,00\"\n";
        BenefitDataset::from_table(Arc::new(RawTable::from_csv_str("t", csv).unwrap()))
    }

    #[test]
    fn empty_filter_keeps_everything() {
        let ds = dataset();
        let filters = FilterState::default();

        assert!(!filters.is_active());
        assert_eq!(filters.apply(&ds.records).len(), 4);
    }

    #[test]
    fn selections_combine_across_dimensions() {
        let ds = dataset();
        let filters = FilterState {
            months: vec!["Fev".to_string()],
            benefits: vec!["Saúde".to_string()],
            ..FilterState::default()
        };

        let rows = filters.apply(&ds.records);
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.month.as_deref() == Some("Fev")));
    }

    #[test]
    fn tier_selection_filters_records() {
        let ds = dataset();
        let filters = FilterState {
            tiers: vec!["Silver".to_string()],
            ..FilterState::default()
        };

        assert!(filters.is_active());
        let rows = filters.apply(&ds.records);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id.as_deref(), Some("202"));
    }

    #[test]
    fn missing_value_fails_a_constrained_dimension() {
        let ds = dataset();
        let filters = FilterState {
            units: vec!["SP".to_string(), "RJ".to_string()],
            ..FilterState::default()
        };

        let rows = filters.apply(&ds.records);
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.unit.is_some()));
    }

    #[test]
    fn search_matches_name_email_and_id() {
        let ds = dataset();

        let by_name = search(&ds, "ana");
        assert_eq!(by_name.rows.len(), 2);
        assert_eq!(by_name.collaborators, 1);

        let by_accentless_name = search(&ds, "joao");
        assert_eq!(by_accentless_name.rows.len(), 1);

        let by_email = search(&ds, "MARCIA@");
        assert_eq!(by_email.rows.len(), 1);

        let by_id = search(&ds, "30");
        assert_eq!(by_id.collaborators, 1);
        assert_eq!(by_id.rows[0][0], "303");
    }

    #[test]
    fn blank_or_unmatched_search_returns_nothing() {
        let ds = dataset();
        assert!(search(&ds, "   ").rows.is_empty());
        assert!(search(&ds, "zzz").rows.is_empty());
        assert!(search(&ds, "zzz").available);
    }
}
