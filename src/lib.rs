/*!
# Benefits Dashboard

A web dashboard for corporate benefits costs, read straight from published
spreadsheets, built in Rust.

## Overview

HR teams keep benefits costs in a spreadsheet: one row per collaborator,
benefit and month, with budgeted and realized amounts. This crate fetches
that sheet as CSV, works out which column holds what, and serves a
filterable page with indicators, charts, a pivot matrix and a collaborator
search. An optional second sheet with consultations per unit adds an
efficiency view (cost per capita against utilization).

## Architecture

### Data layer
- **loader**: fetches a sheet over HTTP (published CSV export) or from disk
- **cache**: keeps fetched tables until they expire or are refreshed
- **table**: loosely-typed CSV table (headers plus string cells)
- **cleaning**: text normalization, Brazilian currency parsing and formatting,
  fuzzy column lookup

### Analysis layer
- **benefits**: column detection and cleaned benefit records
- **filter**: month/unit/benefit/status filters and collaborator search
- **kpi**: totals, variance, execution rate, distinct lives
- **pivot**: group totals and the pivot matrix with heat-map shading
- **efficiency**: joins costs with the consultations sheet per unit

### Presentation layer (feature `web`)
- **graph**: SVG charts rendered with plotters
- **downloader**: matrix export to CSV and XLSX
- **view**: server-side HTML rendering
- **login**: configured users, sessions and the authentication middleware
- **app**: router, handlers and server start-up

## Data handling

- Columns are found by normalized substring match on their names, so
  `"Custo Orçado"`, `"custo orcado"` and `"CUSTO ORÇADO (R$)"` are the same
- `"R$ 1.234,56"` parses to `1234.56`; anything unparsable counts as zero
- A failed load never crashes the page: it shows an error banner, and the
  JSON endpoints answer `503`

## REST API Endpoints

- `/api/summary` - Indicators, filter options and warnings
- `/api/matrix`, `/api/matrix.csv`, `/api/matrix.xlsx` - Pivot matrix
- `/api/efficiency` - Cost and utilization per unit
- `/api/search?q=` - Collaborator search
- `/api/refresh` - Drop cached sheets
- `/chart/{kind}.svg` - Dashboard charts
*/

pub mod benefits;
pub mod cache;
pub mod cleaning;
pub mod config;
pub mod efficiency;
pub mod error;
pub mod filter;
pub mod kpi;
pub mod loader;
pub mod pivot;
pub mod table;

pub mod downloader;

#[cfg(feature = "web")]
pub mod app;
#[cfg(feature = "web")]
pub mod graph;
#[cfg(feature = "web")]
pub mod login;
#[cfg(feature = "web")]
pub mod view;

/// Re-export the types most callers need
pub use benefits::{BenefitDataset, BenefitRecord, Dimension, Measure};
pub use config::DashboardConfig;
pub use error::{DashboardError, Result};
pub use filter::FilterState;
pub use kpi::Kpis;
pub use pivot::Matrix;
