#![cfg(feature = "web")]

use serde::Deserialize;
use std::fmt::Write;

use crate::benefits::{BenefitColumns, Dimension, FilterOptions, Measure};
use crate::cleaning::{format_brl, format_number, format_percent};
use crate::efficiency::EfficiencyRow;
use crate::filter::{FilterState, SearchResult};
use crate::graph::ChartKind;
use crate::kpi::Kpis;
use crate::pivot::Matrix;

/// Notice shown instead of the efficiency map when the benefits sheet cannot feed it.
pub const EFFICIENCY_COLUMNS_MISSING: &str =
    "O mapa de eficiência precisa das colunas de unidade e custo realizado.";

/// Notice for a matrix over a measure the sheet has no column for.
pub fn missing_measure(measure: Measure) -> String {
    format!("Coluna de {} não encontrada", measure.label())
}

/// Tabs of the dashboard page.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Tab {
    #[default]
    Overview,
    Matrix,
    Efficiency,
    Search,
}

impl Tab {
    pub const ALL: [Tab; 4] = [Tab::Overview, Tab::Matrix, Tab::Efficiency, Tab::Search];

    pub fn key(&self) -> &'static str {
        match self {
            Tab::Overview => "overview",
            Tab::Matrix => "matrix",
            Tab::Efficiency => "efficiency",
            Tab::Search => "search",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Tab::Overview => "Visão Geral",
            Tab::Matrix => "Matriz",
            Tab::Efficiency => "Eficiência",
            Tab::Search => "Localizar Colaborador",
        }
    }

    /// Unknown or missing keys fall back to the overview.
    pub fn parse(key: Option<&str>) -> Self {
        key.and_then(|k| Self::ALL.into_iter().find(|t| t.key() == k))
            .unwrap_or_default()
    }
}

/// Query string of the dashboard page and of the API endpoints
///
/// Filters are repeated keys (`?month=Jan&month=Fev`), which is why this is
/// read with `axum_extra`'s `Query` rather than axum's.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct DashboardQuery {
    pub tab: Option<String>,
    pub month: Vec<String>,
    pub unit: Vec<String>,
    pub benefit: Vec<String>,
    pub tier: Vec<String>,
    pub status: Vec<String>,
    pub rows: Option<String>,
    pub cols: Option<String>,
    pub measure: Option<String>,
    pub q: Option<String>,
}

impl DashboardQuery {
    pub fn tab(&self) -> Tab {
        Tab::parse(self.tab.as_deref())
    }

    pub fn filters(&self) -> FilterState {
        FilterState {
            months: self.month.clone(),
            units: self.unit.clone(),
            benefits: self.benefit.clone(),
            tiers: self.tier.clone(),
            statuses: self.status.clone(),
        }
    }

    /// Matrix axes and measure; defaults to benefit x month, realized.
    ///
    /// When both axes name the same dimension the columns fall back to the
    /// first other dimension.
    pub fn matrix_axes(&self) -> (Dimension, Dimension, Measure) {
        let rows = self
            .rows
            .as_deref()
            .and_then(Dimension::parse)
            .unwrap_or(Dimension::Benefit);
        let mut cols = self
            .cols
            .as_deref()
            .and_then(Dimension::parse)
            .unwrap_or(Dimension::Month);
        if cols == rows {
            cols = Dimension::ALL
                .into_iter()
                .find(|d| *d != rows)
                .unwrap_or(Dimension::Month);
        }
        let measure = self
            .measure
            .as_deref()
            .and_then(Measure::parse)
            .unwrap_or(Measure::Realized);
        (rows, cols, measure)
    }

    pub fn search_text(&self) -> &str {
        self.q.as_deref().unwrap_or("").trim()
    }

    fn filter_pairs(&self) -> Vec<(&'static str, &str)> {
        let filters = [
            ("month", &self.month),
            ("unit", &self.unit),
            ("benefit", &self.benefit),
            ("tier", &self.tier),
            ("status", &self.status),
        ];
        filters
            .into_iter()
            .flat_map(|(key, values)| values.iter().map(move |v| (key, v.as_str())))
            .collect()
    }

    /// Query string carrying only the filters, e.g. for chart URLs.
    pub fn filter_query(&self) -> String {
        encode_pairs(&self.filter_pairs())
    }

    /// Query string of the matrix export with the current filters and axes.
    pub fn matrix_query(&self) -> String {
        let (rows, cols, measure) = self.matrix_axes();
        let mut pairs = self.filter_pairs();
        pairs.push(("rows", rows.key()));
        pairs.push(("cols", cols.key()));
        pairs.push(("measure", measure.key()));
        encode_pairs(&pairs)
    }

    /// Link to another tab keeping filters, axes and search text.
    pub fn tab_link(&self, tab: Tab) -> String {
        let mut pairs = vec![("tab", tab.key())];
        pairs.extend(self.filter_pairs());
        for (key, value) in [("rows", &self.rows), ("cols", &self.cols), ("measure", &self.measure), ("q", &self.q)] {
            if let Some(value) = value.as_deref() {
                pairs.push((key, value));
            }
        }
        format!("/?{}", encode_pairs(&pairs))
    }
}

fn encode_pairs(pairs: &[(&str, &str)]) -> String {
    pairs
        .iter()
        .map(|(key, value)| format!("{}={}", key, urlencoding::encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Escape text for use inside HTML content or a quoted attribute
///
/// Braces are escaped too, so sheet values can never form a `{{placeholder}}`
/// of the page template.
///
/// # Examples
/// ```
/// use benefits_dashboard::view::escape_html;
///
/// assert_eq!(escape_html("<b>\"R&D\"</b>"), "&lt;b&gt;&quot;R&amp;D&quot;&lt;/b&gt;");
/// assert_eq!(escape_html("{{x}}"), "&#123;&#123;x&#125;&#125;");
/// ```
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            '{' => escaped.push_str("&#123;"),
            '}' => escaped.push_str("&#125;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// State of the efficiency tab.
#[derive(Clone, Debug)]
pub enum EfficiencySection {
    /// No consultations sheet configured
    NotConfigured,

    /// The consultations sheet could not be used
    Unavailable(String),

    /// The benefits sheet lacks the unit or realized cost column
    MissingColumns,

    Rows(Vec<EfficiencyRow>),
}

/// Everything the page shows once the benefits sheet is loaded
///
/// Only the active tab's section is computed; the others stay `None`.
#[derive(Clone, Debug)]
pub struct LoadedPage {
    pub options: FilterOptions,
    pub warnings: Vec<String>,
    pub columns: BenefitColumns,
    pub filtered_records: usize,
    /// Header and raw cells of the rows that passed the filters
    pub filtered_table: (Vec<String>, Vec<Vec<String>>),
    pub kpis: Kpis,
    pub matrix: Option<Matrix>,
    pub efficiency: Option<EfficiencySection>,
    pub search: Option<SearchResult>,
}

/// Data for one render of the dashboard page.
#[derive(Clone, Debug)]
pub struct DashboardPage {
    pub username: String,
    pub query: DashboardQuery,
    /// When the benefits sheet was fetched, already formatted
    pub fetched_at: Option<String>,
    /// `None` when the benefits sheet failed to load
    pub loaded: Option<LoadedPage>,
}

/// Render the dashboard page from the `dashboard.html` template.
pub fn render_dashboard(page: &DashboardPage) -> String {
    let template = include_str!("./static/dashboard.html");
    let tab = page.query.tab();

    let (filters, content) = match &page.loaded {
        Some(loaded) => (
            render_filters(&page.query, &loaded.options),
            render_loaded(page, loaded, tab),
        ),
        None => (
            String::new(),
            "<div class=\"alert error\">Não foi possível carregar os dados. \
             Verifique a planilha configurada e tente atualizar.</div>"
                .to_string(),
        ),
    };

    let updated = page
        .fetched_at
        .as_deref()
        .map(|at| format!("Dados de {}", escape_html(at)))
        .unwrap_or_default();

    template
        .replace("{{tabs}}", &render_tabs(&page.query, tab))
        .replace("{{filters}}", &filters)
        .replace("{{content}}", &content)
        .replace("{{updated}}", &updated)
        .replace("{{username}}", &escape_html(&page.username))
}

fn render_tabs(query: &DashboardQuery, active: Tab) -> String {
    let mut html = String::from("<nav class=\"tabs\">");
    for tab in Tab::ALL {
        let class = if tab == active { " class=\"active\"" } else { "" };
        let _ = write!(
            html,
            "<a href=\"{}\"{}>{}</a>",
            escape_html(&query.tab_link(tab)),
            class,
            tab.label()
        );
    }
    html.push_str("</nav>");
    html
}

fn hidden(name: &str, value: &str) -> String {
    format!(
        "<input type=\"hidden\" name=\"{}\" value=\"{}\">",
        name,
        escape_html(value)
    )
}

fn render_filters(query: &DashboardQuery, options: &FilterOptions) -> String {
    let filters = query.filters();
    let mut html = String::from("<form class=\"filters\" method=\"get\" action=\"/\"><h2>Filtros</h2>");
    html.push_str(&hidden("tab", query.tab().key()));
    for (key, value) in [("rows", &query.rows), ("cols", &query.cols), ("measure", &query.measure)] {
        if let Some(value) = value {
            html.push_str(&hidden(key, value));
        }
    }

    for dim in Dimension::ALL {
        let values = options.values(dim);
        if values.is_empty() {
            continue;
        }
        let selected = filters.selection(dim);
        let _ = write!(
            html,
            "<label>{}<select name=\"{}\" multiple size=\"{}\">",
            dim.label(),
            dim.key(),
            values.len().min(6)
        );
        for value in values {
            let mark = if selected.contains(value) { " selected" } else { "" };
            let _ = write!(
                html,
                "<option value=\"{v}\"{}>{v}</option>",
                mark,
                v = escape_html(value)
            );
        }
        html.push_str("</select></label>");
    }

    html.push_str("<button type=\"submit\">Aplicar</button>");
    if filters.is_active() {
        let _ = write!(html, " <a href=\"/?tab={}\">Limpar</a>", query.tab().key());
    }
    html.push_str("</form>");
    html
}

fn render_loaded(page: &DashboardPage, loaded: &LoadedPage, tab: Tab) -> String {
    let mut html = String::new();
    for warning in &loaded.warnings {
        let _ = write!(html, "<div class=\"alert warning\">{}</div>", escape_html(warning));
    }

    let section = match tab {
        Tab::Overview => render_overview(&page.query, loaded),
        Tab::Matrix => render_matrix(&page.query, loaded.matrix.as_ref()),
        Tab::Efficiency => match &loaded.efficiency {
            Some(section) => render_efficiency(&page.query, section),
            None => String::new(),
        },
        Tab::Search => render_search(&page.query, loaded.search.as_ref()),
    };
    html.push_str(&section);
    html
}

fn card(label: &str, value: &str) -> String {
    format!(
        "<div class=\"card\"><span class=\"label\">{}</span><span class=\"value\">{}</span></div>",
        label,
        escape_html(value)
    )
}

fn render_overview(query: &DashboardQuery, loaded: &LoadedPage) -> String {
    let k = &loaded.kpis;
    let mut html = String::from("<section><h2>Visão Geral</h2><div class=\"cards\">");

    let has_budget = loaded.columns.has_measure(Measure::Budgeted);
    let has_realized = loaded.columns.has_measure(Measure::Realized);
    if has_budget {
        html.push_str(&card("Custo Orçado", &format_brl(k.total_budgeted)));
    }
    if has_realized {
        html.push_str(&card("Custo Realizado", &format_brl(k.total_realized)));
    }
    if has_budget && has_realized {
        html.push_str(&card("Saldo", &format_brl(k.variance)));
        if let Some(pct) = k.execution_pct {
            html.push_str(&card("Execução do orçamento", &format_percent(pct)));
        }
    }
    if has_realized {
        if let Some(pct) = k.annual_consumption_pct {
            html.push_str(&card("Consumo do orçamento anual", &format_percent(pct)));
        }
        html.push_str(&card("Custo médio por registro", &format_brl(k.average_realized)));
    }
    if let Some(lives) = k.lives {
        html.push_str(&card("Total de Vidas", &lives.to_string()));
    }
    html.push_str(&card("Registros", &k.records.to_string()));
    html.push_str(&card("Unidades", &k.units.to_string()));
    html.push_str(&card("Benefícios", &k.benefits.to_string()));
    html.push_str("</div>");

    if !k.by_status.is_empty() {
        html.push_str("<ul class=\"status\">");
        for (status, count) in &k.by_status {
            let _ = write!(html, "<li>{}: <strong>{}</strong></li>", escape_html(status), count);
        }
        html.push_str("</ul>");
    }

    if loaded.filtered_records == 0 {
        html.push_str("<p class=\"muted\">Nenhum registro para os filtros selecionados.</p>");
    }

    let overview_charts = [
        ChartKind::BudgetByMonth,
        ChartKind::RealizedByBenefit,
        ChartKind::RealizedByUnit,
    ];
    let charts: Vec<ChartKind> = overview_charts
        .into_iter()
        .filter(|kind| kind.is_available(&loaded.columns))
        .collect();
    if !charts.is_empty() {
        html.push_str("<div class=\"charts\">");
        let filters = query.filter_query();
        for kind in charts {
            let _ = write!(
                html,
                "<img src=\"/chart/{}.svg?{}\" alt=\"{}\">",
                kind.name(),
                escape_html(&filters),
                kind.title()
            );
        }
        html.push_str("</div>");
    }

    html.push_str(&render_filtered_table(&loaded.filtered_table));
    html.push_str("</section>");
    html
}

fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut html = String::from("<table><thead><tr>");
    for header in headers {
        let _ = write!(html, "<th>{}</th>", escape_html(header));
    }
    html.push_str("</tr></thead><tbody>");
    for row in rows {
        html.push_str("<tr>");
        for cell in row {
            let _ = write!(html, "<td>{}</td>", escape_html(cell));
        }
        html.push_str("</tr>");
    }
    html.push_str("</tbody></table>");
    html
}

/// Collapsible table with every raw row that passed the filters.
fn render_filtered_table((headers, rows): &(Vec<String>, Vec<Vec<String>>)) -> String {
    if rows.is_empty() {
        return String::new();
    }
    format!(
        "<details class=\"raw\"><summary>Visualizar base de dados completa (filtrada): {} registro(s)</summary>{}</details>",
        rows.len(),
        render_table(headers, rows)
    )
}

fn render_matrix(query: &DashboardQuery, matrix: Option<&Matrix>) -> String {
    let (rows, cols, measure) = query.matrix_axes();
    let mut html = String::from("<section><h2>Matriz</h2><form class=\"axes\" method=\"get\" action=\"/\">");
    html.push_str(&hidden("tab", Tab::Matrix.key()));
    for (key, value) in query.filter_pairs() {
        html.push_str(&hidden(key, value));
    }

    let select = |name: &str, current: &str, choices: Vec<(&str, &str)>| {
        let mut s = format!("<select name=\"{}\">", name);
        for (key, label) in choices {
            let mark = if key == current { " selected" } else { "" };
            let _ = write!(s, "<option value=\"{}\"{}>{}</option>", key, mark, label);
        }
        s.push_str("</select>");
        s
    };
    let dims = || Dimension::ALL.iter().map(|d| (d.key(), d.label())).collect::<Vec<_>>();
    let measures = Measure::ALL.iter().map(|m| (m.key(), m.label())).collect::<Vec<_>>();

    let _ = write!(
        html,
        "<label>Linhas {}</label><label>Colunas {}</label><label>Medida {}</label>\
         <button type=\"submit\">Atualizar</button></form>",
        select("rows", rows.key(), dims()),
        select("cols", cols.key(), dims()),
        select("measure", measure.key(), measures)
    );

    let Some(matrix) = matrix else {
        let _ = write!(
            html,
            "<div class=\"alert warning\">{}.</div></section>",
            escape_html(&missing_measure(measure))
        );
        return html;
    };

    let export = escape_html(&query.matrix_query());
    let _ = write!(
        html,
        "<p class=\"downloads\"><a href=\"/api/matrix.csv?{q}\">Baixar CSV</a> \
         <a href=\"/api/matrix.xlsx?{q}\">Baixar Excel</a></p>",
        q = export
    );

    if matrix.is_empty() {
        html.push_str("<p class=\"muted\">Nenhum registro para os filtros selecionados.</p></section>");
        return html;
    }

    let _ = write!(html, "<table class=\"matrix\"><thead><tr><th>{}</th>", matrix.row_dimension.label());
    for label in &matrix.column_labels {
        let _ = write!(html, "<th>{}</th>", escape_html(label));
    }
    html.push_str("<th>Total</th></tr></thead><tbody>");

    for (r, label) in matrix.row_labels.iter().enumerate() {
        let _ = write!(html, "<tr><th>{}</th>", escape_html(label));
        for (c, value) in matrix.cells[r].iter().enumerate() {
            let shade = matrix.intensity(r, c);
            let rgb = if *value < 0.0 { "229, 57, 53" } else { "33, 150, 243" };
            let _ = write!(
                html,
                "<td style=\"background: rgba({}, {:.2})\">{}</td>",
                rgb,
                0.08 + 0.6 * shade,
                format_number(*value)
            );
        }
        let _ = write!(html, "<td class=\"total\">{}</td></tr>", format_number(matrix.row_totals[r]));
    }

    html.push_str("</tbody><tfoot><tr><th>Total</th>");
    for total in &matrix.column_totals {
        let _ = write!(html, "<td>{}</td>", format_number(*total));
    }
    let _ = write!(
        html,
        "<td class=\"total\">{}</td></tr></tfoot></table></section>",
        format_number(matrix.grand_total)
    );
    html
}

fn render_efficiency(query: &DashboardQuery, section: &EfficiencySection) -> String {
    let mut html = String::from("<section><h2>Eficiência por unidade</h2>");
    let rows = match section {
        EfficiencySection::NotConfigured => {
            html.push_str(
                "<p class=\"muted\">Nenhuma planilha de consultas configurada.</p></section>",
            );
            return html;
        }
        EfficiencySection::Unavailable(message) => {
            let _ = write!(
                html,
                "<div class=\"alert warning\">Planilha de consultas indisponível: {}</div></section>",
                escape_html(message)
            );
            return html;
        }
        EfficiencySection::MissingColumns => {
            let _ = write!(
                html,
                "<div class=\"alert warning\">{}</div></section>",
                EFFICIENCY_COLUMNS_MISSING
            );
            return html;
        }
        EfficiencySection::Rows(rows) => rows,
    };

    let _ = write!(
        html,
        "<div class=\"charts\"><img src=\"/chart/{}.svg?{}\" alt=\"{}\"></div>",
        ChartKind::Efficiency.name(),
        escape_html(&query.filter_query()),
        ChartKind::Efficiency.title()
    );

    html.push_str(
        "<table><thead><tr><th>Unidade</th><th>Custo</th><th>Vidas</th><th>Consultas</th>\
         <th>Custo per capita</th><th>Consultas por vida</th><th>Quadrante</th></tr></thead><tbody>",
    );
    let dash = || "-".to_string();
    for row in rows {
        let _ = write!(
            html,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            escape_html(&row.unit),
            format_brl(row.cost),
            row.lives.map(format_number).unwrap_or_else(dash),
            format_number(row.consultations),
            row.per_capita.map(format_brl).unwrap_or_else(dash),
            row.utilization.map(format_number).unwrap_or_else(dash),
            row.quadrant.map(|q| q.label()).unwrap_or("-")
        );
    }
    html.push_str("</tbody></table></section>");
    html
}

fn render_search(query: &DashboardQuery, result: Option<&SearchResult>) -> String {
    let mut html = String::from("<section><h2>Localizar Colaborador</h2><form class=\"search\" method=\"get\" action=\"/\">");
    html.push_str(&hidden("tab", Tab::Search.key()));
    let _ = write!(
        html,
        "<input type=\"search\" name=\"q\" value=\"{}\" placeholder=\"Nome, e-mail ou ID\">\
         <button type=\"submit\">Buscar</button></form>",
        escape_html(query.search_text())
    );

    let Some(result) = result else {
        html.push_str("</section>");
        return html;
    };

    if !result.available {
        html.push_str(
            "<div class=\"alert warning\">A planilha não tem colunas de nome, e-mail ou ID para busca.</div></section>",
        );
        return html;
    }
    if query.search_text().is_empty() {
        html.push_str("</section>");
        return html;
    }
    if result.rows.is_empty() {
        html.push_str(
            "<div class=\"alert warning\">Nenhum colaborador encontrado com esses dados.</div></section>",
        );
        return html;
    }

    let _ = write!(
        html,
        "<p>{} colaborador(es) encontrado(s) em {} registro(s).</p>",
        result.collaborators,
        result.rows.len()
    );
    html.push_str(&render_table(&result.headers, &result.rows));
    html.push_str("</section>");
    html
}

/// Render the login page with an optional error message.
pub fn render_login(error: Option<&str>) -> String {
    let banner = error
        .filter(|message| !message.trim().is_empty())
        .map(|message| format!("<div class=\"alert error\">{}</div>", escape_html(message)))
        .unwrap_or_default();

    include_str!("./static/login.html").replace("{{error}}", &banner)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(pairs: &[(&str, &str)]) -> DashboardQuery {
        use axum::extract::FromRequestParts;
        use axum::http::Request;

        let request = Request::builder()
            .uri(format!("/?{}", encode_pairs(pairs)))
            .body(())
            .unwrap();
        let (mut parts, _) = request.into_parts();
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let axum_extra::extract::Query(q) = runtime
            .block_on(axum_extra::extract::Query::<DashboardQuery>::from_request_parts(
                &mut parts,
                &(),
            ))
            .unwrap();
        q
    }

    #[test]
    fn repeated_keys_become_selections() {
        let q = query(&[("month", "Jan"), ("month", "Fev"), ("unit", "São Paulo")]);
        let filters = q.filters();

        assert_eq!(filters.months, vec!["Jan", "Fev"]);
        assert_eq!(filters.units, vec!["São Paulo"]);
        assert!(filters.benefits.is_empty());
        assert_eq!(q.tab(), Tab::Overview);
    }

    #[test]
    fn matrix_axes_default_and_never_collide() {
        let default = DashboardQuery::default().matrix_axes();
        assert_eq!(default, (Dimension::Benefit, Dimension::Month, Measure::Realized));

        let same = DashboardQuery {
            rows: Some("unit".to_string()),
            cols: Some("unit".to_string()),
            measure: Some("variance".to_string()),
            ..DashboardQuery::default()
        };
        assert_eq!(same.matrix_axes(), (Dimension::Unit, Dimension::Month, Measure::Variance));
    }

    #[test]
    fn links_keep_filters_encoded() {
        let q = DashboardQuery {
            unit: vec!["Rio & Cia".to_string()],
            q: Some("ana".to_string()),
            ..DashboardQuery::default()
        };

        assert_eq!(q.filter_query(), "unit=Rio%20%26%20Cia");
        assert_eq!(q.tab_link(Tab::Matrix), "/?tab=matrix&unit=Rio%20%26%20Cia&q=ana");
        assert!(q.matrix_query().ends_with("rows=benefit&cols=month&measure=realized"));
    }

    #[test]
    fn failed_load_shows_the_banner() {
        let page = DashboardPage {
            username: "admin".to_string(),
            query: DashboardQuery::default(),
            fetched_at: None,
            loaded: None,
        };
        let html = render_dashboard(&page);

        assert!(html.contains("Não foi possível carregar os dados"));
        assert!(!html.contains("{{"));
    }

    #[test]
    fn user_text_cannot_expand_placeholders() {
        let page = DashboardPage {
            username: "{{content}}".to_string(),
            query: DashboardQuery::default(),
            fetched_at: Some("{{filters}}".to_string()),
            loaded: None,
        };
        let html = render_dashboard(&page);

        assert!(html.contains("&#123;&#123;content&#125;&#125;"));
        assert!(!html.contains("{{"));
        assert_eq!(html.matches("Não foi possível carregar os dados").count(), 1);
    }

    #[test]
    fn login_error_is_escaped() {
        let html = render_login(Some("<script>"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(!render_login(None).contains("{{error}}"));
    }
}
