#![cfg(feature = "web")]
use plotters::coord::Shift;
use plotters::element::Pie;
use plotters::prelude::*;
use plotters::series::DashedLineSeries;
use plotters::style::full_palette;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::collections::HashMap;

use crate::benefits::{BenefitColumns, BenefitRecord, Dimension, Measure};
use crate::efficiency::EfficiencyRow;
use crate::error::{DashboardError, Result};
use crate::pivot::group_sum;

type DrawResult = std::result::Result<(), Box<dyn std::error::Error>>;

const PALETTE: [RGBColor; 10] = [
    full_palette::BLUE_700,
    full_palette::ORANGE_500,
    full_palette::TEAL_500,
    full_palette::PURPLE_400,
    full_palette::GREEN_600,
    full_palette::AMBER_600,
    full_palette::INDIGO_400,
    full_palette::PINK_300,
    full_palette::BROWN_400,
    full_palette::CYAN_600,
];

/// Charts served by the dashboard
///
/// Each kind maps to one `/chart/<name>.svg` route.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChartKind {
    /// Budgeted vs. realized per month, grouped bars
    BudgetByMonth,

    /// Realized cost per benefit, bars
    RealizedByBenefit,

    /// Share of realized cost per unit, pie
    RealizedByUnit,

    /// Per-capita cost vs. utilization per unit, scatter
    Efficiency,
}

impl ChartKind {
    pub const ALL: [ChartKind; 4] = [
        ChartKind::BudgetByMonth,
        ChartKind::RealizedByBenefit,
        ChartKind::RealizedByUnit,
        ChartKind::Efficiency,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ChartKind::BudgetByMonth => "budget_by_month",
            ChartKind::RealizedByBenefit => "realized_by_benefit",
            ChartKind::RealizedByUnit => "realized_by_unit",
            ChartKind::Efficiency => "efficiency",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    pub fn title(&self) -> &'static str {
        match self {
            ChartKind::BudgetByMonth => "Orçado x Realizado por mês",
            ChartKind::RealizedByBenefit => "Custo realizado por benefício",
            ChartKind::RealizedByUnit => "Participação por unidade",
            ChartKind::Efficiency => "Custo per capita x utilização",
        }
    }

    /// Whether the sheet has the columns this chart plots
    ///
    /// # Examples
    /// ```
    /// use benefits_dashboard::benefits::BenefitColumns;
    /// use benefits_dashboard::graph::ChartKind;
    ///
    /// let columns = BenefitColumns {
    ///     unit: Some("Unidade".into()),
    ///     realized: Some("Custo".into()),
    ///     ..Default::default()
    /// };
    /// assert!(ChartKind::RealizedByUnit.is_available(&columns));
    /// assert!(!ChartKind::BudgetByMonth.is_available(&columns));
    /// ```
    pub fn is_available(&self, columns: &BenefitColumns) -> bool {
        match self {
            ChartKind::BudgetByMonth => columns.month.is_some() && columns.has_costs(),
            ChartKind::RealizedByBenefit => {
                columns.benefit.is_some() && columns.has_measure(Measure::Realized)
            }
            ChartKind::RealizedByUnit | ChartKind::Efficiency => {
                columns.unit.is_some() && columns.has_measure(Measure::Realized)
            }
        }
    }
}

/// Configuration options for chart generation
#[derive(Clone, Debug)]
pub struct ChartOptions {
    /// Title displayed at the top of the chart
    pub title: String,

    /// Label for the X-axis
    pub x_label: String,

    /// Label for the Y-axis
    pub y_label: String,

    /// Width of the chart in pixels
    pub width: u32,

    /// Height of the chart in pixels
    pub height: u32,
}

impl Default for ChartOptions {
    fn default() -> Self {
        Self {
            title: String::new(),
            x_label: String::new(),
            y_label: String::new(),
            width: 800,
            height: 400,
        }
    }
}

impl ChartOptions {
    fn titled(title: &str) -> Self {
        Self {
            title: title.to_string(),
            ..Self::default()
        }
    }
}

/// One named series of a bar chart, aligned with the chart's labels.
#[derive(Clone, Debug)]
pub struct BarSeries {
    pub name: String,
    pub values: Vec<f64>,
}

/// A labelled point of a scatter chart.
#[derive(Clone, Debug)]
pub struct ScatterPoint {
    pub label: String,
    pub x: f64,
    pub y: f64,
}

fn chart_error<E: std::fmt::Display>(e: E) -> DashboardError {
    DashboardError::Chart(e.to_string())
}

/// Draw onto an in-memory SVG document and return its text.
fn render<F>(options: &ChartOptions, draw: F) -> Result<String>
where
    F: FnOnce(&DrawingArea<SVGBackend<'_>, Shift>) -> DrawResult,
{
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (options.width, options.height))
            .into_drawing_area();
        root.fill(&WHITE).map_err(chart_error)?;
        draw(&root).map_err(chart_error)?;
        root.present().map_err(chart_error)?;
    }
    Ok(svg)
}

/// Axis label for an amount: `1,2M`, `35k`, `870`.
fn compact(value: f64) -> String {
    let abs = value.abs();
    let text = if abs >= 1_000_000.0 {
        format!("{:.1}M", value / 1_000_000.0)
    } else if abs >= 1_000.0 {
        format!("{:.0}k", value / 1_000.0)
    } else {
        format!("{:.0}", value)
    };
    text.replace('.', ",")
}

/// Placeholder shown when a chart has nothing to plot.
pub fn empty_chart(title: &str) -> Result<String> {
    let options = ChartOptions::titled(title);
    let (width, height) = (options.width as i32, options.height as i32);

    render(&options, |root| {
        let caption = TextStyle::from(("sans-serif", 22).into_font())
            .pos(Pos::new(HPos::Center, VPos::Top));
        root.draw(&Text::new(options.title.clone(), (width / 2, 10), caption))?;

        let message = TextStyle::from(("sans-serif", 20).into_font())
            .color(&full_palette::GREY_500)
            .pos(Pos::new(HPos::Center, VPos::Center));
        root.draw(&Text::new("Sem dados", (width / 2, height / 2), message))?;
        Ok(())
    })
}

/// Create a bar chart with one bar group per label
///
/// Several series are drawn side by side inside each group and named in a
/// legend. Negative values extend below the zero line.
///
/// # Arguments
/// * `options` - Title, axis descriptions and size
/// * `labels` - Category of each group
/// * `series` - Values per series, one per label
///
/// # Returns
/// * `Result<String>` - SVG document
pub fn bar_chart(options: &ChartOptions, labels: &[String], series: &[BarSeries]) -> Result<String> {
    if labels.is_empty() || series.is_empty() {
        return empty_chart(&options.title);
    }

    let all = series.iter().flat_map(|s| s.values.iter().copied());
    let (min, max) = all.fold((0.0_f64, 0.0_f64), |(lo, hi), v| (lo.min(v), hi.max(v)));
    let pad = ((max - min) * 0.1).max(1.0);
    let y_min = if min < 0.0 { min - pad } else { 0.0 };
    let y_range = y_min..max + pad;
    let x_range = -0.5..labels.len() as f64 - 0.5;

    let label_at = |x: &f64| {
        let i = x.round();
        if (x - i).abs() > 1e-6 || i < 0.0 {
            return String::new();
        }
        labels.get(i as usize).cloned().unwrap_or_default()
    };
    let amount = |y: &f64| compact(*y);

    render(options, |root| {
        let mut chart = ChartBuilder::on(root)
            .caption(&options.title, ("sans-serif", 22).into_font())
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(x_range, y_range)?;

        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(labels.len())
            .x_label_formatter(&label_at)
            .y_label_formatter(&amount)
            .x_desc(&options.x_label)
            .y_desc(&options.y_label)
            .draw()?;

        let width = 0.8 / series.len() as f64;
        for (s, serie) in series.iter().enumerate() {
            let color = PALETTE[s % PALETTE.len()];
            chart
                .draw_series(serie.values.iter().enumerate().map(|(i, value)| {
                    let x0 = i as f64 - 0.4 + s as f64 * width;
                    Rectangle::new([(x0, 0.0), (x0 + width, *value)], color.filled())
                }))?
                .label(serie.name.as_str())
                .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled()));
        }

        if series.len() > 1 {
            chart
                .configure_series_labels()
                .background_style(&WHITE.mix(0.8))
                .border_style(&BLACK)
                .draw()?;
        }
        Ok(())
    })
}

/// Create a pie chart of each label's share of the total
///
/// Non-positive slices are left out since they have no share to show.
pub fn pie_chart(options: &ChartOptions, slices: &[(String, f64)]) -> Result<String> {
    let (labels, sizes): (Vec<String>, Vec<f64>) = slices
        .iter()
        .filter(|(_, value)| *value > 0.0)
        .cloned()
        .unzip();
    if sizes.is_empty() {
        return empty_chart(&options.title);
    }

    let colors: Vec<RGBColor> = (0..sizes.len()).map(|i| PALETTE[i % PALETTE.len()]).collect();
    let center = (options.width as i32 / 2, options.height as i32 / 2 + 15);
    let radius = (options.height.min(options.width) as f64 / 2.0 - 60.0).max(20.0);

    render(options, |root| {
        let caption = TextStyle::from(("sans-serif", 22).into_font())
            .pos(Pos::new(HPos::Center, VPos::Top));
        root.draw(&Text::new(options.title.clone(), (center.0, 10), caption))?;

        let mut pie = Pie::new(&center, &radius, &sizes, &colors, &labels);
        pie.start_angle(-90.0);
        pie.label_style(("sans-serif", 14).into_font());
        pie.percentages(("sans-serif", 12).into_font().color(&WHITE));
        root.draw(&pie)?;
        Ok(())
    })
}

/// Create a scatter chart of labelled points
///
/// Dashed guides mark the mean of each axis, splitting the plot into the
/// four efficiency quadrants.
pub fn scatter_chart(options: &ChartOptions, points: &[ScatterPoint]) -> Result<String> {
    if points.is_empty() {
        return empty_chart(&options.title);
    }

    let n = points.len() as f64;
    let mean_x = points.iter().map(|p| p.x).sum::<f64>() / n;
    let mean_y = points.iter().map(|p| p.y).sum::<f64>() / n;
    let max_x = points.iter().map(|p| p.x).fold(0.0_f64, f64::max) * 1.15 + 1e-9;
    let max_y = points.iter().map(|p| p.y).fold(0.0_f64, f64::max) * 1.15 + 1e-9;

    render(options, |root| {
        let mut chart = ChartBuilder::on(root)
            .caption(&options.title, ("sans-serif", 22).into_font())
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(50)
            .build_cartesian_2d(0.0..max_x, 0.0..max_y)?;

        chart
            .configure_mesh()
            .x_label_formatter(&|x| compact(*x))
            .x_desc(&options.x_label)
            .y_desc(&options.y_label)
            .draw()?;

        let guide = full_palette::GREY_500.stroke_width(1);
        chart.draw_series(DashedLineSeries::new(
            vec![(mean_x, 0.0), (mean_x, max_y)],
            6,
            4,
            guide,
        ))?;
        chart.draw_series(DashedLineSeries::new(
            vec![(0.0, mean_y), (max_x, mean_y)],
            6,
            4,
            guide,
        ))?;

        chart.draw_series(points.iter().map(|p| {
            EmptyElement::at((p.x, p.y))
                + Circle::new((0, 0), 5, PALETTE[0].filled())
                + Text::new(p.label.clone(), (8, -6), ("sans-serif", 12).into_font())
        }))?;
        Ok(())
    })
}

/// Render one of the dashboard charts from the filtered data
///
/// A chart whose columns are missing from the sheet renders the placeholder.
///
/// # Arguments
/// * `kind` - Which chart to draw
/// * `columns` - Columns detected in the benefits sheet
/// * `records` - Benefit records that passed the filters
/// * `efficiency` - Efficiency rows, used by [`ChartKind::Efficiency`] only
pub fn render_chart(
    kind: ChartKind,
    columns: &BenefitColumns,
    records: &[BenefitRecord],
    efficiency: &[EfficiencyRow],
) -> Result<String> {
    if !kind.is_available(columns) {
        return empty_chart(kind.title());
    }
    let mut options = ChartOptions::titled(kind.title());

    match kind {
        ChartKind::BudgetByMonth => {
            let labels: Vec<String> = group_sum(records, Dimension::Month, Measure::Realized)
                .into_iter()
                .map(|(label, _)| label)
                .collect();

            let series: Vec<BarSeries> = [(Measure::Budgeted, "Orçado"), (Measure::Realized, "Realizado")]
                .into_iter()
                .filter(|(measure, _)| columns.has_measure(*measure))
                .map(|(measure, name)| {
                    let totals: HashMap<String, f64> =
                        group_sum(records, Dimension::Month, measure).into_iter().collect();
                    BarSeries {
                        name: name.to_string(),
                        values: labels
                            .iter()
                            .map(|l| totals.get(l).copied().unwrap_or(0.0))
                            .collect(),
                    }
                })
                .collect();
            options.y_label = "R$".to_string();
            bar_chart(&options, &labels, &series)
        }
        ChartKind::RealizedByBenefit => {
            let groups = group_sum(records, Dimension::Benefit, Measure::Realized);
            let (labels, values): (Vec<String>, Vec<f64>) = groups.into_iter().unzip();
            options.y_label = "R$".to_string();
            bar_chart(
                &options,
                &labels,
                &[BarSeries {
                    name: "Realizado".to_string(),
                    values,
                }],
            )
        }
        ChartKind::RealizedByUnit => {
            pie_chart(&options, &group_sum(records, Dimension::Unit, Measure::Realized))
        }
        ChartKind::Efficiency => {
            let points: Vec<ScatterPoint> = efficiency
                .iter()
                .filter_map(|row| {
                    Some(ScatterPoint {
                        label: row.unit.clone(),
                        x: row.per_capita?,
                        y: row.utilization?,
                    })
                })
                .collect();
            options.x_label = "Custo per capita (R$)".to_string();
            options.y_label = "Consultas por vida".to_string();
            scatter_chart(&options, &points)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(month: &str, unit: &str, budgeted: f64, realized: f64) -> BenefitRecord {
        BenefitRecord {
            month: Some(month.to_string()),
            unit: Some(unit.to_string()),
            benefit: Some("Odonto".to_string()),
            budgeted,
            realized,
            ..BenefitRecord::default()
        }
    }

    fn all_columns() -> BenefitColumns {
        let named = |name: &str| Some(name.to_string());
        BenefitColumns {
            month: named("Mês"),
            unit: named("Unidade"),
            benefit: named("Benefício"),
            budgeted: named("Custo Orçado"),
            realized: named("Custo Realizado"),
            ..BenefitColumns::default()
        }
    }

    #[test]
    fn chart_names_round_trip() {
        for kind in ChartKind::ALL {
            assert_eq!(ChartKind::parse(kind.name()), Some(kind));
        }
        assert_eq!(ChartKind::parse("nope"), None);
    }

    #[test]
    fn compact_amounts() {
        assert_eq!(compact(1_250_000.0), "1,2M");
        assert_eq!(compact(35_400.0), "35k");
        assert_eq!(compact(870.0), "870");
    }

    #[test]
    fn bar_chart_renders_series_in_the_legend() {
        let records = vec![
            record("Jan", "SP", 100.0, 90.0),
            record("Fev", "RJ", 100.0, 130.0),
        ];
        let svg = render_chart(ChartKind::BudgetByMonth, &all_columns(), &records, &[]).unwrap();

        assert!(svg.starts_with("<svg"));
        assert_eq!(svg.matches("Orçado").count(), 2);
        assert!(svg.contains("Realizado"));
        assert!(!svg.contains("Sem dados"));
    }

    #[test]
    fn missing_budget_column_drops_its_series() {
        let columns = BenefitColumns {
            budgeted: None,
            ..all_columns()
        };
        let records = vec![record("Jan", "SP", 0.0, 90.0)];
        let svg = render_chart(ChartKind::BudgetByMonth, &columns, &records, &[]).unwrap();

        assert!(!svg.contains("Sem dados"));
        // only the title, no legend entry
        assert_eq!(svg.matches("Orçado").count(), 1);
    }

    #[test]
    fn missing_dimension_disables_the_chart() {
        let columns = BenefitColumns {
            month: None,
            ..all_columns()
        };
        let records = vec![record("Jan", "SP", 100.0, 90.0)];

        let svg = render_chart(ChartKind::BudgetByMonth, &columns, &records, &[]).unwrap();
        assert!(svg.contains("Sem dados"));
        assert!(!svg.contains("Não informado"));

        let pie = render_chart(ChartKind::RealizedByUnit, &columns, &records, &[]).unwrap();
        assert!(!pie.contains("Sem dados"));
    }

    #[test]
    fn pie_chart_labels_each_unit() {
        let records = vec![record("Jan", "SP", 0.0, 70.0), record("Jan", "RJ", 0.0, 30.0)];
        let svg = render_chart(ChartKind::RealizedByUnit, &all_columns(), &records, &[]).unwrap();

        assert!(svg.contains("SP"));
        assert!(svg.contains("RJ"));
    }

    #[test]
    fn scatter_chart_labels_points() {
        let points = vec![
            ScatterPoint { label: "Alpha".to_string(), x: 100.0, y: 0.5 },
            ScatterPoint { label: "Beta".to_string(), x: 50.0, y: 1.5 },
        ];
        let svg = scatter_chart(&ChartOptions::titled("t"), &points).unwrap();

        assert!(svg.contains("Alpha"));
        assert!(svg.contains("Beta"));
    }

    #[test]
    fn nothing_to_plot_renders_a_placeholder() {
        for kind in ChartKind::ALL {
            let svg = render_chart(kind, &all_columns(), &[], &[]).unwrap();
            assert!(svg.contains("Sem dados"), "{:?}", kind);
        }
    }
}
