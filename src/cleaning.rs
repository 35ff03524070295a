use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref WHITESPACE_REGEX: Regex = Regex::new(r"\s+").unwrap();
}

/// Normalize a label for fuzzy comparison
///
/// Lowercases the text, strips diacritics (both precomposed characters such as
/// `ç`/`ã` and combining marks), collapses runs of whitespace and trims.
///
/// # Examples
/// ```
/// use benefits_dashboard::cleaning::normalize_text;
///
/// assert_eq!(normalize_text("  Custo   Orçado "), "custo orcado");
/// assert_eq!(normalize_text("Mês"), "mes");
/// ```
pub fn normalize_text(text: &str) -> String {
    let folded: String = text
        .to_lowercase()
        .chars()
        .filter(|c| !is_combining_mark(*c))
        .map(fold_char)
        .collect();

    WHITESPACE_REGEX
        .replace_all(folded.trim(), " ")
        .into_owned()
}

fn is_combining_mark(c: char) -> bool {
    ('\u{0300}'..='\u{036f}').contains(&c)
}

fn fold_char(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ã' | 'ä' | 'å' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'ç' => 'c',
        'ñ' => 'n',
        'ý' | 'ÿ' => 'y',
        other => other,
    }
}

/// Convert a Brazilian currency string into a number
///
/// Applies a fixed sequence of replacements: drop the `R$` symbol, drop the
/// `.` thousands separator, turn the decimal comma into a dot and remove any
/// whitespace. Anything that still fails to parse is treated as zero.
///
/// # Arguments
/// * `raw` - Cell text as exported by the spreadsheet
///
/// # Returns
/// * `f64` - The parsed value, or `0.0` when the text is not a number
///
/// # Examples
/// ```
/// use benefits_dashboard::cleaning::parse_currency;
///
/// assert_eq!(parse_currency("R$ 1.234,56"), 1234.56);
/// assert_eq!(parse_currency("-R$ 10,00"), -10.0);
/// assert_eq!(parse_currency("n/d"), 0.0);
/// ```
pub fn parse_currency(raw: &str) -> f64 {
    let cleaned: String = raw
        .replace("R$", "")
        .replace('.', "")
        .replace(',', ".")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    match cleaned.parse::<f64>() {
        Ok(value) if value.is_finite() => value,
        _ => 0.0,
    }
}

/// Find the first column whose normalized name contains any search term
///
/// This is a single linear scan over `columns` in their original order; the
/// first column that matches any of the terms wins. Terms are normalized the
/// same way as column names, so `"orçado"` matches `"Custo Orcado"`.
///
/// # Arguments
/// * `columns` - Column names in sheet order
/// * `terms` - Substrings to look for
///
/// # Returns
/// * `Option<String>` - The original (un-normalized) column name, if any
///
/// # Examples
/// ```
/// use benefits_dashboard::cleaning::find_column;
///
/// let columns = vec!["Mês".to_string(), "Custo Orçado".to_string(), "Custo Realizado".to_string()];
/// assert_eq!(find_column(&columns, &["orçado"]), Some("Custo Orçado".to_string()));
/// assert_eq!(find_column(&columns, &["status"]), None);
/// ```
pub fn find_column<S: AsRef<str>>(columns: &[S], terms: &[&str]) -> Option<String> {
    find_column_excluding(columns, terms, &[])
}

/// Same as [`find_column`], skipping columns already claimed by another role.
pub fn find_column_excluding<S: AsRef<str>>(
    columns: &[S],
    terms: &[&str],
    taken: &[&str],
) -> Option<String> {
    let terms: Vec<String> = terms.iter().map(|t| normalize_text(t)).collect();

    columns
        .iter()
        .map(|c| c.as_ref())
        .filter(|c| !taken.contains(c))
        .find(|column| {
            let normalized = normalize_text(column);
            terms
                .iter()
                .any(|term| !term.is_empty() && normalized.contains(term.as_str()))
        })
        .map(str::to_string)
}

/// Exact (normalized) match, for short terms such as `id` that would
/// otherwise be found inside unrelated names like `Unidade`.
pub fn find_column_exact<S: AsRef<str>>(columns: &[S], terms: &[&str]) -> Option<String> {
    let terms: Vec<String> = terms.iter().map(|t| normalize_text(t)).collect();

    columns
        .iter()
        .map(|c| c.as_ref())
        .find(|column| terms.contains(&normalize_text(column)))
        .map(str::to_string)
}

/// Format a value as Brazilian Real, e.g. `R$ 1.234,56`
///
/// # Examples
/// ```
/// use benefits_dashboard::cleaning::format_brl;
///
/// assert_eq!(format_brl(1234.56), "R$ 1.234,56");
/// assert_eq!(format_brl(-12.0), "-R$ 12,00");
/// ```
pub fn format_brl(value: f64) -> String {
    let sign = if value < 0.0 && (value.abs() * 100.0).round() > 0.0 {
        "-"
    } else {
        ""
    };
    format!("{}R$ {}", sign, format_number(value.abs()))
}

/// Format a number with `.` thousands and `,` decimals (two places).
pub fn format_number(value: f64) -> String {
    let cents = (value.abs() * 100.0).round() as u64;
    let digits = (cents / 100).to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);

    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 && cents > 0 { "-" } else { "" };
    format!("{}{},{:02}", sign, grouped, cents % 100)
}

/// Format a percentage with one decimal place and a decimal comma.
pub fn format_percent(value: f64) -> String {
    format!("{:.1}%", value).replace('.', ",")
}
