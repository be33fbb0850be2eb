const MAX_NAME_WIDTH: usize = 35;
const LINE_BUDGET: usize = 90;

/// Print a titled two-column listing. The first column is padded to the
/// widest entry, the second is cut to fit the line.
pub fn print_listing(title: &str, rows: &[(String, String)]) {
    println!("{title} ({})", rows.len());

    let name_width = name_width(rows);
    let detail_budget = LINE_BUDGET.saturating_sub(2 + name_width + 2);

    for (name, detail) in rows {
        let name = truncate(name, name_width);
        let detail = truncate(detail, detail_budget);
        println!("  {:<width$}  {}", name, detail, width = name_width);
    }
}

fn name_width(rows: &[(String, String)]) -> usize {
    rows.iter()
        .map(|(name, _)| name.chars().count())
        .max()
        .unwrap_or(0)
        .min(MAX_NAME_WIDTH)
}

pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_owned()
    } else {
        let truncated: String = s.chars().take(max_len.saturating_sub(1)).collect();
        format!("{truncated}…")
    }
}
