use dashsync::SourceSpec;
use dashsync_store::SourcesDocument;

use super::format;

pub fn run(document: &SourcesDocument) {
    let rows: Vec<(String, String)> = document
        .sources
        .iter()
        .map(|spec| (spec.display_name().to_owned(), describe(spec)))
        .collect();
    format::print_listing("Sources", &rows);

    match &document.last_updated {
        Some(at) => println!("\nLast full sync: {at}"),
        None => println!("\nNever synced."),
    }
}

fn describe(spec: &SourceSpec) -> String {
    let connector = spec
        .resolve()
        .map(|(id, _)| id)
        .unwrap_or_else(|| "<unknown connector>".into());
    let mut line = connector;
    if let Some(handler) = spec.handler() {
        line.push_str(&format!(" | handler {handler}"));
    }
    if !spec.active {
        line.push_str(" | inactive");
    }
    line
}
