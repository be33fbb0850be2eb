use anyhow::{Context, Result};
use dashsync_store::{Pages, list_chart_modules, resolve_chart_data};

use crate::workspace::Workspace;

/// Page shown when no pages are configured; it holds every chart module.
const DEFAULT_PAGE: &str = "Dashboard";

pub fn run(workspace: &Workspace) {
    let links = workspace.documents.load_chart_links();
    let titles = workspace.documents.load_titles();
    let modules = list_chart_modules(&workspace.charts_dir);

    for (page, charts) in page_layout(&workspace.documents.load_pages(), modules) {
        println!("{page} ({})", charts.len());
        for chart in &charts {
            println!("  {} [{chart}]", titles.display_name(chart));
            let paths = resolve_chart_data(&links, &workspace.data, chart);
            if paths.is_empty() {
                println!("    (no data)");
            }
            for path in paths {
                println!("    {}", path.display());
            }
        }
    }
}

/// Link `chart` to `files`, or forget its links when `files` is empty.
pub fn link(workspace: &Workspace, chart: &str, files: Vec<String>) -> Result<()> {
    let mut links = workspace.documents.load_chart_links();

    if files.is_empty() {
        links.unlink(chart);
        println!("{chart}: unlinked");
    } else {
        if !workspace.charts_dir.join(chart).is_file() {
            eprintln!("warning: no chart module named {chart}");
        }
        for file in &files {
            if !workspace.data.artifact_path(file).is_ok_and(|p| p.is_file()) {
                eprintln!("warning: {file} is not in the data directory yet");
            }
        }
        println!("{chart}: linked to {}", files.join(", "));
        links.link(chart, files);
    }

    workspace
        .documents
        .save_chart_links(&links)
        .context("failed to save chart links")
}

fn page_layout(pages: &Pages, modules: Vec<String>) -> Vec<(String, Vec<String>)> {
    if pages.is_empty() {
        return vec![(DEFAULT_PAGE.to_owned(), modules)];
    }
    pages
        .iter()
        .map(|(page, charts)| {
            (
                page.to_owned(),
                charts.into_iter().map(str::to_owned).collect(),
            )
        })
        .collect()
}
