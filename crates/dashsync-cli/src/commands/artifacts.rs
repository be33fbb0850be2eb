//! Manual work on files already in the data directory.

use anyhow::{Context, Result};
use dashsync::list_handlers;

use super::format;
use crate::workspace::Workspace;

pub fn list(workspace: &Workspace) -> Result<()> {
    let artifacts = workspace
        .data
        .list_artifacts()
        .with_context(|| format!("failed to list {}", workspace.data.root().display()))?;

    let rows: Vec<(String, String)> = artifacts
        .into_iter()
        .map(|a| {
            let note = if a.has_backup { "transformed, original kept" } else { "" };
            (a.filename, note.to_owned())
        })
        .collect();
    format::print_listing("Data files", &rows);
    Ok(())
}

pub fn handlers(workspace: &Workspace) {
    let rows: Vec<(String, String)> = list_handlers(workspace.transforms.handlers_dir())
        .into_iter()
        .map(|name| (name, String::new()))
        .collect();
    format::print_listing("Handlers", &rows);
}

pub async fn transform(workspace: &Workspace, filename: &str, handler: &str) -> Result<()> {
    let table = workspace
        .data
        .apply_handler(filename, handler, &workspace.transforms)
        .await
        .with_context(|| format!("{filename}: transform with {handler} failed"))?;

    println!("{filename}: OK ({} rows)", table.row_count());
    Ok(())
}

pub fn restore(workspace: &Workspace, filename: &str) -> Result<()> {
    workspace
        .data
        .restore(filename)
        .with_context(|| format!("{filename}: restore failed"))?;
    println!("{filename}: original restored");
    Ok(())
}

pub fn delete(workspace: &Workspace, filename: &str) -> Result<()> {
    workspace
        .data
        .delete(filename)
        .with_context(|| format!("{filename}: delete failed"))?;
    println!("{filename}: deleted");
    Ok(())
}
