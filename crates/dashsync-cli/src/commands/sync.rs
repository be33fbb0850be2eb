use std::collections::BTreeMap;

use anyhow::{Context, Result, bail};
use dashsync::artifact::with_default_extension;
use dashsync::coordinator::active_batch;
use dashsync::spec::SHEETS_CONNECTOR_ID;
use dashsync::{Feedback, GoogleCredentials, SourceSpec, SyncContext};
use dashsync_connectors::refresh_google_credentials;

use crate::workspace::Workspace;

/// Sync all active sources, or only the named ones, printing one line per
/// source as it finishes.
///
/// Returns the number of failed sources. `last_updated` is only stamped
/// when the whole active set was synced.
pub async fn run(workspace: &Workspace, filenames: &[String]) -> Result<usize> {
    let document = workspace.documents.load_sources();
    let full_batch = filenames.is_empty();
    let batch = select_batch(&document.sources, filenames)?;

    if batch.is_empty() {
        println!("No active sources to sync.");
        return Ok(0);
    }

    let mut ctx = SyncContext::new();
    if batch.values().any(uses_google)
        && let Some(credentials) = google_credentials(workspace).await
    {
        ctx = ctx.with_google(credentials);
    }

    println!("Syncing {} source(s)...", batch.len());
    let names: BTreeMap<usize, String> = batch
        .iter()
        .map(|(index, spec)| (*index, spec.display_name().to_owned()))
        .collect();
    let log = workspace
        .coordinator()
        .run(batch, &ctx, |index, result| {
            let name = names.get(index).map(String::as_str).unwrap_or_default();
            let line = Feedback::for_sync(name, result);
            if line.is_error() {
                eprintln!("{line}");
            } else {
                println!("{line}");
            }
        })
        .await;

    let failed = log.failure_count();
    println!("Synced {} of {} source(s).", log.len() - failed, log.len());

    if full_batch {
        workspace
            .documents
            .stamp_last_updated(chrono::Local::now())
            .context("failed to record the sync time")?;
    }

    Ok(failed)
}

/// Sources to sync keyed by their position in the sources list. Named
/// sources run even when inactive; an unknown name is an error.
fn select_batch(
    sources: &[SourceSpec],
    filenames: &[String],
) -> Result<BTreeMap<usize, SourceSpec>> {
    if filenames.is_empty() {
        return Ok(active_batch(sources));
    }

    let mut batch = BTreeMap::new();
    for name in filenames {
        let wanted = with_default_extension(name);
        let Some((index, spec)) = sources
            .iter()
            .enumerate()
            .find(|(_, s)| s.filename == *name || with_default_extension(&s.filename) == wanted)
        else {
            bail!("no source writes to {name}");
        };
        batch.insert(index, spec.clone());
    }
    Ok(batch)
}

fn uses_google(spec: &SourceSpec) -> bool {
    spec.resolve()
        .is_some_and(|(id, _)| id == SHEETS_CONNECTOR_ID)
}

/// The stored Google token, refreshed and saved back when it has expired.
/// A failed refresh is reported and the stale token is used as-is, which
/// makes the sheet sources fail with a sign-in message.
async fn google_credentials(workspace: &Workspace) -> Option<GoogleCredentials> {
    let credentials = workspace.documents.load_google_token()?;
    if !credentials.is_expired() || !credentials.can_refresh() {
        return Some(credentials);
    }

    let client = reqwest::Client::new();
    match refresh_google_credentials(&client, &credentials).await {
        Ok(fresh) => {
            if let Err(e) = workspace.documents.save_google_token(&fresh) {
                tracing::warn!(error = %e, "could not save refreshed Google token");
            }
            Some(fresh)
        }
        Err(e) => {
            eprintln!("{}", Feedback::warning(format!("Google token refresh failed: {e}")));
            Some(credentials)
        }
    }
}
