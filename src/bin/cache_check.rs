use std::collections::HashSet;

use nook::config::NookConfig;
use nook::core::habit::Habit;
use nook::core::link::Link;
use nook::core::note::Note;
use nook::core::record::{Entity, Record};
use nook::core::task::Task;
use nook::sync::cache::{FileCache, read_snapshot};
use nook::sync::identity::KeyringIdentity;
use nook::sync::remote::{RemoteCollection, RestRemote};

/// Compare one collection's cached snapshot with what the server holds.
async fn check<F: Entity>(cache: &FileCache, remote: &RestRemote<F>, owner_id: &str) {
    println!("\n--- {} ---", F::COLLECTION);

    let cached: Vec<Record<F>> = match read_snapshot(cache) {
        Some(items) => items,
        None => {
            println!("  No cached snapshot at {}", cache.path_for(F::CACHE_KEY).display());
            Vec::new()
        }
    };
    let remote_items = match remote.list(owner_id).await {
        Ok(items) => items,
        Err(e) => {
            println!("  Error listing remote {}: {}", F::COLLECTION, e);
            return;
        }
    };
    println!("  Cache: {}, remote: {}", cached.len(), remote_items.len());

    let remote_ids: HashSet<_> = remote_items.iter().map(|r| r.id.clone()).collect();
    let cached_ids: HashSet<_> = cached.iter().map(|r| r.id.clone()).collect();

    let local_only: Vec<_> = cached.iter().filter(|r| r.id.is_local()).collect();
    let stale: Vec<_> = cached
        .iter()
        .filter(|r| !r.id.is_local() && !remote_ids.contains(&r.id))
        .collect();
    let server_only: Vec<_> = remote_items
        .iter()
        .filter(|r| !cached_ids.contains(&r.id))
        .collect();
    let drifted: Vec<_> = cached
        .iter()
        .filter(|c| {
            remote_items
                .iter()
                .any(|r| r.id == c.id && r.fields != c.fields)
        })
        .collect();

    if !local_only.is_empty() {
        println!("\n  NEVER SYNCED ({}):", local_only.len());
        for r in &local_only {
            println!("    {} (created {})", r.id, r.created_at);
        }
    }
    if !stale.is_empty() {
        println!("\n  CACHED BUT GONE FROM SERVER ({}):", stale.len());
        for r in &stale {
            println!("    {}", r.id);
        }
    }
    if !server_only.is_empty() {
        println!("\n  ON SERVER ONLY ({}):", server_only.len());
        for r in &server_only {
            println!("    {} (updated {})", r.id, r.updated_at);
        }
    }
    if !drifted.is_empty() {
        println!("\n  CHANGED LOCALLY ({}):", drifted.len());
        for r in &drifted {
            println!("    {} (local edit {})", r.id, r.updated_at);
        }
    }
    if local_only.is_empty() && stale.is_empty() && server_only.is_empty() && drifted.is_empty() {
        println!("  All in sync!");
    }
}

fn client<F: Entity>(url: &str, api_key: &str, token: Option<&str>) -> Option<RestRemote<F>> {
    match RestRemote::<F>::new(url, api_key) {
        Ok(remote) => Some(match token {
            Some(token) => remote.with_access_token(token),
            None => remote,
        }),
        Err(e) => {
            println!("  Client error: {}", e);
            None
        }
    }
}

#[tokio::main]
async fn main() {
    if let Ok(journal) = systemd_journal_logger::JournalLog::new() {
        let _ = journal
            .with_syslog_identifier("nook-cache-check".to_string())
            .install();
        log::set_max_level(log::LevelFilter::Info);
    }

    let config = NookConfig::load(&NookConfig::default_path());

    println!("=== Cache vs Remote Comparison ===");
    println!("Cache directory: {}", config.cache_directory.display());

    let Some(remote) = &config.remote else {
        println!("No remote configured.");
        return;
    };

    let session = KeyringIdentity::new(&remote.url).session().await;
    let owner_id = match (&config.owner_id, &session) {
        (Some(owner), _) => owner.clone(),
        (None, Some(session)) => session.owner_id.clone(),
        (None, None) => {
            println!("Not signed in; anonymous sessions never reach the server.");
            return;
        }
    };
    let token = session.as_ref().map(|s| s.access_token.as_str());
    println!("Owner: {}", owner_id);

    let cache = FileCache::new(&config.cache_directory);
    let (url, key) = (remote.url.as_str(), remote.api_key.as_str());

    if let Some(r) = client::<Task>(url, key, token) {
        check(&cache, &r, &owner_id).await;
    }
    if let Some(r) = client::<Habit>(url, key, token) {
        check(&cache, &r, &owner_id).await;
    }
    if let Some(r) = client::<Link>(url, key, token) {
        check(&cache, &r, &owner_id).await;
    }
    if let Some(r) = client::<Note>(url, key, token) {
        check(&cache, &r, &owner_id).await;
    }

    println!("\n=== Done ===");
}
