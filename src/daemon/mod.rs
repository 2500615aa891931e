use anyhow::Result;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Notify;

use crate::store::OperationKind;
use crate::triage::{FetchOutcome, TriageSession};

pub struct WatchConfig {
    pub interval: Duration,
    pub count: u32,
    pub auto_draft: bool,
    /// Stop after this many cycles; `None` runs until Ctrl-C.
    pub max_cycles: Option<u64>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WatchReport {
    pub cycles: u64,
    pub skipped: u64,
    pub failed: u64,
    pub drafted: u64,
}

/// Re-fetches the batch every `interval` until Ctrl-C.
pub async fn run_watch(session: &TriageSession, cfg: WatchConfig) -> Result<WatchReport> {
    let running = Arc::new(AtomicBool::new(true));
    let wake = Arc::new(Notify::new());
    let (r2, w2) = (running.clone(), wake.clone());
    ctrlc::set_handler(move || {
        r2.store(false, Ordering::SeqCst);
        w2.notify_one();
    })?;

    Ok(watch_until(session, &cfg, &running, &wake).await)
}

pub async fn watch_until(
    session: &TriageSession,
    cfg: &WatchConfig,
    running: &AtomicBool,
    wake: &Notify,
) -> WatchReport {
    let mut report = WatchReport::default();
    let mut seen: HashSet<String> = HashSet::new();
    // Each re-fetch hands back fresh records with `draft: ""`, so drafts from
    // earlier cycles are kept here by id.
    let mut drafted: HashMap<String, String> = HashMap::new();

    while running.load(Ordering::SeqCst) {
        if cfg.max_cycles.is_some_and(|max| report.cycles >= max) {
            break;
        }
        report.cycles += 1;

        // A fetch started elsewhere on this session is still out.
        if session.state().is_running(OperationKind::Fetch) {
            log::debug!("previous fetch still in flight; skipping cycle");
            report.skipped += 1;
        } else {
            match session.fetch(cfg.count).await {
                Ok(outcome @ FetchOutcome::Applied { .. }) => {
                    announce_new(session, &mut seen);
                    if cfg.auto_draft {
                        report.drafted += auto_draft(session, &mut drafted).await;
                    }
                    // The fetch stays in flight until its batch is persisted;
                    // the next cycle must not mistake it for a stuck fetch.
                    outcome.settle().await;
                }
                Ok(FetchOutcome::Superseded) => {}
                Err(e) => {
                    eprintln!("{e}");
                    report.failed += 1;
                }
            }
        }

        if cfg.max_cycles.is_some_and(|max| report.cycles >= max) {
            break;
        }
        tokio::select! {
            _ = tokio::time::sleep(cfg.interval) => {}
            _ = wake.notified() => {}
        }
    }

    report
}

fn announce_new(session: &TriageSession, seen: &mut HashSet<String>) {
    let emails = session.emails();
    let fresh: Vec<_> = emails.iter().filter(|e| !seen.contains(&e.id)).collect();
    for e in &fresh {
        println!("new: {} — {}", e.sender, e.subject);
    }
    log::info!("{} emails in batch, {} new", emails.len(), fresh.len());
    seen.extend(emails.iter().map(|e| e.id.clone()));
}

/// Drafts replied emails that have no draft. An id drafted by an earlier
/// cycle gets that draft back instead of a new request; failed ids are tried
/// again next cycle.
async fn auto_draft(session: &TriageSession, drafted: &mut HashMap<String, String>) -> u64 {
    let mut pending = Vec::new();
    for e in session.emails().iter().filter(|e| e.wants_draft()) {
        match drafted.get(&e.id) {
            Some(draft) => {
                session.restore_draft(&e.id, draft);
            }
            None => pending.push(e.clone()),
        }
    }

    let mut count = 0;
    for (id, outcome) in session.draft_all(pending).await {
        match outcome {
            Ok(draft) => {
                drafted.insert(id, draft);
                count += 1;
            }
            Err(e) => eprintln!("{id}: {e}"),
        }
    }
    count
}
