use anyhow::{Result, anyhow, bail};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use inbox_triage::backend::{HttpBackend, TriageBackend};
use inbox_triage::config::{Config, load_config};
use inbox_triage::daemon::{WatchConfig, run_watch};
use inbox_triage::domain::email::Email;
use inbox_triage::triage::TriageSession;

#[derive(Parser)]
#[command(name = "inbox_triage")]
#[command(about = "Inbox assistant triage: fetch, draft and export unreplied emails", long_about = None)]
struct Cli {
    /// Config file (defaults to <config dir>/inbox_triage/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch a batch of candidate emails and persist it
    Fetch {
        #[arg(long)]
        count: Option<u32>,
    },

    /// Generate reply drafts for replied emails in the batch
    Draft {
        /// Email ids to draft; omit with --all
        ids: Vec<String>,

        /// Draft every replied email that has no draft yet
        #[arg(long, conflicts_with = "ids")]
        all: bool,

        /// Start from the last saved batch instead of fetching
        #[arg(long)]
        saved: bool,

        #[arg(long)]
        count: Option<u32>,

        /// Draft even if the email already has one
        #[arg(long)]
        force: bool,
    },

    /// Export the saved batch as CSV
    Export {
        /// Write the CSV here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,

        /// Open the export in the browser instead of downloading it
        #[arg(long, conflicts_with = "out")]
        open: bool,
    },

    /// Re-fetch periodically until Ctrl-C
    Watch {
        #[arg(long)]
        count: Option<u32>,

        /// Seconds between fetches
        #[arg(long)]
        interval: Option<u64>,

        /// Draft every pending replied email after each fetch
        #[arg(long)]
        auto_draft: bool,

        /// Stop after this many cycles
        #[arg(long)]
        cycles: Option<u64>,
    },

    /// Check that the backend is reachable
    Ping,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let cfg = load_config(cli.config.as_deref()).map_err(|e| anyhow!("Configuration error: {e}"))?;
    let backend: Arc<dyn TriageBackend> =
        Arc::new(HttpBackend::new(&cfg.api_base_url, cfg.request_timeout())?);
    let session = TriageSession::new(backend, cfg.export_window());

    match cli.cmd {
        Command::Fetch { count } => {
            let outcome = session.fetch(cfg.batch_size(count)).await?;
            print_batch(&session.emails());
            outcome.settle().await;
            if let Some(e) = session.status().persist_error {
                eprintln!("Warning: batch was not saved: {e}");
            }
            Ok(())
        }

        Command::Draft {
            ids,
            all,
            saved,
            count,
            force,
        } => draft(&session, &cfg, ids, all, saved, count, force).await,

        Command::Export { out, open } => export(&session, out, open).await,

        Command::Watch {
            count,
            interval,
            auto_draft,
            cycles,
        } => {
            let interval = interval
                .map(std::time::Duration::from_secs)
                .unwrap_or_else(|| cfg.watch_interval());
            let report = run_watch(
                &session,
                WatchConfig {
                    interval,
                    count: cfg.batch_size(count),
                    auto_draft,
                    max_cycles: cycles,
                },
            )
            .await?;
            println!(
                "{} cycles, {} skipped, {} failed, {} drafts",
                report.cycles, report.skipped, report.failed, report.drafted
            );
            Ok(())
        }

        Command::Ping => {
            session.backend().healthcheck().await?;
            println!("ok: {}", session.exporter().url());
            Ok(())
        }
    }
}

async fn draft(
    session: &TriageSession,
    cfg: &Config,
    ids: Vec<String>,
    all: bool,
    saved: bool,
    count: Option<u32>,
    force: bool,
) -> Result<()> {
    if ids.is_empty() && !all {
        bail!("pass one or more email ids, or --all");
    }

    if saved {
        session.load_saved().await?;
    } else {
        session.fetch(cfg.batch_size(count)).await?.settle().await;
    }

    let (targets, skipped) = select_draft_targets(&session.emails(), &ids, all, force);
    for note in &skipped {
        eprintln!("{note}");
    }
    if targets.is_empty() {
        println!("Nothing to draft.");
        return Ok(());
    }

    let mut failed = 0;
    for (id, outcome) in session.draft_all(targets).await {
        match outcome {
            Ok(draft) => println!("--- {id}\n{draft}\n"),
            Err(e) => {
                eprintln!("{id}: {e}");
                failed += 1;
            }
        }
    }
    if failed > 0 {
        bail!("{failed} draft(s) failed");
    }
    Ok(())
}

/// Picks the emails `draft` should request, plus one note per id it skipped.
/// Only replied emails are drafted; without `force`, ones that already have a
/// draft are left alone.
fn select_draft_targets(
    batch: &[Email],
    ids: &[String],
    all: bool,
    force: bool,
) -> (Vec<Email>, Vec<String>) {
    let mut targets: Vec<Email> = Vec::new();
    let mut skipped = Vec::new();
    if all {
        targets.extend(batch.iter().filter(|e| e.is_replied()).cloned());
    } else {
        for id in ids {
            match batch.iter().find(|e| &e.id == id) {
                Some(e) if e.is_replied() => targets.push(e.clone()),
                Some(_) => skipped.push(format!(
                    "{id}: not replied yet; drafts are generated automatically"
                )),
                None => skipped.push(format!("{id}: not in the current batch")),
            }
        }
    }
    if !force {
        targets.retain(|e| {
            if e.has_draft() {
                skipped.push(format!(
                    "{}: draft already exists (use --force to replace it)",
                    e.id
                ));
            }
            !e.has_draft()
        });
    }
    (targets, skipped)
}

async fn export(session: &TriageSession, out: Option<PathBuf>, open: bool) -> Result<()> {
    session.load_saved().await?;
    if session.emails().is_empty() {
        println!("No emails found.");
        return Ok(());
    }

    let mut signal = session.exporter().subscribe();
    session.export_now();
    let Some(url) = signal.borrow_and_update().clone() else {
        bail!("export signal was not raised");
    };

    if open {
        open::that(url.as_str())?;
        eprintln!("Opened {url}");
        return Ok(());
    }

    let csv = session.backend().download_export().await?;
    match out {
        Some(path) => {
            std::fs::write(&path, &csv)?;
            eprintln!("Wrote {} bytes to {}", csv.len(), path.display());
        }
        None => std::io::stdout().write_all(&csv)?,
    }
    Ok(())
}

fn print_batch(emails: &[Email]) {
    if emails.is_empty() {
        println!("No emails found.");
        return;
    }
    for e in emails {
        let replied = if e.is_replied() { "yes" } else { "no" };
        println!("{}  replied={}  {}  {}", e.id, replied, e.sender, e.subject);
        if let Some(summary) = e.summary.as_deref().filter(|s| !s.is_empty()) {
            println!("    summary: {summary}");
        }
        if e.has_draft() {
            println!("    draft: {}", e.draft.as_deref().unwrap_or_default());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email(id: &str, replied: bool, draft: &str) -> Email {
        Email {
            id: id.to_string(),
            thread_id: format!("thread-{id}"),
            sender: format!("{id}@example.com"),
            subject: format!("Subject {id}"),
            timestamp: "1718000000000".to_string(),
            body: None,
            summary: None,
            replied: Some(replied),
            draft: Some(draft.to_string()),
        }
    }

    fn batch() -> Vec<Email> {
        vec![
            email("fresh", true, ""),
            email("drafted", true, "Thanks, will do."),
            email("open", false, "auto draft"),
        ]
    }

    fn ids_of(emails: &[Email]) -> Vec<&str> {
        emails.iter().map(|e| e.id.as_str()).collect()
    }

    #[test]
    fn all_targets_replied_emails_without_a_draft() {
        let (targets, skipped) = select_draft_targets(&batch(), &[], true, false);
        assert_eq!(ids_of(&targets), ["fresh"]);
        assert_eq!(
            skipped,
            ["drafted: draft already exists (use --force to replace it)"]
        );
    }

    #[test]
    fn force_redrafts_emails_that_have_one() {
        let (targets, skipped) = select_draft_targets(&batch(), &[], true, true);
        assert_eq!(ids_of(&targets), ["fresh", "drafted"]);
        assert!(skipped.is_empty());
    }

    #[test]
    fn named_ids_skip_unreplied_and_unknown_emails() {
        let ids = ["open", "missing", "fresh"].map(String::from);
        let (targets, skipped) = select_draft_targets(&batch(), &ids, false, false);
        assert_eq!(ids_of(&targets), ["fresh"]);
        assert_eq!(
            skipped,
            [
                "open: not replied yet; drafts are generated automatically",
                "missing: not in the current batch",
            ]
        );
    }

    #[test]
    fn force_never_targets_unreplied_emails() {
        let ids = ["open", "drafted"].map(String::from);
        let (targets, _) = select_draft_targets(&batch(), &ids, false, true);
        assert_eq!(ids_of(&targets), ["drafted"]);
    }
}
