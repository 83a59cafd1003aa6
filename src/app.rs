use chrono::{DateTime, FixedOffset};
use log::{debug, error, info};

use crate::config::{Config, RunOptions};
use crate::db::Ledger;
use crate::error::{RadarError, Result};
use crate::extractor::extract;
use crate::fetcher::Fetcher;
use crate::models::Record;
use crate::notify::{Notifier, log_records, render};

/// Cap on how many shows a single log listing prints.
const LOG_LIMIT: usize = 200;

/// How a successful run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Dry run on an empty or missing ledger: nothing was written.
    WouldEstablishBaseline { observed: usize },
    /// First real run: every current show recorded, nothing announced.
    BaselineEstablished { observed: usize },
    Delta {
        observed: usize,
        new: Vec<Record>,
        notified: bool,
    },
    DryRunDelta {
        observed: usize,
        new: Vec<Record>,
        /// The message a real run would send.
        preview: Option<String>,
    },
}

/// One pass: fetch, extract, diff against the ledger, announce, record.
pub async fn run_monitor<N: Notifier>(
    cfg: &Config,
    opts: RunOptions,
    notifier: &N,
    now: DateTime<FixedOffset>,
) -> Result<RunOutcome> {
    // 1) Fetch
    let fetcher = Fetcher::new(cfg.fetch_timeout, &cfg.referer, cfg.retry)?;
    let markup = fetcher.fetch(&cfg.source_url).await?;

    // 2) Extract
    let mut records = extract(&markup)?;
    records.truncate(cfg.top_n);
    let observed = records.len();
    log_records("Shows on the ranking", &records, LOG_LIMIT);

    // 3) Open ledger
    if opts.dry_run && !cfg.db_path.exists() {
        info!(
            "[dry-run] First run would establish a baseline of {observed} shows; no ledger created, nothing sent"
        );
        return Ok(RunOutcome::WouldEstablishBaseline { observed });
    }

    let mut ledger = if opts.dry_run {
        Ledger::open_read_only(&cfg.db_path)?
    } else {
        Ledger::open(&cfg.db_path)?
    };
    debug!("Ledger opened at {}", cfg.db_path.display());

    // 4) Baseline
    if ledger.is_empty()? {
        if opts.dry_run {
            info!("[dry-run] First run would establish a baseline of {observed} shows; nothing written, nothing sent");
            return Ok(RunOutcome::WouldEstablishBaseline { observed });
        }
        ledger.insert_baseline(&records, &now)?;
        info!(
            "First run: baseline of {observed} shows recorded in {}, no notification sent",
            cfg.db_path.display()
        );
        return Ok(RunOutcome::BaselineEstablished { observed });
    }

    if opts.verbose {
        if let Some(previous) = ledger.last_run_at()? {
            debug!("Previous run at {previous}");
        }
    }

    // 5) Delta
    let new = ledger.find_new(&records)?;
    if new.is_empty() {
        info!("No new shows this time");
    } else {
        log_records("New shows", &new, LOG_LIMIT);
        let premieres = new.iter().filter(|r| r.is_first_day).count();
        if premieres > 0 {
            info!("{premieres} of them went live today");
        }
    }

    if opts.verbose {
        for record in records.iter().filter(|r| !new.contains(r)) {
            if let Some(entry) = ledger.entry(&record.name)? {
                debug!("{} known since {}, last seen {}", entry.name, entry.first_seen, entry.last_seen);
            }
        }
    }

    if opts.dry_run {
        let preview = (!new.is_empty()).then(|| render(&new, &cfg.source_url, &now));
        info!(
            "[dry-run] {observed} shows fetched, {} new; nothing written, nothing sent",
            new.len()
        );
        if let Some(text) = &preview {
            info!("[dry-run] Would send:\n{text}");
        }
        return Ok(RunOutcome::DryRunDelta {
            observed,
            new,
            preview,
        });
    }

    let mut notified = false;
    let mut send_failure = None;
    if !new.is_empty() {
        if opts.no_notify {
            info!("New shows found, but notifications are disabled for this run");
        } else {
            let text = render(&new, &cfg.source_url, &now);
            match notifier.send(&text).await {
                Ok(()) => {
                    notified = true;
                    info!("Notification sent");
                }
                // Nothing was delivered and nothing is recorded, so the next
                // properly configured run announces these shows.
                Err(e @ RadarError::ConfigurationMissing(_)) => return Err(e),
                // Recorded anyway: a failed send must not turn into an alert
                // for the same shows on every following run.
                Err(e) => {
                    error!("Notification failed, recording the shows regardless: {e}");
                    send_failure = Some(e);
                }
            }
        }
    }

    ledger.upsert(&records, &now)?;
    if let Some(e) = send_failure {
        return Err(e);
    }

    info!(
        "{observed} shows fetched, {} new; ledger at {} updated",
        new.len(),
        cfg.db_path.display()
    );
    Ok(RunOutcome::Delta {
        observed,
        new,
        notified,
    })
}
