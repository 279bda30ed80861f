//! Periodic SLA breach monitor.
//!
//! Scans all active tickets on a fixed interval, compares elapsed time
//! against the priority's response/resolution thresholds, and emits one
//! breach event per ticket per threshold. The `*_breach_at` markers on
//! the ticket make the scan idempotent: re-running a tick over an
//! unchanged, already-breached ticket emits nothing, and a restarted
//! monitor picks up where the markers say it left off.
//!
//! One ticket failing to evaluate never aborts the scan; the error is
//! logged and the tick continues. Each tick runs under an overall
//! timeout so a stuck evaluation cannot block subsequent ticks.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use helpdesk_core::sla::{self, Breach, SlaPolicyView, SlaTicketView};
use helpdesk_core::status::TicketStatus;
use helpdesk_core::types::Timestamp;
use helpdesk_db::models::ticket::SlaScanRow;
use helpdesk_db::repositories::{TicketRepo, UserRepo};
use helpdesk_db::DbPool;
use helpdesk_events::{event_types, EventBus, Notifier, Severity, TicketEvent};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Counters exposed via `GET /api/v1/sla/monitor`.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct SlaStatistics {
    pub running: bool,
    pub ticks: u64,
    pub response_breaches: u64,
    pub resolution_breaches: u64,
    pub scan_errors: u64,
    pub last_tick_at: Option<Timestamp>,
}

/// Summary of a single tick, returned by `force_check`.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct TickSummary {
    pub scanned: usize,
    pub response_breaches: u64,
    pub resolution_breaches: u64,
    pub errors: u64,
}

#[derive(Default)]
struct Counters {
    ticks: AtomicU64,
    response_breaches: AtomicU64,
    resolution_breaches: AtomicU64,
    scan_errors: AtomicU64,
}

/// Everything one tick needs; cloned into the spawned loop task.
#[derive(Clone)]
struct TickContext {
    pool: DbPool,
    notifier: Arc<dyn Notifier>,
    bus: Arc<EventBus>,
    counters: Arc<Counters>,
    last_tick_at: Arc<std::sync::Mutex<Option<Timestamp>>>,
}

/// Independently start/stop-able SLA monitor.
pub struct SlaMonitor {
    ctx: TickContext,
    interval: Duration,
    tick_timeout: Duration,
    handle: Mutex<Option<(CancellationToken, tokio::task::JoinHandle<()>)>>,
}

impl SlaMonitor {
    pub fn new(
        pool: DbPool,
        notifier: Arc<dyn Notifier>,
        bus: Arc<EventBus>,
        interval: Duration,
        tick_timeout: Duration,
    ) -> Self {
        Self {
            ctx: TickContext {
                pool,
                notifier,
                bus,
                counters: Arc::new(Counters::default()),
                last_tick_at: Arc::new(std::sync::Mutex::new(None)),
            },
            interval,
            tick_timeout,
            handle: Mutex::new(None),
        }
    }

    /// Start the periodic scan loop. Returns `false` if already running.
    pub async fn start(&self) -> bool {
        let mut handle = self.handle.lock().await;
        if handle.is_some() {
            return false;
        }

        let cancel = CancellationToken::new();
        let ctx = self.ctx.clone();
        let interval = self.interval;
        let tick_timeout = self.tick_timeout;
        let loop_cancel = cancel.clone();

        let task = tokio::spawn(async move {
            tracing::info!(
                interval_secs = interval.as_secs(),
                "SLA monitor started"
            );
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = loop_cancel.cancelled() => {
                        tracing::info!("SLA monitor stopping");
                        break;
                    }
                    _ = ticker.tick() => {
                        match tokio::time::timeout(tick_timeout, run_tick(&ctx)).await {
                            Ok(summary) => {
                                tracing::debug!(
                                    scanned = summary.scanned,
                                    response = summary.response_breaches,
                                    resolution = summary.resolution_breaches,
                                    errors = summary.errors,
                                    "SLA tick complete"
                                );
                            }
                            Err(_) => {
                                ctx.counters.scan_errors.fetch_add(1, Ordering::Relaxed);
                                tracing::error!(
                                    timeout_secs = tick_timeout.as_secs(),
                                    "SLA tick timed out"
                                );
                            }
                        }
                    }
                }
            }
        });

        *handle = Some((cancel, task));
        true
    }

    /// Stop the scan loop. Returns `false` if it was not running.
    pub async fn stop(&self) -> bool {
        let mut handle = self.handle.lock().await;
        let Some((cancel, task)) = handle.take() else {
            return false;
        };
        cancel.cancel();
        let _ = tokio::time::timeout(Duration::from_secs(5), task).await;
        true
    }

    /// Run one scan immediately, regardless of the loop state.
    pub async fn force_check(&self) -> TickSummary {
        run_tick(&self.ctx).await
    }

    /// Snapshot the monitor's counters.
    pub async fn statistics(&self) -> SlaStatistics {
        let running = self.handle.lock().await.is_some();
        let c = &self.ctx.counters;
        SlaStatistics {
            running,
            ticks: c.ticks.load(Ordering::Relaxed),
            response_breaches: c.response_breaches.load(Ordering::Relaxed),
            resolution_breaches: c.resolution_breaches.load(Ordering::Relaxed),
            scan_errors: c.scan_errors.load(Ordering::Relaxed),
            last_tick_at: *self.ctx.last_tick_at.lock().expect("lock poisoned"),
        }
    }
}

/// Scan every active ticket once.
async fn run_tick(ctx: &TickContext) -> TickSummary {
    let now = Utc::now();
    ctx.counters.ticks.fetch_add(1, Ordering::Relaxed);
    *ctx.last_tick_at.lock().expect("lock poisoned") = Some(now);

    let rows = match TicketRepo::list_active_for_sla(&ctx.pool).await {
        Ok(rows) => rows,
        Err(e) => {
            ctx.counters.scan_errors.fetch_add(1, Ordering::Relaxed);
            tracing::error!(error = %e, "SLA tick failed to fetch tickets");
            return TickSummary {
                errors: 1,
                ..Default::default()
            };
        }
    };

    let mut summary = TickSummary {
        scanned: rows.len(),
        ..Default::default()
    };

    for row in &rows {
        if let Err(e) = evaluate_ticket(ctx, row, now, &mut summary).await {
            summary.errors += 1;
            ctx.counters.scan_errors.fetch_add(1, Ordering::Relaxed);
            tracing::error!(
                error = %e,
                ticket_id = row.id,
                "SLA evaluation failed for ticket, continuing scan"
            );
        }
    }

    summary
}

/// Evaluate one ticket and stamp/emit any newly crossed breaches.
async fn evaluate_ticket(
    ctx: &TickContext,
    row: &SlaScanRow,
    now: Timestamp,
    summary: &mut TickSummary,
) -> Result<(), sqlx::Error> {
    let Some(status) = TicketStatus::from_id(row.status_id) else {
        tracing::warn!(
            ticket_id = row.id,
            status_id = row.status_id,
            "Unknown ticket status, skipping"
        );
        return Ok(());
    };

    // No policy configured for this priority: nothing to enforce.
    let (Some(response_minutes), Some(resolution_minutes)) =
        (row.response_minutes, row.resolution_minutes)
    else {
        tracing::warn!(
            ticket_id = row.id,
            priority_id = row.priority_id,
            "No SLA policy for priority, skipping"
        );
        return Ok(());
    };

    let view = SlaTicketView {
        status,
        assignee_id: row.assignee_id,
        created_at: row.created_at,
        assigned_at: row.assigned_at,
        response_breach_at: row.response_breach_at,
        resolution_breach_at: row.resolution_breach_at,
    };
    let policy = SlaPolicyView {
        response_minutes: i64::from(response_minutes),
        resolution_minutes: i64::from(resolution_minutes),
    };

    for breach in sla::evaluate(&view, &policy, now) {
        match breach {
            Breach::Response => {
                // The conditional update is the dedup point: only the
                // tick that actually sets the marker reports the breach.
                if TicketRepo::mark_response_breach(&ctx.pool, row.id, now).await? {
                    summary.response_breaches += 1;
                    ctx.counters.response_breaches.fetch_add(1, Ordering::Relaxed);
                    report_breach(ctx, row, event_types::SLA_RESPONSE_BREACH, Severity::Warning)
                        .await;
                }
            }
            Breach::Resolution => {
                if TicketRepo::mark_resolution_breach(&ctx.pool, row.id, now).await? {
                    summary.resolution_breaches += 1;
                    ctx.counters
                        .resolution_breaches
                        .fetch_add(1, Ordering::Relaxed);
                    report_breach(
                        ctx,
                        row,
                        event_types::SLA_RESOLUTION_BREACH,
                        Severity::Critical,
                    )
                    .await;
                }
            }
        }
    }

    Ok(())
}

/// Publish the breach event and notify admins (and the assignee, if any).
async fn report_breach(ctx: &TickContext, row: &SlaScanRow, event_type: &str, severity: Severity) {
    tracing::warn!(
        ticket_id = row.id,
        ticket_number = %row.ticket_number,
        event_type,
        "SLA breach"
    );

    ctx.bus.publish(
        TicketEvent::new(event_type)
            .with_ticket(row.id)
            .with_payload(serde_json::json!({
                "ticket_number": row.ticket_number,
                "priority_id": row.priority_id,
            })),
    );

    let mut targets = match UserRepo::list_active_admin_ids(&ctx.pool).await {
        Ok(ids) => ids,
        Err(e) => {
            tracing::error!(error = %e, "Failed to resolve admin users for SLA alert");
            Vec::new()
        }
    };
    if let Some(assignee) = row.assignee_id {
        if !targets.contains(&assignee) {
            targets.push(assignee);
        }
    }

    let (title, message) = match event_type {
        event_types::SLA_RESPONSE_BREACH => (
            "SLA response breach",
            format!("Ticket {} has no accepted agent past its response SLA", row.ticket_number),
        ),
        _ => (
            "SLA resolution breach",
            format!("Ticket {} is unresolved past its resolution SLA", row.ticket_number),
        ),
    };

    for user_id in targets {
        ctx.notifier
            .notify(
                user_id,
                event_type,
                title,
                &message,
                severity,
                serde_json::json!({
                    "ticket_id": row.id,
                    "ticket_number": row.ticket_number,
                }),
            )
            .await;
    }
}
