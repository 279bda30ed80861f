//! SLA threshold evaluation.
//!
//! Pure functions used by the background monitor: given a ticket's
//! timing fields and the SLA policy for its priority, decide which
//! breaches are newly crossed. The monitor stamps `*_breach_at` markers
//! on the ticket so a breach is reported exactly once, and re-running a
//! tick over an unchanged ticket yields nothing new.

use crate::status::TicketStatus;
use crate::types::{DbId, Timestamp};

/// Default response/resolution thresholds in minutes, per priority,
/// lowest priority first. Must match the `sla_policies` seed data.
pub const DEFAULT_THRESHOLDS: [(i64, i64); 4] = [
    (480, 2880), // Low
    (240, 1440), // Medium
    (120, 480),  // High
    (60, 240),   // Critical
];

/// The SLA policy row for one priority.
#[derive(Debug, Clone, Copy)]
pub struct SlaPolicyView {
    pub response_minutes: i64,
    pub resolution_minutes: i64,
}

/// The timing fields of a ticket the evaluator looks at.
#[derive(Debug, Clone, Copy)]
pub struct SlaTicketView {
    pub status: TicketStatus,
    pub assignee_id: Option<DbId>,
    pub created_at: Timestamp,
    pub assigned_at: Option<Timestamp>,
    pub response_breach_at: Option<Timestamp>,
    pub resolution_breach_at: Option<Timestamp>,
}

/// A breach that has just been crossed and not yet reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Breach {
    /// No agent accepted within the response threshold.
    Response,
    /// The ticket stayed unresolved past the resolution threshold.
    Resolution,
}

/// Evaluate which breaches `ticket` has newly crossed at `now`.
///
/// The response clock runs from `created_at` and only matters while no
/// agent has accepted. The resolution clock runs from `assigned_at`
/// when set, else from `created_at` (a ticket nobody accepted can still
/// blow its resolution target). Already-stamped breaches are skipped.
pub fn evaluate(ticket: &SlaTicketView, policy: &SlaPolicyView, now: Timestamp) -> Vec<Breach> {
    let mut breaches = Vec::new();

    if !ticket.status.is_active() {
        return breaches;
    }

    let elapsed_response = (now - ticket.created_at).num_minutes();
    if ticket.assignee_id.is_none()
        && ticket.response_breach_at.is_none()
        && elapsed_response > policy.response_minutes
    {
        breaches.push(Breach::Response);
    }

    let resolution_start = ticket.assigned_at.unwrap_or(ticket.created_at);
    let elapsed_resolution = (now - resolution_start).num_minutes();
    if ticket.resolution_breach_at.is_none() && elapsed_resolution > policy.resolution_minutes {
        breaches.push(Breach::Resolution);
    }

    breaches
}
