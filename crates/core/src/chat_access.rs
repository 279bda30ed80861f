//! Chat access gate.
//!
//! Decides who may read and write chat messages on a ticket, derived
//! entirely from the ticket's current state and the requester's identity.
//! [`evaluate`] is deterministic and side-effect-free; it is called on
//! every chat list/send request and must never mutate ticket state.

use crate::roles::ROLE_ADMIN;
use crate::status::TicketStatus;
use crate::types::DbId;

/// The fields of a ticket the gate looks at.
#[derive(Debug, Clone, Copy)]
pub struct TicketChatView {
    pub status: TicketStatus,
    pub assignee_id: Option<DbId>,
    /// The client the ticket was opened for (the requester).
    pub client_id: DbId,
    /// The user who created the ticket (may differ from the client when
    /// an agent or admin opened it on the client's behalf).
    pub created_by: DbId,
}

/// Gate verdict for one user on one ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct ChatAccess {
    pub can_access: bool,
    pub can_send: bool,
    pub reason: &'static str,
}

impl ChatAccess {
    fn denied(reason: &'static str) -> Self {
        Self {
            can_access: false,
            can_send: false,
            reason,
        }
    }

    fn read_only(reason: &'static str) -> Self {
        Self {
            can_access: true,
            can_send: false,
            reason,
        }
    }

    fn full(reason: &'static str) -> Self {
        Self {
            can_access: true,
            can_send: true,
            reason,
        }
    }
}

/// Evaluate chat access for `user_id` with role `role` on `ticket`.
///
/// Until an agent has accepted the ticket there is no chat at all, for
/// anyone. After that: the requester and the assigned agent get full
/// access, any other admin gets read-only supervision access, and
/// everyone else is denied. Once the ticket is resolved, closed, or
/// cancelled the history stays readable but sending is frozen for all.
pub fn evaluate(user_id: DbId, role: &str, ticket: &TicketChatView) -> ChatAccess {
    if ticket.assignee_id.is_none() {
        return ChatAccess::denied("awaiting agent acceptance");
    }

    let is_participant = user_id == ticket.client_id
        || user_id == ticket.created_by
        || Some(user_id) == ticket.assignee_id;

    let verdict = if is_participant {
        ChatAccess::full("ticket participant")
    } else if role == ROLE_ADMIN {
        ChatAccess::read_only("admin supervision")
    } else {
        return ChatAccess::denied("not a participant");
    };

    if verdict.can_send && ticket.status.is_chat_frozen() {
        return ChatAccess::read_only("ticket is no longer active");
    }

    verdict
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roles::{ROLE_AGENT, ROLE_CLIENT};

    const CLIENT: DbId = 10;
    const AGENT: DbId = 20;
    const ADMIN: DbId = 30;
    const STRANGER: DbId = 40;

    fn ticket(status: TicketStatus, assignee_id: Option<DbId>) -> TicketChatView {
        TicketChatView {
            status,
            assignee_id,
            client_id: CLIENT,
            created_by: CLIENT,
        }
    }

    #[test]
    fn unassigned_ticket_denies_every_role() {
        let t = ticket(TicketStatus::Open, None);
        for (user, role) in [
            (CLIENT, ROLE_CLIENT),
            (AGENT, ROLE_AGENT),
            (ADMIN, ROLE_ADMIN),
            (STRANGER, ROLE_CLIENT),
        ] {
            let access = evaluate(user, role, &t);
            assert!(!access.can_access, "user {user} should be denied");
            assert!(!access.can_send);
            assert_eq!(access.reason, "awaiting agent acceptance");
        }
    }

    #[test]
    fn creator_and_assignee_get_full_access() {
        let t = ticket(TicketStatus::InProgress, Some(AGENT));
        let client = evaluate(CLIENT, ROLE_CLIENT, &t);
        assert!(client.can_access && client.can_send);

        let agent = evaluate(AGENT, ROLE_AGENT, &t);
        assert!(agent.can_access && agent.can_send);
    }

    #[test]
    fn other_admin_is_read_only() {
        let t = ticket(TicketStatus::InProgress, Some(AGENT));
        let admin = evaluate(ADMIN, ROLE_ADMIN, &t);
        assert!(admin.can_access);
        assert!(!admin.can_send);
        assert_eq!(admin.reason, "admin supervision");
    }

    #[test]
    fn admin_who_created_the_ticket_gets_full_access() {
        let t = TicketChatView {
            status: TicketStatus::InProgress,
            assignee_id: Some(AGENT),
            client_id: CLIENT,
            created_by: ADMIN,
        };
        let admin = evaluate(ADMIN, ROLE_ADMIN, &t);
        assert!(admin.can_access && admin.can_send);
    }

    #[test]
    fn stranger_is_denied() {
        let t = ticket(TicketStatus::InProgress, Some(AGENT));
        let access = evaluate(STRANGER, ROLE_AGENT, &t);
        assert!(!access.can_access);
        assert_eq!(access.reason, "not a participant");
    }

    #[test]
    fn closed_ticket_freezes_sending_even_for_creator() {
        for status in [
            TicketStatus::Resolved,
            TicketStatus::Closed,
            TicketStatus::Cancelled,
        ] {
            let t = ticket(status, Some(AGENT));
            let client = evaluate(CLIENT, ROLE_CLIENT, &t);
            assert!(client.can_access, "{status:?}: history stays readable");
            assert!(!client.can_send, "{status:?}: sending must be frozen");

            let agent = evaluate(AGENT, ROLE_AGENT, &t);
            assert!(agent.can_access && !agent.can_send);
        }
    }

    #[test]
    fn waiting_statuses_do_not_freeze_sending() {
        for status in [
            TicketStatus::WaitingForClient,
            TicketStatus::WaitingForThirdParty,
        ] {
            let t = ticket(status, Some(AGENT));
            assert!(evaluate(CLIENT, ROLE_CLIENT, &t).can_send, "{status:?}");
        }
    }
}
