//! Status and priority enums mapping to SMALLINT lookup tables, plus the
//! ticket lifecycle transition table.
//!
//! Each enum variant's discriminant matches the seed data order (1-based)
//! in the corresponding `*_statuses` / `priorities` database table.

use crate::error::CoreError;

/// Status ID type matching SMALLINT/SMALLSERIAL in the database.
pub type StatusId = i16;

macro_rules! define_status_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $val:expr ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr(i16)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $val ),+
        }

        impl $name {
            /// Return the database status ID.
            pub fn id(self) -> StatusId {
                self as StatusId
            }

            /// Resolve a database status ID back to the enum.
            pub fn from_id(id: StatusId) -> Option<Self> {
                match id {
                    $( $val => Some(Self::$variant), )+
                    _ => None,
                }
            }
        }

        impl From<$name> for StatusId {
            fn from(value: $name) -> Self {
                value as StatusId
            }
        }
    };
}

define_status_enum! {
    /// Ticket lifecycle status.
    TicketStatus {
        Open = 1,
        InProgress = 2,
        WaitingForClient = 3,
        WaitingForThirdParty = 4,
        Resolved = 5,
        Closed = 6,
        Cancelled = 7,
    }
}

define_status_enum! {
    /// Assignment request status.
    RequestStatus {
        Pending = 1,
        Accepted = 2,
        Rejected = 3,
    }
}

define_status_enum! {
    /// Ticket priority.
    Priority {
        Low = 1,
        Medium = 2,
        High = 3,
        Critical = 4,
    }
}

impl TicketStatus {
    /// Terminal statuses admit no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, TicketStatus::Closed | TicketStatus::Cancelled)
    }

    /// Active statuses are the ones the SLA monitor scans.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            TicketStatus::Open
                | TicketStatus::InProgress
                | TicketStatus::WaitingForClient
                | TicketStatus::WaitingForThirdParty
        )
    }

    /// Statuses in which the chat is frozen: history stays readable but
    /// nothing new may be written.
    pub fn is_chat_frozen(self) -> bool {
        matches!(
            self,
            TicketStatus::Resolved | TicketStatus::Closed | TicketStatus::Cancelled
        )
    }

    /// Whether the lifecycle move `self -> to` is legal.
    ///
    /// `Cancelled` is reachable from any non-terminal status; everything
    /// else follows the fixed lifecycle:
    ///
    /// ```text
    /// Open -> InProgress -> {WaitingForClient, WaitingForThirdParty}
    ///      -> InProgress -> Resolved -> Closed
    /// ```
    ///
    /// `Closed` is additionally reachable straight from `InProgress`
    /// (force-close without a resolve step).
    pub fn can_transition(self, to: TicketStatus) -> bool {
        use TicketStatus::*;

        if to == Cancelled {
            return !self.is_terminal();
        }

        match (self, to) {
            (Open, InProgress) => true,
            (InProgress, WaitingForClient) => true,
            (InProgress, WaitingForThirdParty) => true,
            (WaitingForClient, InProgress) => true,
            (WaitingForThirdParty, InProgress) => true,
            (InProgress, Resolved) => true,
            (WaitingForClient, Resolved) => true,
            (WaitingForThirdParty, Resolved) => true,
            (InProgress, Closed) => true,
            (Resolved, Closed) => true,
            _ => false,
        }
    }

    /// Validate the lifecycle move `self -> to`, failing with
    /// [`CoreError::InvalidStateTransition`] when it is not legal.
    /// No silent coercion: an illegal move is always an error.
    pub fn ensure_transition(self, to: TicketStatus) -> Result<(), CoreError> {
        if self.can_transition(to) {
            Ok(())
        } else {
            Err(CoreError::InvalidStateTransition { from: self, to })
        }
    }
}

impl Priority {
    /// All priorities, lowest first. Matches the `priorities` seed order.
    pub const ALL: [Priority; 4] = [
        Priority::Low,
        Priority::Medium,
        Priority::High,
        Priority::Critical,
    ];
}
