//! Ticket field validation helpers used by the DB and API layers.

use crate::error::CoreError;

/// Maximum length for a ticket title.
pub const MAX_TITLE_LENGTH: usize = 200;

/// Maximum length for an assignment response note.
pub const MAX_RESPONSE_NOTE_LENGTH: usize = 2_000;

/// Satisfaction rating bounds (inclusive).
pub const MIN_RATING: i16 = 1;
pub const MAX_RATING: i16 = 5;

/// Note stamped on sibling requests when another agent wins the race.
pub const NOTE_ACCEPTED_ELSEWHERE: &str = "ticket accepted by another agent";

/// Note stamped on outstanding requests when an admin assigns manually.
pub const NOTE_MANUALLY_ASSIGNED: &str = "ticket assigned manually by an administrator";

/// Validate a ticket title: non-empty after trimming, within bounds.
pub fn validate_title(title: &str) -> Result<(), CoreError> {
    if title.trim().is_empty() {
        return Err(CoreError::Validation(
            "Ticket title must not be empty".to_string(),
        ));
    }
    if title.len() > MAX_TITLE_LENGTH {
        return Err(CoreError::Validation(format!(
            "Ticket title exceeds maximum length of {MAX_TITLE_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Validate a satisfaction rating value.
pub fn validate_rating(rating: i16) -> Result<(), CoreError> {
    if !(MIN_RATING..=MAX_RATING).contains(&rating) {
        return Err(CoreError::Validation(format!(
            "Satisfaction rating must be between {MIN_RATING} and {MAX_RATING}"
        )));
    }
    Ok(())
}

/// Format the human-readable ticket number for a new ticket id.
///
/// Ticket numbers are unique and immutable once assigned; they are
/// derived from the primary key so no separate sequence is needed.
pub fn format_ticket_number(id: crate::types::DbId) -> String {
    format!("HD-{id:06}")
}
