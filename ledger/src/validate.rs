//! Request validation.
//!
//! Purely a gate before any write: shape and bounds checks that need no
//! store access. Existence, duplicate, and closed-event checks live in the
//! decision layer, where they run against the transactional snapshot.

use crate::error::LedgerError;
use crate::identity::Caller;
use crate::types::{Attendee, ContactInfo};

/// Minimum attendees per reservation.
pub const MIN_ATTENDEES: usize = 1;

/// Maximum attendees per reservation.
pub const MAX_ATTENDEES: usize = 20;

/// Require a verified caller identity.
///
/// # Errors
///
/// Returns [`LedgerError::Unauthenticated`] when no identity was supplied.
pub fn require_caller(caller: Option<&Caller>) -> Result<&Caller, LedgerError> {
    caller.ok_or(LedgerError::Unauthenticated)
}

/// Validate attendee list bounds.
///
/// # Errors
///
/// Returns [`LedgerError::InvalidArgument`] when the list is outside 1–20.
pub fn validate_attendees(attendees: &[Attendee]) -> Result<(), LedgerError> {
    if attendees.len() < MIN_ATTENDEES || attendees.len() > MAX_ATTENDEES {
        return Err(LedgerError::InvalidArgument(
            "Must have 1-20 attendees".to_string(),
        ));
    }
    Ok(())
}

/// Validate contact details.
///
/// # Errors
///
/// Returns [`LedgerError::InvalidArgument`] when the family name is empty or
/// the email is not structurally plausible.
pub fn validate_contact(contact: &ContactInfo) -> Result<(), LedgerError> {
    if contact.family_name.trim().is_empty() {
        return Err(LedgerError::InvalidArgument(
            "Family name is required".to_string(),
        ));
    }
    if !is_plausible_email(&contact.email) {
        return Err(LedgerError::InvalidArgument(
            "Invalid email format".to_string(),
        ));
    }
    Ok(())
}

/// Structural email check: non-empty local part and a domain with a dot.
///
/// Deliverability is the notification collaborator's problem; this only
/// rejects obviously malformed input.
fn is_plausible_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.contains(char::is_whitespace)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::RequesterId;

    #[test]
    fn missing_caller_is_unauthenticated() {
        assert!(matches!(
            require_caller(None),
            Err(LedgerError::Unauthenticated)
        ));
        let caller = Caller::member(RequesterId::new());
        assert!(require_caller(Some(&caller)).is_ok());
    }

    #[test]
    fn attendee_bounds_are_inclusive() {
        let attendee = Attendee::adult("A", 30);
        assert!(validate_attendees(&[]).is_err());
        assert!(validate_attendees(&vec![attendee.clone(); 21]).is_err());
        assert!(validate_attendees(&[attendee.clone()]).is_ok());
        assert!(validate_attendees(&vec![attendee; 20]).is_ok());
    }

    #[test]
    fn attendee_bounds_error_message_matches_portal_wording() {
        let err = validate_attendees(&[]).unwrap_err();
        assert_eq!(err.to_string(), "Must have 1-20 attendees");
    }

    #[test]
    fn contact_requires_family_name_and_plausible_email() {
        assert!(validate_contact(&ContactInfo::new("Smith", "smith@example.com")).is_ok());
        assert!(validate_contact(&ContactInfo::new("  ", "smith@example.com")).is_err());
        assert!(validate_contact(&ContactInfo::new("Smith", "not-an-email")).is_err());
        assert!(validate_contact(&ContactInfo::new("Smith", "a@b")).is_err());
        assert!(validate_contact(&ContactInfo::new("Smith", "a b@example.com")).is_err());
    }
}
