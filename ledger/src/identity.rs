//! Caller identity and capability resolution.
//!
//! The external identity collaborator verifies who is calling; this module
//! resolves that identity's roles into a capability set exactly once per
//! request. Authorization checks downstream test capabilities, never roles.

use crate::types::RequesterId;
use serde::{Deserialize, Serialize};

/// Portal role as reported by the identity collaborator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Regular portal member
    Member,
    /// Event organizer
    Organizer,
    /// Portal administrator
    Admin,
}

impl Role {
    /// Parse a role from its wire string; unknown strings resolve to `Member`.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Self::Admin,
            "organizer" => Self::Organizer,
            _ => Self::Member,
        }
    }
}

/// A single permission the ledger understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Capability {
    /// Delete any reservation, not just one's own
    DeleteAnyReservation,
    /// View any requester's reservations
    ViewAnyReservation,
    /// Create and update event descriptors
    ManageEvents,
}

/// The full set of capabilities resolved for a caller.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySet {
    delete_any: bool,
    view_any: bool,
    manage_events: bool,
}

impl CapabilitySet {
    /// A set granting nothing beyond ownership-based access.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            delete_any: false,
            view_any: false,
            manage_events: false,
        }
    }

    /// Resolve the capability set for a collection of roles.
    ///
    /// Grants are additive across roles: organizers may view any
    /// reservation and manage events; admins additionally may delete any
    /// reservation.
    #[must_use]
    pub fn resolve(roles: &[Role]) -> Self {
        let mut set = Self::none();
        for role in roles {
            match role {
                Role::Member => {}
                Role::Organizer => {
                    set.view_any = true;
                    set.manage_events = true;
                }
                Role::Admin => {
                    set.delete_any = true;
                    set.view_any = true;
                    set.manage_events = true;
                }
            }
        }
        set
    }

    /// Whether the set grants a capability.
    #[must_use]
    pub const fn allows(&self, capability: Capability) -> bool {
        match capability {
            Capability::DeleteAnyReservation => self.delete_any,
            Capability::ViewAnyReservation => self.view_any,
            Capability::ManageEvents => self.manage_events,
        }
    }
}

/// A verified caller: identity plus resolved capabilities.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    /// The caller's requester identity
    pub requester_id: RequesterId,
    /// Verified email, when the identity collaborator supplies one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Capabilities resolved once for this request
    pub capabilities: CapabilitySet,
}

impl Caller {
    /// A caller with no elevated capabilities.
    #[must_use]
    pub const fn member(requester_id: RequesterId) -> Self {
        Self {
            requester_id,
            email: None,
            capabilities: CapabilitySet::none(),
        }
    }

    /// A caller resolved from roles reported by the identity collaborator.
    #[must_use]
    pub fn with_roles(requester_id: RequesterId, roles: &[Role]) -> Self {
        Self {
            requester_id,
            email: None,
            capabilities: CapabilitySet::resolve(roles),
        }
    }

    /// Whether this caller owns the given reservation.
    #[must_use]
    pub fn owns(&self, owner: RequesterId) -> bool {
        self.requester_id == owner
    }
}
