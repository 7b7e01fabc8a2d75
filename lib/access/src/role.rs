//! Procurement roles.
//!
//! Roles gate which workflow transitions an actor may request. The
//! Head of Procurement (HoP) is the final approval authority in every
//! workflow; officers run the day-to-day review steps.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The role an actor holds within the procurement organisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Business user raising requests and submitting deliverables.
    Requester,
    /// External vendor completing due diligence.
    Vendor,
    /// Procurement officer validating and routing items.
    ProcurementOfficer,
    /// Procurement manager, typically assigned as reviewer or approver.
    ProcurementManager,
    /// Head of Procurement, final decision authority.
    HeadOfProcurement,
    /// Platform administrator.
    Admin,
}

impl Role {
    /// All roles, in ascending order of authority.
    pub const ALL: [Role; 6] = [
        Self::Requester,
        Self::Vendor,
        Self::ProcurementOfficer,
        Self::ProcurementManager,
        Self::HeadOfProcurement,
        Self::Admin,
    ];

    /// Returns the wire name of the role.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Requester => "requester",
            Self::Vendor => "vendor",
            Self::ProcurementOfficer => "procurement_officer",
            Self::ProcurementManager => "procurement_manager",
            Self::HeadOfProcurement => "head_of_procurement",
            Self::Admin => "admin",
        }
    }

    /// Returns a human-readable label, used as the role label on gate assignments.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Requester => "Requester",
            Self::Vendor => "Vendor",
            Self::ProcurementOfficer => "Procurement Officer",
            Self::ProcurementManager => "Procurement Manager",
            Self::HeadOfProcurement => "Head of Procurement",
            Self::Admin => "Administrator",
        }
    }

    /// Returns true if this role belongs to procurement staff.
    #[must_use]
    pub fn is_procurement_staff(&self) -> bool {
        matches!(
            self,
            Self::ProcurementOfficer | Self::ProcurementManager | Self::HeadOfProcurement
        )
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| format!("unknown role: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_serialization_format() {
        let json = serde_json::to_string(&Role::HeadOfProcurement).expect("serialize");
        assert_eq!(json, "\"head_of_procurement\"");
    }

    #[test]
    fn parse_matches_serde_name() {
        for role in Role::ALL {
            let json = serde_json::to_string(&role).expect("serialize");
            assert_eq!(json.trim_matches('"'), role.as_str());
            assert_eq!(role.as_str().parse::<Role>(), Ok(role));
        }
    }

    #[test]
    fn parse_unknown_role() {
        assert!("cfo".parse::<Role>().is_err());
    }

    #[test]
    fn staff_roles() {
        assert!(Role::ProcurementOfficer.is_procurement_staff());
        assert!(Role::HeadOfProcurement.is_procurement_staff());
        assert!(!Role::Vendor.is_procurement_staff());
        assert!(!Role::Admin.is_procurement_staff());
    }
}
