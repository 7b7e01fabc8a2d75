//! Entity types and workflow statuses.
//!
//! All four workflows share one status vocabulary; each definition uses the
//! subset that applies to it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which workflow an entity follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    /// Business request (tender) awarded to a vendor.
    BusinessRequest,
    /// Contract under governance review.
    Contract,
    /// Vendor due diligence.
    VendorDd,
    /// Deliverable and its payment authorization.
    Deliverable,
}

impl EntityType {
    /// All entity types.
    pub const ALL: [EntityType; 4] = [
        Self::BusinessRequest,
        Self::Contract,
        Self::VendorDd,
        Self::Deliverable,
    ];

    /// Returns the wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::BusinessRequest => "business_request",
            Self::Contract => "contract",
            Self::VendorDd => "vendor_dd",
            Self::Deliverable => "deliverable",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown entity type: {s}"))
    }
}

/// Workflow status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Draft,
    /// Auto-provisioned contract awaiting officer completion.
    PendingCompletion,
    Submitted,
    UnderReview,
    PendingOfficerReview,
    Validated,
    PendingReview,
    ReviewComplete,
    PendingApproval,
    ApprovalComplete,
    ReturnedForRevision,
    PendingHopApproval,
    Awarded,
    Approved,
    ApprovedWithConditions,
    Rejected,
    Paid,
    Cancelled,
}

impl Status {
    /// Every status.
    pub const ALL: [Status; 18] = [
        Self::Draft,
        Self::PendingCompletion,
        Self::Submitted,
        Self::UnderReview,
        Self::PendingOfficerReview,
        Self::Validated,
        Self::PendingReview,
        Self::ReviewComplete,
        Self::PendingApproval,
        Self::ApprovalComplete,
        Self::ReturnedForRevision,
        Self::PendingHopApproval,
        Self::Awarded,
        Self::Approved,
        Self::ApprovedWithConditions,
        Self::Rejected,
        Self::Paid,
        Self::Cancelled,
    ];

    /// Returns the wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::PendingCompletion => "pending_completion",
            Self::Submitted => "submitted",
            Self::UnderReview => "under_review",
            Self::PendingOfficerReview => "pending_officer_review",
            Self::Validated => "validated",
            Self::PendingReview => "pending_review",
            Self::ReviewComplete => "review_complete",
            Self::PendingApproval => "pending_approval",
            Self::ApprovalComplete => "approval_complete",
            Self::ReturnedForRevision => "returned_for_revision",
            Self::PendingHopApproval => "pending_hop_approval",
            Self::Awarded => "awarded",
            Self::Approved => "approved",
            Self::ApprovedWithConditions => "approved_with_conditions",
            Self::Rejected => "rejected",
            Self::Paid => "paid",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown status: {s}"))
    }
}
