//! Status enums for jobs, applications and verifications, with their allowed
//! transitions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{ApiError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    Pending,
    Active,
    Rejected,
    Closed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "Pending",
            JobStatus::Active => "Active",
            JobStatus::Rejected => "Rejected",
            JobStatus::Closed => "Closed",
        }
    }

    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Pending, Active) | (Pending, Rejected) | (Pending, Closed) | (Active, Closed) | (Active, Rejected)
        )
    }

    pub fn transition(self, next: JobStatus) -> Result<JobStatus> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(invalid("job", self, next))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApplicationStatus {
    Submitted,
    #[serde(rename = "Under Review")]
    UnderReview,
    #[serde(rename = "Interview Scheduled")]
    InterviewScheduled,
    #[serde(rename = "Offer Extended")]
    OfferExtended,
    Rejected,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Submitted => "Submitted",
            ApplicationStatus::UnderReview => "Under Review",
            ApplicationStatus::InterviewScheduled => "Interview Scheduled",
            ApplicationStatus::OfferExtended => "Offer Extended",
            ApplicationStatus::Rejected => "Rejected",
        }
    }

    // Position in the hiring pipeline; Rejected sits outside it.
    fn stage(&self) -> Option<u8> {
        match self {
            ApplicationStatus::Submitted => Some(0),
            ApplicationStatus::UnderReview => Some(1),
            ApplicationStatus::InterviewScheduled => Some(2),
            ApplicationStatus::OfferExtended => Some(3),
            ApplicationStatus::Rejected => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ApplicationStatus::OfferExtended | ApplicationStatus::Rejected
        )
    }

    pub fn can_transition_to(&self, next: ApplicationStatus) -> bool {
        if *self == next {
            return true;
        }
        if self.is_terminal() {
            return false;
        }
        match (self.stage(), next.stage()) {
            (Some(from), Some(to)) => to > from,
            (Some(_), None) => true,
            _ => false,
        }
    }

    pub fn transition(self, next: ApplicationStatus) -> Result<ApplicationStatus> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(invalid("application", self, next))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VerificationStatus {
    Pending,
    #[serde(alias = "Verified")]
    Approved,
    Rejected,
}

impl VerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationStatus::Pending => "Pending",
            VerificationStatus::Approved => "Approved",
            VerificationStatus::Rejected => "Rejected",
        }
    }

    pub fn can_transition_to(&self, next: VerificationStatus) -> bool {
        use VerificationStatus::*;
        matches!(
            (self, next),
            (Pending, Approved) | (Pending, Rejected) | (Rejected, Pending) | (Rejected, Approved) | (Approved, Rejected)
        )
    }

    pub fn transition(self, next: VerificationStatus) -> Result<VerificationStatus> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(invalid("verification", self, next))
        }
    }
}

fn invalid(entity: &'static str, from: impl fmt::Display, to: impl fmt::Display) -> ApiError {
    ApiError::InvalidTransition {
        entity,
        from: from.to_string(),
        to: to.to_string(),
    }
}

macro_rules! impl_display_from_str {
    ($ty:ty, $name:literal, [$($variant:expr),+ $(,)?]) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = ApiError;

            // Case and separator insensitive: "under_review", "Under Review"
            // and "UNDERREVIEW" all parse.
            fn from_str(s: &str) -> Result<Self> {
                let wanted = squash(s);
                [$($variant),+]
                    .into_iter()
                    .find(|v: &$ty| squash(v.as_str()) == wanted)
                    .ok_or_else(|| ApiError::validation(format!("Unknown {} status '{}'", $name, s)))
            }
        }
    };
}

fn squash(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

impl_display_from_str!(JobStatus, "job", [
    JobStatus::Pending,
    JobStatus::Active,
    JobStatus::Rejected,
    JobStatus::Closed,
]);

impl_display_from_str!(ApplicationStatus, "application", [
    ApplicationStatus::Submitted,
    ApplicationStatus::UnderReview,
    ApplicationStatus::InterviewScheduled,
    ApplicationStatus::OfferExtended,
    ApplicationStatus::Rejected,
]);

impl_display_from_str!(VerificationStatus, "verification", [
    VerificationStatus::Pending,
    VerificationStatus::Approved,
    VerificationStatus::Rejected,
]);

impl VerificationStatus {
    /// Parse a status as stored on a Student/Employer record, where an approved
    /// account is written as "Verified".
    pub fn parse_account(s: &str) -> Option<Self> {
        if squash(s) == "verified" {
            return Some(VerificationStatus::Approved);
        }
        s.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_transitions() {
        assert!(JobStatus::Pending.can_transition_to(JobStatus::Active));
        assert!(JobStatus::Pending.can_transition_to(JobStatus::Rejected));
        assert!(JobStatus::Active.can_transition_to(JobStatus::Closed));
        assert!(!JobStatus::Closed.can_transition_to(JobStatus::Active));
        assert!(!JobStatus::Rejected.can_transition_to(JobStatus::Active));
        assert!(!JobStatus::Active.can_transition_to(JobStatus::Pending));

        let err = JobStatus::Closed.transition(JobStatus::Active).unwrap_err();
        assert!(matches!(err, ApiError::InvalidTransition { entity: "job", .. }));
    }

    #[test]
    fn test_application_pipeline_moves_forward_only() {
        use ApplicationStatus::*;
        assert!(Submitted.can_transition_to(UnderReview));
        assert!(Submitted.can_transition_to(InterviewScheduled));
        assert!(UnderReview.can_transition_to(OfferExtended));
        assert!(InterviewScheduled.can_transition_to(Rejected));
        assert!(!InterviewScheduled.can_transition_to(Submitted));
        assert!(!OfferExtended.can_transition_to(Rejected));
        assert!(!Rejected.can_transition_to(UnderReview));
    }

    #[test]
    fn test_application_same_status_allowed() {
        use ApplicationStatus::*;
        assert!(UnderReview.can_transition_to(UnderReview));
        assert!(Rejected.can_transition_to(Rejected));
    }

    #[test]
    fn test_verification_transitions() {
        use VerificationStatus::*;
        assert!(Pending.can_transition_to(Approved));
        assert!(Pending.can_transition_to(Rejected));
        assert!(Rejected.can_transition_to(Pending));
        assert!(Approved.can_transition_to(Rejected));
        assert!(!Approved.can_transition_to(Approved));
        assert!(!Approved.can_transition_to(Pending));
    }

    #[test]
    fn test_parse_is_lenient() {
        assert_eq!("under review".parse::<ApplicationStatus>().unwrap(), ApplicationStatus::UnderReview);
        assert_eq!("Interview_Scheduled".parse::<ApplicationStatus>().unwrap(), ApplicationStatus::InterviewScheduled);
        assert_eq!("ACTIVE".parse::<JobStatus>().unwrap(), JobStatus::Active);
        assert!("archived".parse::<JobStatus>().is_err());
    }

    #[test]
    fn test_verified_alias() {
        assert_eq!(VerificationStatus::parse_account("Verified"), Some(VerificationStatus::Approved));
        assert_eq!(VerificationStatus::parse_account("Pending"), Some(VerificationStatus::Pending));
        assert_eq!(VerificationStatus::parse_account("???"), None);
        let parsed: VerificationStatus = serde_json::from_str("\"Verified\"").unwrap();
        assert_eq!(parsed, VerificationStatus::Approved);
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(
            serde_json::to_string(&ApplicationStatus::OfferExtended).unwrap(),
            "\"Offer Extended\""
        );
        assert_eq!(serde_json::to_string(&JobStatus::Pending).unwrap(), "\"Pending\"");
    }
}
