use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier for any account: client, professional, or admin.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

/// Identifier for a client's service request.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RequestId(pub String);

/// Identifier for the appointment created when a client picks a professional.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AppointmentId(pub String);

/// Identifier for uploaded document metadata.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocumentId(pub String);

/// Identifier for a canonical skill row.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SkillId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for AppointmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for SkillId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Role tag carried by every account. The identity context authenticates the
/// principal; this crate only consumes the resulting id and role set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    Client,
    Professional,
    Admin,
}

impl UserRole {
    pub const fn label(self) -> &'static str {
        match self {
            UserRole::Client => "CLIENT",
            UserRole::Professional => "PROFESSIONAL",
            UserRole::Admin => "ADMIN",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "CLIENT" => Some(UserRole::Client),
            "PROFESSIONAL" => Some(UserRole::Professional),
            "ADMIN" => Some(UserRole::Admin),
            _ => None,
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Flat account record. Professionals carry their role-specific payload
/// inline instead of subclassing, so every component can operate on one
/// role-discriminated shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub display_name: String,
    pub phone: Option<String>,
    pub role: UserRole,
    pub professional: Option<ProfessionalProfile>,
}

impl User {
    pub fn is_verified_professional(&self) -> bool {
        self.professional
            .as_ref()
            .map(|profile| profile.profile_status == ProfileStatus::Verified)
            .unwrap_or(false)
    }
}

/// Screening gate for a professional's visibility to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProfileStatus {
    PendingVerification,
    Verified,
    Rejected,
}

impl ProfileStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ProfileStatus::PendingVerification => "PENDING_VERIFICATION",
            ProfileStatus::Verified => "VERIFIED",
            ProfileStatus::Rejected => "REJECTED",
        }
    }
}

impl fmt::Display for ProfileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Professional-specific payload on a `User`.
///
/// `profile_status`, `summarized_skills`, and `skill_names` are owned by the
/// screening pipeline (plus the admin override) and are never client-writable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfessionalProfile {
    pub profession: String,
    pub years_of_experience: Option<u8>,
    pub qualifications: Option<String>,
    pub about_you: Option<String>,
    pub social_links: BTreeMap<String, String>,
    pub profile_status: ProfileStatus,
    pub summarized_skills: Option<String>,
    pub skill_names: BTreeSet<String>,
    pub document_refs: Vec<DocumentId>,
    pub updated_at: DateTime<Utc>,
}

/// Metadata for an uploaded credential document. Bytes live in blob storage
/// behind `storage_locator`; `extracted_text` is filled by the external text
/// extraction collaborator when it has run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub owner: UserId,
    pub file_name: String,
    pub mime_type: String,
    pub storage_locator: String,
    pub extracted_text: Option<String>,
}

/// Canonical skill vocabulary row. Append-only; created lazily the first time
/// screening extracts the name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skill {
    pub id: SkillId,
    pub name: String,
}

/// A client's ask for a professional, tracked through the fixed lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceRequest {
    pub id: RequestId,
    pub client_id: UserId,
    pub category: String,
    pub description: String,
    pub budget: Option<String>,
    pub status: ServiceRequestStatus,
    pub matching_explanation: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceRequestStatus {
    Open,
    Matched,
    PendingContact,
    Accepted,
    RejectedByProfessional,
    Completed,
    Cancelled,
}

impl ServiceRequestStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ServiceRequestStatus::Open => "OPEN",
            ServiceRequestStatus::Matched => "MATCHED",
            ServiceRequestStatus::PendingContact => "PENDING_CONTACT",
            ServiceRequestStatus::Accepted => "ACCEPTED",
            ServiceRequestStatus::RejectedByProfessional => "REJECTED_BY_PROFESSIONAL",
            ServiceRequestStatus::Completed => "COMPLETED",
            ServiceRequestStatus::Cancelled => "CANCELLED",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            ServiceRequestStatus::Completed
                | ServiceRequestStatus::Cancelled
                | ServiceRequestStatus::RejectedByProfessional
        )
    }

    /// Cancellation is only legal before the professional has accepted.
    pub const fn can_cancel(self) -> bool {
        matches!(
            self,
            ServiceRequestStatus::Open
                | ServiceRequestStatus::Matched
                | ServiceRequestStatus::PendingContact
        )
    }
}

impl fmt::Display for ServiceRequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Record of a client having selected a specific professional for a request.
/// At most one appointment ever exists per service request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: AppointmentId,
    pub service_request_id: RequestId,
    pub client_id: UserId,
    pub professional_id: UserId,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentStatus {
    Requested,
    AcceptedByProfessional,
    Confirmed,
    Completed,
    CancelledByClient,
    CancelledByProfessional,
}

impl AppointmentStatus {
    pub const fn label(self) -> &'static str {
        match self {
            AppointmentStatus::Requested => "REQUESTED",
            AppointmentStatus::AcceptedByProfessional => "ACCEPTED_BY_PROFESSIONAL",
            AppointmentStatus::Confirmed => "CONFIRMED",
            AppointmentStatus::Completed => "COMPLETED",
            AppointmentStatus::CancelledByClient => "CANCELLED_BY_CLIENT",
            AppointmentStatus::CancelledByProfessional => "CANCELLED_BY_PROFESSIONAL",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            AppointmentStatus::Completed
                | AppointmentStatus::CancelledByClient
                | AppointmentStatus::CancelledByProfessional
        )
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

static USER_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static REQUEST_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static APPOINTMENT_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static DOCUMENT_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static SKILL_SEQUENCE: AtomicU64 = AtomicU64::new(1);

pub fn next_user_id() -> UserId {
    let id = USER_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    UserId(format!("user-{id:06}"))
}

pub fn next_request_id() -> RequestId {
    let id = REQUEST_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    RequestId(format!("req-{id:06}"))
}

pub fn next_appointment_id() -> AppointmentId {
    let id = APPOINTMENT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    AppointmentId(format!("apt-{id:06}"))
}

pub fn next_document_id() -> DocumentId {
    let id = DOCUMENT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    DocumentId(format!("doc-{id:06}"))
}

pub fn next_skill_id() -> SkillId {
    let id = SKILL_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    SkillId(format!("skill-{id:06}"))
}
