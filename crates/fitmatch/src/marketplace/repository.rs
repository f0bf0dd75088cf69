use super::domain::{
    Appointment, AppointmentId, Document, DocumentId, RequestId, ServiceRequest, Skill, User,
    UserId,
};

/// Error enumeration for storage failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Storage abstraction for accounts, covering clients, professionals, and
/// admins through the flat role-discriminated `User` record.
pub trait UserRepository: Send + Sync {
    /// Conflict when a user with the same email already exists.
    fn insert(&self, user: User) -> Result<User, RepositoryError>;
    fn update(&self, user: User) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &UserId) -> Result<Option<User>, RepositoryError>;
    fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError>;
    fn verified_professionals(&self) -> Result<Vec<User>, RepositoryError>;
    fn pending_professionals(&self) -> Result<Vec<User>, RepositoryError>;
}

/// Storage abstraction for uploaded document metadata. Documents are
/// immutable after insert and only disappear through the owner cascade.
pub trait DocumentRepository: Send + Sync {
    fn insert(&self, document: Document) -> Result<Document, RepositoryError>;
    fn fetch(&self, id: &DocumentId) -> Result<Option<Document>, RepositoryError>;
    fn for_owner(&self, owner: &UserId) -> Result<Vec<Document>, RepositoryError>;
    fn delete_for_owner(&self, owner: &UserId) -> Result<(), RepositoryError>;
}

/// Storage abstraction for the append-only skill vocabulary.
pub trait SkillRepository: Send + Sync {
    /// Conflict when a skill with the same name already exists. The name
    /// constraint is case-insensitive; a Conflict is the storage layer
    /// settling a concurrent create, not a caller bug.
    fn insert(&self, skill: Skill) -> Result<Skill, RepositoryError>;
    /// Exact-name lookup.
    fn find_by_name(&self, name: &str) -> Result<Option<Skill>, RepositoryError>;
    fn all(&self) -> Result<Vec<Skill>, RepositoryError>;
}

/// Storage abstraction for service requests.
pub trait ServiceRequestRepository: Send + Sync {
    fn insert(&self, request: ServiceRequest) -> Result<ServiceRequest, RepositoryError>;
    fn update(&self, request: ServiceRequest) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &RequestId) -> Result<Option<ServiceRequest>, RepositoryError>;
    fn for_client(&self, client: &UserId) -> Result<Vec<ServiceRequest>, RepositoryError>;
    /// Open requests excluding those submitted by the given user, so a
    /// professional browsing the board never sees their own asks.
    fn open_excluding(&self, user: &UserId) -> Result<Vec<ServiceRequest>, RepositoryError>;
}

/// Storage abstraction for appointments.
pub trait AppointmentRepository: Send + Sync {
    /// Conflict when an appointment already exists for the same service
    /// request. This uniqueness is the final arbiter of "choose once";
    /// application-level checks are an optimization on top of it.
    fn insert(&self, appointment: Appointment) -> Result<Appointment, RepositoryError>;
    fn update(&self, appointment: Appointment) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &AppointmentId) -> Result<Option<Appointment>, RepositoryError>;
    fn find_by_request(&self, request: &RequestId)
        -> Result<Option<Appointment>, RepositoryError>;
    fn for_professional(&self, professional: &UserId)
        -> Result<Vec<Appointment>, RepositoryError>;
}
