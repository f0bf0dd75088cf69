//! Marketplace core: professional verification, request matching, and the
//! request/appointment lifecycle.
//!
//! Repositories and language-model capabilities are injected behind traits so
//! the services here stay persistence- and vendor-agnostic. The lifecycle
//! engine is the only writer of request/appointment status; the screening
//! pipeline is the only writer of a professional's verification state.

pub mod domain;
pub mod error;
pub mod lifecycle;
pub mod llm;
pub mod matching;
pub mod profiles;
pub mod repository;
pub mod router;
pub mod screening;

#[cfg(test)]
mod tests;

pub use domain::{
    Appointment, AppointmentId, AppointmentStatus, Document, DocumentId, ProfessionalProfile,
    ProfileStatus, RequestId, ServiceRequest, ServiceRequestStatus, Skill, SkillId, User, UserId,
    UserRole,
};
pub use error::MarketplaceError;
pub use lifecycle::{LifecycleEngine, NewServiceRequest};
pub use llm::{
    CapabilityError, OpenAiClient, ProfileLine, RankedEntry, RankingContext, RankingOracle,
    RankingOutcome, SkillExtractor, Summarizer,
};
pub use matching::{MatchOutcome, MatchingAdapter, MAX_SHORTLIST};
pub use profiles::{
    DocumentUpload, NewClient, NewProfessional, ProfessionalFullView, ProfessionalProfileUpdate,
    ProfessionalPublicView, ProfileService,
};
pub use repository::{
    AppointmentRepository, DocumentRepository, RepositoryError, ServiceRequestRepository,
    SkillRepository, UserRepository,
};
pub use router::{marketplace_router, MarketplaceState, Principal};
pub use screening::{ScreeningService, SCREENING_SKIPPED_SUMMARY};
