use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use chrono::Utc;

use crate::marketplace::domain::{
    Appointment, AppointmentId, Document, DocumentId, ProfessionalProfile, ProfileStatus,
    RequestId, ServiceRequest, ServiceRequestStatus, Skill, User, UserId, UserRole,
};
use crate::marketplace::lifecycle::LifecycleEngine;
use crate::marketplace::llm::{
    CapabilityError, ProfileLine, RankingContext, RankingOracle, RankingOutcome, SkillExtractor,
    Summarizer,
};
use crate::marketplace::matching::MatchingAdapter;
use crate::marketplace::profiles::ProfileService;
use crate::marketplace::repository::{
    AppointmentRepository, DocumentRepository, RepositoryError, ServiceRequestRepository,
    SkillRepository, UserRepository,
};
use crate::marketplace::router::{marketplace_router, MarketplaceState};
use crate::marketplace::screening::ScreeningService;

#[derive(Default, Clone)]
pub(super) struct MemoryUsers {
    records: Arc<Mutex<HashMap<UserId, User>>>,
}

impl UserRepository for MemoryUsers {
    fn insert(&self, user: User) -> Result<User, RepositoryError> {
        let mut guard = self.records.lock().expect("user mutex poisoned");
        let duplicate = guard
            .values()
            .any(|existing| existing.email.eq_ignore_ascii_case(&user.email));
        if duplicate || guard.contains_key(&user.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    fn update(&self, user: User) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("user mutex poisoned");
        if !guard.contains_key(&user.id) {
            return Err(RepositoryError::NotFound);
        }
        guard.insert(user.id.clone(), user);
        Ok(())
    }

    fn fetch(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        let guard = self.records.lock().expect("user mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        let guard = self.records.lock().expect("user mutex poisoned");
        Ok(guard
            .values()
            .find(|user| user.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    fn verified_professionals(&self) -> Result<Vec<User>, RepositoryError> {
        let guard = self.records.lock().expect("user mutex poisoned");
        let mut users: Vec<User> = guard
            .values()
            .filter(|user| user.is_verified_professional())
            .cloned()
            .collect();
        users.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(users)
    }

    fn pending_professionals(&self) -> Result<Vec<User>, RepositoryError> {
        let guard = self.records.lock().expect("user mutex poisoned");
        let mut users: Vec<User> = guard
            .values()
            .filter(|user| {
                user.professional
                    .as_ref()
                    .map(|profile| {
                        profile.profile_status == ProfileStatus::PendingVerification
                    })
                    .unwrap_or(false)
            })
            .cloned()
            .collect();
        users.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(users)
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryDocuments {
    records: Arc<Mutex<HashMap<DocumentId, Document>>>,
}

impl DocumentRepository for MemoryDocuments {
    fn insert(&self, document: Document) -> Result<Document, RepositoryError> {
        let mut guard = self.records.lock().expect("document mutex poisoned");
        if guard.contains_key(&document.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(document.id.clone(), document.clone());
        Ok(document)
    }

    fn fetch(&self, id: &DocumentId) -> Result<Option<Document>, RepositoryError> {
        let guard = self.records.lock().expect("document mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn for_owner(&self, owner: &UserId) -> Result<Vec<Document>, RepositoryError> {
        let guard = self.records.lock().expect("document mutex poisoned");
        let mut documents: Vec<Document> = guard
            .values()
            .filter(|document| document.owner == *owner)
            .cloned()
            .collect();
        documents.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(documents)
    }

    fn delete_for_owner(&self, owner: &UserId) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("document mutex poisoned");
        guard.retain(|_, document| document.owner != *owner);
        Ok(())
    }
}

#[derive(Default, Clone)]
pub(super) struct MemorySkills {
    records: Arc<Mutex<HashMap<String, Skill>>>,
}

impl MemorySkills {
    pub(super) fn count(&self) -> usize {
        self.records.lock().expect("skill mutex poisoned").len()
    }
}

impl SkillRepository for MemorySkills {
    fn insert(&self, skill: Skill) -> Result<Skill, RepositoryError> {
        let mut guard = self.records.lock().expect("skill mutex poisoned");
        let key = skill.name.to_lowercase();
        if guard.contains_key(&key) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(key, skill.clone());
        Ok(skill)
    }

    fn find_by_name(&self, name: &str) -> Result<Option<Skill>, RepositoryError> {
        let guard = self.records.lock().expect("skill mutex poisoned");
        Ok(guard
            .values()
            .find(|skill| skill.name == name)
            .cloned())
    }

    fn all(&self) -> Result<Vec<Skill>, RepositoryError> {
        let guard = self.records.lock().expect("skill mutex poisoned");
        let mut skills: Vec<Skill> = guard.values().cloned().collect();
        skills.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(skills)
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryRequests {
    records: Arc<Mutex<HashMap<RequestId, ServiceRequest>>>,
}

impl ServiceRequestRepository for MemoryRequests {
    fn insert(&self, request: ServiceRequest) -> Result<ServiceRequest, RepositoryError> {
        let mut guard = self.records.lock().expect("request mutex poisoned");
        if guard.contains_key(&request.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(request.id.clone(), request.clone());
        Ok(request)
    }

    fn update(&self, request: ServiceRequest) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("request mutex poisoned");
        if !guard.contains_key(&request.id) {
            return Err(RepositoryError::NotFound);
        }
        guard.insert(request.id.clone(), request);
        Ok(())
    }

    fn fetch(&self, id: &RequestId) -> Result<Option<ServiceRequest>, RepositoryError> {
        let guard = self.records.lock().expect("request mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn for_client(&self, client: &UserId) -> Result<Vec<ServiceRequest>, RepositoryError> {
        let guard = self.records.lock().expect("request mutex poisoned");
        let mut requests: Vec<ServiceRequest> = guard
            .values()
            .filter(|request| request.client_id == *client)
            .cloned()
            .collect();
        requests.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(requests)
    }

    fn open_excluding(&self, user: &UserId) -> Result<Vec<ServiceRequest>, RepositoryError> {
        let guard = self.records.lock().expect("request mutex poisoned");
        let mut requests: Vec<ServiceRequest> = guard
            .values()
            .filter(|request| {
                request.status == ServiceRequestStatus::Open && request.client_id != *user
            })
            .cloned()
            .collect();
        requests.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(requests)
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryAppointments {
    records: Arc<Mutex<HashMap<AppointmentId, Appointment>>>,
}

impl AppointmentRepository for MemoryAppointments {
    fn insert(&self, appointment: Appointment) -> Result<Appointment, RepositoryError> {
        let mut guard = self.records.lock().expect("appointment mutex poisoned");
        let taken = guard
            .values()
            .any(|existing| existing.service_request_id == appointment.service_request_id);
        if taken || guard.contains_key(&appointment.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(appointment.id.clone(), appointment.clone());
        Ok(appointment)
    }

    fn update(&self, appointment: Appointment) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("appointment mutex poisoned");
        if !guard.contains_key(&appointment.id) {
            return Err(RepositoryError::NotFound);
        }
        guard.insert(appointment.id.clone(), appointment);
        Ok(())
    }

    fn fetch(&self, id: &AppointmentId) -> Result<Option<Appointment>, RepositoryError> {
        let guard = self.records.lock().expect("appointment mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn find_by_request(
        &self,
        request: &RequestId,
    ) -> Result<Option<Appointment>, RepositoryError> {
        let guard = self.records.lock().expect("appointment mutex poisoned");
        Ok(guard
            .values()
            .find(|appointment| appointment.service_request_id == *request)
            .cloned())
    }

    fn for_professional(
        &self,
        professional: &UserId,
    ) -> Result<Vec<Appointment>, RepositoryError> {
        let guard = self.records.lock().expect("appointment mutex poisoned");
        let mut appointments: Vec<Appointment> = guard
            .values()
            .filter(|appointment| appointment.professional_id == *professional)
            .cloned()
            .collect();
        appointments.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(appointments)
    }
}

/// Deterministic summarizer/extractor double.
pub(super) struct StaticAnalyzer {
    pub(super) summary: String,
    pub(super) skills: String,
}

impl StaticAnalyzer {
    pub(super) fn new(summary: &str, skills: &str) -> Arc<Self> {
        Arc::new(Self {
            summary: summary.to_string(),
            skills: skills.to_string(),
        })
    }
}

impl Summarizer for StaticAnalyzer {
    fn summarize(&self, _profile_corpus: &str) -> Result<String, CapabilityError> {
        Ok(self.summary.clone())
    }
}

impl SkillExtractor for StaticAnalyzer {
    fn extract(&self, _profile_corpus: &str) -> Result<String, CapabilityError> {
        Ok(self.skills.clone())
    }
}

/// Capability double that always fails at the transport layer.
pub(super) struct FailingAnalyzer;

impl Summarizer for FailingAnalyzer {
    fn summarize(&self, _profile_corpus: &str) -> Result<String, CapabilityError> {
        Err(CapabilityError::Transport("connection refused".to_string()))
    }
}

impl SkillExtractor for FailingAnalyzer {
    fn extract(&self, _profile_corpus: &str) -> Result<String, CapabilityError> {
        Err(CapabilityError::Transport("connection refused".to_string()))
    }
}

/// Oracle double replaying a canned outcome.
pub(super) struct ScriptedOracle {
    outcome: RankingOutcome,
}

impl ScriptedOracle {
    pub(super) fn new(outcome: RankingOutcome) -> Arc<Self> {
        Arc::new(Self { outcome })
    }
}

impl RankingOracle for ScriptedOracle {
    fn rank(
        &self,
        _context: &RankingContext,
        _pool: &[ProfileLine],
    ) -> Result<RankingOutcome, CapabilityError> {
        Ok(self.outcome.clone())
    }
}

/// Oracle double that always fails at the transport layer.
pub(super) struct FailingOracle;

impl RankingOracle for FailingOracle {
    fn rank(
        &self,
        _context: &RankingContext,
        _pool: &[ProfileLine],
    ) -> Result<RankingOutcome, CapabilityError> {
        Err(CapabilityError::Transport("oracle unreachable".to_string()))
    }
}

/// One bundle of in-memory repositories shared by the services under test.
pub(super) struct Fixture {
    pub(super) users: Arc<MemoryUsers>,
    pub(super) documents: Arc<MemoryDocuments>,
    pub(super) skills: Arc<MemorySkills>,
    pub(super) requests: Arc<MemoryRequests>,
    pub(super) appointments: Arc<MemoryAppointments>,
}

impl Fixture {
    pub(super) fn new() -> Self {
        Self {
            users: Arc::new(MemoryUsers::default()),
            documents: Arc::new(MemoryDocuments::default()),
            skills: Arc::new(MemorySkills::default()),
            requests: Arc::new(MemoryRequests::default()),
            appointments: Arc::new(MemoryAppointments::default()),
        }
    }

    pub(super) fn engine(
        &self,
        oracle: Option<Arc<dyn RankingOracle>>,
    ) -> LifecycleEngine<MemoryUsers, MemoryRequests, MemoryAppointments> {
        let matching = MatchingAdapter::new(self.requests.clone(), self.users.clone(), oracle);
        LifecycleEngine::new(
            self.users.clone(),
            self.requests.clone(),
            self.appointments.clone(),
            matching,
        )
    }

    pub(super) fn adapter(
        &self,
        oracle: Option<Arc<dyn RankingOracle>>,
    ) -> MatchingAdapter<MemoryRequests, MemoryUsers> {
        MatchingAdapter::new(self.requests.clone(), self.users.clone(), oracle)
    }

    pub(super) fn screening(
        &self,
        summarizer: Option<Arc<dyn Summarizer>>,
        extractor: Option<Arc<dyn SkillExtractor>>,
    ) -> ScreeningService<MemoryUsers, MemorySkills, MemoryDocuments> {
        ScreeningService::new(
            self.users.clone(),
            self.skills.clone(),
            self.documents.clone(),
            summarizer,
            extractor,
        )
    }

    pub(super) fn profiles(&self) -> ProfileService<MemoryUsers, MemoryDocuments> {
        ProfileService::new(self.users.clone(), self.documents.clone())
    }

    pub(super) fn router(
        &self,
        oracle: Option<Arc<dyn RankingOracle>>,
        summarizer: Option<Arc<dyn Summarizer>>,
        extractor: Option<Arc<dyn SkillExtractor>>,
    ) -> axum::Router {
        let state = MarketplaceState {
            lifecycle: self.engine(oracle),
            screening: self.screening(summarizer, extractor),
            profiles: self.profiles(),
        };
        marketplace_router(Arc::new(state))
    }

    pub(super) fn seed_client(&self, id: &str) -> User {
        let user = User {
            id: UserId(id.to_string()),
            email: format!("{id}@example.com"),
            display_name: format!("Client {id}"),
            phone: None,
            role: UserRole::Client,
            professional: None,
        };
        self.users.insert(user).expect("seed client")
    }

    pub(super) fn seed_professional(&self, id: &str, status: ProfileStatus) -> User {
        let user = User {
            id: UserId(id.to_string()),
            email: format!("{id}@example.com"),
            display_name: format!("Professional {id}"),
            phone: Some("+39 333 0000000".to_string()),
            role: UserRole::Professional,
            professional: Some(ProfessionalProfile {
                profession: "Personal trainer".to_string(),
                years_of_experience: Some(7),
                qualifications: Some("Certified strength coach".to_string()),
                about_you: Some("Focused on post-injury recovery plans.".to_string()),
                social_links: BTreeMap::new(),
                profile_status: status,
                summarized_skills: None,
                skill_names: BTreeSet::new(),
                document_refs: Vec::new(),
                updated_at: Utc::now(),
            }),
        };
        self.users.insert(user).expect("seed professional")
    }

    pub(super) fn seed_request(
        &self,
        id: &str,
        client: &UserId,
        status: ServiceRequestStatus,
    ) -> ServiceRequest {
        let now = Utc::now();
        let request = ServiceRequest {
            id: RequestId(id.to_string()),
            client_id: client.clone(),
            category: "Yoga".to_string(),
            description: "Weekly one-on-one yoga sessions at home.".to_string(),
            budget: Some("40-60 EUR per session".to_string()),
            status,
            matching_explanation: None,
            created_at: now,
            updated_at: now,
        };
        self.requests.insert(request).expect("seed request")
    }
}
