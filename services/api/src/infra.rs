use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use fitmatch::config::LlmConfig;
use fitmatch::marketplace::{
    Appointment, AppointmentId, AppointmentRepository, Document, DocumentId, DocumentRepository,
    LifecycleEngine, MarketplaceState, MatchingAdapter, OpenAiClient, ProfileService,
    ProfileStatus, RankingOracle, RepositoryError, RequestId, ScreeningService, ServiceRequest,
    ServiceRequestRepository, ServiceRequestStatus, Skill, SkillExtractor, SkillRepository,
    Summarizer, User, UserId, UserRepository,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tracing::{info, warn};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryUserRepository {
    records: Arc<Mutex<HashMap<UserId, User>>>,
}

impl UserRepository for InMemoryUserRepository {
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
                    .map(|profile| profile.profile_status == ProfileStatus::PendingVerification)
                    .unwrap_or(false)
            })
            .cloned()
            .collect();
        users.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(users)
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryDocumentRepository {
    records: Arc<Mutex<HashMap<DocumentId, Document>>>,
}

impl DocumentRepository for InMemoryDocumentRepository {
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
pub(crate) struct InMemorySkillRepository {
    // Keyed by the lowercased name: the case-insensitive unique constraint.
    records: Arc<Mutex<HashMap<String, Skill>>>,
}

impl SkillRepository for InMemorySkillRepository {
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
        Ok(guard.values().find(|skill| skill.name == name).cloned())
    }

    fn all(&self) -> Result<Vec<Skill>, RepositoryError> {
        let guard = self.records.lock().expect("skill mutex poisoned");
        let mut skills: Vec<Skill> = guard.values().cloned().collect();
        skills.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(skills)
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryServiceRequestRepository {
    records: Arc<Mutex<HashMap<RequestId, ServiceRequest>>>,
}

impl ServiceRequestRepository for InMemoryServiceRequestRepository {
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
pub(crate) struct InMemoryAppointmentRepository {
    records: Arc<Mutex<HashMap<AppointmentId, Appointment>>>,
}

impl AppointmentRepository for InMemoryAppointmentRepository {
    fn insert(&self, appointment: Appointment) -> Result<Appointment, RepositoryError> {
        // Check-and-insert under one lock: the per-request uniqueness this
        // store promises as the final selection arbiter.
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

pub(crate) type InMemoryMarketplace = MarketplaceState<
    InMemoryUserRepository,
    InMemoryServiceRequestRepository,
    InMemoryAppointmentRepository,
    InMemorySkillRepository,
    InMemoryDocumentRepository,
>;

/// Wires the in-memory repositories and the configured capabilities into one
/// marketplace state. Without an API key the capability handles stay empty
/// and screening/matching run in their sentinel modes.
pub(crate) fn build_marketplace(llm: &LlmConfig) -> Arc<InMemoryMarketplace> {
    let users = Arc::new(InMemoryUserRepository::default());
    let documents = Arc::new(InMemoryDocumentRepository::default());
    let skills = Arc::new(InMemorySkillRepository::default());
    let requests = Arc::new(InMemoryServiceRequestRepository::default());
    let appointments = Arc::new(InMemoryAppointmentRepository::default());

    let client = if llm.is_configured() {
        match OpenAiClient::from_config(llm) {
            Ok(client) => {
                info!(model = %llm.model, "language-model capabilities configured");
                Some(Arc::new(client))
            }
            Err(err) => {
                warn!(error = %err, "failed to build language-model client, running degraded");
                None
            }
        }
    } else {
        info!("no language-model api key configured, screening and matching run degraded");
        None
    };

    let summarizer = client
        .clone()
        .map(|client| client as Arc<dyn Summarizer>);
    let extractor = client
        .clone()
        .map(|client| client as Arc<dyn SkillExtractor>);
    let oracle = client.map(|client| client as Arc<dyn RankingOracle>);

    let matching = MatchingAdapter::new(requests.clone(), users.clone(), oracle);
    let lifecycle = LifecycleEngine::new(
        users.clone(),
        requests,
        appointments,
        matching,
    );
    let screening = ScreeningService::new(
        users.clone(),
        skills,
        documents.clone(),
        summarizer,
        extractor,
    );
    let profiles = ProfileService::new(users, documents);

    Arc::new(MarketplaceState {
        lifecycle,
        screening,
        profiles,
    })
}
