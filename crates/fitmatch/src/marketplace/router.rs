use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Path, State},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::domain::{AppointmentId, ProfileStatus, RequestId, UserId, UserRole};
use super::error::MarketplaceError;
use super::lifecycle::{LifecycleEngine, NewServiceRequest};
use super::profiles::{NewClient, NewProfessional, ProfessionalProfileUpdate, ProfileService};
use super::repository::{
    AppointmentRepository, DocumentRepository, ServiceRequestRepository, SkillRepository,
    UserRepository,
};
use super::screening::ScreeningService;

/// The authenticated caller, as asserted by the upstream identity context.
/// The core never re-derives identity; it reads what the gateway forwarded.
#[derive(Debug, Clone)]
pub struct Principal {
    pub user_id: UserId,
    pub roles: Vec<UserRole>,
}

impl Principal {
    pub fn has_role(&self, role: UserRole) -> bool {
        self.roles.contains(&role)
    }
}

pub(crate) const PRINCIPAL_ID_HEADER: &str = "x-principal-id";
pub(crate) const PRINCIPAL_ROLES_HEADER: &str = "x-principal-roles";

#[axum::async_trait]
impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(PRINCIPAL_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty());
        let Some(user_id) = user_id else {
            let payload = json!({ "error": "user identifier not found" });
            return Err((StatusCode::UNAUTHORIZED, Json(payload)).into_response());
        };

        let roles = parts
            .headers
            .get(PRINCIPAL_ROLES_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(|raw| raw.split(',').filter_map(UserRole::parse).collect())
            .unwrap_or_default();

        Ok(Principal {
            user_id: UserId(user_id.to_string()),
            roles,
        })
    }
}

/// Shared handler state bundling the three marketplace services.
pub struct MarketplaceState<U, R, A, S, D> {
    pub lifecycle: LifecycleEngine<U, R, A>,
    pub screening: ScreeningService<U, S, D>,
    pub profiles: ProfileService<U, D>,
}

/// Router builder exposing the marketplace operations. Identity arrives via
/// the principal headers; everything else is plain JSON.
pub fn marketplace_router<U, R, A, S, D>(state: Arc<MarketplaceState<U, R, A, S, D>>) -> Router
where
    U: UserRepository + 'static,
    R: ServiceRequestRepository + 'static,
    A: AppointmentRepository + 'static,
    S: SkillRepository + 'static,
    D: DocumentRepository + 'static,
{
    Router::new()
        .route("/api/v1/clients", post(register_client::<U, R, A, S, D>))
        .route(
            "/api/v1/professionals",
            post(register_professional::<U, R, A, S, D>),
        )
        .route(
            "/api/v1/professionals/:id",
            get(public_profile::<U, R, A, S, D>),
        )
        .route(
            "/api/v1/professionals/:id/profile",
            get(full_profile::<U, R, A, S, D>).put(update_profile::<U, R, A, S, D>),
        )
        .route(
            "/api/v1/professionals/:id/screening",
            post(screen_professional::<U, R, A, S, D>),
        )
        .route(
            "/api/v1/professionals/:id/status",
            put(set_verification_status::<U, R, A, S, D>),
        )
        .route(
            "/api/v1/admin/professionals/pending",
            get(pending_professionals::<U, R, A, S, D>),
        )
        .route(
            "/api/v1/admin/professionals/:id/documents",
            get(professional_documents::<U, R, A, S, D>),
        )
        .route("/api/v1/requests", post(create_request::<U, R, A, S, D>))
        .route("/api/v1/requests/mine", get(my_requests::<U, R, A, S, D>))
        .route("/api/v1/requests/open", get(open_requests::<U, R, A, S, D>))
        .route("/api/v1/requests/:id", get(get_request::<U, R, A, S, D>))
        .route(
            "/api/v1/requests/:id/matches",
            post(request_matches::<U, R, A, S, D>),
        )
        .route(
            "/api/v1/requests/:id/selection",
            post(select_professional::<U, R, A, S, D>),
        )
        .route(
            "/api/v1/requests/:id/cancel",
            post(cancel_request::<U, R, A, S, D>),
        )
        .route(
            "/api/v1/appointments/mine",
            get(my_appointments::<U, R, A, S, D>),
        )
        .route(
            "/api/v1/appointments/:id/accept",
            post(accept_appointment::<U, R, A, S, D>),
        )
        .route(
            "/api/v1/appointments/:id/decline",
            post(decline_appointment::<U, R, A, S, D>),
        )
        .route(
            "/api/v1/appointments/:id/confirm",
            post(confirm_appointment::<U, R, A, S, D>),
        )
        .route(
            "/api/v1/appointments/:id/complete",
            post(complete_appointment::<U, R, A, S, D>),
        )
        .route(
            "/api/v1/appointments/:id/cancel",
            post(cancel_appointment::<U, R, A, S, D>),
        )
        .with_state(state)
}

fn error_response(err: MarketplaceError) -> Response {
    let status = match &err {
        MarketplaceError::NotFound(_) => StatusCode::NOT_FOUND,
        MarketplaceError::Forbidden(_) => StatusCode::FORBIDDEN,
        MarketplaceError::Conflict(_) => StatusCode::CONFLICT,
        MarketplaceError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        MarketplaceError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let payload = json!({ "error": err.to_string() });
    (status, Json(payload)).into_response()
}

fn require_role(principal: &Principal, role: UserRole) -> Result<(), Response> {
    if principal.has_role(role) {
        return Ok(());
    }
    let payload = json!({ "error": format!("{role} role required") });
    Err((StatusCode::FORBIDDEN, Json(payload)).into_response())
}

fn blocking_failed(err: tokio::task::JoinError) -> Response {
    let payload = json!({ "error": format!("operation aborted: {err}") });
    (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response()
}

#[derive(Debug, Deserialize)]
struct CreateRequestBody {
    category: String,
    description: String,
    #[serde(default)]
    budget: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SelectProfessionalBody {
    professional_id: String,
}

#[derive(Debug, Deserialize)]
struct SetStatusBody {
    status: ProfileStatus,
}

async fn register_client<U, R, A, S, D>(
    State(state): State<Arc<MarketplaceState<U, R, A, S, D>>>,
    Json(body): Json<NewClient>,
) -> Response
where
    U: UserRepository + 'static,
    R: ServiceRequestRepository + 'static,
    A: AppointmentRepository + 'static,
    S: SkillRepository + 'static,
    D: DocumentRepository + 'static,
{
    match state.profiles.register_client(body) {
        Ok(user) => (StatusCode::CREATED, Json(user)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn register_professional<U, R, A, S, D>(
    State(state): State<Arc<MarketplaceState<U, R, A, S, D>>>,
    Json(body): Json<NewProfessional>,
) -> Response
where
    U: UserRepository + 'static,
    R: ServiceRequestRepository + 'static,
    A: AppointmentRepository + 'static,
    S: SkillRepository + 'static,
    D: DocumentRepository + 'static,
{
    match state.profiles.register_professional(body) {
        Ok(user) => (StatusCode::CREATED, Json(user)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn public_profile<U, R, A, S, D>(
    State(state): State<Arc<MarketplaceState<U, R, A, S, D>>>,
    Path(id): Path<String>,
) -> Response
where
    U: UserRepository + 'static,
    R: ServiceRequestRepository + 'static,
    A: AppointmentRepository + 'static,
    S: SkillRepository + 'static,
    D: DocumentRepository + 'static,
{
    match state.profiles.public_view(&UserId(id)) {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn full_profile<U, R, A, S, D>(
    State(state): State<Arc<MarketplaceState<U, R, A, S, D>>>,
    principal: Principal,
    Path(id): Path<String>,
) -> Response
where
    U: UserRepository + 'static,
    R: ServiceRequestRepository + 'static,
    A: AppointmentRepository + 'static,
    S: SkillRepository + 'static,
    D: DocumentRepository + 'static,
{
    match state.profiles.full_view(&UserId(id), &principal.user_id) {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn update_profile<U, R, A, S, D>(
    State(state): State<Arc<MarketplaceState<U, R, A, S, D>>>,
    principal: Principal,
    Path(id): Path<String>,
    Json(body): Json<ProfessionalProfileUpdate>,
) -> Response
where
    U: UserRepository + 'static,
    R: ServiceRequestRepository + 'static,
    A: AppointmentRepository + 'static,
    S: SkillRepository + 'static,
    D: DocumentRepository + 'static,
{
    match state
        .profiles
        .update_professional_profile(&UserId(id), &principal.user_id, body)
    {
        Ok(user) => (StatusCode::OK, Json(user)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn screen_professional<U, R, A, S, D>(
    State(state): State<Arc<MarketplaceState<U, R, A, S, D>>>,
    principal: Principal,
    Path(id): Path<String>,
) -> Response
where
    U: UserRepository + 'static,
    R: ServiceRequestRepository + 'static,
    A: AppointmentRepository + 'static,
    S: SkillRepository + 'static,
    D: DocumentRepository + 'static,
{
    if let Err(response) = require_role(&principal, UserRole::Admin) {
        return response;
    }

    // Screening blocks on the summarizer/extractor capabilities.
    let result =
        tokio::task::spawn_blocking(move || state.screening.screen_professional(&UserId(id)))
            .await;
    match result {
        Ok(Ok(user)) => (StatusCode::OK, Json(user)).into_response(),
        Ok(Err(err)) => error_response(err),
        Err(err) => blocking_failed(err),
    }
}

async fn set_verification_status<U, R, A, S, D>(
    State(state): State<Arc<MarketplaceState<U, R, A, S, D>>>,
    principal: Principal,
    Path(id): Path<String>,
    Json(body): Json<SetStatusBody>,
) -> Response
where
    U: UserRepository + 'static,
    R: ServiceRequestRepository + 'static,
    A: AppointmentRepository + 'static,
    S: SkillRepository + 'static,
    D: DocumentRepository + 'static,
{
    if let Err(response) = require_role(&principal, UserRole::Admin) {
        return response;
    }
    match state
        .screening
        .set_verification_status(&UserId(id), body.status)
    {
        Ok(user) => (StatusCode::OK, Json(user)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn pending_professionals<U, R, A, S, D>(
    State(state): State<Arc<MarketplaceState<U, R, A, S, D>>>,
    principal: Principal,
) -> Response
where
    U: UserRepository + 'static,
    R: ServiceRequestRepository + 'static,
    A: AppointmentRepository + 'static,
    S: SkillRepository + 'static,
    D: DocumentRepository + 'static,
{
    if let Err(response) = require_role(&principal, UserRole::Admin) {
        return response;
    }
    match state.screening.pending_professionals() {
        Ok(users) => (StatusCode::OK, Json(users)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn professional_documents<U, R, A, S, D>(
    State(state): State<Arc<MarketplaceState<U, R, A, S, D>>>,
    principal: Principal,
    Path(id): Path<String>,
) -> Response
where
    U: UserRepository + 'static,
    R: ServiceRequestRepository + 'static,
    A: AppointmentRepository + 'static,
    S: SkillRepository + 'static,
    D: DocumentRepository + 'static,
{
    if let Err(response) = require_role(&principal, UserRole::Admin) {
        return response;
    }
    match state.screening.documents_for(&UserId(id)) {
        Ok(documents) => (StatusCode::OK, Json(documents)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn create_request<U, R, A, S, D>(
    State(state): State<Arc<MarketplaceState<U, R, A, S, D>>>,
    principal: Principal,
    Json(body): Json<CreateRequestBody>,
) -> Response
where
    U: UserRepository + 'static,
    R: ServiceRequestRepository + 'static,
    A: AppointmentRepository + 'static,
    S: SkillRepository + 'static,
    D: DocumentRepository + 'static,
{
    if let Err(response) = require_role(&principal, UserRole::Client) {
        return response;
    }
    let input = NewServiceRequest {
        category: body.category,
        description: body.description,
        budget: body.budget,
    };
    match state.lifecycle.create_request(&principal.user_id, input) {
        Ok(request) => (StatusCode::CREATED, Json(request)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn my_requests<U, R, A, S, D>(
    State(state): State<Arc<MarketplaceState<U, R, A, S, D>>>,
    principal: Principal,
) -> Response
where
    U: UserRepository + 'static,
    R: ServiceRequestRepository + 'static,
    A: AppointmentRepository + 'static,
    S: SkillRepository + 'static,
    D: DocumentRepository + 'static,
{
    if let Err(response) = require_role(&principal, UserRole::Client) {
        return response;
    }
    match state.lifecycle.requests_for_client(&principal.user_id) {
        Ok(requests) => (StatusCode::OK, Json(requests)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn open_requests<U, R, A, S, D>(
    State(state): State<Arc<MarketplaceState<U, R, A, S, D>>>,
    principal: Principal,
) -> Response
where
    U: UserRepository + 'static,
    R: ServiceRequestRepository + 'static,
    A: AppointmentRepository + 'static,
    S: SkillRepository + 'static,
    D: DocumentRepository + 'static,
{
    if let Err(response) = require_role(&principal, UserRole::Professional) {
        return response;
    }
    match state
        .lifecycle
        .open_requests_for_professional(&principal.user_id)
    {
        Ok(requests) => (StatusCode::OK, Json(requests)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn get_request<U, R, A, S, D>(
    State(state): State<Arc<MarketplaceState<U, R, A, S, D>>>,
    principal: Principal,
    Path(id): Path<String>,
) -> Response
where
    U: UserRepository + 'static,
    R: ServiceRequestRepository + 'static,
    A: AppointmentRepository + 'static,
    S: SkillRepository + 'static,
    D: DocumentRepository + 'static,
{
    match state
        .lifecycle
        .get_request(&RequestId(id), &principal.user_id)
    {
        Ok(request) => (StatusCode::OK, Json(request)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn request_matches<U, R, A, S, D>(
    State(state): State<Arc<MarketplaceState<U, R, A, S, D>>>,
    principal: Principal,
    Path(id): Path<String>,
) -> Response
where
    U: UserRepository + 'static,
    R: ServiceRequestRepository + 'static,
    A: AppointmentRepository + 'static,
    S: SkillRepository + 'static,
    D: DocumentRepository + 'static,
{
    if let Err(response) = require_role(&principal, UserRole::Client) {
        return response;
    }

    // The ranking oracle is blocking, slow, and unreliable; keep it off the
    // async workers.
    let result = tokio::task::spawn_blocking(move || {
        state
            .lifecycle
            .request_matches(&RequestId(id), &principal.user_id)
    })
    .await;
    match result {
        Ok(Ok((request, outcome))) => {
            let shortlist: Vec<_> = outcome
                .ranked
                .iter()
                .map(|user| {
                    json!({
                        "id": user.id,
                        "display_name": user.display_name,
                        "profession": user
                            .professional
                            .as_ref()
                            .map(|profile| profile.profession.clone()),
                        "summarized_skills": user
                            .professional
                            .as_ref()
                            .and_then(|profile| profile.summarized_skills.clone()),
                    })
                })
                .collect();
            let payload = json!({
                "request": request,
                "rationale": outcome.rationale,
                "ranked": shortlist,
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Ok(Err(err)) => error_response(err),
        Err(err) => blocking_failed(err),
    }
}

async fn select_professional<U, R, A, S, D>(
    State(state): State<Arc<MarketplaceState<U, R, A, S, D>>>,
    principal: Principal,
    Path(id): Path<String>,
    Json(body): Json<SelectProfessionalBody>,
) -> Response
where
    U: UserRepository + 'static,
    R: ServiceRequestRepository + 'static,
    A: AppointmentRepository + 'static,
    S: SkillRepository + 'static,
    D: DocumentRepository + 'static,
{
    if let Err(response) = require_role(&principal, UserRole::Client) {
        return response;
    }
    match state.lifecycle.select_professional(
        &RequestId(id),
        &UserId(body.professional_id),
        &principal.user_id,
    ) {
        Ok(appointment) => (StatusCode::CREATED, Json(appointment)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn cancel_request<U, R, A, S, D>(
    State(state): State<Arc<MarketplaceState<U, R, A, S, D>>>,
    principal: Principal,
    Path(id): Path<String>,
) -> Response
where
    U: UserRepository + 'static,
    R: ServiceRequestRepository + 'static,
    A: AppointmentRepository + 'static,
    S: SkillRepository + 'static,
    D: DocumentRepository + 'static,
{
    if let Err(response) = require_role(&principal, UserRole::Client) {
        return response;
    }
    match state
        .lifecycle
        .cancel_request(&RequestId(id), &principal.user_id)
    {
        Ok(request) => (StatusCode::OK, Json(request)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn my_appointments<U, R, A, S, D>(
    State(state): State<Arc<MarketplaceState<U, R, A, S, D>>>,
    principal: Principal,
) -> Response
where
    U: UserRepository + 'static,
    R: ServiceRequestRepository + 'static,
    A: AppointmentRepository + 'static,
    S: SkillRepository + 'static,
    D: DocumentRepository + 'static,
{
    if let Err(response) = require_role(&principal, UserRole::Professional) {
        return response;
    }
    match state
        .lifecycle
        .appointments_for_professional(&principal.user_id)
    {
        Ok(appointments) => (StatusCode::OK, Json(appointments)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn accept_appointment<U, R, A, S, D>(
    State(state): State<Arc<MarketplaceState<U, R, A, S, D>>>,
    principal: Principal,
    Path(id): Path<String>,
) -> Response
where
    U: UserRepository + 'static,
    R: ServiceRequestRepository + 'static,
    A: AppointmentRepository + 'static,
    S: SkillRepository + 'static,
    D: DocumentRepository + 'static,
{
    match state
        .lifecycle
        .accept_appointment(&AppointmentId(id), &principal.user_id)
    {
        Ok(appointment) => (StatusCode::OK, Json(appointment)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn decline_appointment<U, R, A, S, D>(
    State(state): State<Arc<MarketplaceState<U, R, A, S, D>>>,
    principal: Principal,
    Path(id): Path<String>,
) -> Response
where
    U: UserRepository + 'static,
    R: ServiceRequestRepository + 'static,
    A: AppointmentRepository + 'static,
    S: SkillRepository + 'static,
    D: DocumentRepository + 'static,
{
    match state
        .lifecycle
        .decline_appointment(&AppointmentId(id), &principal.user_id)
    {
        Ok(appointment) => (StatusCode::OK, Json(appointment)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn confirm_appointment<U, R, A, S, D>(
    State(state): State<Arc<MarketplaceState<U, R, A, S, D>>>,
    principal: Principal,
    Path(id): Path<String>,
) -> Response
where
    U: UserRepository + 'static,
    R: ServiceRequestRepository + 'static,
    A: AppointmentRepository + 'static,
    S: SkillRepository + 'static,
    D: DocumentRepository + 'static,
{
    match state
        .lifecycle
        .confirm_appointment(&AppointmentId(id), &principal.user_id)
    {
        Ok(appointment) => (StatusCode::OK, Json(appointment)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn complete_appointment<U, R, A, S, D>(
    State(state): State<Arc<MarketplaceState<U, R, A, S, D>>>,
    principal: Principal,
    Path(id): Path<String>,
) -> Response
where
    U: UserRepository + 'static,
    R: ServiceRequestRepository + 'static,
    A: AppointmentRepository + 'static,
    S: SkillRepository + 'static,
    D: DocumentRepository + 'static,
{
    match state
        .lifecycle
        .complete_appointment(&AppointmentId(id), &principal.user_id)
    {
        Ok(appointment) => (StatusCode::OK, Json(appointment)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn cancel_appointment<U, R, A, S, D>(
    State(state): State<Arc<MarketplaceState<U, R, A, S, D>>>,
    principal: Principal,
    Path(id): Path<String>,
) -> Response
where
    U: UserRepository + 'static,
    R: ServiceRequestRepository + 'static,
    A: AppointmentRepository + 'static,
    S: SkillRepository + 'static,
    D: DocumentRepository + 'static,
{
    match state
        .lifecycle
        .cancel_appointment(&AppointmentId(id), &principal.user_id)
    {
        Ok(appointment) => (StatusCode::OK, Json(appointment)).into_response(),
        Err(err) => error_response(err),
    }
}
