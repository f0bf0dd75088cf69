use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use super::domain::{
    next_appointment_id, next_request_id, Appointment, AppointmentId, AppointmentStatus,
    RequestId, ServiceRequest, ServiceRequestStatus, User, UserId, UserRole,
};
use super::error::MarketplaceError;
use super::matching::{MatchOutcome, MatchingAdapter};
use super::repository::{
    AppointmentRepository, RepositoryError, ServiceRequestRepository, UserRepository,
};

/// Intake payload for a new service request.
#[derive(Debug, Clone)]
pub struct NewServiceRequest {
    pub category: String,
    pub description: String,
    pub budget: Option<String>,
}

const MIN_DESCRIPTION_LEN: usize = 10;

/// Owns the ServiceRequest and Appointment state machines. Every status write
/// in the system flows through this engine; the repositories' uniqueness
/// constraints backstop the concurrent races it cannot see.
pub struct LifecycleEngine<U, R, A> {
    users: Arc<U>,
    requests: Arc<R>,
    appointments: Arc<A>,
    matching: MatchingAdapter<R, U>,
}

impl<U, R, A> LifecycleEngine<U, R, A>
where
    U: UserRepository,
    R: ServiceRequestRepository,
    A: AppointmentRepository,
{
    pub fn new(
        users: Arc<U>,
        requests: Arc<R>,
        appointments: Arc<A>,
        matching: MatchingAdapter<R, U>,
    ) -> Self {
        Self {
            users,
            requests,
            appointments,
            matching,
        }
    }

    /// Opens a new request for an existing client.
    pub fn create_request(
        &self,
        client_id: &UserId,
        input: NewServiceRequest,
    ) -> Result<ServiceRequest, MarketplaceError> {
        let client = self.users.fetch(client_id)?.ok_or_else(|| {
            MarketplaceError::not_found(format!("client not found: {client_id}"))
        })?;
        if client.role != UserRole::Client {
            return Err(MarketplaceError::not_found(format!(
                "client not found: {client_id}"
            )));
        }
        if input.description.trim().len() < MIN_DESCRIPTION_LEN {
            return Err(MarketplaceError::validation(format!(
                "service description must be at least {MIN_DESCRIPTION_LEN} characters"
            )));
        }

        let now = Utc::now();
        let request = ServiceRequest {
            id: next_request_id(),
            client_id: client.id,
            category: input.category,
            description: input.description,
            budget: input.budget,
            status: ServiceRequestStatus::Open,
            matching_explanation: None,
            created_at: now,
            updated_at: now,
        };
        let request = self.requests.insert(request)?;
        info!(request = %request.id, client = %request.client_id, "service request opened");
        Ok(request)
    }

    /// Runs the matching adapter for an OPEN request owned by the caller and
    /// persists the outcome. The request lands in MATCHED with a non-null
    /// explanation whether or not the shortlist is empty.
    pub fn request_matches(
        &self,
        request_id: &RequestId,
        caller: &UserId,
    ) -> Result<(ServiceRequest, MatchOutcome), MarketplaceError> {
        let mut request = self.fetch_request(request_id)?;
        self.require_owner(&request, caller, "request matches")?;
        if request.status != ServiceRequestStatus::Open {
            return Err(MarketplaceError::conflict(format!(
                "matches can only be requested for OPEN requests, current status is {}",
                request.status
            )));
        }

        let outcome = self.matching.find_matches(request_id)?;

        request.matching_explanation = Some(outcome.rationale.clone());
        request.status = ServiceRequestStatus::Matched;
        request.updated_at = Utc::now();
        self.requests.update(request.clone())?;
        info!(
            request = %request_id,
            shortlist = outcome.ranked.len(),
            "service request matched"
        );
        Ok((request, outcome))
    }

    /// Turns the client's pick into an appointment. The appointment
    /// repository's per-request uniqueness settles concurrent picks; the
    /// lookup here only gives the common case a better error.
    pub fn select_professional(
        &self,
        request_id: &RequestId,
        professional_id: &UserId,
        caller: &UserId,
    ) -> Result<Appointment, MarketplaceError> {
        let mut request = self.fetch_request(request_id)?;
        self.require_owner(&request, caller, "select a professional")?;
        if request.status != ServiceRequestStatus::Matched {
            return Err(MarketplaceError::conflict(format!(
                "a professional can only be selected for MATCHED requests, current status is {}",
                request.status
            )));
        }

        let professional = self.users.fetch(professional_id)?;
        let verified = professional
            .as_ref()
            .map(User::is_verified_professional)
            .unwrap_or(false);
        if !verified {
            return Err(MarketplaceError::validation(format!(
                "professional {professional_id} is not available for selection"
            )));
        }

        if self.appointments.find_by_request(request_id)?.is_some() {
            return Err(already_selected(request_id));
        }

        let appointment = Appointment {
            id: next_appointment_id(),
            service_request_id: request_id.clone(),
            client_id: request.client_id.clone(),
            professional_id: professional_id.clone(),
            status: AppointmentStatus::Requested,
            created_at: Utc::now(),
        };
        let appointment = match self.appointments.insert(appointment) {
            Ok(appointment) => appointment,
            Err(RepositoryError::Conflict) => {
                warn!(request = %request_id, "lost the selection race, appointment already exists");
                return Err(already_selected(request_id));
            }
            Err(other) => return Err(other.into()),
        };

        request.status = ServiceRequestStatus::PendingContact;
        request.updated_at = Utc::now();
        self.requests.update(request)?;
        info!(
            request = %request_id,
            professional = %professional_id,
            appointment = %appointment.id,
            "professional selected"
        );
        Ok(appointment)
    }

    /// Cancels a request that has not yet been accepted, closing out any
    /// live appointment on the client's behalf.
    pub fn cancel_request(
        &self,
        request_id: &RequestId,
        caller: &UserId,
    ) -> Result<ServiceRequest, MarketplaceError> {
        let mut request = self.fetch_request(request_id)?;
        self.require_owner(&request, caller, "cancel the request")?;
        if !request.status.can_cancel() {
            return Err(MarketplaceError::conflict(format!(
                "request cannot be cancelled from status {}",
                request.status
            )));
        }

        if let Some(mut appointment) = self.appointments.find_by_request(request_id)? {
            if !appointment.status.is_terminal() {
                appointment.status = AppointmentStatus::CancelledByClient;
                self.appointments.update(appointment)?;
            }
        }

        request.status = ServiceRequestStatus::Cancelled;
        request.updated_at = Utc::now();
        self.requests.update(request.clone())?;
        info!(request = %request_id, "service request cancelled");
        Ok(request)
    }

    pub fn requests_for_client(
        &self,
        caller: &UserId,
    ) -> Result<Vec<ServiceRequest>, MarketplaceError> {
        Ok(self.requests.for_client(caller)?)
    }

    /// The request board shown to professionals: open asks minus their own.
    pub fn open_requests_for_professional(
        &self,
        caller: &UserId,
    ) -> Result<Vec<ServiceRequest>, MarketplaceError> {
        Ok(self.requests.open_excluding(caller)?)
    }

    pub fn get_request(
        &self,
        request_id: &RequestId,
        caller: &UserId,
    ) -> Result<ServiceRequest, MarketplaceError> {
        let request = self.fetch_request(request_id)?;
        self.require_owner(&request, caller, "view the request")?;
        Ok(request)
    }

    /// The professional acknowledges the client's pick.
    pub fn accept_appointment(
        &self,
        appointment_id: &AppointmentId,
        caller: &UserId,
    ) -> Result<Appointment, MarketplaceError> {
        let appointment = self.transition_appointment(
            appointment_id,
            caller,
            AppointmentParty::Professional,
            AppointmentStatus::Requested,
            AppointmentStatus::AcceptedByProfessional,
        )?;
        self.advance_request(
            &appointment.service_request_id,
            ServiceRequestStatus::PendingContact,
            ServiceRequestStatus::Accepted,
        )?;
        Ok(appointment)
    }

    /// The professional declines; the request reaches its terminal
    /// REJECTED_BY_PROFESSIONAL state and the client must submit a new one.
    pub fn decline_appointment(
        &self,
        appointment_id: &AppointmentId,
        caller: &UserId,
    ) -> Result<Appointment, MarketplaceError> {
        let appointment = self.transition_appointment(
            appointment_id,
            caller,
            AppointmentParty::Professional,
            AppointmentStatus::Requested,
            AppointmentStatus::CancelledByProfessional,
        )?;
        self.advance_request(
            &appointment.service_request_id,
            ServiceRequestStatus::PendingContact,
            ServiceRequestStatus::RejectedByProfessional,
        )?;
        Ok(appointment)
    }

    /// The client confirms an appointment the professional has accepted.
    pub fn confirm_appointment(
        &self,
        appointment_id: &AppointmentId,
        caller: &UserId,
    ) -> Result<Appointment, MarketplaceError> {
        self.transition_appointment(
            appointment_id,
            caller,
            AppointmentParty::Client,
            AppointmentStatus::AcceptedByProfessional,
            AppointmentStatus::Confirmed,
        )
    }

    /// The professional marks the service delivered.
    pub fn complete_appointment(
        &self,
        appointment_id: &AppointmentId,
        caller: &UserId,
    ) -> Result<Appointment, MarketplaceError> {
        let appointment = self.transition_appointment(
            appointment_id,
            caller,
            AppointmentParty::Professional,
            AppointmentStatus::Confirmed,
            AppointmentStatus::Completed,
        )?;
        self.advance_request(
            &appointment.service_request_id,
            ServiceRequestStatus::Accepted,
            ServiceRequestStatus::Completed,
        )?;
        Ok(appointment)
    }

    /// Either party walks away from a non-terminal appointment. The parent
    /// request flips to CANCELLED only while it is still in a cancellable
    /// state; an ACCEPTED request keeps its status.
    pub fn cancel_appointment(
        &self,
        appointment_id: &AppointmentId,
        caller: &UserId,
    ) -> Result<Appointment, MarketplaceError> {
        let mut appointment = self.fetch_appointment(appointment_id)?;
        let cancelled_status = if appointment.client_id == *caller {
            AppointmentStatus::CancelledByClient
        } else if appointment.professional_id == *caller {
            AppointmentStatus::CancelledByProfessional
        } else {
            return Err(MarketplaceError::forbidden(
                "only the appointment's client or professional may cancel it",
            ));
        };
        if appointment.status.is_terminal() {
            return Err(MarketplaceError::conflict(format!(
                "appointment cannot be cancelled from status {}",
                appointment.status
            )));
        }

        appointment.status = cancelled_status;
        self.appointments.update(appointment.clone())?;

        let mut request = self.fetch_request(&appointment.service_request_id)?;
        if request.status.can_cancel() {
            request.status = ServiceRequestStatus::Cancelled;
            request.updated_at = Utc::now();
            self.requests.update(request)?;
        }
        info!(appointment = %appointment_id, status = %appointment.status, "appointment cancelled");
        Ok(appointment)
    }

    pub fn appointments_for_professional(
        &self,
        caller: &UserId,
    ) -> Result<Vec<Appointment>, MarketplaceError> {
        Ok(self.appointments.for_professional(caller)?)
    }

    fn transition_appointment(
        &self,
        appointment_id: &AppointmentId,
        caller: &UserId,
        party: AppointmentParty,
        expected: AppointmentStatus,
        next: AppointmentStatus,
    ) -> Result<Appointment, MarketplaceError> {
        let mut appointment = self.fetch_appointment(appointment_id)?;
        let allowed = match party {
            AppointmentParty::Client => appointment.client_id == *caller,
            AppointmentParty::Professional => appointment.professional_id == *caller,
        };
        if !allowed {
            return Err(MarketplaceError::forbidden(format!(
                "only the appointment's {party} may perform this transition"
            )));
        }
        if appointment.status != expected {
            return Err(MarketplaceError::conflict(format!(
                "appointment must be {expected} for this transition, current status is {}",
                appointment.status
            )));
        }

        appointment.status = next;
        self.appointments.update(appointment.clone())?;
        info!(appointment = %appointment_id, status = %next, "appointment transitioned");
        Ok(appointment)
    }

    /// Moves the parent request along with an appointment transition. The
    /// request must exist; a dangling appointment is a storage inconsistency
    /// and surfaces as an unexpected repository error.
    fn advance_request(
        &self,
        request_id: &RequestId,
        expected: ServiceRequestStatus,
        next: ServiceRequestStatus,
    ) -> Result<(), MarketplaceError> {
        let mut request = self.fetch_request(request_id)?;
        if request.status != expected {
            warn!(
                request = %request_id,
                status = %request.status,
                "request not in expected state while advancing, leaving untouched"
            );
            return Ok(());
        }
        request.status = next;
        request.updated_at = Utc::now();
        self.requests.update(request)?;
        Ok(())
    }

    fn fetch_request(&self, request_id: &RequestId) -> Result<ServiceRequest, MarketplaceError> {
        self.requests.fetch(request_id)?.ok_or_else(|| {
            MarketplaceError::not_found(format!("service request not found: {request_id}"))
        })
    }

    fn fetch_appointment(
        &self,
        appointment_id: &AppointmentId,
    ) -> Result<Appointment, MarketplaceError> {
        self.appointments.fetch(appointment_id)?.ok_or_else(|| {
            MarketplaceError::not_found(format!("appointment not found: {appointment_id}"))
        })
    }

    fn require_owner(
        &self,
        request: &ServiceRequest,
        caller: &UserId,
        action: &str,
    ) -> Result<(), MarketplaceError> {
        if request.client_id != *caller {
            return Err(MarketplaceError::forbidden(format!(
                "only the owning client may {action}"
            )));
        }
        Ok(())
    }
}

fn already_selected(request_id: &RequestId) -> MarketplaceError {
    MarketplaceError::conflict(format!(
        "a professional has already been selected for request {request_id}"
    ))
}

#[derive(Debug, Clone, Copy)]
enum AppointmentParty {
    Client,
    Professional,
}

impl std::fmt::Display for AppointmentParty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppointmentParty::Client => f.write_str("client"),
            AppointmentParty::Professional => f.write_str("professional"),
        }
    }
}
