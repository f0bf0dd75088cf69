use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::domain::{
    next_document_id, next_user_id, Document, ProfessionalProfile, ProfileStatus, User, UserId,
    UserRole,
};
use super::error::MarketplaceError;
use super::repository::{DocumentRepository, UserRepository};

/// Registration payload for a client account.
#[derive(Debug, Clone, Deserialize)]
pub struct NewClient {
    pub email: String,
    pub display_name: String,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Registration payload for a professional account, including the metadata
/// of documents already uploaded to blob storage.
#[derive(Debug, Clone, Deserialize)]
pub struct NewProfessional {
    pub email: String,
    pub display_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub profession: String,
    #[serde(default)]
    pub years_of_experience: Option<u8>,
    #[serde(default)]
    pub qualifications: Option<String>,
    #[serde(default)]
    pub about_you: Option<String>,
    #[serde(default)]
    pub social_links: BTreeMap<String, String>,
    #[serde(default)]
    pub documents: Vec<DocumentUpload>,
}

/// Metadata for one uploaded document; bytes live behind the locator.
#[derive(Debug, Clone, Deserialize)]
pub struct DocumentUpload {
    pub file_name: String,
    pub mime_type: String,
    pub storage_locator: String,
    #[serde(default)]
    pub extracted_text: Option<String>,
}

/// Partial update of the client-writable profile fields. Verification state,
/// summaries, skills, and documents are out of reach by construction.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfessionalProfileUpdate {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub profession: Option<String>,
    #[serde(default)]
    pub years_of_experience: Option<u8>,
    #[serde(default)]
    pub qualifications: Option<String>,
    #[serde(default)]
    pub about_you: Option<String>,
    #[serde(default)]
    pub social_links: Option<BTreeMap<String, String>>,
}

/// What clients see of a verified professional. Contact details stay private
/// until an appointment is made.
#[derive(Debug, Clone, Serialize)]
pub struct ProfessionalPublicView {
    pub id: UserId,
    pub display_name: String,
    pub profession: String,
    pub years_of_experience: Option<u8>,
    pub about_you: Option<String>,
    pub summarized_skills: Option<String>,
    pub skill_names: Vec<String>,
    pub social_links: BTreeMap<String, String>,
}

/// The professional's own dashboard view, including verification state and
/// document metadata.
#[derive(Debug, Clone, Serialize)]
pub struct ProfessionalFullView {
    pub user: User,
    pub documents: Vec<Document>,
}

/// Account registration, profile editing, and profile views.
pub struct ProfileService<U, D> {
    users: Arc<U>,
    documents: Arc<D>,
}

impl<U, D> ProfileService<U, D>
where
    U: UserRepository,
    D: DocumentRepository,
{
    pub fn new(users: Arc<U>, documents: Arc<D>) -> Self {
        Self { users, documents }
    }

    pub fn register_client(&self, input: NewClient) -> Result<User, MarketplaceError> {
        self.require_unused_email(&input.email)?;
        let user = User {
            id: next_user_id(),
            email: input.email,
            display_name: input.display_name,
            phone: input.phone,
            role: UserRole::Client,
            professional: None,
        };
        let user = self.users.insert(user)?;
        info!(user = %user.id, "client registered");
        Ok(user)
    }

    /// Registers a professional with PENDING_VERIFICATION status. Document
    /// metadata that fails to persist is logged and skipped so one bad
    /// upload never sinks the whole registration.
    pub fn register_professional(
        &self,
        input: NewProfessional,
    ) -> Result<User, MarketplaceError> {
        self.require_unused_email(&input.email)?;
        let user_id = next_user_id();

        let mut document_refs = Vec::new();
        for upload in input.documents {
            let document = Document {
                id: next_document_id(),
                owner: user_id.clone(),
                file_name: upload.file_name,
                mime_type: upload.mime_type,
                storage_locator: upload.storage_locator,
                extracted_text: upload.extracted_text,
            };
            match self.documents.insert(document) {
                Ok(stored) => document_refs.push(stored.id),
                Err(err) => {
                    warn!(
                        professional = %user_id,
                        error = %err,
                        "failed to persist document metadata, skipping"
                    );
                }
            }
        }

        let user = User {
            id: user_id,
            email: input.email,
            display_name: input.display_name,
            phone: input.phone,
            role: UserRole::Professional,
            professional: Some(ProfessionalProfile {
                profession: input.profession,
                years_of_experience: input.years_of_experience,
                qualifications: input.qualifications,
                about_you: input.about_you,
                social_links: input.social_links,
                profile_status: ProfileStatus::PendingVerification,
                summarized_skills: None,
                skill_names: BTreeSet::new(),
                document_refs,
                updated_at: Utc::now(),
            }),
        };
        let user = self.users.insert(user)?;
        info!(user = %user.id, "professional registered, awaiting verification");
        Ok(user)
    }

    pub fn update_professional_profile(
        &self,
        professional_id: &UserId,
        caller: &UserId,
        update: ProfessionalProfileUpdate,
    ) -> Result<User, MarketplaceError> {
        if professional_id != caller {
            return Err(MarketplaceError::forbidden(
                "only the profile owner may update it",
            ));
        }

        let mut user = self.fetch_professional(professional_id)?;
        if let Some(display_name) = update.display_name {
            user.display_name = display_name;
        }
        if let Some(phone) = update.phone {
            user.phone = Some(phone);
        }

        let profile = user.professional.as_mut().ok_or_else(|| {
            MarketplaceError::not_found(format!("professional not found: {professional_id}"))
        })?;
        if let Some(profession) = update.profession {
            profile.profession = profession;
        }
        if let Some(years) = update.years_of_experience {
            profile.years_of_experience = Some(years);
        }
        if let Some(qualifications) = update.qualifications {
            profile.qualifications = Some(qualifications);
        }
        if let Some(about_you) = update.about_you {
            profile.about_you = Some(about_you);
        }
        if let Some(social_links) = update.social_links {
            profile.social_links = social_links;
        }
        profile.updated_at = Utc::now();

        self.users.update(user.clone())?;
        info!(professional = %professional_id, "professional profile updated");
        Ok(user)
    }

    /// Public view of a professional. Hidden (NotFound) until the profile is
    /// VERIFIED, which is what makes screening the gate to discoverability.
    pub fn public_view(
        &self,
        professional_id: &UserId,
    ) -> Result<ProfessionalPublicView, MarketplaceError> {
        let user = self.fetch_professional(professional_id)?;
        let profile = user.professional.as_ref().filter(|profile| {
            profile.profile_status == ProfileStatus::Verified
        });
        let profile = profile.ok_or_else(|| {
            MarketplaceError::not_found(format!("professional not found: {professional_id}"))
        })?;

        Ok(ProfessionalPublicView {
            id: user.id.clone(),
            display_name: user.display_name.clone(),
            profession: profile.profession.clone(),
            years_of_experience: profile.years_of_experience,
            about_you: profile.about_you.clone(),
            summarized_skills: profile.summarized_skills.clone(),
            skill_names: profile.skill_names.iter().cloned().collect(),
            social_links: profile.social_links.clone(),
        })
    }

    pub fn full_view(
        &self,
        professional_id: &UserId,
        caller: &UserId,
    ) -> Result<ProfessionalFullView, MarketplaceError> {
        if professional_id != caller {
            return Err(MarketplaceError::forbidden(
                "only the profile owner may view the full profile",
            ));
        }
        let user = self.fetch_professional(professional_id)?;
        let documents = self.documents.for_owner(professional_id)?;
        Ok(ProfessionalFullView { user, documents })
    }

    fn fetch_professional(&self, professional_id: &UserId) -> Result<User, MarketplaceError> {
        self.users
            .fetch(professional_id)?
            .filter(|user| user.professional.is_some())
            .ok_or_else(|| {
                MarketplaceError::not_found(format!(
                    "professional not found: {professional_id}"
                ))
            })
    }

    fn require_unused_email(&self, email: &str) -> Result<(), MarketplaceError> {
        if self.users.find_by_email(email)?.is_some() {
            return Err(MarketplaceError::conflict(format!(
                "email already registered: {email}"
            )));
        }
        Ok(())
    }
}
