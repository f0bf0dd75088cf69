use std::fmt::Write as _;
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use super::domain::{next_skill_id, Document, ProfileStatus, Skill, User, UserId};
use super::error::MarketplaceError;
use super::llm::{CapabilityError, SkillExtractor, Summarizer};
use super::repository::{DocumentRepository, RepositoryError, SkillRepository, UserRepository};

/// Summary recorded when screening runs without a usable capability.
/// The profile status is left untouched on this path: verification is never
/// granted without an actual screening result.
pub const SCREENING_SKIPPED_SUMMARY: &str = "screening skipped: capability unavailable";

/// Verification pipeline gating which professionals become matchable.
pub struct ScreeningService<U, S, D> {
    users: Arc<U>,
    skills: Arc<S>,
    documents: Arc<D>,
    summarizer: Option<Arc<dyn Summarizer>>,
    extractor: Option<Arc<dyn SkillExtractor>>,
}

impl<U, S, D> ScreeningService<U, S, D>
where
    U: UserRepository,
    S: SkillRepository,
    D: DocumentRepository,
{
    pub fn new(
        users: Arc<U>,
        skills: Arc<S>,
        documents: Arc<D>,
        summarizer: Option<Arc<dyn Summarizer>>,
        extractor: Option<Arc<dyn SkillExtractor>>,
    ) -> Self {
        Self {
            users,
            skills,
            documents,
            summarizer,
            extractor,
        }
    }

    /// Summarize the professional's corpus, extract and canonicalize skills,
    /// and move the profile to VERIFIED. Degrades to the sentinel summary
    /// when no capability is available, leaving the status untouched.
    pub fn screen_professional(
        &self,
        professional_id: &UserId,
    ) -> Result<User, MarketplaceError> {
        let mut user = self.fetch_professional(professional_id)?;
        let corpus = self.profile_corpus(&user)?;

        let analysis = match (self.summarizer.as_deref(), self.extractor.as_deref()) {
            (Some(summarizer), Some(extractor)) => {
                match run_analysis(summarizer, extractor, &corpus) {
                    Ok(analysis) => Some(analysis),
                    Err(err) => {
                        warn!(
                            professional = %professional_id,
                            error = %err,
                            "screening capability failed, recording sentinel summary"
                        );
                        None
                    }
                }
            }
            _ => {
                warn!(
                    professional = %professional_id,
                    "screening capability not configured, recording sentinel summary"
                );
                None
            }
        };

        // All capability results are in hand before the first mutation, so a
        // failed call can never leave the profile half-updated.
        match analysis {
            Some((summary, extracted)) => {
                let names = canonicalize_skill_names(&extracted);
                self.ensure_skills(&names)?;

                let profile = expect_profile(&mut user, professional_id)?;
                profile.summarized_skills = Some(summary);
                profile.skill_names = names.into_iter().collect();
                profile.profile_status = ProfileStatus::Verified;
                profile.updated_at = Utc::now();
                self.users.update(user.clone())?;
                info!(professional = %professional_id, "professional screened and verified");
            }
            None => {
                let profile = expect_profile(&mut user, professional_id)?;
                profile.summarized_skills = Some(SCREENING_SKIPPED_SUMMARY.to_string());
                profile.updated_at = Utc::now();
                self.users.update(user.clone())?;
            }
        }

        Ok(user)
    }

    /// Human override of the screening gate. Only VERIFIED and REJECTED are
    /// legal targets.
    pub fn set_verification_status(
        &self,
        professional_id: &UserId,
        new_status: ProfileStatus,
    ) -> Result<User, MarketplaceError> {
        if !matches!(
            new_status,
            ProfileStatus::Verified | ProfileStatus::Rejected
        ) {
            return Err(MarketplaceError::validation(format!(
                "verification status must be VERIFIED or REJECTED, got {new_status}"
            )));
        }

        let mut user = self.fetch_professional(professional_id)?;
        let profile = expect_profile(&mut user, professional_id)?;
        profile.profile_status = new_status;
        profile.updated_at = Utc::now();
        self.users.update(user.clone())?;
        info!(professional = %professional_id, status = %new_status, "verification status overridden");
        Ok(user)
    }

    /// Professionals still awaiting screening, for the admin queue.
    pub fn pending_professionals(&self) -> Result<Vec<User>, MarketplaceError> {
        Ok(self.users.pending_professionals()?)
    }

    /// Uploaded document metadata for one professional, for admin review.
    pub fn documents_for(
        &self,
        professional_id: &UserId,
    ) -> Result<Vec<Document>, MarketplaceError> {
        self.fetch_professional(professional_id)?;
        Ok(self.documents.for_owner(professional_id)?)
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

    /// Concatenates the self-reported profile with per-document extracted
    /// text into the single corpus both capabilities consume.
    fn profile_corpus(&self, user: &User) -> Result<String, MarketplaceError> {
        let profile = user.professional.as_ref().ok_or_else(|| {
            MarketplaceError::not_found(format!("professional not found: {}", user.id))
        })?;

        let mut corpus = String::new();
        let _ = writeln!(corpus, "Profession: {}", profile.profession);
        let years = profile
            .years_of_experience
            .map(|value| value.to_string())
            .unwrap_or_else(|| "not stated".to_string());
        let _ = writeln!(corpus, "Years of experience: {years}");
        let _ = writeln!(
            corpus,
            "Qualifications: {}",
            profile.qualifications.as_deref().unwrap_or("not stated")
        );
        let _ = writeln!(
            corpus,
            "About: {}",
            profile.about_you.as_deref().unwrap_or("not stated")
        );
        if !profile.social_links.is_empty() {
            let links = profile
                .social_links
                .iter()
                .map(|(label, url)| format!("{label}={url}"))
                .collect::<Vec<_>>()
                .join(", ");
            let _ = writeln!(corpus, "Links: {links}");
        }

        for document_id in &profile.document_refs {
            match self.documents.fetch(document_id)? {
                Some(document) => append_document_text(&mut corpus, &document),
                None => {
                    warn!(
                        professional = %user.id,
                        document = %document_id,
                        "referenced document metadata missing, skipping"
                    );
                }
            }
        }

        Ok(corpus)
    }

    /// Lazily creates any skill names missing from the vocabulary. A storage
    /// Conflict means a concurrent screening got there first; the name is
    /// already canonical and the loop moves on.
    fn ensure_skills(&self, names: &[String]) -> Result<(), MarketplaceError> {
        for name in names {
            if self.skills.find_by_name(name)?.is_some() {
                continue;
            }
            match self.skills.insert(Skill {
                id: next_skill_id(),
                name: name.clone(),
            }) {
                Ok(_) | Err(RepositoryError::Conflict) => {}
                Err(other) => return Err(other.into()),
            }
        }
        Ok(())
    }
}

fn run_analysis(
    summarizer: &dyn Summarizer,
    extractor: &dyn SkillExtractor,
    corpus: &str,
) -> Result<(String, String), CapabilityError> {
    let summary = summarizer.summarize(corpus)?;
    let extracted = extractor.extract(corpus)?;
    Ok((summary, extracted))
}

fn append_document_text(corpus: &mut String, document: &Document) {
    match document.extracted_text.as_deref() {
        Some(text) if !text.trim().is_empty() => {
            let _ = writeln!(corpus, "Document {}: {}", document.file_name, text.trim());
        }
        _ => {
            let _ = writeln!(
                corpus,
                "Document {} at {} has no extracted text.",
                document.file_name, document.storage_locator
            );
        }
    }
}

/// Splits the extractor's comma-separated output into canonical names:
/// trimmed, non-empty, first occurrence wins within the batch.
pub(crate) fn canonicalize_skill_names(raw: &str) -> Vec<String> {
    let mut names = Vec::new();
    for candidate in raw.split(',') {
        let candidate = candidate.trim();
        if candidate.is_empty() {
            continue;
        }
        if names.iter().any(|existing: &String| existing == candidate) {
            continue;
        }
        names.push(candidate.to_string());
    }
    names
}

fn expect_profile<'a>(
    user: &'a mut User,
    professional_id: &UserId,
) -> Result<&'a mut super::domain::ProfessionalProfile, MarketplaceError> {
    user.professional.as_mut().ok_or_else(|| {
        MarketplaceError::not_found(format!("professional not found: {professional_id}"))
    })
}
