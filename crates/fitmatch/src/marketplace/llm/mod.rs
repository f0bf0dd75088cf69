//! Capability seams for the external language-model services: profile
//! summarization, skill extraction, and shortlist ranking.
//!
//! The traits are synchronous and blocking; adapters own whatever async
//! machinery their transport needs. Callers must treat every capability as
//! slow and unreliable and degrade to sentinel results on failure.

pub mod openai;

use serde::{Deserialize, Serialize};

use super::domain::User;

pub use openai::OpenAiClient;

/// Failure modes shared by all capability adapters.
#[derive(Debug, thiserror::Error)]
pub enum CapabilityError {
    #[error("capability not configured")]
    Unconfigured,
    #[error("capability transport failed: {0}")]
    Transport(String),
    #[error("capability returned malformed payload: {0}")]
    Protocol(String),
}

/// Produces a client-facing free-text summary of a professional's corpus.
pub trait Summarizer: Send + Sync {
    fn summarize(&self, profile_corpus: &str) -> Result<String, CapabilityError>;
}

/// Extracts a comma-separated skill list from a professional's corpus.
pub trait SkillExtractor: Send + Sync {
    fn extract(&self, profile_corpus: &str) -> Result<String, CapabilityError>;
}

/// Ranks a pool of professionals against a service request.
pub trait RankingOracle: Send + Sync {
    fn rank(
        &self,
        context: &RankingContext,
        pool: &[ProfileLine],
    ) -> Result<RankingOutcome, CapabilityError>;
}

/// The request-side input handed to the ranking oracle.
#[derive(Debug, Clone, Serialize)]
pub struct RankingContext {
    pub category: String,
    pub description: String,
    pub budget: Option<String>,
}

/// Compact, serialized view of one verified professional submitted to the
/// ranking oracle.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileLine {
    pub professional_id: String,
    pub display_name: String,
    pub profession: String,
    pub years_of_experience: Option<u8>,
    pub summarized_skills: Option<String>,
    pub about_you: Option<String>,
    pub skills: Vec<String>,
}

impl ProfileLine {
    /// Builds a line from a user, returning None for accounts without a
    /// professional payload.
    pub fn from_user(user: &User) -> Option<Self> {
        let profile = user.professional.as_ref()?;
        Some(Self {
            professional_id: user.id.0.clone(),
            display_name: user.display_name.clone(),
            profession: profile.profession.clone(),
            years_of_experience: profile.years_of_experience,
            summarized_skills: profile.summarized_skills.clone(),
            about_you: profile.about_you.clone(),
            skills: profile.skill_names.iter().cloned().collect(),
        })
    }

    /// One-line rendering used in oracle prompts.
    pub fn render(&self) -> String {
        let years = self
            .years_of_experience
            .map(|value| value.to_string())
            .unwrap_or_else(|| "N/A".to_string());
        format!(
            "ID: {}, Name: {}, Profession: {}, YearsExp: {}, Summary: {}, About: {}, Skills: [{}]",
            self.professional_id,
            self.display_name,
            self.profession,
            years,
            self.summarized_skills.as_deref().unwrap_or("N/A"),
            self.about_you.as_deref().unwrap_or("N/A"),
            self.skills.join(", "),
        )
    }
}

/// Validated shape of a ranking response. Anything that does not deserialize
/// into this is a protocol error, not something to scrape strings out of.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RankingOutcome {
    pub rationale: String,
    #[serde(default)]
    pub ranked: Vec<RankedEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RankedEntry {
    pub professional_id: String,
    /// 1-based position. Used purely as a sort key; ties and gaps are
    /// tolerated and resolved by submission order.
    pub rank: u32,
    #[serde(default)]
    pub rationale: Option<String>,
}
