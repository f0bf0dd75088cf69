use std::sync::{Arc, Mutex};

use super::common::*;
use crate::marketplace::domain::{DocumentId, ProfileStatus, Skill, SkillId, UserId};
use crate::marketplace::error::MarketplaceError;
use crate::marketplace::llm::{CapabilityError, SkillExtractor, Summarizer};
use crate::marketplace::repository::{DocumentRepository, SkillRepository, UserRepository};
use crate::marketplace::screening::SCREENING_SKIPPED_SUMMARY;

/// Analyzer double that records the corpus it was handed.
struct RecordingAnalyzer {
    corpora: Mutex<Vec<String>>,
}

impl RecordingAnalyzer {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            corpora: Mutex::new(Vec::new()),
        })
    }

    fn last_corpus(&self) -> String {
        self.corpora
            .lock()
            .expect("corpus mutex poisoned")
            .last()
            .cloned()
            .expect("analyzer was invoked")
    }
}

impl Summarizer for RecordingAnalyzer {
    fn summarize(&self, profile_corpus: &str) -> Result<String, CapabilityError> {
        self.corpora
            .lock()
            .expect("corpus mutex poisoned")
            .push(profile_corpus.to_string());
        Ok("Seasoned trainer with recovery expertise.".to_string())
    }
}

impl SkillExtractor for RecordingAnalyzer {
    fn extract(&self, _profile_corpus: &str) -> Result<String, CapabilityError> {
        Ok("Yoga, Mobility".to_string())
    }
}

#[test]
fn screening_verifies_and_canonicalizes_skills() {
    let fixture = Fixture::new();
    let professional = fixture.seed_professional("pro-1", ProfileStatus::PendingVerification);
    let analyzer = StaticAnalyzer::new(
        "Seasoned trainer with recovery expertise.",
        "Yoga, Pilates, Yoga ,  , Strength coaching",
    );
    let service = fixture.screening(Some(analyzer.clone()), Some(analyzer));

    let screened = service
        .screen_professional(&professional.id)
        .expect("screening succeeds");

    let profile = screened.professional.expect("professional payload");
    assert_eq!(profile.profile_status, ProfileStatus::Verified);
    assert_eq!(
        profile.summarized_skills.as_deref(),
        Some("Seasoned trainer with recovery expertise.")
    );
    let names: Vec<&str> = profile.skill_names.iter().map(String::as_str).collect();
    assert_eq!(names, vec!["Pilates", "Strength coaching", "Yoga"]);
    assert_eq!(fixture.skills.count(), 3);
}

#[test]
fn rescreening_creates_no_duplicate_skills() {
    let fixture = Fixture::new();
    let professional = fixture.seed_professional("pro-1", ProfileStatus::PendingVerification);
    let analyzer = StaticAnalyzer::new("Summary.", "Yoga, Pilates");
    let service = fixture.screening(Some(analyzer.clone()), Some(analyzer));

    service
        .screen_professional(&professional.id)
        .expect("first screening succeeds");
    service
        .screen_professional(&professional.id)
        .expect("second screening succeeds");

    assert_eq!(fixture.skills.count(), 2);
}

#[test]
fn screening_without_capability_records_sentinel() {
    let fixture = Fixture::new();
    let professional = fixture.seed_professional("pro-1", ProfileStatus::PendingVerification);
    let service = fixture.screening(None, None);

    let screened = service
        .screen_professional(&professional.id)
        .expect("sentinel path still succeeds");

    let profile = screened.professional.expect("professional payload");
    assert_eq!(profile.profile_status, ProfileStatus::PendingVerification);
    assert_eq!(
        profile.summarized_skills.as_deref(),
        Some(SCREENING_SKIPPED_SUMMARY)
    );
    assert!(profile.skill_names.is_empty());
}

#[test]
fn screening_capability_failure_leaves_profile_pending() {
    let fixture = Fixture::new();
    let professional = fixture.seed_professional("pro-1", ProfileStatus::PendingVerification);
    let failing = Arc::new(FailingAnalyzer);
    let service = fixture.screening(Some(failing.clone()), Some(failing));

    let screened = service
        .screen_professional(&professional.id)
        .expect("failure degrades instead of erroring");

    let profile = screened.professional.expect("professional payload");
    assert_eq!(profile.profile_status, ProfileStatus::PendingVerification);
    assert_eq!(
        profile.summarized_skills.as_deref(),
        Some(SCREENING_SKIPPED_SUMMARY)
    );
    assert_eq!(fixture.skills.count(), 0);

    let stored = fixture
        .users
        .fetch(&professional.id)
        .expect("fetch succeeds")
        .expect("record present");
    assert_eq!(
        stored
            .professional
            .expect("professional payload")
            .profile_status,
        ProfileStatus::PendingVerification
    );
}

#[test]
fn skill_conflict_from_concurrent_create_is_tolerated() {
    let fixture = Fixture::new();
    let professional = fixture.seed_professional("pro-1", ProfileStatus::PendingVerification);
    // A differently cased row already owns the case-insensitive name slot, so
    // the exact-name lookup misses and the insert must swallow the Conflict.
    fixture
        .skills
        .insert(Skill {
            id: SkillId("skill-yoga".to_string()),
            name: "yoga".to_string(),
        })
        .expect("seed skill");

    let analyzer = StaticAnalyzer::new("Summary.", "Yoga");
    let service = fixture.screening(Some(analyzer.clone()), Some(analyzer));

    let screened = service
        .screen_professional(&professional.id)
        .expect("conflict is not fatal");

    assert_eq!(fixture.skills.count(), 1);
    let profile = screened.professional.expect("professional payload");
    assert!(profile.skill_names.contains("Yoga"));
    assert_eq!(profile.profile_status, ProfileStatus::Verified);
}

#[test]
fn corpus_includes_profile_and_document_text() {
    let fixture = Fixture::new();
    let mut professional =
        fixture.seed_professional("pro-1", ProfileStatus::PendingVerification);

    let with_text = crate::marketplace::domain::Document {
        id: DocumentId("doc-1".to_string()),
        owner: professional.id.clone(),
        file_name: "certificate.pdf".to_string(),
        mime_type: "application/pdf".to_string(),
        storage_locator: "blob://docs/certificate.pdf".to_string(),
        extracted_text: Some("Level 3 coaching certificate".to_string()),
    };
    let without_text = crate::marketplace::domain::Document {
        id: DocumentId("doc-2".to_string()),
        owner: professional.id.clone(),
        file_name: "insurance.pdf".to_string(),
        mime_type: "application/pdf".to_string(),
        storage_locator: "blob://docs/insurance.pdf".to_string(),
        extracted_text: None,
    };
    fixture.documents.insert(with_text).expect("seed document");
    fixture
        .documents
        .insert(without_text)
        .expect("seed document");
    {
        let profile = professional.professional.as_mut().expect("payload");
        profile.document_refs = vec![
            DocumentId("doc-1".to_string()),
            DocumentId("doc-2".to_string()),
        ];
    }
    fixture
        .users
        .update(professional.clone())
        .expect("update professional");

    let analyzer = RecordingAnalyzer::new();
    let service = fixture.screening(Some(analyzer.clone()), Some(analyzer.clone()));
    service
        .screen_professional(&professional.id)
        .expect("screening succeeds");

    let corpus = analyzer.last_corpus();
    assert!(corpus.contains("Profession: Personal trainer"));
    assert!(corpus.contains("Level 3 coaching certificate"));
    assert!(corpus.contains("insurance.pdf"));
    assert!(corpus.contains("has no extracted text"));
}

#[test]
fn set_verification_status_rejects_pending_target() {
    let fixture = Fixture::new();
    let professional = fixture.seed_professional("pro-1", ProfileStatus::Verified);
    let service = fixture.screening(None, None);

    match service
        .set_verification_status(&professional.id, ProfileStatus::PendingVerification)
    {
        Err(MarketplaceError::Validation(message)) => {
            assert!(message.contains("VERIFIED or REJECTED"));
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn set_verification_status_applies_override() {
    let fixture = Fixture::new();
    let professional = fixture.seed_professional("pro-1", ProfileStatus::PendingVerification);
    let service = fixture.screening(None, None);

    let updated = service
        .set_verification_status(&professional.id, ProfileStatus::Rejected)
        .expect("override succeeds");

    assert_eq!(
        updated
            .professional
            .expect("professional payload")
            .profile_status,
        ProfileStatus::Rejected
    );
}

#[test]
fn screening_unknown_professional_is_not_found() {
    let fixture = Fixture::new();
    fixture.seed_client("client-1");
    let service = fixture.screening(None, None);

    match service.screen_professional(&UserId("ghost".to_string())) {
        Err(MarketplaceError::NotFound(_)) => {}
        other => panic!("expected not found, got {other:?}"),
    }

    // A client account is not a professional either.
    match service.screen_professional(&UserId("client-1".to_string())) {
        Err(MarketplaceError::NotFound(_)) => {}
        other => panic!("expected not found, got {other:?}"),
    }
}

#[test]
fn pending_listing_only_returns_unscreened_professionals() {
    let fixture = Fixture::new();
    fixture.seed_professional("pro-1", ProfileStatus::PendingVerification);
    fixture.seed_professional("pro-2", ProfileStatus::Verified);
    fixture.seed_client("client-1");
    let service = fixture.screening(None, None);

    let pending = service.pending_professionals().expect("listing succeeds");
    let ids: Vec<&str> = pending.iter().map(|user| user.id.0.as_str()).collect();
    assert_eq!(ids, vec!["pro-1"]);
}
