use std::collections::BTreeMap;

use super::common::*;
use crate::marketplace::domain::{ProfileStatus, UserId, UserRole};
use crate::marketplace::error::MarketplaceError;
use crate::marketplace::profiles::{
    DocumentUpload, NewClient, NewProfessional, ProfessionalProfileUpdate,
};
use crate::marketplace::repository::DocumentRepository;

fn new_professional(email: &str) -> NewProfessional {
    NewProfessional {
        email: email.to_string(),
        display_name: "Giulia Bianchi".to_string(),
        phone: Some("+39 333 1234567".to_string()),
        profession: "Physiotherapist".to_string(),
        years_of_experience: Some(9),
        qualifications: Some("MSc Physiotherapy".to_string()),
        about_you: Some("Sports rehabilitation specialist.".to_string()),
        social_links: BTreeMap::from([(
            "linkedin".to_string(),
            "https://linkedin.com/in/gbianchi".to_string(),
        )]),
        documents: vec![
            DocumentUpload {
                file_name: "degree.pdf".to_string(),
                mime_type: "application/pdf".to_string(),
                storage_locator: "blob://docs/degree.pdf".to_string(),
                extracted_text: Some("MSc Physiotherapy, University of Bologna".to_string()),
            },
            DocumentUpload {
                file_name: "license.pdf".to_string(),
                mime_type: "application/pdf".to_string(),
                storage_locator: "blob://docs/license.pdf".to_string(),
                extracted_text: None,
            },
        ],
    }
}

#[test]
fn register_professional_persists_document_metadata() {
    let fixture = Fixture::new();
    let service = fixture.profiles();

    let user = service
        .register_professional(new_professional("giulia@example.com"))
        .expect("registration succeeds");

    assert_eq!(user.role, UserRole::Professional);
    let profile = user.professional.as_ref().expect("professional payload");
    assert_eq!(profile.profile_status, ProfileStatus::PendingVerification);
    assert!(profile.summarized_skills.is_none());
    assert_eq!(profile.document_refs.len(), 2);

    let documents = fixture
        .documents
        .for_owner(&user.id)
        .expect("listing succeeds");
    assert_eq!(documents.len(), 2);
    let names: Vec<&str> = documents
        .iter()
        .map(|document| document.file_name.as_str())
        .collect();
    assert!(names.contains(&"degree.pdf"));
    assert!(names.contains(&"license.pdf"));
}

#[test]
fn registration_rejects_duplicate_email() {
    let fixture = Fixture::new();
    let service = fixture.profiles();

    service
        .register_client(NewClient {
            email: "giulia@example.com".to_string(),
            display_name: "Giulia".to_string(),
            phone: None,
        })
        .expect("client registration succeeds");

    match service.register_professional(new_professional("giulia@example.com")) {
        Err(MarketplaceError::Conflict(_)) => {}
        other => panic!("expected conflict, got {other:?}"),
    }
}

#[test]
fn profile_update_cannot_touch_verification_state() {
    let fixture = Fixture::new();
    let professional = fixture.seed_professional("pro-1", ProfileStatus::PendingVerification);
    let service = fixture.profiles();

    let updated = service
        .update_professional_profile(
            &professional.id,
            &professional.id,
            ProfessionalProfileUpdate {
                profession: Some("Pilates instructor".to_string()),
                about_you: Some("Now teaching reformer pilates.".to_string()),
                ..ProfessionalProfileUpdate::default()
            },
        )
        .expect("update succeeds");

    let profile = updated.professional.expect("professional payload");
    assert_eq!(profile.profession, "Pilates instructor");
    // The screening-owned fields are untouched by construction.
    assert_eq!(profile.profile_status, ProfileStatus::PendingVerification);
    assert!(profile.summarized_skills.is_none());
    assert!(profile.skill_names.is_empty());
}

#[test]
fn profile_update_is_owner_only() {
    let fixture = Fixture::new();
    let professional = fixture.seed_professional("pro-1", ProfileStatus::Verified);
    let intruder = fixture.seed_client("client-1");
    let service = fixture.profiles();

    match service.update_professional_profile(
        &professional.id,
        &intruder.id,
        ProfessionalProfileUpdate::default(),
    ) {
        Err(MarketplaceError::Forbidden(_)) => {}
        other => panic!("expected forbidden, got {other:?}"),
    }
}

#[test]
fn public_view_is_hidden_until_verified() {
    let fixture = Fixture::new();
    let professional = fixture.seed_professional("pro-1", ProfileStatus::PendingVerification);
    let service = fixture.profiles();

    match service.public_view(&professional.id) {
        Err(MarketplaceError::NotFound(_)) => {}
        other => panic!("expected not found, got {other:?}"),
    }

    fixture
        .screening(None, None)
        .set_verification_status(&professional.id, ProfileStatus::Verified)
        .expect("override succeeds");

    let view = service
        .public_view(&professional.id)
        .expect("verified profile is public");
    assert_eq!(view.id, professional.id);
    assert_eq!(view.profession, "Personal trainer");
}

#[test]
fn rejected_profile_stays_hidden() {
    let fixture = Fixture::new();
    let professional = fixture.seed_professional("pro-1", ProfileStatus::Rejected);
    let service = fixture.profiles();

    match service.public_view(&professional.id) {
        Err(MarketplaceError::NotFound(_)) => {}
        other => panic!("expected not found, got {other:?}"),
    }
}

#[test]
fn full_view_is_owner_only() {
    let fixture = Fixture::new();
    let professional = fixture.seed_professional("pro-1", ProfileStatus::PendingVerification);
    let service = fixture.profiles();

    match service.full_view(&professional.id, &UserId("client-9".to_string())) {
        Err(MarketplaceError::Forbidden(_)) => {}
        other => panic!("expected forbidden, got {other:?}"),
    }

    let view = service
        .full_view(&professional.id, &professional.id)
        .expect("owner sees the full profile");
    assert_eq!(view.user.id, professional.id);
    assert!(view.documents.is_empty());
}
