use std::collections::BTreeMap;
use std::sync::Arc;

use clap::Args;
use fitmatch::error::AppError;
use fitmatch::marketplace::{
    CapabilityError, DocumentUpload, LifecycleEngine, MatchingAdapter, NewClient,
    NewProfessional, NewServiceRequest, ProfileLine, ProfileService, RankedEntry, RankingContext,
    RankingOracle, RankingOutcome, ScreeningService, SkillExtractor, Summarizer,
};

use crate::infra::{
    InMemoryAppointmentRepository, InMemoryDocumentRepository, InMemoryServiceRequestRepository,
    InMemorySkillRepository, InMemoryUserRepository,
};

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Also walk the decline path with a second service request.
    #[arg(long)]
    pub(crate) include_decline: bool,
}

/// Deterministic in-process stand-in for the summarizer/extractor, so the
/// demo runs without network access or credentials.
struct DemoAnalyzer;

impl Summarizer for DemoAnalyzer {
    fn summarize(&self, profile_corpus: &str) -> Result<String, CapabilityError> {
        Ok(format!(
            "Demo summary distilled from {} characters of submitted profile material.",
            profile_corpus.len()
        ))
    }
}

impl SkillExtractor for DemoAnalyzer {
    fn extract(&self, _profile_corpus: &str) -> Result<String, CapabilityError> {
        Ok("Personal training, Mobility coaching, Nutrition basics".to_string())
    }
}

/// Deterministic ranking stand-in: submission order, capped at three.
struct DemoOracle;

impl RankingOracle for DemoOracle {
    fn rank(
        &self,
        context: &RankingContext,
        pool: &[ProfileLine],
    ) -> Result<RankingOutcome, CapabilityError> {
        Ok(RankingOutcome {
            rationale: format!(
                "Demo ranking for '{}': pool order, capped at three entries.",
                context.category
            ),
            ranked: pool
                .iter()
                .take(3)
                .enumerate()
                .map(|(index, line)| RankedEntry {
                    professional_id: line.professional_id.clone(),
                    rank: (index + 1) as u32,
                    rationale: Some(format!("position {} in the demo pool", index + 1)),
                })
                .collect(),
        })
    }
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    println!(
        "FitMatch end-to-end demo — {}",
        chrono::Utc::now().format("%Y-%m-%d %H:%M UTC")
    );
    println!();

    let users = Arc::new(InMemoryUserRepository::default());
    let documents = Arc::new(InMemoryDocumentRepository::default());
    let skills = Arc::new(InMemorySkillRepository::default());
    let requests = Arc::new(InMemoryServiceRequestRepository::default());
    let appointments = Arc::new(InMemoryAppointmentRepository::default());

    let analyzer = Arc::new(DemoAnalyzer);
    let profiles = ProfileService::new(users.clone(), documents.clone());
    let screening = ScreeningService::new(
        users.clone(),
        skills,
        documents,
        Some(analyzer.clone()),
        Some(analyzer),
    );
    let matching = MatchingAdapter::new(requests.clone(), users.clone(), Some(Arc::new(DemoOracle)));
    let engine = LifecycleEngine::new(users, requests, appointments, matching);

    let client = profiles.register_client(NewClient {
        email: "laura@example.com".to_string(),
        display_name: "Laura Conti".to_string(),
        phone: Some("+39 340 1122334".to_string()),
    })?;
    println!("registered client       {} ({})", client.display_name, client.id);

    let professional = profiles.register_professional(NewProfessional {
        email: "marco@example.com".to_string(),
        display_name: "Marco Greco".to_string(),
        phone: Some("+39 333 5566778".to_string()),
        profession: "Personal trainer".to_string(),
        years_of_experience: Some(8),
        qualifications: Some("Certified strength and conditioning coach".to_string()),
        about_you: Some("Functional training with a focus on posture.".to_string()),
        social_links: BTreeMap::from([(
            "instagram".to_string(),
            "https://instagram.com/marco.trains".to_string(),
        )]),
        documents: vec![DocumentUpload {
            file_name: "certification.pdf".to_string(),
            mime_type: "application/pdf".to_string(),
            storage_locator: "blob://demo/certification.pdf".to_string(),
            extracted_text: Some("CSCS certification, issued 2019".to_string()),
        }],
    })?;
    println!(
        "registered professional {} ({})",
        professional.display_name, professional.id
    );

    let screened = screening.screen_professional(&professional.id)?;
    if let Some(profile) = screened.professional.as_ref() {
        println!("screened professional   status={}", profile.profile_status);
        println!(
            "  summary: {}",
            profile.summarized_skills.as_deref().unwrap_or("-")
        );
        println!(
            "  skills:  {}",
            profile
                .skill_names
                .iter()
                .cloned()
                .collect::<Vec<_>>()
                .join(", ")
        );
    }

    let request = engine.create_request(
        &client.id,
        NewServiceRequest {
            category: "Personal training".to_string(),
            description: "Three strength sessions per week before work.".to_string(),
            budget: Some("50 EUR per session".to_string()),
        },
    )?;
    println!();
    println!("opened request          {} status={}", request.id, request.status);

    let (matched, outcome) = engine.request_matches(&request.id, &client.id)?;
    println!("matched request         status={}", matched.status);
    println!("  rationale: {}", outcome.rationale);
    for (index, candidate) in outcome.ranked.iter().enumerate() {
        println!("  #{} {}", index + 1, candidate.display_name);
    }

    let appointment = engine.select_professional(&request.id, &professional.id, &client.id)?;
    println!(
        "selected professional   appointment={} status={}",
        appointment.id, appointment.status
    );

    let accepted = engine.accept_appointment(&appointment.id, &professional.id)?;
    println!("professional accepted   status={}", accepted.status);
    let confirmed = engine.confirm_appointment(&appointment.id, &client.id)?;
    println!("client confirmed        status={}", confirmed.status);
    let completed = engine.complete_appointment(&appointment.id, &professional.id)?;
    println!("service delivered       status={}", completed.status);

    let closed = engine.get_request(&request.id, &client.id)?;
    println!("request closed          status={}", closed.status);

    if args.include_decline {
        println!();
        let second = engine.create_request(
            &client.id,
            NewServiceRequest {
                category: "Mobility".to_string(),
                description: "Saturday mobility sessions for a marathon block.".to_string(),
                budget: None,
            },
        )?;
        engine.request_matches(&second.id, &client.id)?;
        let appointment =
            engine.select_professional(&second.id, &professional.id, &client.id)?;
        let declined = engine.decline_appointment(&appointment.id, &professional.id)?;
        println!("professional declined   status={}", declined.status);
        let rejected = engine.get_request(&second.id, &client.id)?;
        println!("request terminal        status={}", rejected.status);
    }

    Ok(())
}
