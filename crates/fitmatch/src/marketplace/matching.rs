use std::collections::HashSet;
use std::sync::Arc;

use tracing::{info, warn};

use super::domain::{RequestId, User};
use super::error::MarketplaceError;
use super::llm::{ProfileLine, RankingContext, RankingOracle, RankingOutcome};
use super::repository::{ServiceRequestRepository, UserRepository};

/// Upper bound on the shortlist; oracle responses carrying more are truncated.
pub const MAX_SHORTLIST: usize = 3;

/// Result of a matching run. The rationale is always present, even when the
/// shortlist is empty, so the lifecycle engine can persist an explanation.
#[derive(Debug, Clone)]
pub struct MatchOutcome {
    pub rationale: String,
    pub ranked: Vec<User>,
}

impl MatchOutcome {
    fn degraded(rationale: impl Into<String>) -> Self {
        Self {
            rationale: rationale.into(),
            ranked: Vec::new(),
        }
    }
}

/// Turns a service request plus the verified professional pool into a ranked
/// shortlist via the ranking oracle. Read-only with respect to the request;
/// the lifecycle engine owns all status writes.
pub struct MatchingAdapter<R, U> {
    requests: Arc<R>,
    users: Arc<U>,
    oracle: Option<Arc<dyn RankingOracle>>,
}

impl<R, U> MatchingAdapter<R, U>
where
    R: ServiceRequestRepository,
    U: UserRepository,
{
    pub fn new(requests: Arc<R>, users: Arc<U>, oracle: Option<Arc<dyn RankingOracle>>) -> Self {
        Self {
            requests,
            users,
            oracle,
        }
    }

    pub fn find_matches(&self, request_id: &RequestId) -> Result<MatchOutcome, MarketplaceError> {
        let request = self.requests.fetch(request_id)?.ok_or_else(|| {
            MarketplaceError::not_found(format!("service request not found: {request_id}"))
        })?;

        let pool = self.users.verified_professionals()?;
        if pool.is_empty() {
            info!(request = %request_id, "no verified professionals available to match");
            return Ok(MatchOutcome::degraded(
                "No verified professionals available.",
            ));
        }

        let oracle = match self.oracle.as_deref() {
            Some(oracle) => oracle,
            None => {
                warn!(request = %request_id, "ranking capability not configured, skipping matching");
                return Ok(MatchOutcome::degraded(
                    "Matching skipped: ranking capability not configured.",
                ));
            }
        };

        let lines: Vec<ProfileLine> = pool.iter().filter_map(ProfileLine::from_user).collect();
        let context = RankingContext {
            category: request.category.clone(),
            description: request.description.clone(),
            budget: request.budget.clone(),
        };

        info!(
            request = %request_id,
            pool_size = lines.len(),
            "submitting professional pool to ranking oracle"
        );

        match oracle.rank(&context, &lines) {
            Ok(outcome) => Ok(sanitize(request_id, outcome, &pool)),
            Err(err) => {
                warn!(request = %request_id, error = %err, "ranking oracle failed");
                Ok(MatchOutcome::degraded(format!(
                    "Matching degraded: ranking oracle unavailable ({err})."
                )))
            }
        }
    }
}

/// Maps an oracle response back onto the submitted pool. Unknown ids are
/// dropped with a warning, duplicates keep their first entry, the rank field
/// is a pure sort key with submission order breaking ties, and the shortlist
/// is capped at `MAX_SHORTLIST`. An empty result is a valid outcome.
fn sanitize(request_id: &RequestId, outcome: RankingOutcome, pool: &[User]) -> MatchOutcome {
    let mut entries = outcome.ranked;
    // Vec::sort_by_key is stable, so equal ranks keep submission order.
    entries.sort_by_key(|entry| entry.rank);

    let mut ranked = Vec::new();
    let mut seen = HashSet::new();
    for entry in entries {
        if ranked.len() == MAX_SHORTLIST {
            warn!(
                request = %request_id,
                "ranking oracle exceeded the shortlist cap, dropping extra entries"
            );
            break;
        }
        if !seen.insert(entry.professional_id.clone()) {
            warn!(
                request = %request_id,
                professional = %entry.professional_id,
                "ranking oracle repeated a professional id, keeping the first entry"
            );
            continue;
        }
        match pool.iter().find(|user| user.id.0 == entry.professional_id) {
            Some(user) => ranked.push(user.clone()),
            None => {
                warn!(
                    request = %request_id,
                    professional = %entry.professional_id,
                    "ranking oracle returned an unknown professional id, dropping entry"
                );
            }
        }
    }

    MatchOutcome {
        rationale: outcome.rationale,
        ranked,
    }
}
