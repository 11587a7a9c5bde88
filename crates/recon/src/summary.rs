use crate::matcher::MatchPass;
use crate::model::{MatchOutcome, MatchSummary, SkipReason, SourceSummary};

/// Compute run counts from a matching pass.
pub fn compute_summary(
    pass: &MatchPass<'_>,
    statements: usize,
    sources: &SourceSummary,
) -> MatchSummary {
    let mut partial_matches = 0;
    let mut fuzzy_matches = 0;

    for outcome in &pass.outcomes {
        if outcome.is_partial() {
            partial_matches += 1;
        }
        if let MatchOutcome::Code(code) = outcome {
            if code.score.is_some() {
                fuzzy_matches += 1;
            }
        }
    }

    let no_match = pass
        .skips
        .iter()
        .filter(|s| s.reason == SkipReason::NoMatch)
        .count();

    MatchSummary {
        contracts: pass.outcomes.len() + pass.skips.len(),
        matches: pass.outcomes.len(),
        full_matches: pass.outcomes.len() - partial_matches,
        partial_matches,
        fuzzy_matches,
        statements,
        skipped: pass.skips.len(),
        no_match,
        sources: sources.clone(),
    }
}
