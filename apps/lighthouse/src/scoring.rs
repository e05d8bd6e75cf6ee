//! # Category Scoring
//!
//! A category score is the weighted arithmetic mean of its audits' scores,
//! rounded to two decimals.
//!
//! - manual, informative and not-applicable audits carry no weight
//! - errored audits count as 0
//! - a category with no remaining weight has a null score

use lighthouse_core::{
    AuditResult, CategoryDefinition, CategoryScore, LighthouseError, ScoreDisplayMode, Scorer,
};
use std::collections::BTreeMap;

/// Weighted-mean scorer.
#[derive(Debug, Clone, Copy, Default)]
pub struct WeightedScorer;

impl WeightedScorer {
    fn score_category(
        id: &str,
        category: &CategoryDefinition,
        results_by_id: &BTreeMap<String, AuditResult>,
    ) -> Result<Option<f64>, LighthouseError> {
        let mut weighted_sum = 0.0;
        let mut total_weight = 0.0;

        for audit_ref in &category.audit_refs {
            let result = results_by_id.get(&audit_ref.id).ok_or_else(|| {
                LighthouseError::Scoring(format!(
                    "Category '{}' references audit '{}' which has no result",
                    id, audit_ref.id
                ))
            })?;
            if audit_ref.weight < 0.0 || !audit_ref.weight.is_finite() {
                return Err(LighthouseError::Scoring(format!(
                    "Audit '{}' in category '{}' has invalid weight {}",
                    audit_ref.id, id, audit_ref.weight
                )));
            }

            let score = match result.score_display_mode {
                ScoreDisplayMode::Manual
                | ScoreDisplayMode::Informative
                | ScoreDisplayMode::NotApplicable => continue,
                ScoreDisplayMode::Error => 0.0,
                ScoreDisplayMode::Numeric | ScoreDisplayMode::Binary => match result.score {
                    Some(score) => score,
                    None => continue,
                },
            };
            weighted_sum += score * audit_ref.weight;
            total_weight += audit_ref.weight;
        }

        if total_weight == 0.0 {
            return Ok(None);
        }
        Ok(Some(round_to_hundredths(weighted_sum / total_weight)))
    }
}

fn round_to_hundredths(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

impl Scorer for WeightedScorer {
    fn score_all_categories(
        &self,
        categories: &BTreeMap<String, CategoryDefinition>,
        results_by_id: &BTreeMap<String, AuditResult>,
    ) -> Result<BTreeMap<String, CategoryScore>, LighthouseError> {
        categories
            .iter()
            .map(|(id, category)| {
                let score = Self::score_category(id, category, results_by_id)?;
                tracing::debug!(category = %id, ?score, "category scored");
                Ok((
                    id.clone(),
                    CategoryScore {
                        id: id.clone(),
                        title: category.title.clone(),
                        description: category.description.clone(),
                        manual_description: category.manual_description.clone(),
                        audit_refs: category.audit_refs.clone(),
                        score,
                    },
                ))
            })
            .collect()
    }
}
