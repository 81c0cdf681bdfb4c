// Location: src/moderation/policy.rs

use crate::error::{EngineError, Result};
use crate::types::{GuardConfig, ModerationResult, Severity, Verdict};

use super::{Category, NO_ISSUES};

/// Turn per-category scores into a verdict.
///
/// A category triggers when its score reaches `threshold`. The verdict is
/// `Block` only when auto-block is on and a high-severity category triggered;
/// any other trigger is a `Flag`.
pub fn evaluate(scores: &[(Category, f32)], config: &GuardConfig) -> Result<ModerationResult> {
    if let Some((category, score)) = scores
        .iter()
        .find(|(_, s)| !s.is_finite() || !(0.0..=1.0).contains(s))
    {
        return Err(EngineError::moderation(format!(
            "guard returned score {} for '{}', expected a value in [0, 1]",
            score, category
        )));
    }

    let mut triggered: Vec<(Category, f32)> = scores
        .iter()
        .copied()
        .filter(|(_, score)| *score >= config.threshold)
        .collect();
    triggered.sort_by_key(|(category, _)| *category);
    triggered.dedup_by_key(|(category, _)| *category);

    if triggered.is_empty() {
        return Ok(ModerationResult {
            verdict: Verdict::Allow,
            severity: Severity::Low,
            rationale: vec![NO_ISSUES.to_string()],
            categories: Vec::new(),
        });
    }

    let severity = triggered
        .iter()
        .map(|(category, _)| category.severity())
        .max()
        .unwrap_or_default();

    let verdict = if config.auto_block && severity == Severity::High {
        Verdict::Block
    } else {
        Verdict::Flag
    };

    let rationale = triggered
        .iter()
        .map(|(category, score)| {
            format!(
                "{} ({}): score {:.2} >= threshold {:.2}, {} severity",
                category.label(),
                category.code(),
                score,
                config.threshold,
                category.severity()
            )
        })
        .collect();

    Ok(ModerationResult {
        verdict,
        severity,
        rationale,
        categories: triggered.iter().map(|(c, _)| c.name().to_string()).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn guard(threshold: f32, auto_block: bool) -> GuardConfig {
        GuardConfig::new("meta-llama/Llama-Guard-3-1B", threshold).with_auto_block(auto_block)
    }

    #[test]
    fn test_nothing_triggered_allows() {
        let scores = [(Category::Violence, 0.2), (Category::Hate, 0.49)];
        let result = evaluate(&scores, &guard(0.5, true)).unwrap();

        assert_eq!(result.verdict, Verdict::Allow);
        assert_eq!(result.severity, Severity::Low);
        assert_eq!(result.rationale, vec![NO_ISSUES.to_string()]);
        assert!(result.categories.is_empty());
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let result = evaluate(&[(Category::Privacy, 0.5)], &guard(0.5, false)).unwrap();
        assert_eq!(result.verdict, Verdict::Flag);
        assert_eq!(result.severity, Severity::Medium);
        assert_eq!(result.categories, vec!["privacy".to_string()]);
    }

    #[test]
    fn test_high_severity_blocks_only_with_auto_block() {
        let scores = [(Category::Violence, 0.9), (Category::Defamation, 0.7)];

        let blocked = evaluate(&scores, &guard(0.5, true)).unwrap();
        assert_eq!(blocked.verdict, Verdict::Block);
        assert_eq!(blocked.severity, Severity::High);
        assert_eq!(blocked.rationale.len(), 2);
        assert!(blocked.rationale[0].starts_with("Violent Crimes (S1)"));

        let flagged = evaluate(&scores, &guard(0.5, false)).unwrap();
        assert_eq!(flagged.verdict, Verdict::Flag);
        assert_eq!(flagged.severity, Severity::High);
        assert_eq!(flagged.categories, blocked.categories);
    }

    #[test]
    fn test_medium_severity_never_blocks() {
        let result = evaluate(&[(Category::Hate, 1.0)], &guard(0.5, true)).unwrap();
        assert_eq!(result.verdict, Verdict::Flag);
    }

    #[test]
    fn test_turning_auto_block_off_only_downgrades_block() {
        let cases: Vec<Vec<(Category, f32)>> = vec![
            vec![],
            vec![(Category::Violence, 0.1)],
            vec![(Category::Weapons, 0.8)],
            vec![(Category::Elections, 0.6), (Category::SelfHarm, 0.95)],
            vec![(Category::Crime, 0.7)],
        ];

        for scores in cases {
            let on = evaluate(&scores, &guard(0.5, true)).unwrap();
            let off = evaluate(&scores, &guard(0.5, false)).unwrap();
            match on.verdict {
                Verdict::Block => assert_eq!(off.verdict, Verdict::Flag),
                other => assert_eq!(off.verdict, other),
            }
        }
    }

    #[test]
    fn test_categories_follow_taxonomy_order() {
        let scores = [(Category::CodeAbuse, 0.9), (Category::Violence, 0.9), (Category::Hate, 0.9)];
        let result = evaluate(&scores, &guard(0.5, false)).unwrap();
        assert_eq!(result.categories, vec!["violence", "hate", "code_abuse"]);
    }

    #[test]
    fn test_malformed_scores_are_rejected() {
        for bad in [f32::NAN, -0.1, 1.5] {
            let error = evaluate(&[(Category::Violence, bad)], &guard(0.5, false)).unwrap_err();
            assert!(matches!(error, EngineError::Moderation { .. }));
        }
    }
}
