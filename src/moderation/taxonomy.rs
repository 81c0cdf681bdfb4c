// Location: src/moderation/taxonomy.rs

use std::collections::BTreeSet;
use std::fmt;

use crate::error::{EngineError, Result};
use crate::types::Severity;

/// Hazard categories, following the Llama Guard 3 list (S1..S14).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    Violence,
    Crime,
    SexCrimes,
    ChildSafety,
    Defamation,
    SpecializedAdvice,
    Privacy,
    IntellectualProperty,
    Weapons,
    Hate,
    SelfHarm,
    Sexual,
    Elections,
    CodeAbuse,
}

impl Category {
    /// Every category in taxonomy order
    pub const ALL: [Category; 14] = [
        Category::Violence,
        Category::Crime,
        Category::SexCrimes,
        Category::ChildSafety,
        Category::Defamation,
        Category::SpecializedAdvice,
        Category::Privacy,
        Category::IntellectualProperty,
        Category::Weapons,
        Category::Hate,
        Category::SelfHarm,
        Category::Sexual,
        Category::Elections,
        Category::CodeAbuse,
    ];

    /// Wire name used in requests and responses
    pub fn name(self) -> &'static str {
        match self {
            Category::Violence => "violence",
            Category::Crime => "crime",
            Category::SexCrimes => "sex_crimes",
            Category::ChildSafety => "child_safety",
            Category::Defamation => "defamation",
            Category::SpecializedAdvice => "specialized_advice",
            Category::Privacy => "privacy",
            Category::IntellectualProperty => "intellectual_property",
            Category::Weapons => "weapons",
            Category::Hate => "hate",
            Category::SelfHarm => "self_harm",
            Category::Sexual => "sexual",
            Category::Elections => "elections",
            Category::CodeAbuse => "code_abuse",
        }
    }

    /// Guard model category code
    pub fn code(self) -> &'static str {
        match self {
            Category::Violence => "S1",
            Category::Crime => "S2",
            Category::SexCrimes => "S3",
            Category::ChildSafety => "S4",
            Category::Defamation => "S5",
            Category::SpecializedAdvice => "S6",
            Category::Privacy => "S7",
            Category::IntellectualProperty => "S8",
            Category::Weapons => "S9",
            Category::Hate => "S10",
            Category::SelfHarm => "S11",
            Category::Sexual => "S12",
            Category::Elections => "S13",
            Category::CodeAbuse => "S14",
        }
    }

    /// Human-readable label, as written in the guard prompt
    pub fn label(self) -> &'static str {
        match self {
            Category::Violence => "Violent Crimes",
            Category::Crime => "Non-Violent Crimes",
            Category::SexCrimes => "Sex-Related Crimes",
            Category::ChildSafety => "Child Sexual Exploitation",
            Category::Defamation => "Defamation",
            Category::SpecializedAdvice => "Specialized Advice",
            Category::Privacy => "Privacy",
            Category::IntellectualProperty => "Intellectual Property",
            Category::Weapons => "Indiscriminate Weapons",
            Category::Hate => "Hate",
            Category::SelfHarm => "Suicide & Self-Harm",
            Category::Sexual => "Sexual Content",
            Category::Elections => "Elections",
            Category::CodeAbuse => "Code Interpreter Abuse",
        }
    }

    pub fn severity(self) -> Severity {
        match self {
            Category::Violence
            | Category::SexCrimes
            | Category::ChildSafety
            | Category::Weapons
            | Category::SelfHarm => Severity::High,
            Category::Crime
            | Category::Privacy
            | Category::Hate
            | Category::Sexual
            | Category::CodeAbuse => Severity::Medium,
            Category::Defamation
            | Category::SpecializedAdvice
            | Category::IntellectualProperty
            | Category::Elections => Severity::Low,
        }
    }

    /// Parse a wire name, case-insensitively
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.name().eq_ignore_ascii_case(name))
    }

    /// Categories a request asked for, in taxonomy order. An empty set selects all.
    pub fn select(names: &BTreeSet<String>) -> Result<Vec<Category>> {
        if names.is_empty() {
            return Ok(Self::ALL.to_vec());
        }

        let mut selected = BTreeSet::new();
        for name in names {
            let category = Self::parse(name)
                .ok_or_else(|| EngineError::moderation(format!("unknown category '{}'", name)))?;
            selected.insert(category);
        }
        Ok(selected.into_iter().collect())
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_round_trips_names() {
        for category in Category::ALL {
            assert_eq!(Category::parse(category.name()), Some(category));
        }
        assert_eq!(Category::parse(" Violence "), Some(Category::Violence));
        assert_eq!(Category::parse("spam"), None);
    }

    #[test]
    fn test_select_keeps_taxonomy_order() {
        let names: BTreeSet<String> = ["weapons", "violence", "hate"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let selected = Category::select(&names).unwrap();
        assert_eq!(
            selected,
            vec![Category::Violence, Category::Weapons, Category::Hate]
        );
    }

    #[test]
    fn test_select_empty_means_all() {
        let selected = Category::select(&BTreeSet::new()).unwrap();
        assert_eq!(selected.len(), 14);
        assert_eq!(selected[0], Category::Violence);
    }

    #[test]
    fn test_select_unknown_category() {
        let names: BTreeSet<String> = ["violence", "spam"].iter().map(|s| s.to_string()).collect();
        let error = Category::select(&names).unwrap_err();
        assert!(matches!(error, EngineError::Moderation { .. }));
        assert!(error.to_string().contains("spam"));
    }

    #[test]
    fn test_codes_are_sequential() {
        for (i, category) in Category::ALL.iter().enumerate() {
            assert_eq!(category.code(), format!("S{}", i + 1));
        }
    }
}
