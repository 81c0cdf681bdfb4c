/// Stop sequences matched against the decoded completion.
#[derive(Debug, Clone, Default)]
pub struct StopSequences {
    sequences: Vec<String>,
}

impl StopSequences {
    pub fn new(sequences: &[String]) -> Self {
        Self {
            sequences: sequences.iter().filter(|s| !s.is_empty()).cloned().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    /// Byte offset of the earliest match in `text`
    pub fn find(&self, text: &str) -> Option<usize> {
        self.sequences.iter().filter_map(|s| text.find(s.as_str())).min()
    }

    /// `text` cut before the earliest stop sequence, if any matched
    pub fn truncate<'a>(&self, text: &'a str) -> Option<&'a str> {
        self.find(text).map(|at| &text[..at])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stops(items: &[&str]) -> StopSequences {
        let owned: Vec<String> = items.iter().map(|s| s.to_string()).collect();
        StopSequences::new(&owned)
    }

    #[test]
    fn test_earliest_match_wins() {
        let stops = stops(&["\n\n", "User:"]);
        assert_eq!(stops.truncate("Sure. User: hi\n\nmore"), Some("Sure. "));
        assert_eq!(stops.truncate("no stop here"), None);
    }

    #[test]
    fn test_empty_sequences_are_ignored() {
        let stops = stops(&["", ""]);
        assert!(stops.is_empty());
        assert_eq!(stops.find("anything"), None);
    }

    #[test]
    fn test_multibyte_text() {
        let stops = stops(&["。"]);
        assert_eq!(stops.truncate("你好。再见"), Some("你好"));
    }
}
