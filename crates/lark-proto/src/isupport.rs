//! ISUPPORT (numeric 005) token construction.

/// Maximum tokens per 005 line.
const TOKENS_PER_LINE: usize = 13;

/// Accumulates ISUPPORT tokens and splits them into 005-sized groups.
#[derive(Debug, Default)]
pub struct IsupportBuilder {
    tokens: Vec<String>,
}

impl IsupportBuilder {
    /// Start an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a bare token (`SAFELIST`).
    pub fn flag(mut self, name: &str) -> Self {
        self.tokens.push(name.to_string());
        self
    }

    /// Add a `NAME=value` token.
    pub fn value(mut self, name: &str, value: impl std::fmt::Display) -> Self {
        self.tokens.push(format!("{name}={value}"));
        self
    }

    /// Split into groups of at most 13 tokens, one per 005 line.
    pub fn lines(self) -> Vec<Vec<String>> {
        self.tokens
            .chunks(TOKENS_PER_LINE)
            .map(|chunk| chunk.to_vec())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_at_thirteen() {
        let mut b = IsupportBuilder::new();
        for i in 0..30 {
            b = b.value("TOK", i);
        }
        let lines = b.lines();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].len(), 13);
        assert_eq!(lines[1].len(), 13);
        assert_eq!(lines[2].len(), 4);
    }

    #[test]
    fn formats_values() {
        let lines = IsupportBuilder::new()
            .value("NICKLEN", 30)
            .flag("SAFELIST")
            .value("CHANTYPES", "#&")
            .lines();
        assert_eq!(lines, vec![vec![
            "NICKLEN=30".to_string(),
            "SAFELIST".to_string(),
            "CHANTYPES=#&".to_string(),
        ]]);
    }
}
