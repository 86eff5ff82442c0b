/// Upper bound on "did you mean" suggestions returned for an unresolved name.
pub const MAX_SUGGESTIONS: usize = 5;

/// Canonical country name, spelled the way the data source spells it.
pub type SupportedCountry = String;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
    #[error("\"{input}\" is not a recognized country")]
    NotFound {
        input: String,
        suggestions: Vec<SupportedCountry>,
    },
}

impl LookupError {
    pub fn suggestions(&self) -> &[SupportedCountry] {
        match self {
            Self::NotFound { suggestions, .. } => suggestions,
        }
    }
}

/// Immutable, source-ordered set of supported country names.
#[derive(Debug, Clone, Default)]
pub struct CountryIndex {
    names: Vec<SupportedCountry>,
    folded: Vec<String>,
}

impl CountryIndex {
    pub fn new(names: Vec<SupportedCountry>) -> Self {
        let folded = names.iter().map(|name| name.to_lowercase()).collect();
        Self { names, folded }
    }

    pub fn names(&self) -> &[SupportedCountry] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Exact case-insensitive match, or a miss carrying up to
    /// [`MAX_SUGGESTIONS`] substring matches in source order.
    pub fn resolve(&self, input: &str) -> Result<SupportedCountry, LookupError> {
        let needle = input.trim().to_lowercase();
        if needle.is_empty() {
            return Err(LookupError::NotFound {
                input: input.to_string(),
                suggestions: Vec::new(),
            });
        }

        if let Some(idx) = self.folded.iter().position(|name| *name == needle) {
            return Ok(self.names[idx].clone());
        }

        let suggestions = self
            .folded
            .iter()
            .zip(&self.names)
            .filter(|(folded, _)| folded.contains(&needle))
            .map(|(_, name)| name.clone())
            .take(MAX_SUGGESTIONS)
            .collect();

        Err(LookupError::NotFound {
            input: input.trim().to_string(),
            suggestions,
        })
    }
}
