//! Provider identification.

/// Provider type enum for matching configuration strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderType {
    Ollama,
    Watsonx,
}

impl ProviderType {
    /// Parse provider type from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "ollama" => Some(Self::Ollama),
            "watsonx" | "ibm" | "ibm-watsonx" => Some(Self::Watsonx),
            _ => None,
        }
    }

    /// Get the canonical provider name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::Watsonx => "watsonx",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_type_parsing() {
        assert_eq!(ProviderType::parse("ollama"), Some(ProviderType::Ollama));
        assert_eq!(ProviderType::parse("Watsonx"), Some(ProviderType::Watsonx));
        assert_eq!(ProviderType::parse("ibm"), Some(ProviderType::Watsonx));
        assert_eq!(ProviderType::parse("openai"), None);
    }

    #[test]
    fn test_canonical_names_round_trip() {
        for provider in [ProviderType::Ollama, ProviderType::Watsonx] {
            assert_eq!(ProviderType::parse(provider.as_str()), Some(provider));
        }
    }
}
