//! Providers handler

use selfheal::provider::PROVIDER_NAMES;
use selfheal::ProviderKind;

/// Table of providers, their aliases and environment variables
#[must_use]
pub fn render_providers() -> String {
    let mut out = String::new();
    for kind in ProviderKind::ALL {
        let aliases: Vec<&str> = PROVIDER_NAMES
            .iter()
            .filter(|(name, k)| *k == kind && *name != kind.as_str())
            .map(|(name, _)| *name)
            .collect();
        out.push_str(kind.as_str());
        if !aliases.is_empty() {
            out.push_str(&format!(" (also: {})", aliases.join(", ")));
        }
        out.push('\n');

        let key = if kind.requires_key() {
            kind.key_vars().join(" | ")
        } else {
            "not required".to_string()
        };
        out.push_str(&format!("  key:      {key}\n"));
        out.push_str(&format!(
            "  model:    {} (default {})\n",
            kind.model_var(),
            kind.default_model()
        ));
        if let Some(endpoint) = kind.endpoint_var() {
            out.push_str(&format!("  endpoint: {endpoint}\n"));
        }
    }
    out
}

/// Execute the providers command
pub fn execute_providers() {
    print!("{}", render_providers());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lists_every_provider() {
        let table = render_providers();
        for kind in ProviderKind::ALL {
            assert!(table.contains(kind.as_str()));
            assert!(table.contains(kind.default_model()));
        }
    }

    #[test]
    fn test_aliases_and_keys() {
        let table = render_providers();
        assert!(table.contains("gemini (also: google)"));
        assert!(table.contains("GEMINI_API_KEY | GOOGLE_API_KEY"));
        assert!(table.contains("ollama (also: local)"));
        assert!(table.contains("key:      not required"));
        assert!(table.contains("endpoint: AZURE_OPENAI_ENDPOINT"));
    }
}
