//! Configuration-builder classification
//!
//! Deciding which methods build configuration text is approximate, so the
//! decision sits behind [`TemplateFilter`] and callers can swap it out.

/// Method signature facts the filter decides on
#[derive(Debug, Clone, Copy)]
pub struct MethodSignature<'a> {
    pub name: &'a str,
    pub struct_name: &'a str,
    pub has_receiver: bool,
    pub returns_text: bool,
}

/// Predicate selecting configuration-builder functions
pub trait TemplateFilter: Send + Sync {
    fn is_config_function(&self, sig: &MethodSignature<'_>) -> bool;
}

/// Method names used by acceptance-test structs for infrastructure checks
pub const DEFAULT_EXCLUDED_NAMES: &[&str] = &[
    "Exists",
    "Destroy",
    "ResourceType",
    "IDValidationFunc",
    "ModelObject",
    "Arguments",
    "Attributes",
    "Create",
    "Read",
    "Update",
    "Delete",
    "CustomizeDiff",
    "CustomImporter",
    "String",
    "Error",
];

/// Name prefixes of helper methods that may still return strings
pub const DEFAULT_EXCLUDED_PREFIXES: &[&str] = &["check", "Check", "exists", "destroy"];

/// Receiver + `string` result + not an infrastructure helper
#[derive(Debug, Clone)]
pub struct DefaultTemplateFilter {
    excluded_names: Vec<String>,
    excluded_prefixes: Vec<String>,
}

impl DefaultTemplateFilter {
    pub fn new() -> Self {
        Self {
            excluded_names: DEFAULT_EXCLUDED_NAMES.iter().map(|s| s.to_string()).collect(),
            excluded_prefixes: DEFAULT_EXCLUDED_PREFIXES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }

    /// Replace the excluded name list
    pub fn with_excluded_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_names = names.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the excluded prefix list
    pub fn with_excluded_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_prefixes = prefixes.into_iter().map(Into::into).collect();
        self
    }

    fn is_helper(&self, name: &str) -> bool {
        self.excluded_names.iter().any(|n| n == name)
            || self.excluded_prefixes.iter().any(|p| name.starts_with(p.as_str()))
    }
}

impl Default for DefaultTemplateFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateFilter for DefaultTemplateFilter {
    fn is_config_function(&self, sig: &MethodSignature<'_>) -> bool {
        sig.has_receiver && sig.returns_text && !self.is_helper(sig.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(name: &str, returns_text: bool) -> MethodSignature<'_> {
        MethodSignature {
            name,
            struct_name: "ResourceGroupResource",
            has_receiver: true,
            returns_text,
        }
    }

    #[test]
    fn test_accepts_template_methods() {
        let filter = DefaultTemplateFilter::new();
        assert!(filter.is_config_function(&sig("basic", true)));
        assert!(filter.is_config_function(&sig("requiresImport", true)));
    }

    #[test]
    fn test_rejects_non_text_and_helpers() {
        let filter = DefaultTemplateFilter::new();
        assert!(!filter.is_config_function(&sig("basic", false)));
        assert!(!filter.is_config_function(&sig("ResourceType", true)));
        assert!(!filter.is_config_function(&sig("checkTags", true)));
    }

    #[test]
    fn test_rejects_free_functions() {
        let filter = DefaultTemplateFilter::new();
        let free = MethodSignature {
            has_receiver: false,
            ..sig("basic", true)
        };
        assert!(!filter.is_config_function(&free));
    }

    #[test]
    fn test_custom_exclusions() {
        let filter = DefaultTemplateFilter::new()
            .with_excluded_names(["template"])
            .with_excluded_prefixes(Vec::<String>::new());
        assert!(!filter.is_config_function(&sig("template", true)));
        assert!(filter.is_config_function(&sig("checkTags", true)));
        assert!(filter.is_config_function(&sig("ResourceType", true)));
    }
}
