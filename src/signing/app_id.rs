//! Application-identifier wildcard matching
//!
//! Profile patterns use `*` as the only wildcard, standing for any
//! (possibly empty) substring. Every other character matches literally.

use regex_lite::Regex;

/// Pattern accepting every application identifier
pub const MATCH_ALL: &str = "*";

/// Compiled application-identifier pattern
#[derive(Debug, Clone)]
pub enum AppIdPattern {
    Any,
    Matcher(Regex),
}

impl AppIdPattern {
    pub fn new(pattern: &str) -> Result<Self, regex_lite::Error> {
        if pattern == MATCH_ALL {
            return Ok(AppIdPattern::Any);
        }
        Ok(AppIdPattern::Matcher(Regex::new(&wildcard_to_regex(pattern))?))
    }

    pub fn matches(&self, app_id: &str) -> bool {
        match self {
            AppIdPattern::Any => true,
            AppIdPattern::Matcher(re) => re.is_match(app_id),
        }
    }
}

/// Anchored regex source for a wildcard pattern.
pub fn wildcard_to_regex(pattern: &str) -> String {
    format!("^{}$", regex_lite::escape(pattern).replace(r"\*", ".*"))
}

/// Whether `app_id` is covered by `pattern`
pub fn app_id_matches(pattern: &str, app_id: &str) -> bool {
    AppIdPattern::new(pattern)
        .map(|p| p.matches(app_id))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_all_accepts_anything() {
        for id in ["org.example.app", "", "a.b.c.d", "weird id with spaces"] {
            assert!(app_id_matches("*", id), "{id}");
        }
    }

    #[test]
    fn test_trailing_wildcard() {
        assert!(app_id_matches("com.acme.*", "com.acme.app1"));
        assert!(app_id_matches("com.acme.*", "com.acme.app1.ext"));
        assert!(!app_id_matches("com.acme.*", "com.other.app1"));
        assert!(!app_id_matches("com.acme.*", "com.acme"));
    }

    #[test]
    fn test_dots_are_literal() {
        assert!(app_id_matches("com.acme.app", "com.acme.app"));
        assert!(!app_id_matches("com.acme.app", "comXacmeXapp"));
        assert!(!app_id_matches("com.acme.app", "com.acme.app.extra"));
        assert!(!app_id_matches("com.acme.app", "prefix.com.acme.app"));
    }

    #[test]
    fn test_metacharacters_are_literal() {
        assert!(app_id_matches("com.acme+(beta)?", "com.acme+(beta)?"));
        assert!(!app_id_matches("com.acme+(beta)?", "com.acmee(beta)"));
        assert!(app_id_matches("a[b]c$^|*", "a[b]c$^|anything"));
    }

    #[test]
    fn test_inner_wildcard() {
        assert!(app_id_matches("com.*.app", "com.acme.app"));
        assert!(app_id_matches("com.*.app", "com..app"));
        assert!(!app_id_matches("com.*.app", "com.acme.app2"));
    }

    #[test]
    fn test_regex_source_anchored() {
        assert_eq!(wildcard_to_regex("com.acme.*"), r"^com\.acme\..*$");
    }
}
