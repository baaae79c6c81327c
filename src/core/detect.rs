//! Entry-point detection - classifies saved source text
//!
//! Two textual markers are recognized: a decorator-style service
//! registration (`@app(...)`) whose first quoted argument is the route, and
//! an indexed publish (`site['...']`). The registration marker takes
//! priority; when it is present but carries no extractable route, the text
//! is unresolved and nothing may be launched.

use regex::Regex;

/// Service-registration marker substring
const REGISTRATION_MARKER: &str = "@app(";

/// How the user's program should be launched, derived from its source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Long-running service registered at a route
    Service { route: String },
    /// One-shot program; runs to completion, nothing to preview
    Script,
    /// Looks like a service but no route could be extracted
    Unresolved,
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Service { route } => write!(f, "service at {}", route),
            Self::Script => write!(f, "script"),
            Self::Unresolved => write!(f, "unresolved service"),
        }
    }
}

/// Entry-point detector with precompiled patterns
pub struct EntryDetector {
    registration_re: Regex,
    publish_re: Regex,
}

impl EntryDetector {
    pub fn new() -> Self {
        Self {
            // First quoted string inside a decorator line `@app(...)`
            registration_re: Regex::new(r#"(?m)^\s*@app\([^'"\n]*['"]([^'"]*)['"]"#).unwrap(),
            // Indexed publish `site['/path']` anywhere in the text
            publish_re: Regex::new(r#"site\[\s*['"]([^'"]+)['"]\s*\]"#).unwrap(),
        }
    }

    /// Classify source text; pure, deterministic
    pub fn classify(&self, source: &str) -> Classification {
        if source.contains(REGISTRATION_MARKER) {
            return match self.registration_route(source) {
                Some(route) => Classification::Service { route },
                None => Classification::Unresolved,
            };
        }

        if let Some(caps) = self.publish_re.captures(source) {
            return Classification::Service {
                route: caps[1].to_string(),
            };
        }

        Classification::Script
    }

    fn registration_route(&self, source: &str) -> Option<String> {
        let caps = self.registration_re.captures(source)?;
        let route = caps[1].to_string();
        if route.is_empty() {
            return None;
        }
        Some(route)
    }
}

impl Default for EntryDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(source: &str) -> Classification {
        EntryDetector::new().classify(source)
    }

    #[test]
    fn test_service_registration() {
        let source = "from service import app\n\n@app('/foo')\nasync def serve(q):\n    pass\n";
        assert_eq!(
            classify(source),
            Classification::Service {
                route: "/foo".to_string()
            }
        );
    }

    #[test]
    fn test_double_quotes_and_extra_args() {
        let source = "@app(\"/dash\", on_startup=boot)\nasync def serve(q):\n    pass\n";
        assert_eq!(
            classify(source),
            Classification::Service {
                route: "/dash".to_string()
            }
        );
    }

    #[test]
    fn test_plain_script() {
        let source = "print('hello')\nfor i in range(3):\n    print(i)\n";
        assert_eq!(classify(source), Classification::Script);
    }

    #[test]
    fn test_registration_without_route_is_unresolved() {
        let source = "@app(page)\nasync def serve(q):\n    pass\n";
        assert_eq!(classify(source), Classification::Unresolved);
    }

    #[test]
    fn test_empty_route_is_unresolved() {
        let source = "@app('')\nasync def serve(q):\n    pass\n";
        assert_eq!(classify(source), Classification::Unresolved);
    }

    #[test]
    fn test_indexed_publish() {
        let source = "page = site['/report']\npage.save()\n";
        assert_eq!(
            classify(source),
            Classification::Service {
                route: "/report".to_string()
            }
        );
    }

    #[test]
    fn test_registration_wins_over_publish() {
        // Unparseable registration stays unresolved even with a valid publish
        let source = "@app(route)\npage = site['/other']\n";
        assert_eq!(classify(source), Classification::Unresolved);

        let source = "@app('/main')\npage = site['/other']\n";
        assert_eq!(
            classify(source),
            Classification::Service {
                route: "/main".to_string()
            }
        );
    }

    #[test]
    fn test_classification_is_deterministic() {
        let detector = EntryDetector::new();
        let source = "@app('/same')\n";
        assert_eq!(detector.classify(source), detector.classify(source));
    }
}
