//! Route templates.
//!
//! Requests are labelled by the template they matched (`/items/{id}`), never
//! by their raw path, so the number of series per family stays bounded by the
//! number of declared routes.

use hyper::Method;

/// Template recorded for requests that match no route.
pub const UNMATCHED_ROUTE: &str = "unmatched";

#[derive(Clone, Debug, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

#[derive(Clone, Debug)]
struct RouteEntry<T> {
    method: Method,
    template: String,
    segments: Vec<Segment>,
    target: T,
}

/// Result of resolving a request against a [`RouteTable`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RouteMatch<T> {
    /// Method and path matched a route.
    Found {
        template: String,
        params: Vec<(String, String)>,
        target: T,
    },
    /// The path matched a template, but not for this method.
    MethodNotAllowed { template: String },
    /// Nothing matched.
    NotFound,
}

impl<T> RouteMatch<T> {
    /// The template to use as a metric label.
    pub fn template(&self) -> &str {
        match self {
            RouteMatch::Found { template, .. } | RouteMatch::MethodNotAllowed { template } => {
                template
            }
            RouteMatch::NotFound => UNMATCHED_ROUTE,
        }
    }

    /// Value of a `{name}` path parameter.
    pub fn param(&self, name: &str) -> Option<&str> {
        match self {
            RouteMatch::Found { params, .. } => params
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }
}

/// Ordered set of `(method, template)` routes. First match wins.
#[derive(Clone, Debug)]
pub struct RouteTable<T> {
    routes: Vec<RouteEntry<T>>,
}

impl<T> Default for RouteTable<T> {
    fn default() -> Self {
        Self { routes: Vec::new() }
    }
}

impl<T: Clone> RouteTable<T> {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a route. `{name}` segments match any single path segment.
    pub fn route(mut self, method: Method, template: &str, target: T) -> Self {
        self.routes.push(RouteEntry {
            method,
            template: template.to_string(),
            segments: parse_template(template),
            target,
        });
        self
    }

    /// Resolve a method and path.
    pub fn resolve(&self, method: &Method, path: &str) -> RouteMatch<T> {
        let parts: Vec<&str> = split_path(path).collect();
        let mut path_matched: Option<&str> = None;

        for entry in &self.routes {
            let Some(params) = match_segments(&entry.segments, &parts) else {
                continue;
            };

            if entry.method == *method {
                return RouteMatch::Found {
                    template: entry.template.clone(),
                    params,
                    target: entry.target.clone(),
                };
            }
            path_matched.get_or_insert(entry.template.as_str());
        }

        match path_matched {
            Some(template) => RouteMatch::MethodNotAllowed {
                template: template.to_string(),
            },
            None => RouteMatch::NotFound,
        }
    }

    /// Whether any route uses exactly this template.
    pub fn has_template(&self, template: &str) -> bool {
        self.routes.iter().any(|r| r.template == template)
    }
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

fn parse_template(template: &str) -> Vec<Segment> {
    split_path(template)
        .map(|s| match s.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            Some(name) => Segment::Param(name.to_string()),
            None => Segment::Literal(s.to_string()),
        })
        .collect()
}

fn match_segments(segments: &[Segment], parts: &[&str]) -> Option<Vec<(String, String)>> {
    if segments.len() != parts.len() {
        return None;
    }

    let mut params = Vec::new();
    for (segment, part) in segments.iter().zip(parts) {
        match segment {
            Segment::Literal(lit) if lit.as_str() == *part => {}
            Segment::Literal(_) => return None,
            Segment::Param(name) => params.push((name.clone(), part.to_string())),
        }
    }
    Some(params)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> RouteTable<&'static str> {
        RouteTable::new()
            .route(Method::GET, "/", "root")
            .route(Method::GET, "/health", "health")
            .route(Method::GET, "/items/{id}", "item")
            .route(Method::POST, "/simulate-load", "load")
    }

    #[test]
    fn test_literal_match() {
        let m = table().resolve(&Method::GET, "/health");
        assert_eq!(m.template(), "/health");
        assert!(matches!(m, RouteMatch::Found { target: "health", .. }));
    }

    #[test]
    fn test_root_and_trailing_slash() {
        let t = table();
        assert_eq!(t.resolve(&Method::GET, "/").template(), "/");
        assert_eq!(t.resolve(&Method::GET, "/health/").template(), "/health");
    }

    #[test]
    fn test_param_match_uses_template() {
        let t = table();
        let a = t.resolve(&Method::GET, "/items/42");
        let b = t.resolve(&Method::GET, "/items/abc-def");

        assert_eq!(a.template(), "/items/{id}");
        assert_eq!(b.template(), "/items/{id}");
        assert_eq!(a.param("id"), Some("42"));
        assert_eq!(b.param("id"), Some("abc-def"));
        assert_eq!(a.param("missing"), None);
    }

    #[test]
    fn test_method_not_allowed() {
        let m = table().resolve(&Method::GET, "/simulate-load");
        assert_eq!(
            m,
            RouteMatch::MethodNotAllowed {
                template: "/simulate-load".to_string()
            }
        );
        assert_eq!(m.template(), "/simulate-load");
    }

    #[test]
    fn test_not_found_collapses_to_unmatched() {
        let t = table();
        for path in ["/nope", "/items/1/extra", "/items", "/health/x"] {
            let m = t.resolve(&Method::GET, path);
            assert_eq!(m, RouteMatch::NotFound, "path {path}");
            assert_eq!(m.template(), UNMATCHED_ROUTE);
        }
    }

    #[test]
    fn test_has_template() {
        let t = table();
        assert!(t.has_template("/items/{id}"));
        assert!(!t.has_template("/items/42"));
    }
}
