//! Longest-unique-prefix route matching and path transform.

use http::Method;

use moltis_config::schema::RouteGroup;

pub enum RouteMatch<'a> {
    Found { route: &'a RouteGroup, forward_path: String },
    MethodNotAllowed,
    NotFound,
}

/// Matches `path` against the longest route prefix, then checks the method
/// allow-list. Config validation (`moltis_config::validate::validate_gateway`)
/// already rejects duplicate prefixes, so "longest" is always unique.
#[must_use]
pub fn resolve<'a>(routes: &'a [RouteGroup], path: &str, method: &Method) -> RouteMatch<'a> {
    let matched = routes.iter().filter(|r| path_matches_prefix(path, &r.prefix)).max_by_key(|r| r.prefix.len());

    let Some(route) = matched else {
        return RouteMatch::NotFound;
    };

    if !route.methods.contains(method.as_str()) {
        return RouteMatch::MethodNotAllowed;
    }

    let forward_path = if route.transform {
        transform_path(path, &route.prefix)
    } else {
        path.to_string()
    };

    RouteMatch::Found { route, forward_path }
}

/// `path` matches `prefix` if it equals it exactly or continues with `/`,
/// so `/svc` matches `/svc` and `/svc/ping` but not `/svcx`.
fn path_matches_prefix(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    path == prefix || path.starts_with(&format!("{prefix}/"))
}

/// Strips `prefix` from `path`, then strips a trailing slash unless the
/// result is the root (`/`).
///
/// `/api/v1/x/` with prefix `/api/v1/x` becomes `/` (root preserved);
/// `/api/v1/x/y/` becomes `/y`.
fn transform_path(path: &str, prefix: &str) -> String {
    let stripped = path.strip_prefix(prefix).unwrap_or(path);
    let stripped = if stripped.is_empty() { "/" } else { stripped };
    if stripped != "/" && stripped.ends_with('/') {
        stripped.trim_end_matches('/').to_string()
    } else {
        stripped.to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    fn route(prefix: &str, transform: bool) -> RouteGroup {
        RouteGroup {
            name: "svc".into(),
            prefix: prefix.into(),
            service: "svc".into(),
            methods: ["GET", "POST"].into_iter().map(String::from).collect::<BTreeSet<_>>(),
            transform,
        }
    }

    #[test]
    fn trailing_slash_on_root_is_preserved() {
        assert_eq!(transform_path("/api/v1/x/", "/api/v1/x"), "/");
    }

    #[test]
    fn nested_trailing_slash_is_stripped() {
        assert_eq!(transform_path("/api/v1/x/y/", "/api/v1/x"), "/y");
    }

    #[test]
    fn longest_prefix_wins() {
        let routes = vec![route("/api", true), route("/api/v1/x", true)];
        match resolve(&routes, "/api/v1/x/y", &Method::GET) {
            RouteMatch::Found { route, .. } => assert_eq!(route.prefix, "/api/v1/x"),
            _ => panic!("expected a match"),
        }
    }

    #[test]
    fn method_not_in_allow_list_is_405() {
        let routes = vec![route("/svc", true)];
        match resolve(&routes, "/svc/ping", &Method::DELETE) {
            RouteMatch::MethodNotAllowed => {},
            _ => panic!("expected method not allowed"),
        }
    }

    #[test]
    fn unknown_path_is_404() {
        let routes = vec![route("/svc", true)];
        match resolve(&routes, "/other", &Method::GET) {
            RouteMatch::NotFound => {},
            _ => panic!("expected not found"),
        }
    }
}
