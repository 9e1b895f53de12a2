//! Ordered route table.

use crate::routing::route::Route;

/// An ordered sequence of route rules, matched top to bottom.
#[derive(Clone, Debug, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, route: Route) {
        self.routes.push(route);
    }

    pub fn extend(&mut self, routes: impl IntoIterator<Item = Route>) {
        self.routes.extend(routes);
    }

    /// First rule whose pattern matches `path`, in declaration order.
    pub fn first_match(&self, path: &str) -> Option<&Route> {
        self.routes.iter().find(|route| route.matches(path))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::route::{handler, ContentMode, Outcome};
    use hyper::StatusCode;

    fn route(pattern: &str) -> Route {
        Route::new(
            pattern,
            handler(|_req| async { Outcome::Rendered(String::new(), StatusCode::OK) }),
            ContentMode::Plain,
        )
        .unwrap()
    }

    #[test]
    fn first_match_wins_over_later_more_specific_rules() {
        let mut table = RouteTable::new();
        table.push(route("^/"));
        table.push(route("^/exact$"));

        // Declaration order decides, not specificity.
        let matched = table.first_match("/exact").unwrap();
        assert_eq!(matched.raw_pattern(), "^/");
    }

    #[test]
    fn no_match_yields_none() {
        let mut table = RouteTable::new();
        table.push(route("^/tea$"));
        assert!(table.first_match("/missing").is_none());
    }

    #[test]
    fn anchored_root_pattern_does_not_match_subpaths() {
        let mut table = RouteTable::new();
        table.push(route("^/$"));
        assert!(table.first_match("/").is_some());
        assert!(table.first_match("/sub").is_none());
    }
}
