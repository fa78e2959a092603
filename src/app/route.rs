use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// A page address. The paths match the web client's, so links can be shared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Route {
    /// `/`
    #[default]
    Home,
    /// `/ad/{id}`
    Listing(u64),
    /// `/404` and every path that matches nothing else.
    NotFound,
}

impl Route {
    /// Resolves a path. Query strings, fragments and trailing slashes are ignored.
    #[must_use]
    pub fn parse(path: &str) -> Self {
        let path = path.trim();
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let path = path.trim_end_matches('/');

        if path.is_empty() {
            return Self::Home;
        }
        path.strip_prefix("/ad/")
            .and_then(|id| id.parse().ok())
            .map_or(Self::NotFound, Self::Listing)
    }

    #[must_use]
    pub fn path(&self) -> String {
        match self {
            Self::Home => "/".to_string(),
            Self::Listing(id) => format!("/ad/{id}"),
            Self::NotFound => "/404".to_string(),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

impl FromStr for Route {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}
