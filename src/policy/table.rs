use std::collections::HashMap;
use std::path::Path;

use axum::http::Method;
use serde::Deserialize;

use super::rule::{PolicyRule, RawRule, RouteMethod};
use super::PolicyError;

const BUILTIN_POLICIES: &str = include_str!("../../policies.yaml");

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PolicyFile {
    rules: Vec<RawRule>,
}

/// Immutable route policy table, loaded once at startup.
#[derive(Debug, Clone)]
pub struct PolicyTable {
    rules: Vec<PolicyRule>,
    index: HashMap<(String, RouteMethod), usize>,
}

impl PolicyTable {
    pub fn new(rules: Vec<PolicyRule>) -> Result<Self, PolicyError> {
        let mut index = HashMap::with_capacity(rules.len());
        let mut names = HashMap::with_capacity(rules.len());

        for (i, rule) in rules.iter().enumerate() {
            if names.insert(rule.name.clone(), i).is_some() {
                return Err(PolicyError::Duplicate(format!("name '{}'", rule.name)));
            }
            let key = (rule.route.clone(), rule.method.clone());
            if index.insert(key, i).is_some() {
                return Err(PolicyError::Duplicate(format!("{} {}", rule.method, rule.route)));
            }
        }

        Ok(Self { rules, index })
    }

    pub fn from_yaml(source: &str) -> Result<Self, PolicyError> {
        let file: PolicyFile = serde_yaml::from_str(source)?;
        let rules = file
            .rules
            .into_iter()
            .map(PolicyRule::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(rules)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, PolicyError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| PolicyError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&source)
    }

    /// Table compiled into the binary.
    pub fn builtin() -> Result<Self, PolicyError> {
        Self::from_yaml(BUILTIN_POLICIES)
    }

    /// `path` when configured, the built-in table otherwise.
    pub fn load(path: Option<&str>) -> Result<Self, PolicyError> {
        match path {
            Some(path) => {
                tracing::info!("Loading policy table from {}", path);
                Self::from_file(path)
            }
            None => Self::builtin(),
        }
    }

    /// Rule for a matched route pattern; an exact method rule wins over `ANY`.
    /// `HEAD` falls back to the `GET` rule, as the router serves it with the
    /// `GET` handler.
    pub fn lookup(&self, method: &Method, route: &str) -> Option<&PolicyRule> {
        let exact = |method: &Method| {
            self.index
                .get(&(route.to_string(), RouteMethod::Exact(method.clone())))
        };
        let any = (route.to_string(), RouteMethod::Any);
        exact(method)
            .or_else(|| match *method {
                Method::HEAD => exact(&Method::GET),
                _ => None,
            })
            .or_else(|| self.index.get(&any))
            .map(|&i| &self.rules[i])
    }

    /// Whether any rule, for any method, covers the route pattern.
    pub fn has_route(&self, route: &str) -> bool {
        self.rules.iter().any(|rule| rule.route == route)
    }

    pub fn get(&self, name: &str) -> Option<&PolicyRule> {
        self.rules.iter().find(|rule| rule.name == name)
    }

    pub fn rules(&self) -> &[PolicyRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
