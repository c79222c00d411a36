//! Per-service name allocation.
//!
//! Every generated type and function name of a service goes through one
//! [`NameRegistry`]. Artifacts that are structurally identical are keyed so
//! that they are generated once and shared; everything else gets a unique
//! name, disambiguated first by the owning method or field path and then
//! by a numeric suffix.

use std::collections::{HashMap, HashSet};

use tracing::trace;

/// Which side of the boundary a body type lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    /// Decoded from requests.
    Request,
    /// Encoded into responses and error responses.
    Response,
}

impl Role {
    /// Suffix appended to body type names.
    pub fn suffix(self) -> &'static str {
        match self {
            Role::Request => "RequestBody",
            Role::Response => "ResponseBody",
        }
    }
}

/// Direction of a conversion helper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Wire body to domain value.
    Unmarshal,
    /// Domain value to wire body.
    Marshal,
}

/// Identity of a shareable artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArtifactKey {
    /// Body type generated for a user type.
    Shape {
        type_name: String,
        role: Role,
        /// Set when the type is projected through a view whose fields
        /// differ from the full type.
        view: Option<String>,
    },
    /// Conversion helper between a body type and a domain type.
    Helper {
        direction: Direction,
        body: String,
        domain: String,
    },
    /// Validator of a body type.
    Validator { body: String },
}

/// Allocates unique names within one generation unit.
#[derive(Debug, Default)]
pub struct NameRegistry {
    taken: HashSet<String>,
    keyed: HashMap<ArtifactKey, String>,
}

impl NameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves a fresh name.
    ///
    /// Tries `candidate`, then `candidate` followed by `disambiguator`, then
    /// appends 2, 3, ... until a free name is found.
    pub fn reserve(&mut self, candidate: &str, disambiguator: &str) -> String {
        let name = self.free_name(candidate, disambiguator);
        self.taken.insert(name.clone());
        name
    }

    /// Returns the name already allocated for `key`, or reserves one.
    ///
    /// The flag is `true` when the key was known: the artifact exists (or is
    /// being built further up the stack) and must not be generated again.
    pub fn lookup_or_reserve(
        &mut self,
        key: ArtifactKey,
        candidate: &str,
        disambiguator: &str,
    ) -> (String, bool) {
        if let Some(name) = self.keyed.get(&key) {
            trace!(?key, name = %name, "reusing shared artifact");
            return (name.clone(), true);
        }
        let name = self.reserve(candidate, disambiguator);
        self.keyed.insert(key, name.clone());
        (name, false)
    }

    pub fn lookup(&self, key: &ArtifactKey) -> Option<&str> {
        self.keyed.get(key).map(String::as_str)
    }

    pub fn is_taken(&self, name: &str) -> bool {
        self.taken.contains(name)
    }

    fn free_name(&self, candidate: &str, disambiguator: &str) -> String {
        if !self.taken.contains(candidate) {
            return candidate.to_string();
        }
        let base = if disambiguator.is_empty() || candidate.ends_with(disambiguator) {
            candidate.to_string()
        } else {
            let joined = join(candidate, disambiguator);
            if !self.taken.contains(&joined) {
                return joined;
            }
            joined
        };
        let mut n = 2;
        loop {
            let numbered = format!("{base}{n}");
            if !self.taken.contains(&numbered) {
                return numbered;
            }
            n += 1;
        }
    }
}

/// Joins a name and its disambiguator, keeping snake_case names snake_case.
fn join(candidate: &str, disambiguator: &str) -> String {
    if candidate.starts_with(|c: char| c.is_lowercase()) {
        format!("{candidate}_{}", super::rust_types::to_snake_case(disambiguator))
    } else {
        format!("{candidate}{}", super::rust_types::to_pascal_case(disambiguator))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape(type_name: &str, role: Role) -> ArtifactKey {
        ArtifactKey::Shape {
            type_name: type_name.to_string(),
            role,
            view: None,
        }
    }

    #[test]
    fn test_reserve_uses_candidate_when_free() {
        let mut registry = NameRegistry::new();
        assert_eq!(registry.reserve("FooRequestBody", "MethodA"), "FooRequestBody");
        assert!(registry.is_taken("FooRequestBody"));
    }

    #[test]
    fn test_reserve_disambiguates_then_counts() {
        let mut registry = NameRegistry::new();
        assert_eq!(registry.reserve("FooRequestBody", "MethodA"), "FooRequestBody");
        assert_eq!(registry.reserve("FooRequestBody", "MethodA"), "FooRequestBodyMethodA");
        assert_eq!(registry.reserve("FooRequestBody", "MethodA"), "FooRequestBodyMethodA2");
        assert_eq!(registry.reserve("FooRequestBody", "MethodA"), "FooRequestBodyMethodA3");
        assert_eq!(registry.reserve("FooRequestBody", ""), "FooRequestBody2");
    }

    #[test]
    fn test_reserve_snake_case_functions() {
        let mut registry = NameRegistry::new();
        assert_eq!(registry.reserve("validate_foo", "MethodA"), "validate_foo");
        assert_eq!(registry.reserve("validate_foo", "MethodA"), "validate_foo_method_a");
    }

    #[test]
    fn test_lookup_or_reserve_shares_structural_keys() {
        let mut registry = NameRegistry::new();
        let (first, existed) =
            registry.lookup_or_reserve(shape("Foo", Role::Request), "FooRequestBody", "A");
        assert_eq!((first.as_str(), existed), ("FooRequestBody", false));

        let (again, existed) =
            registry.lookup_or_reserve(shape("Foo", Role::Request), "FooRequestBody", "B");
        assert_eq!((again.as_str(), existed), ("FooRequestBody", true));

        let (response, existed) =
            registry.lookup_or_reserve(shape("Foo", Role::Response), "FooResponseBody", "A");
        assert_eq!((response.as_str(), existed), ("FooResponseBody", false));
        assert_eq!(
            registry.lookup(&shape("Foo", Role::Response)),
            Some("FooResponseBody")
        );
    }

    #[test]
    fn test_distinct_keys_with_same_candidate_get_distinct_names() {
        let mut registry = NameRegistry::new();
        registry.reserve("CreateRequestBody", "");
        let (name, existed) =
            registry.lookup_or_reserve(shape("Create", Role::Request), "CreateRequestBody", "UpdateItem");
        assert!(!existed);
        assert_eq!(name, "CreateRequestBodyUpdateItem");
    }
}
