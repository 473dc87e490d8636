//! Job variable store and `$(name)` macro expansion

use std::collections::HashMap;
use uuid::Uuid;

use crate::inputs::InputMap;

/// Well-known variable names
pub mod names {
    pub const TASK_DISPLAY_NAME: &str = "task.displayname";
    pub const SYSTEM_HOST_TYPE: &str = "system.hostType";
    pub const SYSTEM_COLLECTION_ID: &str = "system.collectionId";
    pub const SYSTEM_TEAM_PROJECT_ID: &str = "system.teamProjectId";
    pub const SYSTEM_DEFAULT_WORKING_DIRECTORY: &str = "system.defaultWorkingDirectory";
    pub const AGENT_RELEASE_DIRECTORY: &str = "agent.releaseDirectory";
    pub const RELEASE_ID: &str = "release.releaseId";
    pub const RELEASE_ARTIFACTS_DIRECTORY: &str = "release.artifactsDirectory";
    pub const RELEASE_SKIP_ARTIFACTS_DOWNLOAD: &str = "release.skipArtifactsDownload";
    pub const RELEASE_DEFINITION_NAME: &str = "release.definitionName";
    pub const RELEASE_DEFINITION_ID: &str = "release.definitionId";
}

#[derive(Debug, Clone)]
struct Variable {
    name: String,
    value: String,
    secret: bool,
}

/// Case-insensitive variable store for a single job
#[derive(Debug, Clone, Default)]
pub struct Variables {
    values: HashMap<String, Variable>,
}

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .get(&name.to_ascii_lowercase())
            .map(|variable| variable.value.as_str())
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.insert(name.into(), value.into(), false);
    }

    /// Set a value that must never be printed
    pub fn set_secret(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.insert(name.into(), value.into(), true);
    }

    fn insert(&mut self, name: String, value: String, secret: bool) {
        self.values
            .insert(name.to_ascii_lowercase(), Variable { name, value, secret });
    }

    pub fn get_int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(|value| value.trim().parse().ok())
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(|value| {
            let value = value.trim();
            if value.eq_ignore_ascii_case("true") {
                Some(true)
            } else if value.eq_ignore_ascii_case("false") {
                Some(false)
            } else {
                None
            }
        })
    }

    pub fn get_uuid(&self, name: &str) -> Option<Uuid> {
        self.get(name)
            .and_then(|value| Uuid::parse_str(value.trim()).ok())
    }

    /// Expand `$(name)` references in a single value
    pub fn expand(&self, value: &str) -> String {
        expand_macros(value, |name| self.get(name).map(str::to_string))
    }

    /// Expand `$(name)` references in every value of `target`
    pub fn expand_values(&self, target: InputMap) -> InputMap {
        target.map_values(|_, value| self.expand(value))
    }

    /// Non-secret variables sorted by name
    pub fn public(&self) -> Vec<(String, String)> {
        let mut public: Vec<(String, String)> = self
            .values
            .values()
            .filter(|variable| !variable.secret)
            .map(|variable| (variable.name.clone(), variable.value.clone()))
            .collect();
        public.sort_by(|a, b| a.0.to_ascii_lowercase().cmp(&b.0.to_ascii_lowercase()));
        public
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for Variables
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut variables = Variables::new();
        for (name, value) in iter {
            variables.set(name, value);
        }
        variables
    }
}

/// Replace every `$(name)` in `value` for which `lookup` yields a value.
///
/// Unknown references stay verbatim. Substituted text is not re-scanned.
pub fn expand_macros<F>(value: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut result = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("$(") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find(')') {
            Some(end) => {
                let name = &after[..end];
                match lookup(name) {
                    Some(replacement) if !name.is_empty() => result.push_str(&replacement),
                    _ => {
                        result.push_str("$(");
                        result.push_str(name);
                        result.push(')');
                    }
                }
                rest = &after[end + 1..];
            }
            None => {
                result.push_str(&rest[start..]);
                rest = "";
            }
        }
    }

    result.push_str(rest);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Variables {
        [
            ("Build.SourcesDirectory", "/src"),
            ("release.releaseId", "42"),
            ("release.skipArtifactsDownload", "True"),
            ("system.teamProjectId", "6c6f8a2e-4d0b-4b5e-9c43-3a2f0c5d7e11"),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_typed_getters() {
        let variables = sample();
        assert_eq!(variables.get("build.sourcesdirectory"), Some("/src"));
        assert_eq!(variables.get_int("RELEASE.RELEASEID"), Some(42));
        assert_eq!(variables.get_bool("release.skipArtifactsDownload"), Some(true));
        assert!(variables.get_uuid("system.teamProjectId").is_some());
        assert_eq!(variables.get_int("missing"), None);
        assert_eq!(variables.get_bool("release.releaseId"), None);
    }

    #[test]
    fn test_expand_known_and_unknown() {
        let variables = sample();
        assert_eq!(
            variables.expand("$(Build.SourcesDirectory)/out/$(nope)"),
            "/src/out/$(nope)"
        );
        assert_eq!(variables.expand("no macros"), "no macros");
        assert_eq!(variables.expand("dangling $(Build"), "dangling $(Build");
        assert_eq!(variables.expand("$()"), "$()");
    }

    #[test]
    fn test_expansion_is_single_pass() {
        let variables: Variables = [("a", "$(b)"), ("b", "value")].into_iter().collect();
        assert_eq!(variables.expand("$(a)"), "$(b)");
    }

    #[test]
    fn test_public_excludes_secrets() {
        let mut variables = sample();
        variables.set_secret("system.accessToken", "hunter2");

        let public = variables.public();
        assert!(public.iter().all(|(name, _)| name != "system.accessToken"));
        assert_eq!(public.len(), 4);
        // Still readable for expansion
        assert_eq!(variables.get("system.accesstoken"), Some("hunter2"));
    }
}
