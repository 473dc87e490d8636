//! Release artifact filtering

use serde_json::{Map, Value};
use stevedore_core::AgentArtifactDefinition;
use tracing::debug;

const INNER_TYPE_KEY: &str = "ArtifactType";
const BUILD_SUB_TYPE: &str = "Build";

/// Drop custom artifacts that identify themselves as a non-Build sub-type.
///
/// Every other artifact is kept in the order received.
pub fn filter_artifacts(artifacts: Vec<AgentArtifactDefinition>) -> Vec<AgentArtifactDefinition> {
    artifacts
        .into_iter()
        .filter(|artifact| {
            let keep = is_wanted(artifact);
            if !keep {
                debug!("Skipping custom artifact {} of foreign sub-type", artifact.alias);
            }
            keep
        })
        .collect()
}

fn is_wanted(artifact: &AgentArtifactDefinition) -> bool {
    if !artifact.is_custom() {
        return true;
    }

    // Details that are not a flat string map are kept
    let Ok(details) = serde_json::from_str::<Map<String, Value>>(&artifact.details) else {
        return true;
    };
    if details.values().any(|value| value.is_object() || value.is_array()) {
        return true;
    }

    match details.get(INNER_TYPE_KEY) {
        None | Some(Value::Null) => true,
        Some(Value::String(sub_type)) => sub_type.eq_ignore_ascii_case(BUILD_SUB_TYPE),
        Some(other) => other.to_string().eq_ignore_ascii_case(BUILD_SUB_TYPE),
    }
}
