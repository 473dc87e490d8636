//! Handler variant selection

use stevedore_core::{ExecutionData, HandlerData, HandlerKind};
use tracing::debug;

const LEGACY_SHELL_PLATFORM: &str = "windows";

/// Clear the platform pin of the legacy PowerShell variant when the stage
/// also offers PowerShell3.
///
/// Older task packages shipped a Windows-pinned legacy handler next to an
/// unpinned modern one. With the pin cleared both compete on priority alone,
/// which PowerShell3 always wins.
pub fn apply_legacy_shell_rule(mut execution: ExecutionData) -> ExecutionData {
    let has_modern = execution
        .handlers
        .iter()
        .any(|handler| handler.kind == HandlerKind::PowerShell3);
    let legacy_pinned = execution.handlers.iter().any(|handler| {
        handler.kind == HandlerKind::PowerShell && handler.is_pinned_to(LEGACY_SHELL_PLATFORM)
    });

    if has_modern && legacy_pinned {
        if let Some(legacy) = execution
            .handlers
            .iter_mut()
            .find(|handler| handler.kind == HandlerKind::PowerShell)
        {
            debug!("Ignoring platform pinning for legacy PowerShell handler");
            legacy.platforms = None;
        }
    }

    execution
}

/// Pick the variant to run on `platform`.
///
/// Variants preferred on the platform come first, then lower priority wins.
/// The sort is stable so declaration order breaks remaining ties.
pub fn select_handler(execution: &ExecutionData, platform: &str) -> Option<HandlerData> {
    let mut candidates: Vec<&HandlerData> = execution.handlers.iter().collect();
    candidates.sort_by_key(|handler| (!handler.preferred_on_platform(platform), handler.priority()));
    candidates.first().map(|handler| (*handler).clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(handler: Option<HandlerData>) -> Option<HandlerKind> {
        handler.map(|h| h.kind)
    }

    #[test]
    fn test_platform_affine_variant_wins_regardless_of_order() {
        let affine = HandlerData::new(HandlerKind::PowerShell).with_platforms(["linux"]);
        let foreign = HandlerData::new(HandlerKind::Node).with_platforms(["windows"]);

        let forward = ExecutionData::new(vec![affine.clone(), foreign.clone()]);
        let reverse = ExecutionData::new(vec![foreign, affine]);

        assert_eq!(kinds(select_handler(&forward, "linux")), Some(HandlerKind::PowerShell));
        assert_eq!(kinds(select_handler(&reverse, "linux")), Some(HandlerKind::PowerShell));
    }

    #[test]
    fn test_priority_breaks_ties_within_group() {
        let execution = ExecutionData::new(vec![
            HandlerData::new(HandlerKind::Process),
            HandlerData::new(HandlerKind::Node),
            HandlerData::new(HandlerKind::PowerShell3),
        ]);
        assert_eq!(kinds(select_handler(&execution, "linux")), Some(HandlerKind::Node));
    }

    #[test]
    fn test_stable_for_equal_keys() {
        let first = HandlerData::new(HandlerKind::Node).with_input("target", "a.js");
        let second = HandlerData::new(HandlerKind::Node).with_input("target", "b.js");
        let execution = ExecutionData::new(vec![first, second]);

        let selected = select_handler(&execution, "linux").unwrap();
        assert_eq!(selected.target(), Some("a.js"));
    }

    #[test]
    fn test_empty_set_selects_nothing() {
        assert!(select_handler(&ExecutionData::default(), "linux").is_none());
    }

    #[test]
    fn test_modern_shell_always_beats_pinned_legacy_shell() {
        for platform in ["windows", "linux", "macos"] {
            for legacy_first in [true, false] {
                let legacy = HandlerData::new(HandlerKind::PowerShell).with_platforms(["windows"]);
                let modern = HandlerData::new(HandlerKind::PowerShell3);
                let handlers = if legacy_first {
                    vec![legacy, modern]
                } else {
                    vec![modern, legacy]
                };

                let execution = apply_legacy_shell_rule(ExecutionData::new(handlers));
                assert_eq!(
                    kinds(select_handler(&execution, platform)),
                    Some(HandlerKind::PowerShell3),
                    "platform {platform}, legacy first {legacy_first}"
                );
            }
        }
    }

    #[test]
    fn test_legacy_rule_clears_pin_only_when_modern_present() {
        let pinned = HandlerData::new(HandlerKind::PowerShell).with_platforms(["Windows"]);

        let alone = apply_legacy_shell_rule(ExecutionData::new(vec![pinned.clone()]));
        assert!(alone.handlers[0].platforms.is_some());

        let with_modern = apply_legacy_shell_rule(ExecutionData::new(vec![
            pinned,
            HandlerData::new(HandlerKind::PowerShell3),
        ]));
        assert!(with_modern.handlers[0].platforms.is_none());
    }
}
