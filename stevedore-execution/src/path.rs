//! Rooting of file path inputs

use std::path::Path;
use std::sync::Arc;
use stevedore_core::paths::{full_path, has_invalid_path_chars, is_rooted};
use stevedore_core::{ExecutionContext, ExtensionRegistry, HostType};
use stevedore_interfaces::JobExtension;
use tracing::{debug, info};

/// Translates possibly-relative input paths through the job extensions of
/// the job's host type.
///
/// Resolution never fails: values that cannot be rooted come back as given,
/// since many file path inputs are not paths at all.
#[derive(Clone, Default)]
pub struct PathResolutionChain {
    extensions: Vec<Arc<dyn JobExtension>>,
}

impl PathResolutionChain {
    pub fn new(extensions: Vec<Arc<dyn JobExtension>>) -> Self {
        Self { extensions }
    }

    /// Chain over the registered job extensions matching `host_type`
    pub fn for_host(registry: &ExtensionRegistry, host_type: HostType) -> Self {
        let extensions = registry
            .get_extensions::<dyn JobExtension>()
            .into_iter()
            .filter(|extension| extension.host_type() == host_type)
            .collect();
        Self::new(extensions)
    }

    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }

    pub fn resolve(&self, context: &ExecutionContext, raw: &str) -> String {
        let value = platform_normalize(raw);

        if !value.is_empty() && !has_invalid_path_chars(&value) && is_rooted(&value) {
            return match full_path(Path::new(&value)) {
                Some(full) => {
                    debug!("Input is a rooted path, returning absolute path {}", full.display());
                    full.to_string_lossy().into_owned()
                }
                None => value,
            };
        }

        if has_invalid_path_chars(&value) {
            return value;
        }

        for extension in &self.extensions {
            let Some(root) = extension.path_root(context) else {
                continue;
            };
            if root.as_os_str().is_empty() {
                continue;
            }
            // Stop on the first root that yields a full path
            if let Some(full) = full_path(&root.join(&value)) {
                info!(
                    "{} job extension resolved a rooted path: {}",
                    extension.host_type(),
                    full.display()
                );
                return full.to_string_lossy().into_owned();
            }
        }

        debug!("Could not root path through any job extension, returning input");
        value
    }
}

/// Windows inputs may arrive quoted or with forward slashes
fn platform_normalize(raw: &str) -> String {
    if cfg!(windows) && !raw.is_empty() {
        raw.trim_matches('"').replace('/', "\\")
    } else {
        raw.to_string()
    }
}

impl std::fmt::Debug for PathResolutionChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathResolutionChain")
            .field("extensions", &self.extensions.len())
            .finish()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::path::PathBuf;
    use stevedore_core::{MemorySink, Result, Variables};

    struct Rooted {
        host_type: HostType,
        root: Option<&'static str>,
    }

    #[async_trait]
    impl JobExtension for Rooted {
        fn host_type(&self) -> HostType {
            self.host_type
        }

        fn path_root(&self, _context: &ExecutionContext) -> Option<PathBuf> {
            self.root.map(PathBuf::from)
        }

        async fn initialize(&self, _context: &ExecutionContext) -> Result<()> {
            Ok(())
        }

        async fn pre_job(&self, _context: &ExecutionContext) -> Result<()> {
            Ok(())
        }
    }

    fn context() -> ExecutionContext {
        ExecutionContext::new(HostType::Release, Variables::new(), Arc::new(MemorySink::new()))
    }

    fn chain(roots: &[Option<&'static str>]) -> PathResolutionChain {
        PathResolutionChain::new(
            roots
                .iter()
                .map(|root| {
                    Arc::new(Rooted {
                        host_type: HostType::Release,
                        root: *root,
                    }) as Arc<dyn JobExtension>
                })
                .collect(),
        )
    }

    #[test]
    fn test_absolute_canonical_path_is_unchanged() {
        let chain = chain(&[Some("/work/r1/a")]);
        let context = context();
        assert_eq!(chain.resolve(&context, "/opt/tools/bin"), "/opt/tools/bin");
        let once = chain.resolve(&context, "/opt/./tools/../tools/bin");
        assert_eq!(once, "/opt/tools/bin");
        assert_eq!(chain.resolve(&context, &once), once);
    }

    #[test]
    fn test_first_extension_with_root_wins() {
        let chain = chain(&[None, Some("/work/r1/a"), Some("/elsewhere")]);
        assert_eq!(chain.resolve(&context(), "drop/app.zip"), "/work/r1/a/drop/app.zip");
    }

    #[test]
    fn test_empty_input_yields_default_root() {
        let chain = chain(&[Some("/work/r1/a/")]);
        assert_eq!(chain.resolve(&context(), ""), "/work/r1/a");
        assert_eq!(PathResolutionChain::default().resolve(&context(), ""), "");
    }

    #[test]
    fn test_unrooted_values_come_back_unchanged() {
        let context = context();
        assert_eq!(chain(&[None]).resolve(&context, "not/a/path"), "not/a/path");
        assert_eq!(chain(&[Some("")]).resolve(&context, "x"), "x");
        assert_eq!(
            chain(&[Some("/work")]).resolve(&context, "bad\0value"),
            "bad\0value"
        );
        // A relative root never produces a full path
        assert_eq!(chain(&[Some("relative")]).resolve(&context, "x"), "x");
    }

    #[test]
    fn test_for_host_filters_by_host_type() {
        let mut registry = ExtensionRegistry::new();
        registry
            .register::<dyn JobExtension>(Arc::new(Rooted {
                host_type: HostType::Build,
                root: Some("/build"),
            }))
            .register::<dyn JobExtension>(Arc::new(Rooted {
                host_type: HostType::Release,
                root: Some("/release"),
            }));

        let chain = PathResolutionChain::for_host(&registry, HostType::Release);
        assert_eq!(chain.len(), 1);
        assert_eq!(chain.resolve(&context(), "x"), "/release/x");
    }
}
