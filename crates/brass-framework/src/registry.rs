//! Module registry contract and catalog cache.
//!
//! The host application owns module loading and publishes the result
//! through [`ModuleRegistry`]. The dispatcher reads it through a
//! [`ModuleCatalog`], which caches each listing and asks the registry
//! again while a listing is still empty.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::module::{Module, RegexModule};

/// Source of registered modules.
pub trait ModuleRegistry: Send + Sync {
    /// Every module keyed by keyword.
    fn list_modules(&self) -> HashMap<String, Arc<Module>>;

    /// Alias to canonical keyword.
    fn list_aliases(&self) -> HashMap<String, String>;

    /// The regex modules, in registration order.
    fn list_regex_modules(&self) -> Vec<Arc<RegexModule>>;
}

/// A process-local registry filled by [`register`](Self::register).
#[derive(Debug, Default)]
pub struct StaticRegistry {
    modules: RwLock<Vec<Arc<Module>>>,
    extra_aliases: RwLock<HashMap<String, String>>,
}

impl StaticRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a module, replacing any module with the same keyword.
    pub fn register(&self, module: impl Into<Module>) {
        let module = Arc::new(module.into());
        let mut modules = self.modules.write();
        match modules.iter_mut().find(|m| m.keyword() == module.keyword()) {
            Some(slot) => *slot = module,
            None => modules.push(module),
        }
    }

    /// Adds an alias that is not declared on any module, e.g.
    /// `"wp" -> "wiki page"`.
    pub fn alias(&self, alias: impl Into<String>, target: impl Into<String>) {
        self.extra_aliases
            .write()
            .insert(alias.into().to_lowercase(), target.into());
    }

    pub fn with(self, module: impl Into<Module>) -> Self {
        self.register(module);
        self
    }
}

impl ModuleRegistry for StaticRegistry {
    fn list_modules(&self) -> HashMap<String, Arc<Module>> {
        self.modules
            .read()
            .iter()
            .map(|m| (m.keyword().to_string(), Arc::clone(m)))
            .collect()
    }

    fn list_aliases(&self) -> HashMap<String, String> {
        let mut aliases: HashMap<String, String> = self
            .modules
            .read()
            .iter()
            .filter_map(|m| m.as_command())
            .flat_map(|c| {
                c.aliases()
                    .iter()
                    .map(|a| (a.clone(), c.keyword().to_string()))
            })
            .collect();
        aliases.extend(
            self.extra_aliases
                .read()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        aliases
    }

    fn list_regex_modules(&self) -> Vec<Arc<RegexModule>> {
        self.modules
            .read()
            .iter()
            .filter_map(|m| match m.as_ref() {
                Module::Regex(r) => Some(Arc::new(r.clone())),
                _ => None,
            })
            .collect()
    }
}

#[derive(Default)]
struct Snapshot {
    modules: Arc<HashMap<String, Arc<Module>>>,
    aliases: Arc<HashMap<String, String>>,
    regex: Arc<Vec<Arc<RegexModule>>>,
}

/// Cached view of a [`ModuleRegistry`].
pub struct ModuleCatalog {
    registry: Arc<dyn ModuleRegistry>,
    snapshot: RwLock<Snapshot>,
}

impl ModuleCatalog {
    pub fn new(registry: Arc<dyn ModuleRegistry>) -> Self {
        Self {
            registry,
            snapshot: RwLock::new(Snapshot::default()),
        }
    }

    pub fn modules(&self) -> Arc<HashMap<String, Arc<Module>>> {
        if let Some(cached) = non_empty(&self.snapshot.read().modules) {
            return cached;
        }
        let fresh = Arc::new(self.registry.list_modules());
        debug!(count = fresh.len(), "Loaded module listing");
        self.snapshot.write().modules = Arc::clone(&fresh);
        fresh
    }

    pub fn aliases(&self) -> Arc<HashMap<String, String>> {
        if let Some(cached) = non_empty(&self.snapshot.read().aliases) {
            return cached;
        }
        let fresh = Arc::new(self.registry.list_aliases());
        self.snapshot.write().aliases = Arc::clone(&fresh);
        fresh
    }

    pub fn regex_modules(&self) -> Arc<Vec<Arc<RegexModule>>> {
        let cached = Arc::clone(&self.snapshot.read().regex);
        if !cached.is_empty() {
            return cached;
        }
        let fresh = Arc::new(self.registry.list_regex_modules());
        self.snapshot.write().regex = Arc::clone(&fresh);
        fresh
    }

    /// Drops every cached listing.
    pub fn reload(&self) {
        *self.snapshot.write() = Snapshot::default();
    }
}

fn non_empty<K, V>(map: &Arc<HashMap<K, V>>) -> Option<Arc<HashMap<K, V>>> {
    (!map.is_empty()).then(|| Arc::clone(map))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::MessageContext;
    use crate::module::{CommandModule, MatchMode, StubModule};
    use brass_core::BoxError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn noop(_ctx: Arc<MessageContext>) -> Result<(), BoxError> {
        Ok(())
    }

    #[test]
    fn test_static_registry_derives_listings() {
        let registry = StaticRegistry::new()
            .with(CommandModule::new("wiki").alias("w").handle(noop))
            .with(StubModule::new("about").desc("A bot"))
            .with(
                RegexModule::new("bv")
                    .pattern(r"BV\w+", MatchMode::FindAll, noop)
                    .unwrap(),
            );
        registry.alias("wp", "wiki page");

        assert_eq!(registry.list_modules().len(), 3);
        let aliases = registry.list_aliases();
        assert_eq!(aliases["w"], "wiki");
        assert_eq!(aliases["wp"], "wiki page");
        let regex = registry.list_regex_modules();
        assert_eq!(regex.len(), 1);
        assert_eq!(regex[0].keyword(), "bv");
    }

    #[test]
    fn test_register_replaces_same_keyword() {
        let registry = StaticRegistry::new();
        registry.register(StubModule::new("about").desc("old"));
        registry.register(StubModule::new("about").desc("new"));

        let modules = registry.list_modules();
        assert_eq!(modules.len(), 1);
        assert_eq!(modules["about"].desc(), Some("new"));
    }

    struct CountingRegistry {
        inner: StaticRegistry,
        calls: AtomicUsize,
    }

    impl ModuleRegistry for CountingRegistry {
        fn list_modules(&self) -> HashMap<String, Arc<Module>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.list_modules()
        }

        fn list_aliases(&self) -> HashMap<String, String> {
            self.inner.list_aliases()
        }

        fn list_regex_modules(&self) -> Vec<Arc<RegexModule>> {
            self.inner.list_regex_modules()
        }
    }

    #[test]
    fn test_catalog_requeries_while_empty() {
        let registry = Arc::new(CountingRegistry {
            inner: StaticRegistry::new(),
            calls: AtomicUsize::new(0),
        });
        let catalog = ModuleCatalog::new(registry.clone());

        assert!(catalog.modules().is_empty());
        assert!(catalog.modules().is_empty());
        assert_eq!(registry.calls.load(Ordering::SeqCst), 2);

        registry.inner.register(StubModule::new("about"));
        assert_eq!(catalog.modules().len(), 1);
        assert_eq!(catalog.modules().len(), 1);
        assert_eq!(registry.calls.load(Ordering::SeqCst), 3);

        registry.inner.register(StubModule::new("help"));
        assert_eq!(catalog.modules().len(), 1);
        catalog.reload();
        assert_eq!(catalog.modules().len(), 2);
    }
}
