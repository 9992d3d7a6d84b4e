//! Unit loading
//!
//! A [`UnitResolver`] answers "which bytes define this qualified name".
//! Resolvers compose through [`ResolverChain`], which tries each in order and
//! then defers to an optional parent. [`UnitLoader`] sits on top and defines
//! each unit at most once.

pub mod fat;
pub mod sibling;

use crate::error::{LoadError, LoadResult};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, trace};

/// A unit's bytes plus where they came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedUnit {
    pub name: String,
    pub bytes: Arc<[u8]>,
    /// Location the unit was loaded from, as an address or URL
    pub code_source: String,
}

pub trait UnitResolver: Send + Sync {
    /// Bytes for `qualified_name`, or `None` when this resolver has no match
    fn resolve_unit(&self, qualified_name: &str) -> LoadResult<Option<LoadedUnit>>;

    /// Search roots this resolver consults, in lookup order
    fn search_roots(&self) -> Vec<String>;
}

/// Tries resolvers in order, then the parent
#[derive(Default)]
pub struct ResolverChain {
    resolvers: Vec<Box<dyn UnitResolver>>,
    parent: Option<Arc<dyn UnitResolver>>,
}

impl ResolverChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parent(parent: Arc<dyn UnitResolver>) -> Self {
        Self {
            resolvers: Vec::new(),
            parent: Some(parent),
        }
    }

    pub fn push(&mut self, resolver: impl UnitResolver + 'static) {
        self.resolvers.push(Box::new(resolver));
    }

    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }
}

impl UnitResolver for ResolverChain {
    fn resolve_unit(&self, qualified_name: &str) -> LoadResult<Option<LoadedUnit>> {
        for resolver in &self.resolvers {
            if let Some(unit) = resolver.resolve_unit(qualified_name)? {
                return Ok(Some(unit));
            }
        }
        match &self.parent {
            Some(parent) => parent.resolve_unit(qualified_name),
            None => Ok(None),
        }
    }

    fn search_roots(&self) -> Vec<String> {
        let mut roots: Vec<String> = self
            .resolvers
            .iter()
            .flat_map(|resolver| resolver.search_roots())
            .collect();
        if let Some(parent) = &self.parent {
            roots.extend(parent.search_roots());
        }
        roots
    }
}

/// Defines units through a resolver, caching every definition
pub struct UnitLoader {
    resolver: Box<dyn UnitResolver>,
    defined: RwLock<HashMap<String, Arc<LoadedUnit>>>,
}

impl UnitLoader {
    pub fn new(resolver: impl UnitResolver + 'static) -> Self {
        Self {
            resolver: Box::new(resolver),
            defined: RwLock::new(HashMap::new()),
        }
    }

    /// Load a unit, defining it on first request
    pub fn load(&self, qualified_name: &str) -> LoadResult<Arc<LoadedUnit>> {
        if let Some(unit) = self.defined_unit(qualified_name) {
            trace!(unit = qualified_name, "definition cache hit");
            return Ok(unit);
        }

        let unit = self
            .resolver
            .resolve_unit(qualified_name)?
            .ok_or_else(|| LoadError::unit_not_found(qualified_name))?;

        let mut defined = self.defined.write().unwrap_or_else(PoisonError::into_inner);
        // another thread may have defined it while we were reading
        let unit = defined
            .entry(qualified_name.to_string())
            .or_insert_with(|| {
                debug!(unit = qualified_name, source = %unit.code_source, "defined unit");
                Arc::new(unit)
            })
            .clone();
        Ok(unit)
    }

    pub fn defined_unit(&self, qualified_name: &str) -> Option<Arc<LoadedUnit>> {
        self.defined
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(qualified_name)
            .cloned()
    }

    /// Number of units defined so far
    pub fn defined_count(&self) -> usize {
        self.defined
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn search_roots(&self) -> Vec<String> {
        self.resolver.search_roots()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixed {
        name: &'static str,
        root: &'static str,
        calls: Arc<AtomicUsize>,
    }

    impl UnitResolver for Fixed {
        fn resolve_unit(&self, qualified_name: &str) -> LoadResult<Option<LoadedUnit>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok((qualified_name == self.name).then(|| LoadedUnit {
                name: qualified_name.to_string(),
                bytes: Arc::from(self.root.as_bytes()),
                code_source: self.root.to_string(),
            }))
        }

        fn search_roots(&self) -> Vec<String> {
            vec![self.root.to_string()]
        }
    }

    fn fixed(name: &'static str, root: &'static str) -> (Fixed, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Fixed {
                name,
                root,
                calls: calls.clone(),
            },
            calls,
        )
    }

    #[test]
    fn test_chain_tries_resolvers_in_order_then_parent() {
        let (parent, _) = fixed("p.P", "parent");
        let mut chain = ResolverChain::with_parent(Arc::new(parent));
        let (first, _) = fixed("a.A", "first");
        let (second, _) = fixed("a.A", "second");
        chain.push(first);
        chain.push(second);

        let unit = chain.resolve_unit("a.A").unwrap().unwrap();
        assert_eq!(unit.code_source, "first");
        let unit = chain.resolve_unit("p.P").unwrap().unwrap();
        assert_eq!(unit.code_source, "parent");
        assert!(chain.resolve_unit("x.X").unwrap().is_none());
        assert_eq!(chain.search_roots(), vec!["first", "second", "parent"]);
    }

    #[test]
    fn test_loader_defines_once() {
        let (resolver, calls) = fixed("a.A", "root");
        let loader = UnitLoader::new(resolver);

        let first = loader.load("a.A").unwrap();
        let second = loader.load("a.A").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(loader.defined_count(), 1);
    }

    #[test]
    fn test_loader_miss_is_unit_not_found() {
        let (resolver, _) = fixed("a.A", "root");
        let loader = UnitLoader::new(resolver);
        let err = loader.load("b.B").unwrap_err();
        assert!(matches!(err, LoadError::UnitNotFound(name) if name == "b.B"));
        assert_eq!(loader.defined_count(), 0);
    }
}
