//! Per-connection memo of resolved table mappings.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use super::provider::{ColumnInfoProvider, CreateFlags};
use super::{Storable, TableMapping};
use crate::error::Result;
use crate::types::TypeMapper;

/// Caches one [`TableMapping`] per storable type.
///
/// Mappings are resolved on first use and shared read-only afterwards.
#[derive(Debug, Default)]
pub struct MappingCache {
    mappings: RwLock<HashMap<TypeId, Arc<TableMapping>>>,
}

impl MappingCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached mapping of `T`, resolving it on a miss.
    ///
    /// `flags` only matter for the resolution that populates the cache.
    pub fn get_or_resolve<T: Storable>(
        &self,
        flags: CreateFlags,
        mapper: &TypeMapper,
        provider: &dyn ColumnInfoProvider,
    ) -> Result<Arc<TableMapping>> {
        let key = TypeId::of::<T>();
        if let Some(mapping) = self
            .mappings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Ok(Arc::clone(mapping));
        }

        let resolved = Arc::new(TableMapping::resolve(
            &T::descriptor(),
            flags,
            mapper,
            provider,
        )?);
        let mut mappings = self
            .mappings
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(Arc::clone(mappings.entry(key).or_insert(resolved)))
    }

    /// Returns the cached mapping of `T` without resolving it.
    #[must_use]
    pub fn get<T: Storable>(&self) -> Option<Arc<TableMapping>> {
        self.mappings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&TypeId::of::<T>())
            .cloned()
    }

    /// Number of cached mappings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.mappings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns whether nothing has been resolved yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
