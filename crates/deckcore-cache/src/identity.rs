use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::CacheError;

/// Stable handle for an interned resource name. Ids are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(u32);

impl ResourceId {
    pub fn index(self) -> usize {
        self.0 as usize
    }

    fn from_index(index: usize) -> Result<Self, CacheError> {
        u32::try_from(index)
            .map(ResourceId)
            .map_err(|_| CacheError::IdsExhausted)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Append-only name table. Not synchronized on its own; the resolver service
/// keeps it behind the same lock as its cache slots.
#[derive(Debug, Default)]
pub struct IdentityMap {
    by_name: HashMap<Arc<str>, ResourceId>,
    names: Vec<Arc<str>>,
}

impl IdentityMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the id for `name`, allocating the next sequential one on first sight.
    /// The boolean is `true` when the id was freshly allocated.
    pub fn intern(&mut self, name: &str) -> Result<(ResourceId, bool), CacheError> {
        if let Some(id) = self.by_name.get(name) {
            return Ok((*id, false));
        }

        let id = ResourceId::from_index(self.names.len())?;
        let name: Arc<str> = Arc::from(name);
        self.names.push(Arc::clone(&name));
        self.by_name.insert(name, id);
        Ok((id, true))
    }

    pub fn get(&self, name: &str) -> Option<ResourceId> {
        self.by_name.get(name).copied()
    }

    pub fn name(&self, id: ResourceId) -> Option<&Arc<str>> {
        self.names.get(id.index())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_is_idempotent_and_sequential() {
        let mut map = IdentityMap::new();
        let (folder, fresh) = map.intern("folder").unwrap();
        assert!(fresh);
        let (refresh, _) = map.intern("view-refresh").unwrap();
        assert_eq!(map.intern("folder").unwrap(), (folder, false));

        assert_eq!(folder.index(), 0);
        assert_eq!(refresh.index(), 1);
        assert_eq!(map.name(refresh).map(|n| n.as_ref()), Some("view-refresh"));
        assert_eq!(map.get("missing"), None);
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn id_space_overflow_is_an_error() {
        let last = ResourceId::from_index(u32::MAX as usize).unwrap();
        assert_eq!(last.index(), u32::MAX as usize);
        assert!(matches!(
            ResourceId::from_index(u32::MAX as usize + 1),
            Err(CacheError::IdsExhausted)
        ));
    }
}
