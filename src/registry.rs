//! Filter type registration.
//!
//! A host looks filter types up by a stable id and instantiates them per
//! filter instance. Each registry is an ordinary value; nothing is shared
//! between registries or between the filters they create.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::RegistryError;
use crate::filter::BranchFilter;
use crate::host::Host;
use crate::settings::{OutputSettings, SettingsStore};
use crate::BranchFilterBuilder;

/// Type id of the branch output filter.
pub const BRANCH_OUTPUT_FILTER_ID: &str = "osi_branch_output";

/// Everything a constructor gets for one new filter instance.
pub struct FilterContext {
    /// Instance name shown by the host.
    pub name: String,
    /// The host as seen from this instance.
    pub host: Arc<dyn Host>,
    /// Settings the host stored for this instance, if any.
    pub settings: Option<OutputSettings>,
    /// Where the most recent settings are kept.
    pub store: Option<SettingsStore>,
}

/// Creates a filter instance.
pub type FilterConstructor = Arc<dyn Fn(FilterContext) -> BranchFilter + Send + Sync>;

/// A registered filter type.
#[derive(Clone)]
pub struct FilterDescriptor {
    /// Stable type id.
    pub id: String,
    /// Name shown in the host's filter list.
    pub display_name: String,
    /// Instance constructor.
    pub create: FilterConstructor,
}

impl FilterDescriptor {
    /// Returns the descriptor of the branch output filter.
    pub fn branch_output() -> Self {
        Self {
            id: BRANCH_OUTPUT_FILTER_ID.to_string(),
            display_name: "Branch Output".to_string(),
            create: Arc::new(|ctx: FilterContext| {
                let mut builder = BranchFilterBuilder::new(ctx.name, ctx.host);
                if let Some(settings) = ctx.settings {
                    builder = builder.settings(settings);
                }
                if let Some(store) = ctx.store {
                    builder = builder.settings_store(store);
                }
                builder.build()
            }),
        }
    }
}

impl std::fmt::Debug for FilterDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterDescriptor")
            .field("id", &self.id)
            .field("display_name", &self.display_name)
            .finish_non_exhaustive()
    }
}

/// Filter types by id.
#[derive(Debug, Default, Clone)]
pub struct FilterRegistry {
    descriptors: HashMap<String, FilterDescriptor>,
}

impl FilterRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the branch output filter.
    pub fn with_branch_output() -> Self {
        let mut registry = Self::new();
        registry
            .descriptors
            .insert(BRANCH_OUTPUT_FILTER_ID.to_string(), FilterDescriptor::branch_output());
        registry
    }

    /// Registers a filter type. Ids must be unique.
    pub fn register(&mut self, descriptor: FilterDescriptor) -> Result<(), RegistryError> {
        if self.descriptors.contains_key(&descriptor.id) {
            return Err(RegistryError::DuplicateFilterId { id: descriptor.id });
        }
        tracing::debug!(id = %descriptor.id, "filter type registered");
        self.descriptors.insert(descriptor.id.clone(), descriptor);
        Ok(())
    }

    /// Returns the descriptor for `id`.
    pub fn get(&self, id: &str) -> Option<&FilterDescriptor> {
        self.descriptors.get(id)
    }

    /// Returns the registered ids, sorted.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.descriptors.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Creates a filter instance of type `id`.
    pub fn create(&self, id: &str, ctx: FilterContext) -> Result<BranchFilter, RegistryError> {
        let descriptor = self
            .descriptors
            .get(id)
            .ok_or_else(|| RegistryError::UnknownFilterId { id: id.to_string() })?;
        Ok((descriptor.create)(ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::mock::MockHost;

    fn context(host: &MockHost, name: &str) -> FilterContext {
        FilterContext {
            name: name.to_string(),
            host: Arc::new(host.clone()),
            settings: Some(OutputSettings {
                server: "rtmp://a/b".to_string(),
                ..OutputSettings::default()
            }),
            store: None,
        }
    }

    #[test]
    fn test_default_registry() {
        let registry = FilterRegistry::with_branch_output();
        assert_eq!(registry.ids(), vec![BRANCH_OUTPUT_FILTER_ID]);
        assert_eq!(
            registry.get(BRANCH_OUTPUT_FILTER_ID).unwrap().display_name,
            "Branch Output"
        );
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut registry = FilterRegistry::with_branch_output();
        let err = registry
            .register(FilterDescriptor::branch_output())
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateFilterId { .. }));
    }

    #[test]
    fn test_unknown_id() {
        let registry = FilterRegistry::new();
        let host = MockHost::new();
        let err = registry.create("nope", context(&host, "f")).unwrap_err();
        assert!(matches!(err, RegistryError::UnknownFilterId { .. }));
    }

    #[test]
    fn test_instances_are_independent() {
        let registry = FilterRegistry::with_branch_output();
        let host_a = MockHost::new();
        let host_b = MockHost::new();
        let a = registry
            .create(BRANCH_OUTPUT_FILTER_ID, context(&host_a, "a"))
            .unwrap();
        let b = registry
            .create(BRANCH_OUTPUT_FILTER_ID, context(&host_b, "b"))
            .unwrap();

        a.video_tick();
        assert!(a.is_active());
        assert!(!b.is_active());
        assert_eq!(host_a.output_types().len(), 1);
        assert!(host_b.output_types().is_empty());
        assert_eq!(b.name(), "b");
    }
}
