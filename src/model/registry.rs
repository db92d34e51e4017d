use std::collections::HashMap;

use crate::core::{Result, StoreError};
use crate::lifecycle::callbacks::{CallbackChain, CallbackSet, LifecycleEvent};
use crate::model::descriptor::ModelDescriptor;
use crate::model::record::Record;

/// Registry of model descriptors and their lifecycle callback chains.
///
/// Populated once at type-definition time; the engine only reads from it
/// afterwards.
#[derive(Default)]
pub struct ModelRegistry {
    models: HashMap<String, ModelDescriptor>,
    callbacks: HashMap<String, CallbackSet>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, model: ModelDescriptor) -> &mut Self {
        self.callbacks
            .entry(model.name().to_string())
            .or_default();
        self.models.insert(model.name().to_string(), model);
        self
    }

    pub fn model(&self, name: &str) -> Result<&ModelDescriptor> {
        self.models
            .get(name)
            .ok_or_else(|| StoreError::ModelNotFound(name.to_string()))
    }

    pub fn model_by_table(&self, table: &str) -> Result<&ModelDescriptor> {
        self.models
            .values()
            .find(|model| model.table() == table)
            .ok_or_else(|| StoreError::ModelNotFound(table.to_string()))
    }

    pub fn models(&self) -> impl Iterator<Item = &ModelDescriptor> {
        self.models.values()
    }

    pub fn chain(&self, model: &str, event: LifecycleEvent) -> Option<&CallbackChain> {
        self.callbacks.get(model).map(|set| set.chain(event))
    }

    fn chain_mut(&mut self, model: &str, event: LifecycleEvent) -> &mut CallbackChain {
        self.callbacks
            .entry(model.to_string())
            .or_default()
            .chain_mut(event)
    }

    // ------------------------------------------------------------------
    // Registration entry points
    // ------------------------------------------------------------------

    pub fn before_destroy<F>(&mut self, model: &str, hook: F) -> &mut Self
    where
        F: Fn(&mut Record) -> Result<bool> + Send + Sync + 'static,
    {
        self.chain_mut(model, LifecycleEvent::Destroy)
            .push_before(Box::new(hook));
        self
    }

    pub fn around_destroy<F>(&mut self, model: &str, hook: F) -> &mut Self
    where
        F: Fn(&mut Record, crate::lifecycle::callbacks::Body<'_>) -> Result<bool>
            + Send
            + Sync
            + 'static,
    {
        self.chain_mut(model, LifecycleEvent::Destroy)
            .push_around(Box::new(hook));
        self
    }

    pub fn after_destroy<F>(&mut self, model: &str, hook: F) -> &mut Self
    where
        F: Fn(&mut Record) -> Result<()> + Send + Sync + 'static,
    {
        self.chain_mut(model, LifecycleEvent::Destroy)
            .push_after(Box::new(hook));
        self
    }

    pub fn before_restore<F>(&mut self, model: &str, hook: F) -> &mut Self
    where
        F: Fn(&mut Record) -> Result<bool> + Send + Sync + 'static,
    {
        self.chain_mut(model, LifecycleEvent::Restore)
            .push_before(Box::new(hook));
        self
    }

    pub fn around_restore<F>(&mut self, model: &str, hook: F) -> &mut Self
    where
        F: Fn(&mut Record, crate::lifecycle::callbacks::Body<'_>) -> Result<bool>
            + Send
            + Sync
            + 'static,
    {
        self.chain_mut(model, LifecycleEvent::Restore)
            .push_around(Box::new(hook));
        self
    }

    pub fn after_restore<F>(&mut self, model: &str, hook: F) -> &mut Self
    where
        F: Fn(&mut Record) -> Result<()> + Send + Sync + 'static,
    {
        self.chain_mut(model, LifecycleEvent::Restore)
            .push_after(Box::new(hook));
        self
    }

    pub fn before_real_destroy<F>(&mut self, model: &str, hook: F) -> &mut Self
    where
        F: Fn(&mut Record) -> Result<bool> + Send + Sync + 'static,
    {
        self.chain_mut(model, LifecycleEvent::RealDestroy)
            .push_before(Box::new(hook));
        self
    }

    pub fn around_real_destroy<F>(&mut self, model: &str, hook: F) -> &mut Self
    where
        F: Fn(&mut Record, crate::lifecycle::callbacks::Body<'_>) -> Result<bool>
            + Send
            + Sync
            + 'static,
    {
        self.chain_mut(model, LifecycleEvent::RealDestroy)
            .push_around(Box::new(hook));
        self
    }

    pub fn after_real_destroy<F>(&mut self, model: &str, hook: F) -> &mut Self
    where
        F: Fn(&mut Record) -> Result<()> + Send + Sync + 'static,
    {
        self.chain_mut(model, LifecycleEvent::RealDestroy)
            .push_after(Box::new(hook));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_look_up() {
        let mut registry = ModelRegistry::new();
        registry.register(ModelDescriptor::new("note", "notes").lifecycle("deleted_at"));

        assert!(registry.model("note").is_ok());
        assert!(registry.model_by_table("notes").is_ok());
        assert!(matches!(
            registry.model("ghost"),
            Err(StoreError::ModelNotFound(_))
        ));
    }

    #[test]
    fn test_hooks_land_on_their_event_chain() {
        let mut registry = ModelRegistry::new();
        registry.register(ModelDescriptor::new("note", "notes").lifecycle("deleted_at"));
        registry.before_restore("note", |_| Ok(true));
        registry.after_real_destroy("note", |_| Ok(()));

        assert!(
            !registry
                .chain("note", LifecycleEvent::Restore)
                .unwrap()
                .is_empty()
        );
        assert!(
            !registry
                .chain("note", LifecycleEvent::RealDestroy)
                .unwrap()
                .is_empty()
        );
        assert!(
            registry
                .chain("note", LifecycleEvent::Destroy)
                .unwrap()
                .is_empty()
        );
    }
}
