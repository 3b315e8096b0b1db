//! Engine factories and the ordered name table.
//!
//! Factories are registered by name before a dispatcher is built. Once the
//! dispatcher owns the registry the table is fixed: index <-> name is a
//! bijection for the dispatcher's lifetime.

use std::fmt;
use std::sync::Arc;

use log::debug;

use super::{Engine, EngineType};
use crate::engines::OffEngine;
use crate::error::DispatchError;

/// Name of the distinguished no-op entry.
pub const OFF_ENGINE_NAME: &str = "Off";

type Constructor = dyn Fn() -> Box<dyn Engine> + Send + Sync;

/// Named constructor for one engine implementation.
#[derive(Clone)]
pub struct EngineFactory {
    name: String,
    engine_type: EngineType,
    construct: Arc<Constructor>,
}

impl EngineFactory {
    pub fn new<F>(name: impl Into<String>, engine_type: EngineType, construct: F) -> Self
    where
        F: Fn() -> Box<dyn Engine> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            engine_type,
            construct: Arc::new(construct),
        }
    }

    /// Factory for a default-constructible engine, named after the engine
    /// itself.
    pub fn of<E>() -> Self
    where
        E: Engine + Default + 'static,
    {
        let instance = E::default();
        Self::new(instance.name().to_string(), instance.engine_type(), || {
            Box::new(E::default())
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn engine_type(&self) -> EngineType {
        self.engine_type
    }

    /// Construct a fresh engine in its idle, playable default state.
    pub fn construct(&self) -> Box<dyn Engine> {
        (self.construct)()
    }
}

impl fmt::Debug for EngineFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineFactory")
            .field("name", &self.name)
            .field("engine_type", &self.engine_type)
            .finish_non_exhaustive()
    }
}

/// Ordered, name-unique set of factories for one [`EngineType`].
#[derive(Debug, Clone)]
pub struct EngineRegistry {
    engine_type: EngineType,
    factories: Vec<EngineFactory>,
}

impl EngineRegistry {
    pub fn new(engine_type: EngineType) -> Self {
        Self {
            engine_type,
            factories: Vec::new(),
        }
    }

    /// Registry whose index 0 is the no-op `"Off"` engine.
    pub fn with_off(engine_type: EngineType) -> Self {
        let mut registry = Self::new(engine_type);
        registry.factories.push(EngineFactory::new(
            OFF_ENGINE_NAME,
            engine_type,
            move || Box::new(OffEngine::new(engine_type)),
        ));
        registry
    }

    /// Register a factory.
    ///
    /// # Errors
    /// - `DuplicateFactory` if the name is already taken (never overwrites)
    /// - `TypeMismatch` if the factory builds a different engine category
    pub fn register_factory(&mut self, factory: EngineFactory) -> Result<(), DispatchError> {
        if factory.engine_type != self.engine_type {
            return Err(DispatchError::TypeMismatch {
                expected: self.engine_type,
                found: factory.engine_type,
            });
        }
        if self.index_of(&factory.name).is_some() {
            return Err(DispatchError::DuplicateFactory { name: factory.name });
        }

        debug!(
            "[Registry] Registered {} engine '{}' at index {}",
            self.engine_type,
            factory.name,
            self.factories.len()
        );
        self.factories.push(factory);
        Ok(())
    }

    pub fn register_engine<E>(&mut self) -> Result<(), DispatchError>
    where
        E: Engine + Default + 'static,
    {
        self.register_factory(EngineFactory::of::<E>())
    }

    /// Builder-style registration used when assembling fixed engine sets.
    pub fn with_engine<E>(mut self) -> Result<Self, DispatchError>
    where
        E: Engine + Default + 'static,
    {
        self.register_engine::<E>()?;
        Ok(self)
    }

    pub fn engine_type(&self) -> EngineType {
        self.engine_type
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&EngineFactory> {
        self.factories.get(index)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.factories.iter().position(|f| f.name == name)
    }

    pub fn factories(&self) -> &[EngineFactory] {
        &self.factories
    }

    pub fn names(&self) -> Vec<&str> {
        self.factories.iter().map(|f| f.name.as_str()).collect()
    }
}
