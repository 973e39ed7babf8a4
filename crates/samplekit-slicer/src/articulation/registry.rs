//! Articulation registry
//!
//! Maps strategy names to constructors so strategies can be picked from
//! configuration. Built-ins are registered by [`ArticulationRegistry::with_builtins`].

use super::shorts::ShortsArticulation;
use super::sustain::SustainArticulation;
use super::Articulation;
use crate::metadata::{MetaValue, RegionMetadata};
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Constructor parameters, keyed like region metadata.
pub type ArticulationParams = RegionMetadata;

/// Function that constructs an articulation from parameters
pub type ArticulationConstructor =
    Arc<dyn Fn(&ArticulationParams) -> Result<Box<dyn Articulation>> + Send + Sync>;

/// Registry of articulation constructors
pub struct ArticulationRegistry {
    constructors: Arc<RwLock<HashMap<String, ArticulationConstructor>>>,
}

impl ArticulationRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            constructors: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Registry holding the `sustain` and `shorts` strategies.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.register(SustainArticulation::NAME, |params| {
            Ok(Box::new(SustainArticulation::from_params(params)?))
        });
        registry.register(ShortsArticulation::NAME, |params| {
            Ok(Box::new(ShortsArticulation::from_params(params)?))
        });
        registry
    }

    /// Register a constructor, replacing any previous one under `name`.
    pub fn register<F>(&self, name: impl Into<String>, constructor: F)
    where
        F: Fn(&ArticulationParams) -> Result<Box<dyn Articulation>> + Send + Sync + 'static,
    {
        self.constructors
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), Arc::new(constructor));
    }

    /// Create the articulation registered under `name`.
    pub fn create(&self, name: &str, params: &ArticulationParams) -> Result<Box<dyn Articulation>> {
        let constructor = {
            let constructors = self
                .constructors
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            constructors
                .get(name)
                .cloned()
                .ok_or_else(|| Error::UnknownArticulation(name.to_string()))?
        };
        constructor(params)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .constructors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    pub fn unregister(&self, name: &str) -> bool {
        self.constructors
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
            .is_some()
    }
}

impl Default for ArticulationRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl Clone for ArticulationRegistry {
    fn clone(&self) -> Self {
        Self {
            constructors: Arc::clone(&self.constructors),
        }
    }
}

impl core::fmt::Debug for ArticulationRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ArticulationRegistry")
            .field("names", &self.names())
            .finish()
    }
}

/// Helper to get a required parameter
pub fn get_param<T>(
    params: &ArticulationParams,
    name: &str,
    convert: impl FnOnce(&MetaValue) -> Option<T>,
) -> Result<T> {
    let value = params
        .get(name)
        .ok_or_else(|| Error::Articulation(format!("missing parameter '{}'", name)))?;
    convert(value)
        .ok_or_else(|| Error::Articulation(format!("invalid value for '{}': {:?}", name, value)))
}

/// Helper to get an optional parameter with default
///
/// A present value of the wrong type is an error rather than silently
/// replaced by the default.
pub fn get_param_or<T>(
    params: &ArticulationParams,
    name: &str,
    default: T,
    convert: impl FnOnce(&MetaValue) -> Option<T>,
) -> Result<T> {
    match params.get(name) {
        Some(_) => get_param(params, name, convert),
        None => Ok(default),
    }
}
