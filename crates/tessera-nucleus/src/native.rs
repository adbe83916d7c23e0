//! Rust-closure interpreter.

use std::collections::HashMap;
use std::fmt;

use crate::evaluator::{Evaluator, ValidationRequest, ZomeApi};

/// Nucleus type name of [`NativeNucleus`].
pub const NATIVE_NUCLEUS: &str = "native";

type ValidateFn = dyn Fn(&ValidationRequest<'_>) -> Result<(), String> + Send + Sync;
type ZomeFn = dyn Fn(&dyn ZomeApi, &str) -> Result<String, String> + Send + Sync;

/// Zome code written as Rust closures.
///
/// Entry types without a registered validator are accepted.
#[derive(Default)]
pub struct NativeNucleus {
    validators: HashMap<String, Box<ValidateFn>>,
    functions: HashMap<String, Box<ZomeFn>>,
}

impl NativeNucleus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the validation rule for an entry type.
    #[must_use]
    pub fn validator<F>(mut self, entry_type: impl Into<String>, f: F) -> Self
    where
        F: Fn(&ValidationRequest<'_>) -> Result<(), String> + Send + Sync + 'static,
    {
        self.validators.insert(entry_type.into(), Box::new(f));
        self
    }

    /// Register a callable function.
    #[must_use]
    pub fn function<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&dyn ZomeApi, &str) -> Result<String, String> + Send + Sync + 'static,
    {
        self.functions.insert(name.into(), Box::new(f));
        self
    }
}

impl Evaluator for NativeNucleus {
    fn nucleus_type(&self) -> &str {
        NATIVE_NUCLEUS
    }

    fn validate(&self, req: &ValidationRequest<'_>) -> Result<(), String> {
        match self.validators.get(req.entry_type) {
            Some(rule) => rule(req),
            None => Ok(()),
        }
    }

    fn call(&self, api: &dyn ZomeApi, function: &str, args: &str) -> Result<String, String> {
        let f = self
            .functions
            .get(function)
            .ok_or_else(|| format!("function not defined: {function}"))?;
        f(api, args)
    }
}

impl fmt::Debug for NativeNucleus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut validators: Vec<_> = self.validators.keys().collect();
        validators.sort();
        let mut functions: Vec<_> = self.functions.keys().collect();
        functions.sort();
        f.debug_struct("NativeNucleus")
            .field("validators", &validators)
            .field("functions", &functions)
            .finish()
    }
}
