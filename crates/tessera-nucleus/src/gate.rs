//! The validation gate.
//!
//! [`NucleusGate`] resolves which zome owns an entry type, checks the
//! content against the declared data format and then defers to that zome's
//! interpreter. It also routes function calls, enforcing exposure.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard};

use tessera_chain::{is_system_type, Dna, Exposure, FunctionDef};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::evaluator::{Evaluator, ValidationRequest, ZomeApi};

/// Installed interpreters, keyed by zome name.
#[derive(Clone, Default)]
pub struct NucleusRegistry {
    nuclei: HashMap<String, Arc<dyn Evaluator>>,
}

impl NucleusRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the interpreter for a zome.
    pub fn install(&mut self, zome: impl Into<String>, nucleus: Arc<dyn Evaluator>) {
        self.nuclei.insert(zome.into(), nucleus);
    }

    #[must_use]
    pub fn with(mut self, zome: impl Into<String>, nucleus: impl Evaluator + 'static) -> Self {
        self.install(zome, Arc::new(nucleus));
        self
    }

    pub fn get(&self, zome: &str) -> Option<Arc<dyn Evaluator>> {
        self.nuclei.get(zome).cloned()
    }
}

impl fmt::Debug for NucleusRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.nuclei.iter().map(|(k, v)| (k, v.nucleus_type())))
            .finish()
    }
}

/// Accept-or-reject boundary consumed by the chain commit path and the DHT.
pub trait ValidationGate: Send + Sync {
    fn validate(&self, req: &ValidationRequest<'_>) -> Result<()>;
}

/// Gate backed by a DNA and its installed interpreters.
#[derive(Debug, Clone)]
pub struct NucleusGate {
    dna: Arc<RwLock<Dna>>,
    registry: NucleusRegistry,
}

impl NucleusGate {
    pub fn new(dna: Arc<RwLock<Dna>>, registry: NucleusRegistry) -> Self {
        Self { dna, registry }
    }

    fn dna(&self) -> RwLockReadGuard<'_, Dna> {
        self.dna.read().unwrap_or_else(|e| e.into_inner())
    }

    /// The interpreter for a DNA zome.
    pub fn make_nucleus(&self, zome: &str) -> Result<Arc<dyn Evaluator>> {
        let dna = self.dna();
        let declared = dna
            .zome(zome)
            .ok_or_else(|| Error::UnknownZome(zome.to_string()))?;
        let nucleus = self
            .registry
            .get(zome)
            .ok_or_else(|| Error::NoNucleus(zome.to_string()))?;
        if nucleus.nucleus_type() != declared.nucleus_type {
            return Err(Error::NucleusTypeMismatch {
                zome: zome.to_string(),
                declared: declared.nucleus_type.clone(),
                installed: nucleus.nucleus_type().to_string(),
            });
        }
        Ok(nucleus)
    }

    /// A zome function's definition.
    pub fn get_function_def(&self, zome: &str, function: &str) -> Result<FunctionDef> {
        let dna = self.dna();
        let z = dna
            .zome(zome)
            .ok_or_else(|| Error::UnknownZome(zome.to_string()))?;
        z.function(function)
            .cloned()
            .ok_or_else(|| Error::UnknownFunction(function.to_string()))
    }

    /// Call a zome function from the given context.
    pub fn call(
        &self,
        api: &dyn ZomeApi,
        zome: &str,
        function: &str,
        args: &str,
        context: Exposure,
    ) -> Result<String> {
        let def = self.get_function_def(zome, function)?;
        if !def.exposure.allows(context) {
            return Err(Error::FunctionNotExposed);
        }
        let nucleus = self.make_nucleus(zome)?;
        debug!(zome, function, ?context, "Calling zome function");
        nucleus.call(api, function, args).map_err(Error::CallFailed)
    }
}

impl ValidationGate for NucleusGate {
    fn validate(&self, req: &ValidationRequest<'_>) -> Result<()> {
        if is_system_type(req.entry_type) {
            return Ok(());
        }

        let (zome, format) = {
            let dna = self.dna();
            let (zome, def) = dna
                .find_entry_def(req.entry_type)
                .ok_or_else(|| Error::UnknownEntryType(req.entry_type.to_string()))?;
            (zome.name.clone(), def.data_format)
        };

        if !req.entry.matches_format(format) {
            return Err(Error::ValidationFailed(format!(
                "entry does not match data format {format:?} of {}",
                req.entry_type
            )));
        }

        let nucleus = self.make_nucleus(&zome)?;
        nucleus.validate(req).map_err(|reason| {
            warn!(
                action = %req.action,
                entry_type = req.entry_type,
                reason = reason.as_str(),
                "Validation rejected"
            );
            Error::ValidationFailed(reason)
        })
    }
}
