//! Tessera nucleus
//!
//! The validation boundary between the replicated data structures and
//! application code. Each zome of a DNA is run by an interpreter
//! implementing [`Evaluator`]; [`NucleusGate`] picks the right one for an
//! entry type and enforces function exposure on calls.

pub mod error;
pub mod evaluator;
pub mod gate;
pub mod native;

pub use error::{Error, Result};
pub use evaluator::{Action, Evaluator, ValidationRequest, ZomeApi};
pub use gate::{NucleusGate, NucleusRegistry, ValidationGate};
pub use native::{NativeNucleus, NATIVE_NUCLEUS};
