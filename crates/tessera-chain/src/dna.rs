//! Application DNA documents.
//!
//! A DNA names its zomes, their entry types and exposed functions. Before
//! genesis the document is stamped with the digests of each zome's code and
//! each entry type's schema, then committed as the first chain entry; the
//! digest of that entry identifies the application.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tessera_hash::{Hash, HashSpec};
use uuid::Uuid;

use crate::entry::{DataFormat, Entry};
use crate::error::{Error, Result};

/// Protocol version implemented by this crate.
pub const VERSION: u32 = 1;

/// Who may call a zome function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Exposure {
    /// Only other functions of the application.
    Zome,
    /// Application code and the public interface.
    Public,
    /// Application code and peers over the network.
    Transport,
}

impl Exposure {
    /// True if a caller in `context` may invoke a function with this exposure.
    pub fn allows(self, context: Exposure) -> bool {
        match context {
            Exposure::Zome => true,
            other => self == other,
        }
    }
}

/// Argument and return encoding of a zome function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallingType {
    #[default]
    String,
    Json,
}

/// Whether entries of a type are published to the DHT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sharing {
    #[default]
    Public,
    Private,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryDef {
    pub name: String,
    pub data_format: DataFormat,
    #[serde(default)]
    pub sharing: Sharing,
    /// Inline schema document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(default)]
    pub schema_hash: Hash,
}

impl EntryDef {
    pub fn new(name: impl Into<String>, data_format: DataFormat) -> Self {
        Self {
            name: name.into(),
            data_format,
            sharing: Sharing::Public,
            schema: None,
            schema_hash: Hash::null(),
        }
    }

    #[must_use]
    pub fn with_sharing(mut self, sharing: Sharing) -> Self {
        self.sharing = sharing;
        self
    }

    #[must_use]
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Schema digest to put in headers, if the type has a schema.
    pub fn type_link(&self) -> Option<Hash> {
        (!self.schema_hash.is_null()).then(|| self.schema_hash.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionDef {
    pub name: String,
    #[serde(default)]
    pub calling_type: CallingType,
    pub exposure: Exposure,
}

impl FunctionDef {
    pub fn new(name: impl Into<String>, calling_type: CallingType, exposure: Exposure) -> Self {
        Self {
            name: name.into(),
            calling_type,
            exposure,
        }
    }
}

/// A named code module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zome {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Interpreter that runs this zome.
    pub nucleus_type: String,
    /// Inline source handed to the interpreter.
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub code_hash: Hash,
    #[serde(default)]
    pub entries: Vec<EntryDef>,
    #[serde(default)]
    pub functions: Vec<FunctionDef>,
}

impl Zome {
    pub fn entry_def(&self, name: &str) -> Option<&EntryDef> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn function(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.iter().find(|f| f.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DhtConfig {
    /// Digest algorithm name for every hash of this application.
    pub hash_type: String,
}

impl Default for DhtConfig {
    fn default() -> Self {
        Self {
            hash_type: "sha2-256".to_string(),
        }
    }
}

/// The application document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dna {
    pub name: String,
    pub uuid: Uuid,
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default = "default_version")]
    pub requires_version: u32,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    #[serde(default)]
    pub dht_config: DhtConfig,
    #[serde(default)]
    pub zomes: Vec<Zome>,
}

fn default_version() -> u32 {
    VERSION
}

impl Dna {
    /// Empty DNA with a fresh uuid.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uuid: Uuid::new_v4(),
            version: VERSION,
            requires_version: VERSION,
            properties: BTreeMap::new(),
            dht_config: DhtConfig::default(),
            zomes: Vec::new(),
        }
    }

    /// The configured digest algorithm.
    pub fn hash_spec(&self) -> Result<HashSpec> {
        Ok(HashSpec::new(&self.dht_config.hash_type)?)
    }

    /// Fail if the document needs a newer protocol version.
    pub fn check_version(&self) -> Result<()> {
        if self.requires_version > VERSION {
            return Err(Error::VersionMismatch(self.requires_version));
        }
        Ok(())
    }

    /// Stamp code and schema digests into the document.
    ///
    /// Idempotent: digests depend only on code and schema text.
    pub fn gen_hashes(&mut self) -> Result<()> {
        let spec = self.hash_spec()?;
        for zome in &mut self.zomes {
            zome.code_hash = spec.sum(zome.code.as_bytes());
            for def in &mut zome.entries {
                def.schema_hash = match &def.schema {
                    Some(schema) => spec.sum(schema.as_bytes()),
                    None => Hash::null(),
                };
            }
        }
        Ok(())
    }

    pub fn zome(&self, name: &str) -> Option<&Zome> {
        self.zomes.iter().find(|z| z.name == name)
    }

    /// Find the zome declaring an entry type.
    pub fn find_entry_def(&self, entry_type: &str) -> Option<(&Zome, &EntryDef)> {
        self.zomes
            .iter()
            .find_map(|z| z.entry_def(entry_type).map(|def| (z, def)))
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// The `%dna` system entry: the JSON document as bytes.
    pub fn entry(&self) -> Result<Entry> {
        Ok(Entry::Bytes(serde_json::to_vec(self)?))
    }
}
