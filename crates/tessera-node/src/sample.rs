//! Sample application.
//!
//! One native zome with number, profile, rating and private note entry
//! types. The binary runs it when no DNA document is configured, and tests
//! use it as a fixture.

use tessera_chain::{
    CallingType, DataFormat, Dna, Entry, EntryDef, Exposure, FunctionDef, Hash, Sharing, Zome,
};
use tessera_nucleus::{NativeNucleus, NucleusRegistry, ValidationRequest, NATIVE_NUCLEUS};

pub const SAMPLE_ZOME: &str = "sampleZome";

const PROFILE_SCHEMA: &str = r#"{"type":"object","required":["firstName"]}"#;

pub fn dna() -> Dna {
    let mut dna = Dna::new("tessera-sample");
    dna.properties
        .insert("description".to_string(), "tessera sample application".to_string());
    dna.zomes.push(Zome {
        name: SAMPLE_ZOME.to_string(),
        description: "numbers, profiles and ratings".to_string(),
        nucleus_type: NATIVE_NUCLEUS.to_string(),
        code: String::new(),
        code_hash: Hash::null(),
        entries: vec![
            EntryDef::new("evenNumbers", DataFormat::String),
            EntryDef::new("oddNumbers", DataFormat::String),
            EntryDef::new("profile", DataFormat::Json).with_schema(PROFILE_SCHEMA),
            EntryDef::new("rating", DataFormat::Links),
            EntryDef::new("note", DataFormat::String).with_sharing(Sharing::Private),
        ],
        functions: vec![
            FunctionDef::new("testStrFn1", CallingType::String, Exposure::Zome),
            FunctionDef::new("addEven", CallingType::String, Exposure::Public),
            FunctionDef::new("addOdd", CallingType::String, Exposure::Public),
            FunctionDef::new("getDNA", CallingType::String, Exposure::Public),
            FunctionDef::new("whoAmI", CallingType::String, Exposure::Transport),
        ],
    });
    dna
}

fn parity(req: &ValidationRequest<'_>, remainder: i64) -> Result<(), String> {
    let text = req.entry.as_str().unwrap_or_default();
    match text.trim().parse::<i64>() {
        Ok(n) if n.rem_euclid(2) == remainder => Ok(()),
        _ => Err(format!("Invalid entry: {text}")),
    }
}

pub fn nucleus() -> NativeNucleus {
    NativeNucleus::new()
        .validator("evenNumbers", |req| parity(req, 0))
        .validator("oddNumbers", |req| parity(req, 1))
        .validator("profile", |req| {
            let doc: serde_json::Value = req
                .entry
                .as_str()
                .and_then(|s| serde_json::from_str(s).ok())
                .unwrap_or_default();
            match doc.get("firstName") {
                Some(serde_json::Value::String(name)) if !name.is_empty() => Ok(()),
                _ => Err("profile requires a firstName".to_string()),
            }
        })
        .validator("rating", |req| match req.link {
            Some(link) if link.tag.is_empty() => Err("rating links need a tag".to_string()),
            _ => Ok(()),
        })
        .function("testStrFn1", |_, args| Ok(format!("result: {args}")))
        .function("addEven", |api, args| {
            api.commit("evenNumbers", Entry::Text(args.trim().to_string()))
                .map(|hash| hash.to_string())
        })
        .function("addOdd", |api, args| {
            api.commit("oddNumbers", Entry::Text(args.trim().to_string()))
                .map(|hash| hash.to_string())
        })
        .function("getDNA", |api, _| Ok(api.dna_hash().to_string()))
        .function("whoAmI", |api, _| Ok(api.agent_identity()))
}

/// Interpreters for [`dna`].
pub fn registry() -> NucleusRegistry {
    NucleusRegistry::new().with(SAMPLE_ZOME, nucleus())
}
