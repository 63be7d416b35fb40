#![deny(warnings)]

//! Rhai-scripted choice policies.
//!
//! A policy package is a directory holding `metadata.yaml` and `script.rhai`.
//! The script defines
//! `fn choose(phase, set, player_score, opponent_score, choices)` and returns
//! the id of one entry of `choices` (an array of `#{id, label, net}` maps).

use rhai::{Array, Dynamic, Engine, ImmutableString, Map, Scope, AST};
use rust_decimal::prelude::ToPrimitive;
use serde::Deserialize;
use sim_ai::{ChoicePolicy, DecisionView, PolicyError};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;
use tracing::info;

/// Script API version understood by this engine.
pub const SCHEMA_VERSION: u32 = 1;

const MAX_OPERATIONS: u64 = 100_000;

/// Metadata for a policy package.
#[derive(Debug, Clone, Deserialize)]
pub struct PolicyMeta {
    pub id: String,
    pub name: String,
    pub version: String,
    pub engine_schema_version: u32,
    pub description: Option<String>,
}

#[derive(Debug, Error)]
pub enum ModError {
    #[error("invalid metadata: {0}")]
    InvalidMeta(String),
    #[error("io error: {0}")]
    Io(String),
    #[error("rhai error: {0}")]
    Rhai(String),
    #[error("unknown policy: {0}")]
    UnknownPolicy(String),
}

impl From<std::io::Error> for ModError {
    fn from(e: std::io::Error) -> Self {
        ModError::Io(e.to_string())
    }
}

impl From<Box<rhai::EvalAltResult>> for ModError {
    fn from(e: Box<rhai::EvalAltResult>) -> Self {
        ModError::Rhai(e.to_string())
    }
}

impl From<rhai::ParseError> for ModError {
    fn from(e: rhai::ParseError) -> Self {
        ModError::Rhai(e.to_string())
    }
}

/// Package found on disk.
#[derive(Debug, Clone)]
pub struct LoadedPolicy {
    pub meta: PolicyMeta,
    pub dir: PathBuf,
    pub script_path: PathBuf,
    pub script_mtime: SystemTime,
}

fn read_meta(meta_path: &Path) -> Result<PolicyMeta, ModError> {
    let text = fs::read_to_string(meta_path)?;
    let meta: PolicyMeta =
        serde_yaml::from_str(&text).map_err(|e| ModError::InvalidMeta(e.to_string()))?;
    if meta.engine_schema_version != SCHEMA_VERSION {
        return Err(ModError::InvalidMeta(format!(
            "{} targets schema {}, engine supports {}",
            meta.id, meta.engine_schema_version, SCHEMA_VERSION
        )));
    }
    Ok(meta)
}

/// Directory of policy packages.
pub struct PolicyLibrary {
    root: PathBuf,
    policies: Vec<LoadedPolicy>,
}

impl PolicyLibrary {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            policies: vec![],
        }
    }

    /// Scan the root; subdirectories without both files are skipped.
    pub fn load_all(&mut self) -> Result<(), ModError> {
        let entries = fs::read_dir(&self.root)?;
        self.policies.clear();
        for ent in entries {
            let ent = ent?;
            if !ent.file_type()?.is_dir() {
                continue;
            }
            let dir = ent.path();
            let meta_path = dir.join("metadata.yaml");
            let script_path = dir.join("script.rhai");
            if !meta_path.exists() || !script_path.exists() {
                continue;
            }
            let meta = read_meta(&meta_path)?;
            let mtime = fs::metadata(&script_path)?
                .modified()
                .unwrap_or(SystemTime::UNIX_EPOCH);
            self.policies.push(LoadedPolicy {
                meta,
                dir,
                script_path,
                script_mtime: mtime,
            });
        }
        self.policies.sort_by(|a, b| a.meta.id.cmp(&b.meta.id));
        Ok(())
    }

    /// Ids of packages whose script changed since the last scan.
    pub fn reload_if_changed(&mut self) -> Result<Vec<String>, ModError> {
        let mut changed = Vec::new();
        for p in &mut self.policies {
            let mtime = fs::metadata(&p.script_path)?
                .modified()
                .unwrap_or(SystemTime::UNIX_EPOCH);
            if mtime > p.script_mtime {
                info!("Reloading policy: {}", p.meta.id);
                p.script_mtime = mtime;
                changed.push(p.meta.id.clone());
            }
        }
        Ok(changed)
    }

    pub fn policies(&self) -> &[LoadedPolicy] {
        &self.policies
    }

    /// Compile the package with the given id.
    pub fn instantiate(&self, id: &str) -> Result<ScriptPolicy, ModError> {
        let p = self
            .policies
            .iter()
            .find(|p| p.meta.id == id)
            .ok_or_else(|| ModError::UnknownPolicy(id.to_string()))?;
        let source = fs::read_to_string(&p.script_path)?;
        ScriptPolicy::from_source(p.meta.clone(), &source)
    }
}

/// Returns a Rhai engine with operation limits suitable for policy scripts.
pub fn new_engine() -> Engine {
    let mut engine = Engine::new();
    engine.set_max_operations(MAX_OPERATIONS);
    engine
}

/// A compiled script acting as a [`ChoicePolicy`].
pub struct ScriptPolicy {
    meta: PolicyMeta,
    engine: Engine,
    ast: AST,
}

impl ScriptPolicy {
    pub fn from_source(meta: PolicyMeta, source: &str) -> Result<Self, ModError> {
        let engine = new_engine();
        let ast = engine.compile(source)?;
        if !ast.iter_functions().any(|f| f.name == "choose" && f.params.len() == 5) {
            return Err(ModError::Rhai(format!(
                "{}: script must define choose(phase, set, player_score, opponent_score, choices)",
                meta.id
            )));
        }
        Ok(Self { meta, engine, ast })
    }

    /// Load a single package directory.
    pub fn from_dir<P: AsRef<Path>>(dir: P) -> Result<Self, ModError> {
        let dir = dir.as_ref();
        let meta = read_meta(&dir.join("metadata.yaml"))?;
        let source = fs::read_to_string(dir.join("script.rhai"))?;
        Self::from_source(meta, &source)
    }

    pub fn meta(&self) -> &PolicyMeta {
        &self.meta
    }

    fn call_choose(&self, view: &DecisionView<'_>) -> Result<String, ModError> {
        let choices: Array = view
            .choices
            .iter()
            .map(|c| {
                let mut m = Map::new();
                m.insert("id".into(), Dynamic::from(c.id.clone()));
                m.insert("label".into(), Dynamic::from(c.label.clone()));
                m.insert(
                    "net".into(),
                    Dynamic::from(c.net_effect().to_f64().unwrap_or(0.0)),
                );
                Dynamic::from_map(m)
            })
            .collect();
        let mut scope = Scope::new();
        let picked: ImmutableString = self.engine.call_fn(
            &mut scope,
            &self.ast,
            "choose",
            (
                view.phase.tag().to_string(),
                i64::from(view.set_number),
                i64::from(view.player_score),
                i64::from(view.opponent_score),
                choices,
            ),
        )?;
        Ok(picked.to_string())
    }
}

impl ChoicePolicy for ScriptPolicy {
    fn name(&self) -> &str {
        &self.meta.id
    }

    fn choose(&mut self, view: &DecisionView<'_>) -> Result<String, PolicyError> {
        let id = self
            .call_choose(view)
            .map_err(|e| PolicyError::Script(e.to_string()))?;
        if !view.choices.iter().any(|c| c.id == id) {
            return Err(PolicyError::Script(format!(
                "{} returned {id:?}, not offered at {}",
                self.meta.id,
                view.phase.tag()
            )));
        }
        Ok(id)
    }
}
