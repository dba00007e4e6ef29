//! Shader program boundary: source loading with `#include`, textual defines,
//! and the trait every rendering backend implements.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::ShaderError;
use crate::uniform::{UniformTable, UniformValue};

/// Nested `#include` limit; hitting it almost always means a cycle.
pub const MAX_INCLUDE_DEPTH: usize = 20;

fn include_regex() -> &'static Regex {
    static INCLUDE: OnceLock<Regex> = OnceLock::new();
    INCLUDE.get_or_init(|| Regex::new(r#"#include\s*"([^"]+)""#).expect("valid include regex"))
}

/// Where shader text comes from.
pub trait SourceLoader {
    fn load(&self, name: &str) -> Result<String, ShaderError>;

    /// Name of `included` as seen from the file `including`.
    fn resolve(&self, including: &str, included: &str) -> String;
}

/// Loads sources from disk; includes are relative to the including file.
#[derive(Clone, Debug, Default)]
pub struct FileSourceLoader;

impl SourceLoader for FileSourceLoader {
    fn load(&self, name: &str) -> Result<String, ShaderError> {
        std::fs::read_to_string(name).map_err(|e| ShaderError::Load {
            name: name.to_string(),
            reason: e.to_string(),
        })
    }

    fn resolve(&self, including: &str, included: &str) -> String {
        let dir = Path::new(including).parent().unwrap_or_else(|| Path::new(""));
        dir.join(included).to_string_lossy().into_owned()
    }
}

/// In-memory sources keyed by file name, for shaders compiled into the binary.
#[derive(Clone, Debug, Default)]
pub struct EmbeddedSources {
    files: HashMap<String, String>,
}

impl EmbeddedSources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, source: &str) -> Self {
        self.files.insert(name.to_string(), source.to_string());
        self
    }
}

impl SourceLoader for EmbeddedSources {
    fn load(&self, name: &str) -> Result<String, ShaderError> {
        self.files.get(name).cloned().ok_or_else(|| ShaderError::Load {
            name: name.to_string(),
            reason: "no embedded source with that name".to_string(),
        })
    }

    fn resolve(&self, including: &str, included: &str) -> String {
        match including.rsplit_once('/') {
            Some((dir, _)) => format!("{dir}/{included}"),
            None => included.to_string(),
        }
    }
}

/// Load `name` and splice in every `#include "file"` recursively.
pub fn load_shader_source(loader: &dyn SourceLoader, name: &str) -> Result<String, ShaderError> {
    expand_includes(loader, name, 0)
}

fn expand_includes(
    loader: &dyn SourceLoader,
    name: &str,
    depth: usize,
) -> Result<String, ShaderError> {
    let source = loader.load(name)?;
    let mut result = String::with_capacity(source.len());
    let mut last = 0;

    for captures in include_regex().captures_iter(&source) {
        if depth == MAX_INCLUDE_DEPTH {
            log::error!(
                "Reached maximum include depth while loading '{}', maybe there is a cycle?",
                name
            );
            return Err(ShaderError::IncludeDepth {
                name: name.to_string(),
                max: MAX_INCLUDE_DEPTH,
            });
        }
        let (Some(whole), Some(path)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        result.push_str(&source[last..whole.start()]);
        let included = loader.resolve(name, path.as_str());
        result.push_str(&expand_includes(loader, &included, depth + 1)?);
        last = whole.end();
    }
    result.push_str(&source[last..]);
    Ok(result)
}

/// Replace every whole-word occurrence of each define name with its value.
pub fn replace_defines(source: &str, defines: &BTreeMap<String, String>) -> String {
    let mut out = source.to_string();
    for (name, value) in defines {
        let Ok(pattern) = Regex::new(&format!(r"\b{}\b", regex::escape(name))) else {
            continue;
        };
        out = pattern.replace_all(&out, regex::NoExpand(value)).into_owned();
    }
    out
}

/// Expanded vertex and fragment source pair, with defines not yet applied.
#[derive(Clone, Debug, PartialEq)]
pub struct ShaderSources {
    pub vertex: String,
    pub fragment: String,
}

impl ShaderSources {
    pub fn load(
        loader: &dyn SourceLoader,
        vertex: &str,
        fragment: &str,
    ) -> Result<Self, ShaderError> {
        Ok(Self {
            vertex: load_shader_source(loader, vertex)?,
            fragment: load_shader_source(loader, fragment)?,
        })
    }

    pub fn from_strings(vertex: &str, fragment: &str) -> Self {
        Self {
            vertex: vertex.to_string(),
            fragment: fragment.to_string(),
        }
    }
}

/// Backend-independent half of a shader program: sources, defines, uniform table.
///
/// A define change marks the program dirty; only a successful recompile clears it.
#[derive(Clone, Debug)]
pub struct ProgramState {
    sources: ShaderSources,
    defines: BTreeMap<String, String>,
    uniforms: UniformTable,
    dirty: bool,
}

impl ProgramState {
    pub fn new(sources: ShaderSources) -> Self {
        Self {
            sources,
            defines: BTreeMap::new(),
            uniforms: UniformTable::new(),
            dirty: false,
        }
    }

    pub fn vertex_source(&self) -> String {
        replace_defines(&self.sources.vertex, &self.defines)
    }

    pub fn fragment_source(&self) -> String {
        replace_defines(&self.sources.fragment, &self.defines)
    }

    /// Set a define; returns true if the value actually changed.
    pub fn define(&mut self, name: &str, value: &str) -> bool {
        if self.defines.get(name).map(String::as_str) == Some(value) {
            return false;
        }
        self.defines.insert(name.to_string(), value.to_string());
        self.dirty = true;
        true
    }

    pub fn get_define(&self, name: &str) -> Option<&str> {
        self.defines.get(name).map(String::as_str)
    }

    pub fn defines(&self) -> &BTreeMap<String, String> {
        &self.defines
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    pub fn uniforms(&self) -> &UniformTable {
        &self.uniforms
    }

    pub fn store_uniform(&mut self, name: &str, value: UniformValue) {
        self.uniforms.set(name, value);
    }
}

/// A compilable GPU program with a persistent uniform table.
///
/// Implementations keep the vertex stage across [`ShaderProgram::recompile`], which
/// rebuilds only the fragment stage, relinks and replays every stored uniform.
/// Compile or link failures are reported and logged but leave the program
/// not-ready rather than panicking; callers check [`ShaderProgram::is_ready`]
/// before drawing.
pub trait ShaderProgram {
    fn state(&self) -> &ProgramState;

    fn state_mut(&mut self) -> &mut ProgramState;

    /// Push one value to the compiled program. Called only when ready.
    fn upload_uniform(&mut self, name: &str, value: &UniformValue);

    fn compile_vertex_shader(&mut self) -> Result<(), ShaderError>;

    fn compile_fragment_shader(&mut self) -> Result<(), ShaderError>;

    fn link(&mut self) -> Result<(), ShaderError>;

    fn is_ready(&self) -> bool;

    /// Whether a compiled vertex stage exists for `recompile` to reuse.
    fn has_vertex_stage(&self) -> bool;

    /// Store `value` and push it to the program if one is linked.
    fn set_uniform(&mut self, name: &str, value: UniformValue) {
        if self.is_ready() {
            self.upload_uniform(name, &value);
        } else {
            log::debug!("uniform '{}' stored while no program is linked", name);
        }
        self.state_mut().store_uniform(name, value);
    }

    fn uniform(&self, name: &str) -> Option<&UniformValue> {
        self.state().uniforms().get(name)
    }

    fn uniforms(&self) -> &UniformTable {
        self.state().uniforms()
    }

    fn define(&mut self, name: &str, value: &str) {
        self.state_mut().define(name, value);
    }

    fn get_define(&self, name: &str) -> Option<&str> {
        self.state().get_define(name)
    }

    fn needs_recompile(&self) -> bool {
        self.state().is_dirty()
    }

    /// Rebuild the fragment stage with the current defines, relink and replay uniforms.
    fn recompile(&mut self) -> Result<(), ShaderError> {
        let result = self.compile_fragment_shader().and_then(|_| self.link());
        if let Err(e) = &result {
            log::error!("shader recompile failed: {}", e);
            return result;
        }

        let replay: Vec<(String, UniformValue)> = self
            .state()
            .uniforms()
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect();
        for (name, value) in &replay {
            self.upload_uniform(name, value);
        }
        self.state_mut().mark_clean();
        log::debug!("shader recompiled, {} uniforms replayed", replay.len());
        Ok(())
    }

    /// Full build: vertex, fragment, link.
    fn build(&mut self) -> Result<(), ShaderError> {
        self.compile_vertex_shader()?;
        self.recompile()
    }
}
