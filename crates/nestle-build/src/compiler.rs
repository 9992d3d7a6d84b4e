//! Compiler adapter
//!
//! Wraps an external [`CompilerService`]. Every explicitly named unit is
//! registered empty before the service runs; the service writes output
//! through a [`UnitSink`], which also captures units nobody asked for
//! (nested or synthetic declarations). Afterwards every named unit must
//! have produced bytes.

use crate::artifact::SourceUnit;
use crate::error::{BuildError, BuildResult};
use nestle_runtime::layout::unit_entry_name;
use std::collections::HashMap;
use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Options handed to the compiler service
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileOptions {
    /// Platform path list of everything the units may refer to
    pub classpath: Option<OsString>,
}

impl CompileOptions {
    /// Command-line style option list
    pub fn to_args(&self) -> Vec<OsString> {
        match &self.classpath {
            Some(classpath) => vec![OsString::from("-classpath"), classpath.clone()],
            None => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileOutcome {
    pub success: bool,
    pub diagnostics: Vec<String>,
}

impl CompileOutcome {
    pub fn success() -> Self {
        Self {
            success: true,
            diagnostics: Vec::new(),
        }
    }

    pub fn failure(diagnostics: Vec<String>) -> Self {
        Self {
            success: false,
            diagnostics,
        }
    }
}

/// Output redirection: where the bytes of a unit go
pub trait UnitSink {
    fn open_unit(&mut self, qualified_name: &str) -> &mut dyn Write;
}

pub trait CompilerService {
    fn compile(
        &self,
        units: &[SourceUnit],
        options: &CompileOptions,
        sink: &mut dyn UnitSink,
    ) -> CompileOutcome;
}

/// Compiled units in registration order
#[derive(Debug, Default)]
pub struct CompiledUnits {
    units: Vec<(String, Vec<u8>)>,
    index: HashMap<String, usize>,
    explicit: usize,
}

impl CompiledUnits {
    fn with_explicit(units: &[SourceUnit]) -> Self {
        let mut compiled = Self::default();
        for unit in units {
            compiled.register(&unit.qualified_name);
        }
        compiled.explicit = compiled.units.len();
        compiled
    }

    fn register(&mut self, qualified_name: &str) -> usize {
        if let Some(&slot) = self.index.get(qualified_name) {
            return slot;
        }
        let slot = self.units.len();
        self.units.push((qualified_name.to_string(), Vec::new()));
        self.index.insert(qualified_name.to_string(), slot);
        slot
    }

    pub fn get(&self, qualified_name: &str) -> Option<&[u8]> {
        self.index
            .get(qualified_name)
            .map(|&slot| self.units[slot].1.as_slice())
    }

    /// Unit names: explicit ones in caller order, then discovered ones
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.units.iter().map(|(name, _)| name.as_str())
    }

    /// Units the caller did not name
    pub fn synthetic_names(&self) -> impl Iterator<Item = &str> {
        self.units[self.explicit..].iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Write every unit below `root`; returns the written paths in order
    pub fn write_to_disk(&self, root: &Path) -> BuildResult<Vec<PathBuf>> {
        let mut written = Vec::with_capacity(self.units.len());
        for (name, bytes) in &self.units {
            let path = root.join(unit_entry_name(name));
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(|e| BuildError::io(parent, e))?;
            }
            fs::write(&path, bytes).map_err(|e| BuildError::io(&path, e))?;
            written.push(path);
        }
        debug!(root = %root.display(), units = written.len(), "wrote compiled units");
        Ok(written)
    }
}

impl UnitSink for CompiledUnits {
    fn open_unit(&mut self, qualified_name: &str) -> &mut dyn Write {
        let slot = self.register(qualified_name);
        &mut self.units[slot].1
    }
}

/// Compile `units` through `service`
pub fn compile(
    service: &dyn CompilerService,
    units: &[SourceUnit],
    options: &CompileOptions,
) -> BuildResult<CompiledUnits> {
    let mut compiled = CompiledUnits::with_explicit(units);
    let outcome = service.compile(units, options, &mut compiled);

    if !outcome.success {
        let unit = units
            .first()
            .map(|unit| unit.qualified_name.clone())
            .unwrap_or_default();
        return Err(BuildError::compilation(unit, outcome.diagnostics));
    }

    for unit in units {
        if compiled.get(&unit.qualified_name).map_or(true, <[u8]>::is_empty) {
            let mut diagnostics = outcome.diagnostics.clone();
            diagnostics.push("compiler produced no output for this unit".to_string());
            return Err(BuildError::compilation(&unit.qualified_name, diagnostics));
        }
    }

    debug!(
        explicit = units.len(),
        synthetic = compiled.synthetic_names().count(),
        "compiled units"
    );
    Ok(compiled)
}

/// Stores each unit's source text verbatim as its compiled bytes
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughCompiler;

impl CompilerService for PassthroughCompiler {
    fn compile(
        &self,
        units: &[SourceUnit],
        _options: &CompileOptions,
        sink: &mut dyn UnitSink,
    ) -> CompileOutcome {
        let mut diagnostics = Vec::new();
        for unit in units {
            if let Err(e) = sink
                .open_unit(&unit.qualified_name)
                .write_all(unit.source.as_bytes())
            {
                diagnostics.push(format!("{}: {}", unit.qualified_name, e));
            }
        }
        if diagnostics.is_empty() {
            CompileOutcome::success()
        } else {
            CompileOutcome::failure(diagnostics)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Emits every unit plus a synthetic `$Helper` unit for the first one
    struct WithSynthetic;

    impl CompilerService for WithSynthetic {
        fn compile(
            &self,
            units: &[SourceUnit],
            _options: &CompileOptions,
            sink: &mut dyn UnitSink,
        ) -> CompileOutcome {
            if let Some(first) = units.first() {
                let helper = format!("{}$Helper", first.qualified_name);
                let _ = sink.open_unit(&helper).write_all(b"helper");
            }
            for unit in units {
                let _ = sink.open_unit(&unit.qualified_name).write_all(unit.source.as_bytes());
            }
            CompileOutcome::success()
        }
    }

    struct Failing;

    impl CompilerService for Failing {
        fn compile(&self, _: &[SourceUnit], _: &CompileOptions, _: &mut dyn UnitSink) -> CompileOutcome {
            CompileOutcome::failure(vec!["A.java:1: error: ';' expected".to_string()])
        }
    }

    fn units() -> Vec<SourceUnit> {
        vec![SourceUnit::new("b.B", "bee"), SourceUnit::new("a.A", "ay")]
    }

    #[test]
    fn test_explicit_units_keep_caller_order() {
        let compiled = compile(&WithSynthetic, &units(), &CompileOptions::default()).unwrap();
        assert_eq!(compiled.names().collect::<Vec<_>>(), vec!["b.B", "a.A", "b.B$Helper"]);
        assert_eq!(compiled.synthetic_names().collect::<Vec<_>>(), vec!["b.B$Helper"]);
        assert_eq!(compiled.get("a.A"), Some(&b"ay"[..]));
    }

    #[test]
    fn test_empty_output_for_named_unit_fails() {
        let units = vec![SourceUnit::new("a.A", "ay"), SourceUnit::new("e.Empty", "")];
        let err = compile(&PassthroughCompiler, &units, &CompileOptions::default()).unwrap_err();
        assert!(matches!(err, BuildError::Compilation { unit, .. } if unit == "e.Empty"));
    }

    #[test]
    fn test_service_failure_carries_diagnostics() {
        let err = compile(&Failing, &units(), &CompileOptions::default()).unwrap_err();
        match err {
            BuildError::Compilation { diagnostics, .. } => {
                assert_eq!(diagnostics, vec!["A.java:1: error: ';' expected"])
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_write_to_disk_creates_directories() {
        let temp = tempfile::tempdir().unwrap();
        let compiled = compile(&WithSynthetic, &units(), &CompileOptions::default()).unwrap();
        let written = compiled.write_to_disk(temp.path()).unwrap();

        assert_eq!(
            written,
            vec![
                temp.path().join("b/B.class"),
                temp.path().join("a/A.class"),
                temp.path().join("b/B$Helper.class"),
            ]
        );
        assert_eq!(fs::read(temp.path().join("a/A.class")).unwrap(), b"ay");
    }

    #[test]
    fn test_classpath_option() {
        assert!(CompileOptions::default().to_args().is_empty());
        let options = CompileOptions {
            classpath: Some(OsString::from("/w/lib.jar")),
        };
        assert_eq!(options.to_args(), vec![OsString::from("-classpath"), OsString::from("/w/lib.jar")]);
    }
}
