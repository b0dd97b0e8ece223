use crate::error::DmResult;
use crate::graph::GroupId;
use crate::params::{FileKind, ParamTable, ParamValues};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;
use strum::IntoEnumIterator;

/// Capability of applying named parameter overrides to one kind of
/// simulator input file. The registry dispatches on file kind, so adding
/// a simulator-specific fixed-width writer later is a registration, not a
/// branch.
pub trait ApplyOverrides: Send + Sync {
    fn apply(
        &self,
        working_dir: &Path,
        tag: &str,
        kind: FileKind,
        overrides: &[(String, f64)],
    ) -> DmResult<()>;
}

/// Default updater: writes one plain-text override file per group and
/// file kind into the working directory. The simulator-side translation
/// of overrides into its proprietary input formats happens outside this
/// tool.
pub struct OverrideFileWriter;

impl ApplyOverrides for OverrideFileWriter {
    fn apply(
        &self,
        working_dir: &Path,
        tag: &str,
        kind: FileKind,
        overrides: &[(String, f64)],
    ) -> DmResult<()> {
        let name = format!("dmpot_{}_{}.ovr", tag, kind_slug(kind));
        let mut file = fs::File::create(working_dir.join(name))?;
        for (symbol, value) in overrides {
            writeln!(file, "{} = {:.6}", symbol, value)?;
        }
        file.flush()?;
        Ok(())
    }
}

fn kind_slug(kind: FileKind) -> &'static str {
    match kind {
        FileKind::Basin => "bsn",
        FileKind::Crop => "crop",
        FileKind::WaterQuality => "wwq",
        FileKind::Subarea => "sub",
        FileKind::Routing => "rte",
        FileKind::StreamQuality => "swq",
        FileKind::Reservoir => "res",
        FileKind::Groundwater => "gw",
        FileKind::ResponseUnit => "hru",
        FileKind::Management => "mgt",
        FileKind::Soil => "sol",
        FileKind::SoilChemistry => "chm",
    }
}

/// Registry mapping file kind to its override updater.
pub struct UpdateRegistry {
    handlers: BTreeMap<FileKind, Box<dyn ApplyOverrides>>,
}

impl std::fmt::Debug for UpdateRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateRegistry")
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl UpdateRegistry {
    /// Registry with the plain-text writer handling every file kind.
    pub fn with_default_writer() -> Self {
        let mut handlers: BTreeMap<FileKind, Box<dyn ApplyOverrides>> = BTreeMap::new();
        for kind in FileKind::iter() {
            handlers.insert(kind, Box::new(OverrideFileWriter));
        }
        Self { handlers }
    }

    pub fn register(&mut self, kind: FileKind, handler: Box<dyn ApplyOverrides>) {
        self.handlers.insert(kind, handler);
    }

    /// Applies one group's candidate values, batched per file kind.
    /// Groups write disjoint files, so calls for different groups are
    /// safe to run in parallel.
    pub fn apply_group(
        &self,
        working_dir: &Path,
        group: GroupId,
        table: &ParamTable,
        values: &ParamValues,
    ) -> DmResult<()> {
        self.apply_tagged(working_dir, &group.to_string(), table, values)
    }

    /// Applies the basin-level candidate values (shared by all groups).
    pub fn apply_basin(
        &self,
        working_dir: &Path,
        table: &ParamTable,
        values: &ParamValues,
    ) -> DmResult<()> {
        self.apply_tagged(working_dir, "Bsn", table, values)
    }

    fn apply_tagged(
        &self,
        working_dir: &Path,
        tag: &str,
        table: &ParamTable,
        values: &ParamValues,
    ) -> DmResult<()> {
        let mut batches: BTreeMap<FileKind, Vec<(String, f64)>> = BTreeMap::new();
        for (i, def) in table.defs().iter().enumerate() {
            batches
                .entry(def.file_kind)
                .or_default()
                .push((def.symbol.clone(), values.test[i]));
        }
        for (kind, overrides) in batches {
            if let Some(handler) = self.handlers.get(&kind) {
                handler.apply(working_dir, tag, kind, &overrides)?;
            }
        }
        Ok(())
    }
}
