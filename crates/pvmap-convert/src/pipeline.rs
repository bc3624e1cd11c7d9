//! Forward and inverse runs.
//!
//! A run moves `Decoding -> Associating -> Mapping -> Assembling -> Written`
//! and drops to `Failed` on the first fatal error. The target is built in
//! memory and only persisted once assembly succeeded, so a failed run never
//! leaves a partial output file.

use std::fmt::{self, Display, Formatter};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::{error, info};
use pvmap_store::{Storage, StorageMut, TreeFile};
use serde::Serialize;
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::assembler::{MappedModel, assemble};
use crate::associator::associate;
use crate::config::{ConversionOptions, ConverterConfig};
use crate::csys::resolve_coordinate_systems;
use crate::decoder::{DecodedModel, decode_model, decode_results, locate_situation, model_lines};
use crate::error::{ConvertError, Result};
use crate::inverse::{read_vmap, write_permas_text};
use crate::mapper::{assign_materials, map_materials};
use crate::report::ConversionReport;
use crate::result_mapper::ResultMapper;

pub const FORWARD_SUFFIX: &str = "_toVMAP.hdf";
pub const INVERSE_SUFFIX: &str = "_toPERMASASCII.dat";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunState {
    Decoding,
    Associating,
    Mapping,
    Assembling,
    Written,
    Failed,
}

impl Display for RunState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Decoding => "decoding",
            RunState::Associating => "associating",
            RunState::Mapping => "mapping",
            RunState::Assembling => "assembling",
            RunState::Written => "written",
            RunState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A fatal error, the stage that detected it and what was reported so far.
#[derive(Error, Debug)]
#[error("{stage} failed: {source}")]
pub struct PipelineError {
    pub stage: RunState,
    pub source: ConvertError,
    pub report: Box<ConversionReport>,
}

#[derive(Debug)]
struct Run {
    state: RunState,
}

impl Run {
    fn start() -> Self {
        info!("run state: {}", RunState::Decoding);
        Self {
            state: RunState::Decoding,
        }
    }

    fn advance(&mut self, next: RunState) {
        info!("run state: {} -> {next}", self.state);
        self.state = next;
    }

    fn check<T>(&mut self, result: Result<T>, report: &mut ConversionReport) -> std::result::Result<T, PipelineError> {
        result.map_err(|source| {
            let stage = self.state;
            error!("{stage} failed: {source}");
            self.state = RunState::Failed;
            PipelineError {
                stage,
                source,
                report: Box::new(std::mem::take(report)),
            }
        })
    }
}

/// Files of one forward conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardJob {
    pub model: PathBuf,
    /// Separate result file; results are read from `model` when absent.
    pub results: Option<PathBuf>,
    pub output: PathBuf,
}

impl ForwardJob {
    pub fn new(model: impl Into<PathBuf>, results: Option<PathBuf>) -> Self {
        let model = model.into();
        let output = forward_output_path(&model);
        Self {
            model,
            results,
            output,
        }
    }
}

pub fn forward_output_path(model: &Path) -> PathBuf {
    with_suffix(model, FORWARD_SUFFIX)
}

pub fn inverse_output_path(vmap: &Path) -> PathBuf {
    with_suffix(vmap, INVERSE_SUFFIX)
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{stem}{suffix}"))
}

/// PERMAS-HDF to VMAP into `target`, which is left untouched past the
/// first fatal error's stage.
pub fn forward_in_memory<S: Storage, T: StorageMut>(
    source: &S,
    results: Option<&S>,
    target: &mut T,
    config: &ConverterConfig,
    options: &ConversionOptions,
) -> std::result::Result<ConversionReport, PipelineError> {
    let mut run = Run::start();
    let mut report = ConversionReport::new();
    run_forward(&mut run, &mut report, source, results, target, config, options)?;
    run.advance(RunState::Written);
    report.log_summary();
    Ok(report)
}

fn run_forward<S: Storage, T: StorageMut>(
    run: &mut Run,
    report: &mut ConversionReport,
    source: &S,
    results: Option<&S>,
    target: &mut T,
    config: &ConverterConfig,
    options: &ConversionOptions,
) -> std::result::Result<(), PipelineError> {
    run.check(config.validate(), report)?;
    let situation = run.check(locate_situation(source, report), report)?;
    let lines = run.check(model_lines(source, &situation), report)?;
    let DecodedModel {
        mut registry,
        nodal_diameter,
        summary,
    } = run.check(decode_model(lines, report), report)?;
    report.source_summary = Some(summary);

    let case = match results {
        Some(store) => {
            let situation = run.check(locate_situation(store, report), report)?;
            run.check(decode_results(store, &situation, nodal_diameter, options, report), report)?
        }
        None => run.check(decode_results(source, &situation, nodal_diameter, options, report), report)?,
    };

    run.advance(RunState::Associating);
    let placement = run.check(associate(&mut registry, report), report)?;

    run.advance(RunState::Mapping);
    let materials = map_materials(&registry.materials, report);
    let element_materials = assign_materials(&registry, report);
    let coordinate_systems = resolve_coordinate_systems(&registry.coordinate_systems, report);
    let mapper = case
        .as_ref()
        .map(|case| ResultMapper::new(case, &registry, report));

    run.advance(RunState::Assembling);
    let model = MappedModel {
        registry: &registry,
        placement: &placement,
        materials: &materials,
        element_materials: &element_materials,
        coordinate_systems: &coordinate_systems,
    };
    run.check(assemble(target, &model, mapper.as_ref(), config, report), report)?;
    Ok(())
}

/// Reads the files of `job`, converts and persists the VMAP tree.
pub fn convert_forward(
    job: &ForwardJob,
    config: &ConverterConfig,
    options: &ConversionOptions,
) -> std::result::Result<ConversionReport, PipelineError> {
    let mut run = Run::start();
    let mut report = ConversionReport::new();
    info!("converting {} -> {}", job.model.display(), job.output.display());

    let source = run.check(TreeFile::open(&job.model).map_err(ConvertError::from), &mut report)?;
    let results = match &job.results {
        Some(path) => Some(run.check(TreeFile::open(path).map_err(ConvertError::from), &mut report)?),
        None => None,
    };
    let mut target = TreeFile::new();
    run_forward(
        &mut run,
        &mut report,
        &source,
        results.as_ref(),
        &mut target,
        config,
        options,
    )?;
    run.check(target.save(&job.output).map_err(ConvertError::from), &mut report)?;
    run.advance(RunState::Written);
    report.log_summary();
    Ok(report)
}

/// VMAP to PERMAS ASCII text.
pub fn inverse_to_text<S: Storage>(
    store: &S,
    config: &ConverterConfig,
) -> std::result::Result<(String, ConversionReport), PipelineError> {
    let mut run = Run::start();
    let mut report = ConversionReport::new();
    run.check(config.validate(), &mut report)?;
    let registry = run.check(read_vmap(store, &mut report), &mut report)?;
    run.advance(RunState::Assembling);
    let text = write_permas_text(&registry, config);
    run.advance(RunState::Written);
    report.log_summary();
    Ok((text, report))
}

pub fn convert_inverse(
    input: &Path,
    output: &Path,
    config: &ConverterConfig,
) -> std::result::Result<ConversionReport, PipelineError> {
    info!("converting {} -> {}", input.display(), output.display());
    let store = TreeFile::open(input).map_err(|e| PipelineError {
        stage: RunState::Decoding,
        source: e.into(),
        report: Box::default(),
    })?;
    let (text, mut report) = inverse_to_text(&store, config)?;
    if let Err(source) = write_atomic(output, text.as_bytes()) {
        error!("{} failed: {source}", RunState::Assembling);
        return Err(PipelineError {
            stage: RunState::Assembling,
            source,
            report: Box::new(std::mem::take(&mut report)),
        });
    }
    Ok(report)
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)?;
    Ok(())
}
