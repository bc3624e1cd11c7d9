//! PERMAS-HDF to VMAP conversion, and VMAP back to PERMAS ASCII for models.
//!
//! The forward pipeline decodes the situation's model text and result
//! groups, rebuilds parts from element sets, maps types, materials,
//! coordinate systems and results, and assembles the part-scoped VMAP tree.
//! Recoverable problems are collected in a [`ConversionReport`]; fatal ones
//! end the run with a [`PipelineError`].

pub mod assembler;
pub mod associator;
pub mod config;
pub mod csys;
pub mod decoder;
pub mod error;
pub mod inverse;
pub mod layout;
pub mod mapper;
pub mod pipeline;
pub mod report;
pub mod result_mapper;

pub use associator::{PlacedSurfaceSet, SetPlacement, associate};
pub use config::{
    ConversionOptions, ConverterConfig, ELEMENT_VARIABLES, NODAL_VARIABLES, StepSelection,
    UnitSystem, VariableSelection,
};
pub use error::{ConvertError, Result};
pub use inverse::{read_vmap, write_permas_text};
pub use pipeline::{
    ForwardJob, PipelineError, RunState, convert_forward, convert_inverse, forward_in_memory,
    forward_output_path, inverse_output_path, inverse_to_text,
};
pub use report::{Condition, ConversionReport, ConversionStats, EntityKind, Severity};
