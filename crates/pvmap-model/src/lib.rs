//! In-memory model for one PERMAS ⇄ VMAP conversion run.

pub mod entities;
pub mod index;
pub mod registry;
pub mod results;
pub mod summary;

pub use entities::{
    CoordinateSystem, CsysKind, Element, ElementKind, ElementProperty, ElementSet, Material, Node,
    NodeSet, Part, PartId, Surface, SurfaceSet,
};
pub use index::IdIndex;
pub use registry::{EntityRegistry, RegistryError};
pub use results::{
    AnalysisKind, FieldLocation, FieldValues, ResultCase, ResultVariable, StepSamples,
};
pub use summary::ModelSummary;
