//! Run report: every recoverable or advisory condition met during a run.

use std::collections::BTreeMap;
use std::fmt::Write;

use log::{debug, warn};
use pvmap_model::ModelSummary;
use serde::Serialize;

/// How many subjects per kind `render` spells out.
const RENDER_LIMIT: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Severity {
    Recoverable,
    Advisory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EntityKind {
    Node,
    Element,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind")]
pub enum Condition {
    UnsupportedElementType {
        element: i32,
        code: String,
    },
    UnsupportedMaterialModel {
        material: String,
        reason: String,
    },
    OrphanNode {
        node: i32,
    },
    ConflictingPartAssignment {
        entity: EntityKind,
        id: i32,
        kept: String,
        rejected: String,
    },
    UnassignedElement {
        element: i32,
    },
    UnknownNodeReference {
        element: i32,
        node: i32,
    },
    UnknownSetMember {
        set: String,
        id: i32,
    },
    SkippedElementSet {
        set: String,
    },
    UnplacedSet {
        set: String,
    },
    MissingMaterial {
        part: String,
        elements: usize,
    },
    UnresolvedProperty {
        set: String,
        material: String,
    },
    UnknownCoordinateSystem {
        node: i32,
        system: i32,
    },
    DegenerateCoordinateSystem {
        system: i32,
    },
    MalformedRecord {
        block: String,
        line: usize,
        message: String,
    },
    DuplicateDefinition {
        entity: EntityKind,
        id: i32,
    },
    SkippedBlock {
        line: usize,
        message: String,
    },
    UnplacedResult {
        variable: String,
        entity: i32,
    },
    StepMismatch {
        variable: String,
        value: f64,
    },
    MissingStep {
        value: f64,
    },
    SkippedVariable {
        variable: String,
        reason: String,
    },
    SkippedSource {
        path: String,
    },
    OmittedFeature {
        feature: String,
        count: usize,
    },
    PartialCoordinateSystemSupport {
        system: i32,
    },
}

impl Condition {
    pub fn kind(&self) -> &'static str {
        match self {
            Condition::UnsupportedElementType { .. } => "UnsupportedElementType",
            Condition::UnsupportedMaterialModel { .. } => "UnsupportedMaterialModel",
            Condition::OrphanNode { .. } => "OrphanNode",
            Condition::ConflictingPartAssignment { .. } => "ConflictingPartAssignment",
            Condition::UnassignedElement { .. } => "UnassignedElement",
            Condition::UnknownNodeReference { .. } => "UnknownNodeReference",
            Condition::UnknownSetMember { .. } => "UnknownSetMember",
            Condition::SkippedElementSet { .. } => "SkippedElementSet",
            Condition::UnplacedSet { .. } => "UnplacedSet",
            Condition::MissingMaterial { .. } => "MissingMaterial",
            Condition::UnresolvedProperty { .. } => "UnresolvedProperty",
            Condition::UnknownCoordinateSystem { .. } => "UnknownCoordinateSystem",
            Condition::DegenerateCoordinateSystem { .. } => "DegenerateCoordinateSystem",
            Condition::MalformedRecord { .. } => "MalformedRecord",
            Condition::DuplicateDefinition { .. } => "DuplicateDefinition",
            Condition::SkippedBlock { .. } => "SkippedBlock",
            Condition::UnplacedResult { .. } => "UnplacedResult",
            Condition::StepMismatch { .. } => "StepMismatch",
            Condition::MissingStep { .. } => "MissingStep",
            Condition::SkippedVariable { .. } => "SkippedVariable",
            Condition::SkippedSource { .. } => "SkippedSource",
            Condition::OmittedFeature { .. } => "OmittedFeature",
            Condition::PartialCoordinateSystemSupport { .. } => "PartialCoordinateSystemSupport",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Condition::PartialCoordinateSystemSupport { .. }
            | Condition::SkippedSource { .. }
            | Condition::OmittedFeature { .. } => Severity::Advisory,
            _ => Severity::Recoverable,
        }
    }

    /// Identifier(s) the condition is about, as listed in the report.
    pub fn subject(&self) -> String {
        match self {
            Condition::UnsupportedElementType { element, code } => format!("{element} ({code})"),
            Condition::UnsupportedMaterialModel { material, reason } => {
                format!("{material} ({reason})")
            }
            Condition::OrphanNode { node } => node.to_string(),
            Condition::ConflictingPartAssignment {
                entity,
                id,
                kept,
                rejected,
            } => format!("{entity:?} {id}: {kept} / {rejected}"),
            Condition::UnassignedElement { element } => element.to_string(),
            Condition::UnknownNodeReference { element, node } => {
                format!("element {element} -> node {node}")
            }
            Condition::UnknownSetMember { set, id } => format!("{set}: {id}"),
            Condition::SkippedElementSet { set } | Condition::UnplacedSet { set } => set.clone(),
            Condition::MissingMaterial { part, elements } => {
                format!("{part} ({elements} elements)")
            }
            Condition::UnresolvedProperty { set, material } => format!("{set} -> {material}"),
            Condition::UnknownCoordinateSystem { node, system } => {
                format!("node {node} -> RSYS {system}")
            }
            Condition::DegenerateCoordinateSystem { system }
            | Condition::PartialCoordinateSystemSupport { system } => system.to_string(),
            Condition::MalformedRecord {
                block,
                line,
                message,
            } => format!("${block} line {line}: {message}"),
            Condition::DuplicateDefinition { entity, id } => format!("{entity:?} {id}"),
            Condition::SkippedBlock { line, message } => format!("line {line}: {message}"),
            Condition::UnplacedResult { variable, entity } => format!("{variable}: {entity}"),
            Condition::StepMismatch { variable, value } => format!("{variable} @ {value}"),
            Condition::MissingStep { value } => value.to_string(),
            Condition::SkippedVariable { variable, reason } => format!("{variable} ({reason})"),
            Condition::SkippedSource { path } => path.clone(),
            Condition::OmittedFeature { feature, count } => format!("{feature} ({count})"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConversionStats {
    pub parts: usize,
    pub nodes: usize,
    pub elements: usize,
    pub node_sets: usize,
    pub surface_sets: usize,
    pub materials: usize,
    pub coordinate_systems: usize,
    pub states: usize,
    pub variables: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KindSummary {
    pub severity: Severity,
    pub count: usize,
    pub subjects: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConversionReport {
    pub conditions: Vec<Condition>,
    pub stats: ConversionStats,
    pub source_summary: Option<ModelSummary>,
}

impl ConversionReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, condition: Condition) {
        match condition.severity() {
            Severity::Advisory => warn!("{}: {}", condition.kind(), condition.subject()),
            Severity::Recoverable => debug!("{}: {}", condition.kind(), condition.subject()),
        }
        self.conditions.push(condition);
    }

    pub fn count(&self, kind: &str) -> usize {
        self.conditions.iter().filter(|c| c.kind() == kind).count()
    }

    pub fn of_kind<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a Condition> + 'a {
        self.conditions.iter().filter(move |c| c.kind() == kind)
    }

    pub fn is_clean(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn by_kind(&self) -> BTreeMap<&'static str, KindSummary> {
        let mut kinds: BTreeMap<&'static str, KindSummary> = BTreeMap::new();
        for condition in &self.conditions {
            let entry = kinds.entry(condition.kind()).or_insert_with(|| KindSummary {
                severity: condition.severity(),
                count: 0,
                subjects: Vec::new(),
            });
            entry.count += 1;
            entry.subjects.push(condition.subject());
        }
        kinds
    }

    /// Logs one warning line per condition kind.
    pub fn log_summary(&self) {
        for (kind, summary) in self.by_kind() {
            warn!("{kind}: {} occurrence(s)", summary.count);
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let s = &self.stats;
        let _ = writeln!(
            out,
            "parts: {}  nodes: {}  elements: {}  materials: {}  coordinate systems: {}",
            s.parts, s.nodes, s.elements, s.materials, s.coordinate_systems
        );
        let _ = writeln!(
            out,
            "node sets: {}  surface sets: {}  states: {}  variables: {}",
            s.node_sets, s.surface_sets, s.states, s.variables
        );
        if self.conditions.is_empty() {
            out.push_str("no conditions reported\n");
            return out;
        }
        for (kind, summary) in self.by_kind() {
            let _ = writeln!(out, "{kind} [{:?}]: {}", summary.severity, summary.count);
            for subject in summary.subjects.iter().take(RENDER_LIMIT) {
                let _ = writeln!(out, "  {subject}");
            }
            if summary.count > RENDER_LIMIT {
                let _ = writeln!(out, "  ... {} more", summary.count - RENDER_LIMIT);
            }
        }
        out
    }
}
