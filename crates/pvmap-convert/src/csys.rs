//! Coordinate system resolution.
//!
//! Cartesian systems are converted exactly to origin plus orthonormal basis.
//! Cylindrical systems get a best-effort basis (radial, tangential, axial)
//! and an advisory condition, since VMAP consumers may interpret them
//! differently.

use log::warn;
use pvmap_model::{CoordinateSystem, CsysKind};

use crate::layout::{COORDINATE_CARTESIAN, COORDINATE_CYLINDRICAL};
use crate::report::{Condition, ConversionReport};

const DEGENERATE: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq)]
pub struct CoordinateSystemRecord {
    pub identifier: i32,
    pub kind: CsysKind,
    pub origin: [f64; 3],
    /// Unit axis vectors, row per axis.
    pub axes: [[f64; 3]; 3],
}

impl CoordinateSystemRecord {
    pub fn vmap_type(&self) -> i64 {
        match self.kind {
            CsysKind::Cartesian => COORDINATE_CARTESIAN,
            CsysKind::Cylindrical => COORDINATE_CYLINDRICAL,
        }
    }
}

pub fn resolve_coordinate_systems(
    systems: &[CoordinateSystem],
    report: &mut ConversionReport,
) -> Vec<CoordinateSystemRecord> {
    let mut records = Vec::with_capacity(systems.len());
    for system in systems {
        let Some(axes) = basis(system) else {
            report.record(Condition::DegenerateCoordinateSystem { system: system.id });
            continue;
        };
        if system.kind == CsysKind::Cylindrical {
            warn!("RSYS {} is cylindrical, written as a best-effort basis", system.id);
            report.record(Condition::PartialCoordinateSystemSupport { system: system.id });
        }
        records.push(CoordinateSystemRecord {
            identifier: system.id,
            kind: system.kind,
            origin: system.origin,
            axes,
        });
    }
    records
}

/// Orthonormal basis from the two defining vectors. For cylindrical systems
/// `axis1` is the cylinder axis and `axis2` the radial reference direction.
fn basis(system: &CoordinateSystem) -> Option<[[f64; 3]; 3]> {
    match system.kind {
        CsysKind::Cartesian => {
            let x = normalize(system.axis1)?;
            let z = normalize(cross(x, system.axis2))?;
            Some([x, cross(z, x), z])
        }
        CsysKind::Cylindrical => {
            let axial = normalize(system.axis1)?;
            let tangential = normalize(cross(axial, system.axis2))?;
            Some([cross(tangential, axial), tangential, axial])
        }
    }
}

fn cross(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

fn normalize(v: [f64; 3]) -> Option<[f64; 3]> {
    let norm = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
    (norm > DEGENERATE).then(|| [v[0] / norm, v[1] / norm, v[2] / norm])
}
