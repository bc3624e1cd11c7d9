//! Maps a decoded result case to per-state, per-part VMAP variable records.
//!
//! Row-to-part partitions are computed once per variable and reused for
//! every state, so unplaced rows are reported once.

use pvmap_model::{
    AnalysisKind, EntityRegistry, FieldLocation, FieldValues, PartId, ResultCase, ResultVariable,
};

use crate::report::{Condition, ConversionReport};

/// Relative tolerance under which two consecutive mode frequencies form a
/// complex pair.
const PAIR_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeEntity {
    Real = 1,
    Imaginary = 2,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StateRecord {
    pub index: usize,
    pub analysis: AnalysisKind,
    /// Time or frequency.
    pub value: f64,
    pub nodal_diameter: Option<i32>,
    pub entity: ModeEntity,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableRecord<'m> {
    pub part: PartId,
    pub name: &'m str,
    pub identifier: i32,
    pub location: FieldLocation,
    pub components: usize,
    /// Present only when the record does not cover the whole part in order.
    pub geometry_ids: Option<&'m [i32]>,
    pub values: FieldValues<'m>,
    pub unit: i32,
}

struct PartRows {
    part: PartId,
    rows: Vec<usize>,
    ids: Vec<i32>,
    complete: bool,
}

struct Partition {
    parts: Vec<PartRows>,
    /// All rows belong to one part in part order.
    whole: bool,
}

pub struct ResultMapper<'c, 'a> {
    case: &'c ResultCase<'a>,
    partitions: Vec<Partition>,
    entities: Vec<ModeEntity>,
}

impl<'c, 'a> ResultMapper<'c, 'a> {
    pub fn new(case: &'c ResultCase<'a>, registry: &EntityRegistry, report: &mut ConversionReport) -> Self {
        let partitions = case
            .variables
            .iter()
            .map(|variable| partition(variable, registry, report))
            .collect();
        let entities = if case.is_nodal_diameter() {
            mode_entities(&case.temporal_values)
        } else {
            vec![ModeEntity::Real; case.temporal_values.len()]
        };
        Self {
            case,
            partitions,
            entities,
        }
    }

    pub fn state_count(&self) -> usize {
        self.case.temporal_values.len()
    }

    pub fn state(&self, index: usize) -> StateRecord {
        StateRecord {
            index,
            analysis: self.case.analysis,
            value: self.case.temporal_values[index],
            nodal_diameter: self.case.nodal_diameter,
            entity: self.entities[index],
        }
    }

    pub fn states(&self) -> impl Iterator<Item = StateRecord> + '_ {
        (0..self.state_count()).map(|index| self.state(index))
    }

    pub fn variable_count(&self) -> usize {
        self.case.variables.len()
    }

    /// Variable records of one state, lazily, one per variable and part.
    pub fn records(&self, state: usize) -> impl Iterator<Item = VariableRecord<'_>> + '_ {
        self.case
            .variables
            .iter()
            .zip(&self.partitions)
            .enumerate()
            .filter_map(move |(index, (variable, partition))| {
                let samples = variable.samples.iter().find(|s| s.step == state)?;
                Some((index, variable, partition, samples))
            })
            .flat_map(move |(index, variable, partition, samples)| {
                partition.parts.iter().map(move |rows| VariableRecord {
                    part: rows.part,
                    name: &variable.name,
                    identifier: index as i32,
                    location: variable.location,
                    components: variable.components,
                    geometry_ids: (!rows.complete).then_some(rows.ids.as_slice()),
                    values: if partition.whole {
                        samples.values.view()
                    } else {
                        samples.values.select_rows(&rows.rows, variable.components)
                    },
                    unit: unit_identifier(&variable.name),
                })
            })
    }
}

fn partition(variable: &ResultVariable<'_>, registry: &EntityRegistry, report: &mut ConversionReport) -> Partition {
    let mut parts: Vec<PartRows> = Vec::new();
    for (row, &id) in variable.ids.iter().enumerate() {
        let owner = match variable.location {
            FieldLocation::Node => registry.node(id).and_then(|n| n.part),
            FieldLocation::Element => registry.element(id).and_then(|e| e.part),
        };
        let Some(owner) = owner else {
            report.record(Condition::UnplacedResult {
                variable: variable.name.clone(),
                entity: id,
            });
            continue;
        };
        match parts.iter_mut().find(|p| p.part == owner) {
            Some(slice) => {
                slice.rows.push(row);
                slice.ids.push(id);
            }
            None => parts.push(PartRows {
                part: owner,
                rows: vec![row],
                ids: vec![id],
                complete: false,
            }),
        }
    }

    parts.sort_by_key(|p| p.part);
    for slice in &mut parts {
        let part = &registry.parts[slice.part as usize];
        let members = match variable.location {
            FieldLocation::Node => &part.nodes,
            FieldLocation::Element => &part.elements,
        };
        slice.complete = slice.ids == *members;
    }
    let whole = parts.len() == 1 && parts[0].rows.len() == variable.ids.len();
    Partition { parts, whole }
}

/// Real/imaginary tag per mode: a mode repeating the previous mode's
/// frequency is imaginary, every other mode is real.
fn mode_entities(frequencies: &[f64]) -> Vec<ModeEntity> {
    frequencies
        .iter()
        .enumerate()
        .map(|(i, &f)| {
            let repeated = i > 0 && (f - frequencies[i - 1]).abs() <= PAIR_TOLERANCE * f.abs();
            if repeated {
                ModeEntity::Imaginary
            } else {
                ModeEntity::Real
            }
        })
        .collect()
}

/// Unit identifier in the written unit system (base units 1-7, derived
/// 8-12, 0 dimensionless).
pub fn unit_identifier(variable: &str) -> i32 {
    match variable {
        "DISPLACEMENT" | "GAP WIDTH" => 1,
        "TEMPERATURE" => 5,
        v if v.contains("STRESS") => 10,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pvmap_model::StepSamples;
    use std::borrow::Cow;

    fn registry() -> EntityRegistry {
        use pvmap_model::{Element, ElementKind, Node};
        let mut reg = EntityRegistry::new();
        for i in 1..=12 {
            reg.insert_node(Node::new(i, [0.0; 3])).expect("node");
        }
        reg.insert_element(Element::new(1, ElementKind::Hexe8, (1..=8).collect()))
            .expect("e1");
        reg.insert_element(Element::new(2, ElementKind::Hexe8, (5..=12).collect()))
            .expect("e2");
        reg.element_sets = vec![
            pvmap_model::ElementSet {
                name: "LOWER".to_string(),
                elements: vec![1],
            },
            pvmap_model::ElementSet {
                name: "UPPER".to_string(),
                elements: vec![2],
            },
        ];
        let mut report = ConversionReport::new();
        crate::associator::associate(&mut reg, &mut report).expect("associate");
        reg
    }

    fn case(values: &[f64]) -> ResultCase<'_> {
        ResultCase {
            analysis: AnalysisKind::Static,
            nodal_diameter: None,
            temporal_values: vec![1.0],
            variables: vec![ResultVariable {
                name: "TEMPERATURE".to_string(),
                location: FieldLocation::Node,
                ids: (1..=values.len() as i32).collect(),
                components: 1,
                samples: vec![StepSamples {
                    step: 0,
                    values: FieldValues::F64(Cow::Borrowed(values)),
                }],
            }],
        }
    }

    #[test]
    fn rows_are_split_per_part() {
        let reg = registry();
        let values: Vec<f64> = (1..=12).map(f64::from).collect();
        let case = case(&values);
        let mut report = ConversionReport::new();
        let mapper = ResultMapper::new(&case, &reg, &mut report);
        let records: Vec<_> = mapper.records(0).collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].geometry_ids, None);
        assert_eq!(records[0].values.len(), 8);
        assert_eq!(records[1].part, 1);
        assert_eq!(
            records[1].values,
            FieldValues::F64(Cow::Owned(vec![9.0, 10.0, 11.0, 12.0]))
        );
        assert_eq!(records[1].unit, 5);
        assert!(report.is_clean());
    }

    #[test]
    fn partial_coverage_carries_geometry_ids() {
        let reg = registry();
        let values = [1.0, 2.0, 3.0];
        let case = case(&values);
        let mut report = ConversionReport::new();
        let mapper = ResultMapper::new(&case, &reg, &mut report);
        let records: Vec<_> = mapper.records(0).collect();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].geometry_ids, Some(&[1, 2, 3][..]));
        assert!(matches!(records[0].values, FieldValues::F64(Cow::Borrowed(_))));
    }

    #[test]
    fn unplaced_rows_are_reported_once() {
        let reg = registry();
        let values = [0.5; 13];
        let case = case(&values);
        let mut report = ConversionReport::new();
        let mapper = ResultMapper::new(&case, &reg, &mut report);
        let _ = mapper.records(0).count();
        let _ = mapper.records(0).count();
        assert_eq!(report.count("UnplacedResult"), 1);
    }

    #[test]
    fn repeated_frequencies_form_complex_pairs() {
        let entities = mode_entities(&[10.0, 10.0, 25.0, 25.000001, 40.0]);
        assert_eq!(
            entities,
            vec![
                ModeEntity::Real,
                ModeEntity::Imaginary,
                ModeEntity::Real,
                ModeEntity::Imaginary,
                ModeEntity::Real
            ]
        );
    }

    #[test]
    fn degenerate_modes_after_the_first_are_imaginary() {
        use ModeEntity::{Imaginary, Real};
        assert_eq!(
            mode_entities(&[10.0, 10.0, 10.0, 10.0]),
            vec![Real, Imaginary, Imaginary, Imaginary]
        );
        assert_eq!(
            mode_entities(&[5.0, 10.0, 10.0, 10.0, 12.0]),
            vec![Real, Real, Imaginary, Imaginary, Real]
        );
    }

    #[test]
    fn static_states_are_real() {
        let reg = registry();
        let values = [0.0; 12];
        let case = case(&values);
        let mut report = ConversionReport::new();
        let mapper = ResultMapper::new(&case, &reg, &mut report);
        let state = mapper.state(0);
        assert_eq!(state.entity, ModeEntity::Real);
        assert_eq!(state.nodal_diameter, None);
        assert_eq!(mapper.states().count(), 1);
    }
}
