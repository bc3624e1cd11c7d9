//! Analysis results as read from a PERMAS situation.

use std::borrow::Cow;

use serde::Serialize;

/// PERMAS analysis families that can be converted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AnalysisKind {
    Static,
    NonlinearMaterial,
    Temperature,
    NonlinearTemperature,
    TransientTemperature,
    TransientNonlinearTemperature,
    Vibration,
}

impl AnalysisKind {
    pub const ALL: [AnalysisKind; 7] = [
        AnalysisKind::Static,
        AnalysisKind::NonlinearMaterial,
        AnalysisKind::Temperature,
        AnalysisKind::NonlinearTemperature,
        AnalysisKind::TransientTemperature,
        AnalysisKind::TransientNonlinearTemperature,
        AnalysisKind::Vibration,
    ];

    pub fn permas_name(self) -> &'static str {
        match self {
            AnalysisKind::Static => "STATIC",
            AnalysisKind::NonlinearMaterial => "NLMATERIAL",
            AnalysisKind::Temperature => "TEMPERATURE",
            AnalysisKind::NonlinearTemperature => "NLTEMP",
            AnalysisKind::TransientTemperature => "DIRECT TEMPERATURE",
            AnalysisKind::TransientNonlinearTemperature => "DIRECT NLTEMP",
            AnalysisKind::Vibration => "VIBRATION ANALYSIS",
        }
    }

    /// VMAP state name for this analysis.
    pub fn state_name(self) -> &'static str {
        match self {
            AnalysisKind::Static | AnalysisKind::Temperature => "STATIC_LINEAR",
            AnalysisKind::NonlinearMaterial | AnalysisKind::NonlinearTemperature => {
                "STATIC_NONLINEAR"
            }
            AnalysisKind::TransientTemperature => "TRANSIENT_LINEAR",
            AnalysisKind::TransientNonlinearTemperature => "TRANSIENT_NONLINEAR",
            AnalysisKind::Vibration => "MODAL",
        }
    }

    /// Column descriptors hold frequencies instead of times.
    pub fn is_modal(self) -> bool {
        matches!(self, AnalysisKind::Vibration)
    }

    /// Matches the (possibly padded) `.Analysis` text by longest known prefix.
    pub fn from_permas(text: &str) -> Option<Self> {
        let text = text.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .filter(|kind| text.starts_with(kind.permas_name()))
            .max_by_key(|kind| kind.permas_name().len())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FieldLocation {
    Node,
    Element,
}

impl FieldLocation {
    /// Element results carry `ELEMENT` in their PERMAS variable name.
    pub fn of_variable(name: &str) -> Self {
        if name.to_ascii_uppercase().contains("ELEMENT") {
            FieldLocation::Element
        } else {
            FieldLocation::Node
        }
    }
}

/// Sample values at the width they were stored with. Borrowed straight from
/// the source storage where possible.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValues<'a> {
    F32(Cow<'a, [f32]>),
    F64(Cow<'a, [f64]>),
}

impl FieldValues<'_> {
    pub fn len(&self) -> usize {
        match self {
            FieldValues::F32(v) => v.len(),
            FieldValues::F64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Borrowed view of the same values.
    pub fn view(&self) -> FieldValues<'_> {
        match self {
            FieldValues::F32(v) => FieldValues::F32(Cow::Borrowed(&**v)),
            FieldValues::F64(v) => FieldValues::F64(Cow::Borrowed(&**v)),
        }
    }

    /// Copies the rows listed in `rows` (each `width` values wide).
    pub fn select_rows(&self, rows: &[usize], width: usize) -> FieldValues<'static> {
        fn pick<T: Copy>(src: &[T], rows: &[usize], width: usize) -> Vec<T> {
            let mut out = Vec::with_capacity(rows.len() * width);
            for &r in rows {
                out.extend_from_slice(&src[r * width..(r + 1) * width]);
            }
            out
        }
        match self {
            FieldValues::F32(v) => FieldValues::F32(Cow::Owned(pick(&**v, rows, width))),
            FieldValues::F64(v) => FieldValues::F64(Cow::Owned(pick(&**v, rows, width))),
        }
    }
}

/// Values of one variable at one step of the case.
#[derive(Debug, Clone, PartialEq)]
pub struct StepSamples<'a> {
    /// Position in `ResultCase::temporal_values`.
    pub step: usize,
    pub values: FieldValues<'a>,
}

/// One result variable over the steps of a case. `ids` is shared by every
/// step; each sample holds `ids.len() * components` values.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultVariable<'a> {
    pub name: String,
    pub location: FieldLocation,
    pub ids: Vec<i32>,
    pub components: usize,
    pub samples: Vec<StepSamples<'a>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultCase<'a> {
    pub analysis: AnalysisKind,
    /// `MNODDIA` of a cyclic-symmetry vibration analysis.
    pub nodal_diameter: Option<i32>,
    /// Time or frequency of each step, in source column order.
    pub temporal_values: Vec<f64>,
    pub variables: Vec<ResultVariable<'a>>,
}

impl ResultCase<'_> {
    pub fn is_nodal_diameter(&self) -> bool {
        self.analysis.is_modal() && self.nodal_diameter.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analysis_prefix_prefers_longest_match() {
        assert_eq!(
            AnalysisKind::from_permas("STATIC      "),
            Some(AnalysisKind::Static)
        );
        assert_eq!(
            AnalysisKind::from_permas("DIRECT NLTEMP"),
            Some(AnalysisKind::TransientNonlinearTemperature)
        );
        assert_eq!(
            AnalysisKind::from_permas("VIBRATION ANALYSIS  "),
            Some(AnalysisKind::Vibration)
        );
        assert_eq!(AnalysisKind::from_permas("BUCKLING"), None);
    }

    #[test]
    fn state_names_follow_analysis_family() {
        assert_eq!(AnalysisKind::NonlinearMaterial.state_name(), "STATIC_NONLINEAR");
        assert_eq!(AnalysisKind::TransientTemperature.state_name(), "TRANSIENT_LINEAR");
        assert!(AnalysisKind::Vibration.is_modal());
        assert!(!AnalysisKind::Static.is_modal());
    }

    #[test]
    fn element_variables_are_detected_by_name() {
        assert_eq!(FieldLocation::of_variable("ELEMENT STRESS"), FieldLocation::Element);
        assert_eq!(FieldLocation::of_variable("DISPLACEMENT"), FieldLocation::Node);
    }

    #[test]
    fn row_selection_keeps_width() {
        let raw = [1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0];
        let values = FieldValues::F32(Cow::Borrowed(&raw[..]));
        assert_eq!(
            values.select_rows(&[2, 0], 2),
            FieldValues::F32(Cow::Owned(vec![5.0, 6.0, 1.0, 2.0]))
        );
        assert_eq!(values.view().len(), 6);
    }
}
