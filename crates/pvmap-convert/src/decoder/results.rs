use std::borrow::Cow;

use log::{debug, info};
use pvmap_model::{AnalysisKind, FieldLocation, FieldValues, ResultCase, ResultVariable, StepSamples};
use pvmap_store::{DataBuffer, Dataset, Storage, join_path};

use super::{ANALYSIS_DATASET, Situation, visible_children};
use crate::config::{
    ConversionOptions, ELEMENT_VARIABLES, NODAL_VARIABLES, StepSelection, VariableSelection,
    same_step,
};
use crate::error::{ConvertError, Result};
use crate::report::{Condition, ConversionReport};

const COLUMN_DESCRIPTOR: &str = ".ColDes";
const ROW_DESCRIPTOR: &str = ".RowDes";

/// Reads the result groups of a situation. Float columns are borrowed from
/// the store at their stored width.
///
/// Returns `None` when the situation holds no result groups or no variable
/// is selected.
pub fn decode_results<'s, S: Storage>(
    store: &'s S,
    situation: &Situation,
    nodal_diameter: Option<i32>,
    options: &ConversionOptions,
    report: &mut ConversionReport,
) -> Result<Option<ResultCase<'s>>> {
    let groups = visible_children(store, &situation.path)?;
    if groups.is_empty() || options.variables == VariableSelection::None {
        return Ok(None);
    }

    let analysis = read_analysis(store, situation)?;
    info!("analysis {} -> {}", analysis.permas_name(), analysis.state_name());

    if let VariableSelection::Names(names) = &options.variables {
        for name in names {
            if !groups.iter().any(|g| g.eq_ignore_ascii_case(name)) {
                report.record(Condition::SkippedVariable {
                    variable: name.clone(),
                    reason: "not present in the result file".to_string(),
                });
            }
        }
    }

    let mut case = ResultCase {
        analysis,
        nodal_diameter: nodal_diameter.filter(|_| analysis.is_modal()),
        temporal_values: Vec::new(),
        variables: Vec::new(),
    };

    for name in &groups {
        let known = NODAL_VARIABLES.contains(&name.as_str()) || ELEMENT_VARIABLES.contains(&name.as_str());
        let wanted = match &options.variables {
            VariableSelection::All => known,
            selection => selection.accepts(name),
        };
        if !wanted {
            if !known {
                report.record(Condition::SkippedVariable {
                    variable: name.clone(),
                    reason: "not a known result variable".to_string(),
                });
            }
            continue;
        }
        let path = join_path(&situation.path, name);
        if let Some(variable) = decode_variable(store, &path, name, &options.steps, &mut case, report)? {
            case.variables.push(variable);
        }
    }

    if let StepSelection::Values(values) = &options.steps {
        for &value in values {
            if !case.temporal_values.iter().any(|&t| same_step(t, value)) {
                report.record(Condition::MissingStep { value });
            }
        }
    }

    info!(
        "{} result variable(s) over {} step(s)",
        case.variables.len(),
        case.temporal_values.len()
    );
    Ok(Some(case))
}

fn read_analysis<S: Storage>(store: &S, situation: &Situation) -> Result<AnalysisKind> {
    let path = join_path(&situation.path, ANALYSIS_DATASET);
    if !store.exists(&path) {
        return Err(ConvertError::MissingBlock(format!(
            "{path} not found but results are present"
        )));
    }
    let text = store
        .dataset(&path)?
        .data
        .as_text()
        .and_then(|lines| lines.first())
        .ok_or_else(|| ConvertError::Malformed(format!("{path} is not a text dataset")))?;
    AnalysisKind::from_permas(text).ok_or_else(|| ConvertError::UnknownAnalysis(text.trim().to_string()))
}

fn decode_variable<'s, S: Storage>(
    store: &'s S,
    path: &str,
    name: &str,
    steps: &StepSelection,
    case: &mut ResultCase<'s>,
    report: &mut ConversionReport,
) -> Result<Option<ResultVariable<'s>>> {
    let coldes_path = join_path(path, COLUMN_DESCRIPTOR);
    let rowdes_path = join_path(path, ROW_DESCRIPTOR);
    if !store.exists(&coldes_path) || !store.exists(&rowdes_path) {
        report.record(Condition::SkippedVariable {
            variable: name.to_string(),
            reason: "no row or column descriptor".to_string(),
        });
        return Ok(None);
    }

    let columns = store
        .dataset(&coldes_path)?
        .data
        .to_f64()
        .ok_or_else(|| ConvertError::Malformed(format!("{coldes_path} is not numeric")))?;
    let ids = store
        .dataset(&rowdes_path)?
        .data
        .to_i64()
        .ok_or_else(|| ConvertError::Malformed(format!("{rowdes_path} is not an id list")))?
        .into_iter()
        .map(|id| {
            i32::try_from(id)
                .map_err(|_| ConvertError::Malformed(format!("{rowdes_path}: id {id} out of range")))
        })
        .collect::<Result<Vec<i32>>>()?;

    let first_variable = case.variables.is_empty();
    let mut components: Option<usize> = None;
    let mut samples = Vec::new();
    let mut accepted = 0usize;

    for (column, &value) in columns.iter().enumerate() {
        if !steps.accepts(value) {
            continue;
        }
        // Steps line up by position among accepted columns, which keeps
        // repeated frequencies of complex mode pairs apart.
        let step = match case.temporal_values.get(accepted) {
            Some(&known) if same_step(known, value) => accepted,
            Some(_) => {
                report.record(Condition::StepMismatch {
                    variable: name.to_string(),
                    value,
                });
                case.temporal_values.push(value);
                case.temporal_values.len() - 1
            }
            None => {
                if !first_variable {
                    report.record(Condition::StepMismatch {
                        variable: name.to_string(),
                        value,
                    });
                }
                case.temporal_values.push(value);
                case.temporal_values.len() - 1
            }
        };
        accepted += 1;

        let column_path = join_path(path, &format!("Column{}", column + 1));
        if !store.exists(&column_path) {
            return Err(ConvertError::Malformed(format!(
                "{column_path} missing for column descriptor {value}"
            )));
        }
        let dataset = store.dataset(&column_path)?;
        let width = column_width(dataset, ids.len(), &column_path)?;
        match components {
            Some(expected) if expected != width => {
                return Err(ConvertError::Malformed(format!(
                    "{column_path} has {width} components, previous columns {expected}"
                )));
            }
            _ => components = Some(width),
        }
        samples.push(StepSamples {
            step,
            values: field_values(&dataset.data, &column_path)?,
        });
    }

    debug!("{name}: {} rows, {} sample(s)", ids.len(), samples.len());
    Ok(Some(ResultVariable {
        name: name.to_string(),
        location: FieldLocation::of_variable(name),
        ids,
        components: components.unwrap_or(0),
        samples,
    }))
}

fn column_width(dataset: &Dataset, rows: usize, path: &str) -> Result<usize> {
    if !dataset.is_consistent() || dataset.rows() != rows {
        return Err(ConvertError::Malformed(format!(
            "{path}: shape {:?} does not match {rows} row ids",
            dataset.shape
        )));
    }
    Ok(dataset.columns())
}

fn field_values<'s>(data: &'s DataBuffer, path: &str) -> Result<FieldValues<'s>> {
    match data {
        DataBuffer::Float32(v) => Ok(FieldValues::F32(Cow::Borrowed(v.as_slice()))),
        DataBuffer::Float64(v) => Ok(FieldValues::F64(Cow::Borrowed(v.as_slice()))),
        other => other
            .to_f64()
            .map(|v| FieldValues::F64(Cow::Owned(v)))
            .ok_or_else(|| ConvertError::Malformed(format!("{path} is not numeric"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pvmap_store::{StorageMut, TreeFile};

    fn text(line: &str) -> Dataset {
        Dataset::vector(DataBuffer::Text(vec![line.to_string()]))
    }

    fn situation() -> Situation {
        Situation {
            component: "KOMP".to_string(),
            name: "SIT1".to_string(),
            path: "/KOMP/SIT1".to_string(),
        }
    }

    fn static_store() -> TreeFile {
        let mut store = TreeFile::new();
        store.write_dataset("/KOMP/SIT1/.Analysis", text("STATIC   ")).expect("analysis");
        store
            .write_dataset("/KOMP/SIT1/DISPLACEMENT/.ColDes", Dataset::vector(DataBuffer::Float64(vec![1.0, 2.0])))
            .expect("coldes");
        store
            .write_dataset("/KOMP/SIT1/DISPLACEMENT/.RowDes", Dataset::vector(DataBuffer::Int32(vec![1, 2])))
            .expect("rowdes");
        for c in 1..=2 {
            store
                .write_dataset(
                    &format!("/KOMP/SIT1/DISPLACEMENT/Column{c}"),
                    Dataset::matrix(2, 3, DataBuffer::Float32(vec![c as f32; 6])),
                )
                .expect("column");
        }
        store
    }

    #[test]
    fn reads_columns_at_native_width() {
        let store = static_store();
        let mut report = ConversionReport::new();
        let case = decode_results(&store, &situation(), None, &ConversionOptions::default(), &mut report)
            .expect("decode")
            .expect("case");
        assert_eq!(case.analysis, AnalysisKind::Static);
        assert_eq!(case.temporal_values, vec![1.0, 2.0]);
        let disp = &case.variables[0];
        assert_eq!(disp.ids, vec![1, 2]);
        assert_eq!(disp.components, 3);
        assert_eq!(disp.location, FieldLocation::Node);
        assert!(matches!(disp.samples[1].values, FieldValues::F32(Cow::Borrowed(_))));
        assert!(report.is_clean());
    }

    #[test]
    fn step_selection_filters_and_reports_missing_values() {
        let store = static_store();
        let mut report = ConversionReport::new();
        let options = ConversionOptions {
            steps: StepSelection::Values(vec![2.0, 7.0]),
            ..ConversionOptions::default()
        };
        let case = decode_results(&store, &situation(), None, &options, &mut report)
            .expect("decode")
            .expect("case");
        assert_eq!(case.temporal_values, vec![2.0]);
        assert_eq!(case.variables[0].samples.len(), 1);
        assert_eq!(report.of_kind("MissingStep").count(), 1);
    }

    #[test]
    fn requested_but_absent_variables_are_skipped() {
        let store = static_store();
        let mut report = ConversionReport::new();
        let options = ConversionOptions {
            variables: "DISPLACEMENT,TEMPERATURE".parse().expect("selection"),
            ..ConversionOptions::default()
        };
        let case = decode_results(&store, &situation(), None, &options, &mut report)
            .expect("decode")
            .expect("case");
        assert_eq!(case.variables.len(), 1);
        assert_eq!(report.count("SkippedVariable"), 1);
    }

    #[test]
    fn unknown_analysis_is_fatal() {
        let mut store = static_store();
        store.write_dataset("/KOMP/SIT1/.Analysis", text("BUCKLING")).expect("analysis");
        let mut report = ConversionReport::new();
        let err = decode_results(&store, &situation(), None, &ConversionOptions::default(), &mut report)
            .expect_err("unknown analysis");
        assert!(matches!(err, ConvertError::UnknownAnalysis(ref a) if a == "BUCKLING"));
    }

    #[test]
    fn row_count_mismatch_is_fatal() {
        let mut store = static_store();
        store
            .write_dataset(
                "/KOMP/SIT1/DISPLACEMENT/Column2",
                Dataset::matrix(1, 3, DataBuffer::Float32(vec![0.0; 3])),
            )
            .expect("column");
        let mut report = ConversionReport::new();
        let err = decode_results(&store, &situation(), None, &ConversionOptions::default(), &mut report)
            .expect_err("bad shape");
        assert!(matches!(err, ConvertError::Malformed(_)));
    }

    #[test]
    fn nodal_diameter_only_kept_for_vibration() {
        let store = static_store();
        let mut report = ConversionReport::new();
        let case = decode_results(&store, &situation(), Some(2), &ConversionOptions::default(), &mut report)
            .expect("decode")
            .expect("case");
        assert_eq!(case.nodal_diameter, None);
    }

    #[test]
    fn model_only_situation_has_no_case() {
        let mut store = TreeFile::new();
        store.write_dataset("/KOMP/SIT1/.Model", text("$FIN")).expect("model");
        let mut report = ConversionReport::new();
        let case = decode_results(&store, &situation(), None, &ConversionOptions::default(), &mut report)
            .expect("decode");
        assert!(case.is_none());
    }
}
