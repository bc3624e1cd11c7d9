//! Reads PERMAS-HDF storage into typed records.
//!
//! Layout: `/<component>/<situation>/.Model` holds the model as keyword
//! lines, `.Analysis` the analysis type, and one group per result variable
//! sits next to them. Names starting with `.` are metadata. Only the first
//! component and its first situation are converted.

mod model;
mod results;

use log::{info, warn};
use pvmap_store::{Storage, join_path};

use crate::error::{ConvertError, Result};
use crate::report::{Condition, ConversionReport};

pub use model::{
    DecodedModel, ElementRecord, RecordError, coor_records, decode_deck, decode_model,
    element_records, id_records, nodal_diameter, rsys_records, surface_records,
};
pub use results::decode_results;

pub const MODEL_DATASET: &str = ".Model";
pub const ANALYSIS_DATASET: &str = ".Analysis";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Situation {
    pub component: String,
    pub name: String,
    pub path: String,
}

/// Finds the situation to convert, reporting every other one as skipped.
pub fn locate_situation<S: Storage>(store: &S, report: &mut ConversionReport) -> Result<Situation> {
    let components = visible_children(store, "/")?;
    let Some((first, rest)) = components.split_first() else {
        return Err(ConvertError::MissingBlock("no component in source file".to_string()));
    };
    for other in rest {
        warn!("only one component is converted, skipping {other}");
        report.record(Condition::SkippedSource {
            path: format!("/{other}"),
        });
    }

    let component_path = format!("/{first}");
    let situations = visible_children(store, &component_path)?;
    let Some((situation, rest)) = situations.split_first() else {
        return Err(ConvertError::MissingBlock(format!(
            "no situation in component {first}"
        )));
    };
    for other in rest {
        warn!("only one situation is converted, skipping {other}");
        report.record(Condition::SkippedSource {
            path: join_path(&component_path, other),
        });
    }

    let path = join_path(&component_path, situation);
    info!("component {first}, situation {situation}");
    Ok(Situation {
        component: first.clone(),
        name: situation.clone(),
        path,
    })
}

/// Model text lines of a situation.
pub fn model_lines<'s, S: Storage>(store: &'s S, situation: &Situation) -> Result<&'s [String]> {
    let path = join_path(&situation.path, MODEL_DATASET);
    if !store.exists(&path) {
        return Err(ConvertError::MissingBlock(format!("{path} not found")));
    }
    store
        .dataset(&path)?
        .data
        .as_text()
        .ok_or_else(|| ConvertError::Malformed(format!("{path} is not a text dataset")))
}

/// Child groups that are not metadata entries.
pub(crate) fn visible_children<S: Storage>(store: &S, path: &str) -> Result<Vec<String>> {
    Ok(store
        .children(path)?
        .into_iter()
        .filter(|name| !name.starts_with('.') && store.is_group(&join_path(path, name)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pvmap_store::{DataBuffer, Dataset, StorageMut, TreeFile};

    fn text(lines: &[&str]) -> Dataset {
        Dataset::vector(DataBuffer::Text(lines.iter().map(|l| l.to_string()).collect()))
    }

    #[test]
    fn picks_first_component_and_situation() {
        let mut store = TreeFile::new();
        store
            .write_dataset("/.File Header", text(&["PERMAS"]))
            .expect("header");
        store
            .write_dataset("/KOMP/SIT1/.Model", text(&["$COOR"]))
            .expect("model");
        store.create_group("/KOMP/SIT2").expect("situation");
        store.create_group("/OTHER/SIT1").expect("component");

        let mut report = ConversionReport::new();
        let situation = locate_situation(&store, &mut report).expect("locate");
        assert_eq!(situation.path, "/KOMP/SIT1");
        assert_eq!(report.count("SkippedSource"), 2);
        assert_eq!(model_lines(&store, &situation).expect("lines").len(), 1);
    }

    #[test]
    fn empty_file_is_fatal() {
        let store = TreeFile::new();
        let mut report = ConversionReport::new();
        let err = locate_situation(&store, &mut report).expect_err("no component");
        assert!(matches!(err, ConvertError::MissingBlock(_)));
    }

    #[test]
    fn missing_model_is_fatal() {
        let mut store = TreeFile::new();
        store.create_group("/KOMP/SIT1").expect("situation");
        let mut report = ConversionReport::new();
        let situation = locate_situation(&store, &mut report).expect("locate");
        let err = model_lines(&store, &situation).expect_err("no model");
        assert!(matches!(err, ConvertError::MissingBlock(_)));
    }
}
