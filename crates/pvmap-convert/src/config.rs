//! Converter configuration and per-run options.
//!
//! `ConverterConfig` is resolved once by the caller (file, environment,
//! defaults) and passed into the pipeline; nothing below reads the
//! environment.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ConvertError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    /// Installation directory of the VMAP library the output targets.
    pub library_location: Option<PathBuf>,
    pub exporter_name: String,
    pub vmap_version: String,
    pub units: UnitSystem,
    /// `MYCOORDINATESYSTEM` written on result variables.
    pub result_coordinate_system: i32,
    /// Ids per data row in emitted PERMAS set blocks.
    pub ids_per_row: usize,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            library_location: None,
            exporter_name: "Permashdf2Vmap".to_string(),
            vmap_version: "0.5".to_string(),
            units: UnitSystem::default(),
            result_coordinate_system: 1,
            ids_per_row: 14,
        }
    }
}

impl ConverterConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        let config: ConverterConfig = serde_json::from_slice(&bytes)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_library_location(mut self, location: impl Into<PathBuf>) -> Self {
        self.library_location = Some(location.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.ids_per_row == 0 {
            return Err(ConvertError::Config("ids_per_row must be positive".to_string()));
        }
        if let Some(location) = &self.library_location
            && location.as_os_str().is_empty()
        {
            return Err(ConvertError::Config(
                "library_location must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseUnit {
    pub symbol: String,
    pub si_scale: f64,
}

impl BaseUnit {
    fn new(symbol: &str, si_scale: f64) -> Self {
        Self {
            symbol: symbol.to_string(),
            si_scale,
        }
    }
}

/// Derived unit as exponents of (length, mass, time, current, temperature,
/// amount of substance, luminous intensity).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedUnit {
    pub identifier: i32,
    pub symbol: String,
    pub dimension: [i32; 7],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitSystem {
    pub length: BaseUnit,
    pub mass: BaseUnit,
    pub time: BaseUnit,
    pub current: BaseUnit,
    pub temperature: BaseUnit,
    pub amount_of_substance: BaseUnit,
    pub luminous_intensity: BaseUnit,
    pub derived: Vec<DerivedUnit>,
}

impl Default for UnitSystem {
    /// mm-t-s, the usual PERMAS model units.
    fn default() -> Self {
        let derived = [
            (8, "N", [1, 1, -2, 0, 0, 0, 0]),
            (9, "mm^2", [2, 0, 0, 0, 0, 0, 0]),
            (10, "MPa", [-1, 1, -2, 0, 0, 0, 0]),
            (11, "mJ", [2, 1, -2, 0, 0, 0, 0]),
            (12, "mW", [2, 1, -3, 0, 0, 0, 0]),
        ]
        .into_iter()
        .map(|(identifier, symbol, dimension)| DerivedUnit {
            identifier,
            symbol: symbol.to_string(),
            dimension,
        })
        .collect();

        Self {
            length: BaseUnit::new("mm", 0.001),
            mass: BaseUnit::new("t", 1000.0),
            time: BaseUnit::new("s", 1.0),
            current: BaseUnit::new("A", 1.0),
            temperature: BaseUnit::new("K", 1.0),
            amount_of_substance: BaseUnit::new("mol", 1.0),
            luminous_intensity: BaseUnit::new("cd", 1.0),
            derived,
        }
    }
}

impl UnitSystem {
    /// `(quantity, unit)` pairs in VMAP base-unit order.
    pub fn base_units(&self) -> [(&'static str, &BaseUnit); 7] {
        [
            ("LENGTH", &self.length),
            ("MASS", &self.mass),
            ("TIME", &self.time),
            ("CURRENT", &self.current),
            ("TEMPERATURE", &self.temperature),
            ("AMOUNTOFSUBSTANCE", &self.amount_of_substance),
            ("LUMINOUSINTENSITY", &self.luminous_intensity),
        ]
    }
}

/// Which result steps to convert, by time or frequency value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum StepSelection {
    #[default]
    All,
    None,
    Values(Vec<f64>),
}

impl StepSelection {
    pub fn accepts(&self, value: f64) -> bool {
        match self {
            StepSelection::All => true,
            StepSelection::None => false,
            StepSelection::Values(values) => values.iter().any(|v| same_step(*v, value)),
        }
    }
}

pub(crate) fn same_step(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0)
}

impl FromStr for StepSelection {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ALL" => Ok(StepSelection::All),
            "NONE" => Ok(StepSelection::None),
            _ => s
                .split(',')
                .map(|v| {
                    v.trim().parse::<f64>().map_err(|_| {
                        ConvertError::Config(format!("invalid step value '{}'", v.trim()))
                    })
                })
                .collect::<Result<Vec<_>>>()
                .map(StepSelection::Values),
        }
    }
}

/// Which result variables to convert. Names use spaces as in the source;
/// on the command line `_` stands for a space.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum VariableSelection {
    #[default]
    All,
    None,
    Names(Vec<String>),
}

impl VariableSelection {
    pub fn accepts(&self, name: &str) -> bool {
        match self {
            VariableSelection::All => true,
            VariableSelection::None => false,
            VariableSelection::Names(names) => names.iter().any(|n| n.eq_ignore_ascii_case(name)),
        }
    }
}

impl FromStr for VariableSelection {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ALL" => Ok(VariableSelection::All),
            "NONE" => Ok(VariableSelection::None),
            "" => Err(ConvertError::Config("empty variable selection".to_string())),
            upper => Ok(VariableSelection::Names(
                upper
                    .split(',')
                    .map(|n| n.trim().replace('_', " "))
                    .filter(|n| !n.is_empty())
                    .collect(),
            )),
        }
    }
}

/// Result variables PERMAS writes per node.
pub const NODAL_VARIABLES: [&str; 6] = [
    "DISPLACEMENT",
    "CONTACT STATUS",
    "NODAL POINT STRAIN",
    "NODAL POINT STRESS",
    "GAP WIDTH",
    "TEMPERATURE",
];

/// Result variables PERMAS writes per element.
pub const ELEMENT_VARIABLES: [&str; 2] = ["ELEMENT STRESS", "ELEMENT STRAIN"];

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConversionOptions {
    pub steps: StepSelection,
    pub variables: VariableSelection,
}
