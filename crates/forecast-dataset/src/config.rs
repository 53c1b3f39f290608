//! Dataset catalogs: YAML files declaring named forecast datasets.
//!
//! ```yaml
//! metadata:
//!   version: 1
//! sources:
//!   mogreps_uk:
//!     driver: met_office
//!     description: MOGREPS-UK ensemble
//!     args:
//!       start_cycle: 20201018T0000Z
//!       end_cycle: latest
//!       model: mo-atmospheric-mogreps-uk
//!       dimensions: [...]
//!       diagnostics: [...]
//!       static_coords: {...}
//!       storage_options:
//!         data_protocol: abfs
//!         url_prefix: mogreps
//!         account_name: ${ACCOUNT_NAME}
//!         credential: null
//! ```
//!
//! `${VAR}` references in string values are substituted from the
//! environment. Comments and keys are left alone.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

use forecast_common::{is_latest, parse_duration, parse_timestamp, Frequency};
use hypothetic_store::{Attributes, DType, StaticCoordSpec};
use serde::{Deserialize, Serialize};
use storage::StorageOptions;
use tracing::info;

use crate::error::{DatasetError, Result};

/// Which kind of dataset a catalog entry declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Driver {
    /// Cycle/lead indexed forecasts.
    MetOffice,
    /// Daily air quality files.
    MetOfficeAq,
    /// Daily UKV timeseries files.
    MetOfficeUkvTimeseries,
}

/// Top level of a catalog file.
#[derive(Debug, Clone, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub metadata: Attributes,
    pub sources: BTreeMap<String, SourceEntry>,
}

/// One named dataset of a catalog.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceEntry {
    pub driver: Driver,
    #[serde(default)]
    pub description: Option<String>,
    pub args: serde_yaml::Value,
    #[serde(default)]
    pub metadata: Attributes,
}

/// Arguments of a `met_office` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastDeclaration {
    pub start_cycle: String,
    /// A timestamp or `latest`.
    pub end_cycle: String,
    #[serde(default = "Frequency::hourly")]
    pub cycle_frequency: Frequency,
    /// Longest lead time, e.g. `126H`.
    #[serde(default = "default_forecast_extent")]
    pub forecast_extent: String,
    pub model: String,
    pub dimensions: Vec<String>,
    pub diagnostics: Vec<String>,
    pub static_coords: BTreeMap<String, StaticCoordSpec>,
    pub storage_options: StorageOptions,
    #[serde(default)]
    pub license: Option<String>,
    /// Per-diagnostic element types; float32 otherwise.
    #[serde(default)]
    pub dtypes: BTreeMap<String, DType>,
    #[serde(default)]
    pub attrs: Attributes,
}

/// Arguments of a `met_office_aq` or `met_office_ukv_timeseries` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SingleTimeDeclaration {
    pub start_datetime: String,
    /// A timestamp or `latest`.
    pub end_datetime: String,
    /// `1H` or `1D`.
    pub timestep: Frequency,
    pub model: String,
    pub dimensions: Vec<String>,
    pub diagnostics: Vec<String>,
    pub static_coords: BTreeMap<String, StaticCoordSpec>,
    pub storage_options: StorageOptions,
    /// Suffix of air quality file names, e.g. `daily_mean`.
    #[serde(default)]
    pub aggregation: Option<String>,
    #[serde(default)]
    pub license: Option<String>,
    #[serde(default)]
    pub dtypes: BTreeMap<String, DType>,
    #[serde(default)]
    pub attrs: Attributes,
}

fn default_forecast_extent() -> String {
    "126H".to_string()
}

/// A parsed catalog entry.
#[derive(Debug, Clone)]
pub enum Declaration {
    Forecast(ForecastDeclaration),
    AirQuality(SingleTimeDeclaration),
    Timeseries(SingleTimeDeclaration),
}

impl Declaration {
    pub fn license(&self) -> Option<&str> {
        match self {
            Declaration::Forecast(decl) => decl.license.as_deref(),
            Declaration::AirQuality(decl) | Declaration::Timeseries(decl) => decl.license.as_deref(),
        }
    }

    pub fn storage_options(&self) -> &StorageOptions {
        match self {
            Declaration::Forecast(decl) => &decl.storage_options,
            Declaration::AirQuality(decl) | Declaration::Timeseries(decl) => &decl.storage_options,
        }
    }

    /// Refuse a licensed dataset unless its license was accepted.
    pub fn check_license(&self, license_accepted: bool) -> Result<()> {
        match self.license() {
            Some(license) if !license_accepted => {
                Err(DatasetError::LicenseNotAccepted(license.to_string()))
            }
            _ => Ok(()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Declaration::Forecast(decl) => validate_forecast(decl),
            Declaration::AirQuality(decl) => validate_single_time(decl),
            Declaration::Timeseries(decl) => {
                if decl.aggregation.is_some() {
                    return Err(DatasetError::invalid_config(
                        "aggregation is only supported by air quality datasets",
                    ));
                }
                validate_single_time(decl)
            }
        }
    }
}

impl SourceEntry {
    /// Interpret `args` according to the driver.
    pub fn declaration(&self) -> Result<Declaration> {
        let args = self.args.clone();
        let declaration = match self.driver {
            Driver::MetOffice => Declaration::Forecast(serde_yaml::from_value(args)?),
            Driver::MetOfficeAq => Declaration::AirQuality(serde_yaml::from_value(args)?),
            Driver::MetOfficeUkvTimeseries => {
                Declaration::Timeseries(serde_yaml::from_value(args)?)
            }
        };
        Ok(declaration)
    }
}

impl Catalog {
    /// Parse a catalog from YAML text, substituting environment variables.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let mut document: serde_yaml::Value = serde_yaml::from_str(content)?;
        expand_env_vars(&mut document)?;
        let catalog: Catalog = serde_yaml::from_value(document)?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sources.keys().map(String::as_str)
    }

    pub fn entry(&self, name: &str) -> Result<&SourceEntry> {
        self.sources
            .get(name)
            .ok_or_else(|| DatasetError::UnknownSource(name.to_string()))
    }

    fn validate(&self) -> Result<()> {
        for (name, entry) in &self.sources {
            entry
                .declaration()
                .and_then(|decl| decl.validate())
                .map_err(|e| DatasetError::invalid_config(format!("{}: {}", name, e)))?;
        }
        Ok(())
    }
}

/// Load and validate a catalog file.
pub fn load_catalog(path: impl AsRef<Path>) -> Result<Catalog> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    let catalog = Catalog::from_yaml(&content)?;
    info!(
        path = %path.display(),
        sources = catalog.sources.len(),
        "Loaded catalog"
    );
    Ok(catalog)
}

/// Substitute `$VAR` and `${VAR}` from the environment in every string
/// value of a parsed document.
fn expand_env_vars(value: &mut serde_yaml::Value) -> Result<()> {
    match value {
        serde_yaml::Value::String(s) => {
            let expanded = shellexpand::env(s.as_str())
                .map_err(|e| {
                    DatasetError::invalid_config(format!("environment substitution failed: {}", e))
                })?
                .into_owned();
            *s = expanded;
        }
        serde_yaml::Value::Sequence(items) => {
            for item in items {
                expand_env_vars(item)?;
            }
        }
        serde_yaml::Value::Mapping(entries) => {
            for (_, item) in entries.iter_mut() {
                expand_env_vars(item)?;
            }
        }
        serde_yaml::Value::Tagged(tagged) => expand_env_vars(&mut tagged.value)?,
        serde_yaml::Value::Null | serde_yaml::Value::Bool(_) | serde_yaml::Value::Number(_) => {}
    }
    Ok(())
}

fn validate_common(
    model: &str,
    dimensions: &[String],
    diagnostics: &[String],
    storage_options: &StorageOptions,
) -> Result<()> {
    if model.is_empty() {
        return Err(DatasetError::invalid_config("model cannot be empty"));
    }
    if diagnostics.is_empty() {
        return Err(DatasetError::invalid_config("at least one diagnostic is required"));
    }
    let mut seen = HashSet::new();
    if let Some(dup) = dimensions.iter().find(|d| !seen.insert(d.as_str())) {
        return Err(DatasetError::invalid_config(format!(
            "dimension {} declared twice",
            dup
        )));
    }
    seen.clear();
    if let Some(dup) = diagnostics.iter().find(|d| !seen.insert(d.as_str())) {
        return Err(DatasetError::invalid_config(format!(
            "diagnostic {} declared twice",
            dup
        )));
    }
    storage_options.validate()?;
    Ok(())
}

fn validate_end(value: &str) -> Result<()> {
    if !is_latest(value) {
        parse_timestamp(value)?;
    }
    Ok(())
}

fn validate_forecast(decl: &ForecastDeclaration) -> Result<()> {
    validate_common(
        &decl.model,
        &decl.dimensions,
        &decl.diagnostics,
        &decl.storage_options,
    )?;
    parse_timestamp(&decl.start_cycle)?;
    validate_end(&decl.end_cycle)?;
    parse_duration(&decl.forecast_extent)?;
    Ok(())
}

fn validate_single_time(decl: &SingleTimeDeclaration) -> Result<()> {
    validate_common(
        &decl.model,
        &decl.dimensions,
        &decl.diagnostics,
        &decl.storage_options,
    )?;
    parse_timestamp(&decl.start_datetime)?;
    validate_end(&decl.end_datetime)?;
    if !decl.timestep.is_hourly() && !decl.timestep.is_daily() {
        return Err(DatasetError::invalid_config(format!(
            "don't know how to chunk timestep {}, expected 1H or 1D",
            decl.timestep
        )));
    }
    Ok(())
}
