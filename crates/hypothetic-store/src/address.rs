//! Address resolvers: pure functions from a diagnostic and forecast times
//! to the location of the remote object holding that chunk.

use chrono::{DateTime, Duration, Utc};
use forecast_common::{format_compact, format_date, format_lead, Frequency};

use crate::error::{Result, StoreError};

const NETCDF_EXTENSION: &str = "nc";

/// Protocol and prefix that every address starts with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub protocol: String,
    pub url_prefix: String,
}

impl Location {
    pub fn new(protocol: impl Into<String>, url_prefix: impl Into<String>) -> Self {
        let url_prefix: String = url_prefix.into();
        Self {
            protocol: protocol.into(),
            url_prefix: url_prefix.trim_end_matches('/').to_string(),
        }
    }

    /// `{protocol}://{url_prefix}/{path}`
    pub fn render(&self, path: &str) -> String {
        format!("{}://{}/{}", self.protocol, self.url_prefix, path)
    }
}

/// Cycle, validity and lead times of one forecast field.
///
/// validity = cycle + lead always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForecastTimes {
    pub cycle: DateTime<Utc>,
    pub validity: DateTime<Utc>,
    pub lead: Duration,
}

impl ForecastTimes {
    /// Complete the triple from exactly two of its members.
    pub fn derive(
        cycle: Option<DateTime<Utc>>,
        validity: Option<DateTime<Utc>>,
        lead: Option<Duration>,
    ) -> Result<Self> {
        match (cycle, validity, lead) {
            (Some(cycle), Some(validity), None) => Ok(Self {
                cycle,
                validity,
                lead: validity - cycle,
            }),
            (Some(cycle), None, Some(lead)) => Ok(Self {
                cycle,
                validity: cycle + lead,
                lead,
            }),
            (None, Some(validity), Some(lead)) => Ok(Self {
                cycle: validity - lead,
                validity,
                lead,
            }),
            _ => Err(StoreError::addressing(
                "expected exactly 2 of cycle_time, validity_time and lead_time",
            )),
        }
    }
}

/// Addresses for files laid out per model run:
/// `{model}/{cycle}/{validity}-{lead}-{diagnostic}.nc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleAddressing {
    pub location: Location,
    pub model: String,
    pub extension: String,
}

impl CycleAddressing {
    pub fn new(location: Location, model: impl Into<String>) -> Self {
        Self {
            location,
            model: model.into(),
            extension: NETCDF_EXTENSION.to_string(),
        }
    }

    pub fn resolve(&self, diagnostic: &str, times: &ForecastTimes) -> Result<String> {
        let path = format!(
            "{}/{}/{}-{}-{}.{}",
            self.model,
            format_compact(&times.cycle),
            format_compact(&times.validity),
            format_lead(&times.lead)?,
            diagnostic,
            self.extension
        );
        Ok(self.location.render(&path))
    }

    /// Resolve from any two of cycle, validity and lead.
    pub fn resolve_with(
        &self,
        diagnostic: &str,
        cycle: Option<DateTime<Utc>>,
        validity: Option<DateTime<Utc>>,
        lead: Option<Duration>,
    ) -> Result<String> {
        let times = ForecastTimes::derive(cycle, validity, lead)?;
        self.resolve(diagnostic, &times)
    }
}

/// Addresses for files holding one calendar day:
/// `{directory}/{diagnostic}/{file_model}_{diagnostic}[_{aggregation}]_{YYYYMMDD}.nc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlainTimeAddressing {
    pub location: Location,
    pub directory: String,
    pub file_model: String,
    pub aggregation: Option<String>,
    pub extension: String,
}

impl PlainTimeAddressing {
    /// Air quality layout: `metoffice_{model}/{diag}/{model}_{diag}[_{agg}]_{date}.nc`.
    pub fn air_quality(location: Location, model: &str, aggregation: Option<String>) -> Self {
        Self {
            location,
            directory: format!("metoffice_{}", model),
            file_model: model.to_string(),
            aggregation: aggregation.filter(|a| !a.is_empty()),
            extension: NETCDF_EXTENSION.to_string(),
        }
    }

    /// Timeseries layout: `metoffice_{model}_{freq}/{diag}/{model}_{freq}_{diag}_{date}.nc`
    /// where `freq` is `hourly` or `daily`.
    pub fn timeseries(location: Location, model: &str, timestep: &Frequency) -> Result<Self> {
        let frequency = timeseries_frequency(timestep)?;
        Ok(Self {
            location,
            directory: format!("metoffice_{}_{}", model, frequency),
            file_model: format!("{}_{}", model, frequency),
            aggregation: None,
            extension: NETCDF_EXTENSION.to_string(),
        })
    }

    pub fn resolve(&self, diagnostic: &str, time: &DateTime<Utc>) -> String {
        let aggregation = self
            .aggregation
            .as_ref()
            .map(|a| format!("_{}", a))
            .unwrap_or_default();
        let path = format!(
            "{}/{}/{}_{}{}_{}.{}",
            self.directory,
            diagnostic,
            self.file_model,
            diagnostic,
            aggregation,
            format_date(time),
            self.extension
        );
        self.location.render(&path)
    }
}

fn timeseries_frequency(timestep: &Frequency) -> Result<&'static str> {
    if timestep.is_hourly() {
        Ok("hourly")
    } else if timestep.is_daily() {
        Ok("daily")
    } else {
        Err(StoreError::configuration(format!(
            "no timeseries layout for timestep {}",
            timestep
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn location() -> Location {
        Location::new("abfs", "container/")
    }

    fn utc(y: i32, mo: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_location_trims_trailing_slash() {
        assert_eq!(location().render("a/b.nc"), "abfs://container/a/b.nc");
    }

    #[test]
    fn test_cycle_and_lead() {
        let addressing = CycleAddressing::new(location(), "mo-atmospheric-ukv");
        let url = addressing
            .resolve_with("air_temperature", Some(utc(2023, 5, 1, 3)), None, Some(Duration::hours(5)))
            .unwrap();
        assert_eq!(
            url,
            "abfs://container/mo-atmospheric-ukv/20230501T0300Z/20230501T0800Z-PT0005H00M-air_temperature.nc"
        );
    }

    #[test]
    fn test_validity_and_lead_give_same_address() {
        let addressing = CycleAddressing::new(location(), "m");
        let from_cycle = addressing
            .resolve_with("d", Some(utc(2023, 5, 1, 0)), None, Some(Duration::hours(30)))
            .unwrap();
        let from_validity = addressing
            .resolve_with("d", None, Some(utc(2023, 5, 2, 6)), Some(Duration::hours(30)))
            .unwrap();
        let from_pair = addressing
            .resolve_with("d", Some(utc(2023, 5, 1, 0)), Some(utc(2023, 5, 2, 6)), None)
            .unwrap();
        assert_eq!(from_cycle, from_validity);
        assert_eq!(from_cycle, from_pair);
        assert!(from_cycle.ends_with("20230502T0600Z-PT0030H00M-d.nc"));
    }

    #[test]
    fn test_wrong_number_of_times() {
        let t = utc(2023, 1, 1, 0);
        let lead = Duration::hours(1);
        assert!(ForecastTimes::derive(Some(t), Some(t), Some(lead)).is_err());
        assert!(ForecastTimes::derive(Some(t), None, None).is_err());
        assert!(ForecastTimes::derive(None, None, None).is_err());
    }

    #[test]
    fn test_negative_lead_is_rejected() {
        let addressing = CycleAddressing::new(location(), "m");
        let err = addressing
            .resolve_with("d", Some(utc(2023, 1, 2, 0)), Some(utc(2023, 1, 1, 0)), None)
            .unwrap_err();
        assert!(matches!(err, StoreError::Addressing(_)));
    }

    #[test]
    fn test_air_quality_layout() {
        let t = utc(2022, 3, 4, 13);
        let plain = PlainTimeAddressing::air_quality(location(), "aqum_hourly", None);
        assert_eq!(
            plain.resolve("o3", &t),
            "abfs://container/metoffice_aqum_hourly/o3/aqum_hourly_o3_20220304.nc"
        );

        let aggregated =
            PlainTimeAddressing::air_quality(location(), "aqum_daily", Some("daily_mean".to_string()));
        assert_eq!(
            aggregated.resolve("o3", &t),
            "abfs://container/metoffice_aqum_daily/o3/aqum_daily_o3_daily_mean_20220304.nc"
        );
    }

    #[test]
    fn test_timeseries_layout() {
        let t = utc(2022, 3, 4, 0);
        let hourly =
            PlainTimeAddressing::timeseries(location(), "ukv", &"1H".parse().unwrap()).unwrap();
        assert_eq!(
            hourly.resolve("temp", &t),
            "abfs://container/metoffice_ukv_hourly/temp/ukv_hourly_temp_20220304.nc"
        );

        let daily = PlainTimeAddressing::timeseries(location(), "ukv", &"1D".parse().unwrap()).unwrap();
        assert!(daily.resolve("temp", &t).contains("metoffice_ukv_daily/temp/ukv_daily_temp_"));

        assert!(PlainTimeAddressing::timeseries(location(), "ukv", &"3H".parse().unwrap()).is_err());
    }
}
