use std::collections::HashMap;
use std::sync::LazyLock;

use super::model::{DType, Dim};

/// Presentation metadata for one output variable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VarMeta {
    pub dtype: DType,
    pub long_name: Option<&'static str>,
    pub comment: Option<&'static str>,
    pub units: Option<&'static str>,
    pub dims: &'static [Dim],
}

const P: &[Dim] = &[Dim::Profile];
const PR: &[Dim] = &[Dim::Profile, Dim::Range];
const SCALAR: &[Dim] = &[];

const fn var(
    dtype: DType,
    long_name: &'static str,
    comment: Option<&'static str>,
    units: Option<&'static str>,
    dims: &'static [Dim],
) -> VarMeta {
    VarMeta {
        dtype,
        long_name: Some(long_name),
        comment,
        units,
        dims,
    }
}

use DType::*;

#[rustfmt::skip]
const TABLE: &[(&str, VarMeta)] = &[
    // -- profile header --
    ("unit", var(U16, "unit", Some("Unique number for each data system."), None, P)),
    ("version", var(U16, "version", Some("Software version of the EXE that created this file. If the SigmaMPL.exe version is 3.00 then this value would be 300."), None, P)),
    ("shots_sum", var(U32, "shots sum", Some("Number of laser shots collected."), Some("count"), P)),
    ("trigger_frequency", var(I32, "trigger frequency", Some("Laser fire rate (usually 2500)."), Some("Hz"), P)),
    ("energy_monitor", var(U32, "energy monitor", Some("Mean of the Energy Monitor readings * 1000."), Some("mJ"), P)),
    ("temp_0", var(U32, "A/D #0 mean", Some("Mean of the A/D #0 readings * 100."), None, P)),
    ("temp_1", var(U32, "A/D #1 mean", Some("Mean of the A/D #1 readings * 100."), None, P)),
    ("temp_2", var(U32, "A/D #2 mean", Some("Mean of the A/D #2 readings * 100."), None, P)),
    ("temp_3", var(U32, "A/D #3 mean", Some("Mean of the A/D #3 readings * 100."), None, P)),
    ("temp_4", var(U32, "A/D #4 mean", Some("Mean of the A/D #4 readings * 100."), None, P)),
    ("background_average", var(F32, "background average", Some("Background Average for Channel #1."), Some("count us-1"), P)),
    ("background_stddev", var(F32, "background standard deviation", Some("Background Standard Deviation for channel #1."), Some("count us-1"), P)),
    ("number_channels", var(U16, "number of channels", Some("MCS Channels collected. Either 1 or 2."), Some("count"), P)),
    ("bin_time", var(F32, "bin time", Some("Bin width (100, 200, or 500 nanoseconds)."), Some("s"), P)),
    ("range_calibration", var(F32, "range calibration", Some("Default is 0; will indicate range calibration offset measured for particular unit."), Some("m"), P)),
    ("number_data_bins", var(U16, "number of data bins", Some("Number of data bins (not background) following First Data Bin."), Some("count"), P)),
    ("scan_scenario_flags", var(U16, "scan scenario flags", Some("0: No scan scenario used, 1: Scan scenario used."), None, P)),
    ("num_background_bins", var(U16, "number of background bins", Some("Number of background bins following First Background Bin."), Some("count"), P)),
    ("azimuth_angle", var(F32, "azimuth angle", Some("Azimuth angle of scanner."), Some("degrees"), P)),
    ("elevation_angle", var(F32, "elevation angle", Some("Elevation angle of scanner."), Some("degrees"), P)),
    ("compass_degrees", var(F32, "compass degrees", Some("Compass degrees (currently unused)."), Some("degrees"), P)),
    ("polarization_voltage_0", var(F32, "polarization voltage 0", Some("Not used."), None, P)),
    ("polarization_voltage_1", var(F32, "polarization voltage 1", Some("Not used."), None, P)),
    ("gps_latitude", var(F32, "GPS latitude", Some("GPS latitude (optional)."), Some("degrees_north"), P)),
    ("gps_longitude", var(F32, "GPS longitude", Some("GPS longitude (optional)."), Some("degrees_east"), P)),
    ("gps_altitude", var(F32, "GPS altitude", Some("GPS altitude (optional)."), Some("m"), P)),
    ("ad_data_bad_flag", var(U8, "A/D data bad flag", Some("0: A/D data good, 1: A/D data probably out of sync. Energy monitor collection is not exactly aligned with MCS shots."), None, P)),
    ("data_file_version", var(U8, "data file version", Some("Version of the file format."), None, P)),
    ("background_average_2", var(F32, "background average (channel 2)", Some("Background Average for Channel #2."), Some("count us-1"), P)),
    ("background_stddev_2", var(F32, "background standard deviation (channel 2)", Some("Background Standard Deviation for Channel #2."), Some("count us-1"), P)),
    ("mcs_mode", var(U8, "MCS mode", Some("MCS mode register."), None, P)),
    ("first_data_bin", var(U16, "first data bin", Some("Bin # of the first return data."), None, P)),
    ("system_type", var(U8, "system type", Some("0: Normal MPL, 1: MiniMPL."), None, P)),
    ("sync_pulses_seen_per_second", var(U16, "sync pulses seen per second", Some("MiniMPL Only; indicates average number of laser pulses seen to validate if laser is operating correctly."), Some("count s-1"), P)),
    ("first_background_bin", var(U16, "first background bin", Some("Used primarily for MiniMPL (will always be 0 for normal MPL as background is collected pre-trigger)."), None, P)),
    ("ws_used", var(U8, "weather station used", Some("0: Weather station not used, 1: Weather station used."), None, P)),
    ("ws_inside_temp", var(F32, "inside temperature", Some("Weather station inside temperature."), Some("degree_C"), P)),
    ("ws_outside_temp", var(F32, "outside temperature", Some("Weather station outside temperature."), Some("degree_C"), P)),
    ("ws_inside_humidity", var(F32, "inside humidity", Some("Weather station inside humidity."), Some("percent"), P)),
    ("ws_outside_humidity", var(F32, "outside humidity", Some("Weather station outside humidity."), Some("percent"), P)),
    ("ws_dewpoint", var(F32, "dewpoint temperature", Some("Weather station dewpoint."), Some("degree_C"), P)),
    ("ws_wind_speed", var(F32, "wind speed", Some("Weather station wind speed."), Some("km h-1"), P)),
    ("ws_wind_direction", var(I16, "wind direction", Some("Weather station wind direction."), Some("degree"), P)),
    ("ws_barometric_pressure", var(F32, "barometric pressure", Some("Weather station barometric pressure."), Some("hPa"), P)),
    ("ws_rain_rate", var(F32, "rain rate", Some("Weather station rain rate."), Some("mm h-1"), P)),

    // -- afterpulse header --
    ("ap_header", var(U32, "afterpulse header", None, None, SCALAR)),
    ("ap_file_version", var(U16, "afterpulse file version", None, None, SCALAR)),
    ("ap_number_channels", var(U8, "afterpulse number of channels", None, Some("count"), SCALAR)),
    ("ap_number_bins", var(U32, "afterpulse number of bins", None, Some("count"), SCALAR)),
    ("ap_energy", var(F64, "afterpulse energy", None, Some("uJ"), SCALAR)),
    ("ap_background_average_copol", var(F64, "afterpulse co pol background average", None, Some("count us-1"), SCALAR)),
    ("ap_background_average_crosspol", var(F64, "afterpulse cross pol background average", None, Some("count us-1"), SCALAR)),

    // -- correction tables --
    ("ap_range", var(F64, "afterpulse range", None, Some("km"), &[Dim::ApRange])),
    ("ap_copol", var(F64, "afterpulse co pol values", None, Some("count us-1"), &[Dim::ApRange])),
    ("ap_crosspol", var(F64, "afterpulse cross pol values", None, Some("count us-1"), &[Dim::ApRange])),
    ("ol_number_bins", var(U32, "overlap number of bins", None, Some("count"), SCALAR)),
    ("ol_range", var(F64, "overlap range", None, Some("km"), &[Dim::OlRange])),
    ("ol_overlap", var(F64, "overlap values", None, None, &[Dim::OlRange])),
    ("dt_number_coeff", var(U32, "dead time number of coefficients", None, Some("count"), SCALAR)),
    ("dt_coeff", var(F32, "dead time coefficient", Some("N coefficients of polynomial degree N-1 in decreasing order"), None, &[Dim::DtCoeffDegree])),
    ("dt_coeff_degree", var(U32, "dead time coefficient degree", None, Some("count"), &[Dim::DtCoeffDegree])),

    // -- derived --
    ("c", var(F64, "speed of light", None, Some("m s-1"), SCALAR)),
    ("channel_1", var(F32, "channel #1 data", Some("For MPL systems without POL-FS option, the return signal array is stored here. For MPL systems with the POL-FS option, the cross-polarized return signal array is stored here."), Some("count us-1"), PR)),
    ("channel_2", var(F32, "channel #2 data", Some("Used only with POL-FS option. The co-polarized return signal array is stored here."), Some("count us-1"), PR)),
    ("nrb_copol", var(F64, "copol normalized relative backscatter", Some("Experimental."), Some("count us-1 uJ-1 km2"), PR)),
    ("nrb_crosspol", var(F64, "crosspol normalized relative backscatter", Some("Experimental."), Some("count us-1 uJ-1 km2"), PR)),
    ("time", var(U64, "time", Some("Record collection time."), Some("seconds since 1970-01-01 00:00:00"), P)),
    ("time_utc", var(Text, "UTC time", Some("Record collection time (UTC)."), Some("ISO 8601"), P)),
];

static INDEX: LazyLock<HashMap<&'static str, &'static VarMeta>> =
    LazyLock::new(|| TABLE.iter().map(|(name, meta)| (*name, meta)).collect());

/// Metadata for an output variable, or `None` if the name is not a known
/// output field. Raw date/time and layout-only header fields are absent.
pub fn lookup(name: &str) -> Option<&'static VarMeta> {
    INDEX.get(name).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_header_fields_have_no_metadata() {
        for name in ["year", "month", "day", "hours", "minutes", "seconds", "number_bins", "header_size"] {
            assert!(lookup(name).is_none(), "{name} should not be an output field");
        }
    }

    #[test]
    fn table_names_are_unique() {
        assert_eq!(INDEX.len(), TABLE.len());
    }

    #[test]
    fn nrb_is_profile_by_range() {
        let meta = lookup("nrb_copol").unwrap();
        assert_eq!(meta.dims, &[Dim::Profile, Dim::Range]);
        assert_eq!(meta.dtype, DType::F64);
    }
}
