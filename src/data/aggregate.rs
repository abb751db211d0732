use chrono::{NaiveDate, NaiveDateTime};
use ndarray::{arr0, Array1, Array2};

use super::header::ProfileHeader;
use super::model::{Dataset, Values};
use super::record::Profile;
use crate::error::{FormatError, Result};

/// Speed of light, m s-1.
pub const C: f64 = 299_792_458.0;

/// Header fields consumed while decoding and not carried into the output.
pub const EXCLUDED_FIELDS: &[&str] = &[
    "year",
    "month",
    "day",
    "hours",
    "minutes",
    "seconds",
    "header_size",
    "number_bins",
];

/// Collection time of a profile from its raw date/time fields (naive UTC).
fn collection_time(index: usize, h: &ProfileHeader) -> std::result::Result<NaiveDateTime, FormatError> {
    NaiveDate::from_ymd_opt(h.year.into(), h.month.into(), h.day.into())
        .and_then(|d| d.and_hms_opt(h.hours.into(), h.minutes.into(), h.seconds.into()))
        .ok_or(FormatError::InvalidTimestamp {
            index,
            year: h.year,
            month: h.month,
            day: h.day,
            hours: h.hours,
            minutes: h.minutes,
            seconds: h.seconds,
        })
}

/// Stack decoded profiles into profile-indexed arrays.
///
/// Every profile must share the first profile's bin count; channels become
/// `profile × range` arrays. Adds `time`, `time_utc` and `c`.
pub fn aggregate(profiles: &[Profile]) -> Result<Dataset> {
    let bins = profiles.first().map_or(0, Profile::bins);
    for (index, p) in profiles.iter().enumerate() {
        if p.bins() != bins || p.channel_1.len() != bins || p.channel_2.len() != bins {
            return Err(FormatError::InconsistentBins {
                index,
                expected: bins,
                actual: p.channel_1.len().max(p.channel_2.len()).max(p.bins()),
            }
            .into());
        }
    }

    let headers: Vec<ProfileHeader> = profiles.iter().map(|p| p.header).collect();
    let mut ds = Dataset::new();

    for &field in ProfileHeader::FIELDS {
        if EXCLUDED_FIELDS.contains(&field) {
            continue;
        }
        if let Some(column) = ProfileHeader::column(&headers, field) {
            ds.insert(field, column)?;
        }
    }

    ds.insert("channel_1", stack_channel(profiles, bins, |p| &p.channel_1))?;
    ds.insert("channel_2", stack_channel(profiles, bins, |p| &p.channel_2))?;

    let mut time = Vec::with_capacity(profiles.len());
    let mut time_utc = Vec::with_capacity(profiles.len());
    for (index, h) in headers.iter().enumerate() {
        let t = collection_time(index, h)?;
        let secs = u64::try_from(t.and_utc().timestamp()).map_err(|_| {
            FormatError::InvalidTimestamp {
                index,
                year: h.year,
                month: h.month,
                day: h.day,
                hours: h.hours,
                minutes: h.minutes,
                seconds: h.seconds,
            }
        })?;
        time.push(secs);
        time_utc.push(t.format("%Y-%m-%dT%H:%M:%S").to_string());
    }
    ds.insert("time", Values::U64(Array1::from_vec(time).into_dyn()))?;
    ds.insert("time_utc", Values::Text(Array1::from_vec(time_utc).into_dyn()))?;
    ds.insert("c", Values::F64(arr0(C).into_dyn()))?;

    Ok(ds)
}

fn stack_channel(profiles: &[Profile], bins: usize, channel: impl Fn(&Profile) -> &Vec<f32>) -> Values {
    let mut out = Array2::<f32>::zeros((profiles.len(), bins));
    for (mut row, p) in out.rows_mut().into_iter().zip(profiles) {
        row.assign(&ndarray::ArrayView1::from(channel(p).as_slice()));
    }
    Values::F32(out.into_dyn())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::Dim;
    use crate::error::Error;

    fn profile(bins: u32, second: u16) -> Profile {
        Profile {
            header: ProfileHeader {
                year: 2021,
                month: 3,
                day: 4,
                hours: 5,
                minutes: 6,
                seconds: second,
                number_bins: bins,
                header_size: 163,
                energy_monitor: 7000,
                ..Default::default()
            },
            channel_1: vec![1.0; bins as usize],
            channel_2: vec![2.0; bins as usize],
        }
    }

    #[test]
    fn stacks_headers_and_channels() {
        let ds = aggregate(&[profile(4, 7), profile(4, 8), profile(4, 9)]).unwrap();
        assert_eq!(ds.dim_len(Dim::Profile), Some(3));
        assert_eq!(ds.dim_len(Dim::Range), Some(4));
        assert_eq!(ds.f32_2d("channel_2").unwrap().shape(), &[3, 4]);
        assert_eq!(ds.u32_1d("energy_monitor").unwrap().to_vec(), vec![7000; 3]);
        for field in EXCLUDED_FIELDS {
            assert!(!ds.contains(field), "{field} leaked into output");
        }
        assert!(ds.contains("c"));
    }

    #[test]
    fn derives_both_time_representations() {
        let ds = aggregate(&[profile(1, 7)]).unwrap();
        match &ds.get("time_utc").unwrap().values {
            Values::Text(a) => {
                assert_eq!(a.iter().next().map(String::as_str), Some("2021-03-04T05:06:07"))
            }
            other => panic!("unexpected {other:?}"),
        }
        match &ds.get("time").unwrap().values {
            Values::U64(a) => assert_eq!(a.iter().next().copied(), Some(1_614_834_367)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn rejects_mixed_bin_counts() {
        let err = aggregate(&[profile(4, 0), profile(5, 1)]).unwrap_err();
        assert!(matches!(
            err,
            Error::Format(FormatError::InconsistentBins { index: 1, expected: 4, actual: 5 })
        ));
    }

    #[test]
    fn rejects_impossible_dates() {
        let mut p = profile(2, 0);
        p.header.month = 13;
        let err = aggregate(&[p]).unwrap_err();
        assert!(matches!(
            err,
            Error::Format(FormatError::InvalidTimestamp { index: 0, month: 13, .. })
        ));
    }

    #[test]
    fn empty_input_gives_empty_profile_dimension() {
        let ds = aggregate(&[]).unwrap();
        assert_eq!(ds.dim_len(Dim::Profile), Some(0));
        assert_eq!(ds.f32_2d("channel_1").unwrap().shape(), &[0, 0]);
    }
}
