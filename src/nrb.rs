//! Normalized relative backscatter.
//!
//! For profile `i` and bin `j`:
//!
//! ```text
//! NRB = ( D(raw) − D(bg) − D(ap)·E/E_ap + D(ap_bg)·E/E_ap ) · r² / (O · E)
//! ```
//!
//! where `D` is the dead-time correction, `E` the profile energy, `r` the
//! bin range in km, `ap`/`O` the afterpulse and overlap tables interpolated
//! at `r`.

use std::collections::HashMap;

use ndarray::{arr0, Array, Array1, Array2, ArrayView1, ArrayView2, Dimension, Zip};

use crate::data::aggregate::C;
use crate::data::correction::{AfterpulseTable, Corrections};
use crate::data::model::{Dataset, Values};
use crate::error::Result;

/// Which return signal an NRB array is computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarization {
    /// Channel 2 with its own background.
    CoPol,
    /// Channel 1 with the channel 1 background.
    CrossPol,
}

impl Polarization {
    pub const ALL: [Polarization; 2] = [Polarization::CoPol, Polarization::CrossPol];

    pub fn channel(self) -> &'static str {
        match self {
            Polarization::CoPol => "channel_2",
            Polarization::CrossPol => "channel_1",
        }
    }

    pub fn background(self) -> &'static str {
        match self {
            Polarization::CoPol => "background_average_2",
            Polarization::CrossPol => "background_average",
        }
    }

    pub fn output(self) -> &'static str {
        match self {
            Polarization::CoPol => "nrb_copol",
            Polarization::CrossPol => "nrb_crosspol",
        }
    }

    fn afterpulse(self, table: &AfterpulseTable) -> &[f64] {
        match self {
            Polarization::CoPol => &table.copol,
            Polarization::CrossPol => &table.crosspol,
        }
    }

    fn afterpulse_background(self, table: &AfterpulseTable) -> f64 {
        match self {
            Polarization::CoPol => table.header.ap_background_average_copol,
            Polarization::CrossPol => table.header.ap_background_average_crosspol,
        }
    }
}

// ---------------------------------------------------------------------------
// Building blocks
// ---------------------------------------------------------------------------

/// Range of each bin centre in km for a given bin width in seconds.
pub fn range_km(bin_time: f32, bins: usize) -> Array1<f64> {
    let scale = 0.5 * f64::from(bin_time) * C;
    Array1::from_shape_fn(bins, |j| scale * (j as f64 + 0.5) * 1e-3)
}

/// Dead-time polynomial `Σ coeff[k]·y^(n−k−1)`, highest degree first.
fn polynomial(y: f64, coeff: &[f64]) -> f64 {
    let n = coeff.len();
    coeff
        .iter()
        .enumerate()
        .map(|(k, &c)| y.powi((n - k - 1) as i32) * c)
        .sum()
}

/// Apply dead-time correction `x · P(x·1e3)` element-wise.
///
/// With `coeff == [1.0]` this is the identity.
pub fn dead_time_correct<D: Dimension>(x: &Array<f64, D>, coeff: &[f64]) -> Array<f64, D> {
    x.mapv(|v| v * polynomial(v * 1e3, coeff))
}

/// Piecewise-linear interpolation of `(xp, fp)` at each `x`.
///
/// `xp` must be increasing. Points outside the table take the nearest end
/// value; an empty table or a NaN point yields NaN.
pub fn interp(x: ArrayView1<'_, f64>, xp: &[f64], fp: &[f64]) -> Array1<f64> {
    let len = xp.len().min(fp.len());
    let (xp, fp) = (&xp[..len], &fp[..len]);
    x.mapv(|x| {
        let Some(last) = len.checked_sub(1) else {
            return f64::NAN;
        };
        if x.is_nan() {
            return f64::NAN;
        }
        if x <= xp[0] {
            return fp[0];
        }
        if x >= xp[last] {
            return fp[last];
        }
        // NaN table entries break the ordering; stay in bounds regardless
        let k = xp.partition_point(|&v| v <= x);
        if k == 0 {
            return fp[0];
        }
        if k > last {
            return fp[last];
        }
        let slope = (fp[k] - fp[k - 1]) / (xp[k] - xp[k - 1]);
        let y = slope * (x - xp[k - 1]) + fp[k - 1];
        if y.is_nan() && fp[k] == fp[k - 1] {
            fp[k - 1]
        } else {
            y
        }
    })
}

/// Range-dependent terms shared by every profile with the same bin width.
struct RangeTerms {
    range: Array1<f64>,
    afterpulse: Array1<f64>,
    overlap: Array1<f64>,
}

impl RangeTerms {
    fn new(bin_time: f32, bins: usize, pol: Polarization, corrections: &Corrections, coeff: &[f64]) -> Self {
        let range = range_km(bin_time, bins);
        let afterpulse = match &corrections.afterpulse {
            Some(t) => dead_time_correct(&interp(range.view(), &t.range, pol.afterpulse(t)), coeff),
            None => Array1::zeros(bins),
        };
        let overlap = match &corrections.overlap {
            Some(t) => interp(range.view(), &t.range, &t.overlap),
            None => Array1::ones(bins),
        };
        Self {
            range,
            afterpulse,
            overlap,
        }
    }
}

// ---------------------------------------------------------------------------
// NRB
// ---------------------------------------------------------------------------

/// Compute one NRB channel, shaped `(profile, bin)` like `raw`.
///
/// `background`, `energy_monitor` and `bin_time` are per profile.
pub fn compute_nrb(
    raw: ArrayView2<'_, f32>,
    background: ArrayView1<'_, f32>,
    energy_monitor: ArrayView1<'_, u32>,
    bin_time: ArrayView1<'_, f32>,
    pol: Polarization,
    corrections: &Corrections,
) -> Array2<f64> {
    let (n, m) = raw.dim();

    let coeff: Vec<f64> = match &corrections.dead_time {
        Some(t) => t.coeff.iter().map(|&c| f64::from(c)).collect(),
        None => vec![1.0],
    };
    let (ap_energy, ap_background) = match &corrections.afterpulse {
        Some(t) => (t.header.ap_energy, pol.afterpulse_background(t)),
        None => (1.0, 0.0),
    };

    let raw = dead_time_correct(&raw.mapv(f64::from), &coeff);
    let background = dead_time_correct(&background.mapv(f64::from), &coeff);
    let ap_background = dead_time_correct(&arr0(ap_background), &coeff).into_scalar();
    let energy = energy_monitor.mapv(|e| f64::from(e) * 1e-3);

    let mut terms: HashMap<u32, RangeTerms> = HashMap::new();
    let mut nrb = Array2::<f64>::zeros((n, m));

    for (i, mut row) in nrb.rows_mut().into_iter().enumerate() {
        let t = terms
            .entry(bin_time[i].to_bits())
            .or_insert_with(|| RangeTerms::new(bin_time[i], m, pol, corrections, &coeff));
        let (e, bg) = (energy[i], background[i]);

        Zip::from(&mut row)
            .and(raw.row(i))
            .and(&t.range)
            .and(&t.afterpulse)
            .and(&t.overlap)
            .for_each(|out, &x, &r, &ap, &ol| {
                *out = (x - bg - ap * e / ap_energy + ap_background * e / ap_energy) * r.powi(2)
                    / (ol * e);
            });
    }
    nrb
}

/// Add `nrb_copol` and `nrb_crosspol` to a dataset holding stacked profiles.
pub fn process_nrb(ds: &mut Dataset, corrections: &Corrections) -> Result<()> {
    for pol in Polarization::ALL {
        let nrb = compute_nrb(
            ds.f32_2d(pol.channel())?,
            ds.f32_1d(pol.background())?,
            ds.u32_1d("energy_monitor")?,
            ds.f32_1d("bin_time")?,
            pol,
            corrections,
        );
        ds.insert(pol.output(), Values::F64(nrb.into_dyn()))?;
    }
    Ok(())
}
