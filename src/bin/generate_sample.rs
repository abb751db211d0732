use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use byteorder::{LittleEndian, WriteBytesExt};
use chrono::{Datelike, Duration, NaiveDate, Timelike};

use mpl_nrb::data::header::{AfterpulseHeader, ProfileHeader, AFTERPULSE_MAGIC};
use mpl_nrb::data::record::Profile;
use mpl_nrb::nrb::range_km;

const PROFILES: usize = 60;
const BINS: usize = 800;
const BIN_TIME: f32 = 2e-7;
const ENERGY_UJ: f64 = 8.0;

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5)).rotate_left(7).wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

fn overlap_factor(r: f64) -> f64 {
    (1.0 - (-(r / 1.5).powi(2)).exp()).max(0.01)
}

fn afterpulse_copol(r: f64) -> f64 {
    5.0 * (-r / 0.3).exp() + 0.01
}

/// Count rate (count us-1) of a clear sky with one cloud layer at 2 km.
fn backscatter(r: f64, cloud: f64) -> f64 {
    let molecular = 40.0 * (-r / 8.0).exp();
    let layer = cloud * (-((r - 2.0) / 0.1).powi(2)).exp();
    (molecular + layer) * overlap_factor(r) / (r * r)
}

fn write_profiles(path: &Path, rng: &mut SimpleRng) -> Result<()> {
    let range = range_km(BIN_TIME, BINS);
    let start = NaiveDate::from_ymd_opt(2021, 3, 4)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .context("invalid start time")?;
    let mut out = BufWriter::new(File::create(path)?);

    for i in 0..PROFILES {
        let t = start + Duration::seconds(60 * i as i64);
        let energy = rng.gauss(ENERGY_UJ, 0.05);
        let background = 0.05 + rng.gauss(0.0, 0.002);
        let background_2 = 0.08 + rng.gauss(0.0, 0.002);
        let cloud = if (20..40).contains(&i) { 400.0 } else { 0.0 };

        let mut channel_1 = Vec::with_capacity(BINS);
        let mut channel_2 = Vec::with_capacity(BINS);
        for &r in range.iter() {
            let signal = backscatter(r, cloud) * energy / ENERGY_UJ;
            let ap = afterpulse_copol(r) * energy / ENERGY_UJ;
            channel_2.push((signal + ap + background_2 + rng.gauss(0.0, 0.01)) as f32);
            channel_1.push((0.1 * signal + 0.5 * ap + background + rng.gauss(0.0, 0.01)) as f32);
        }

        let header = ProfileHeader {
            unit: 1,
            version: 300,
            year: t.year() as u16,
            month: t.month() as u16,
            day: t.day() as u16,
            hours: t.hour() as u16,
            minutes: t.minute() as u16,
            seconds: t.second() as u16,
            shots_sum: 150_000,
            trigger_frequency: 2500,
            energy_monitor: (energy * 1000.0).round() as u32,
            background_average: background as f32,
            background_average_2: background_2 as f32,
            number_channels: 2,
            number_bins: BINS as u32,
            bin_time: BIN_TIME,
            number_data_bins: BINS as u16,
            elevation_angle: 90.0,
            data_file_version: 1,
            header_size: ProfileHeader::SIZE as u16,
            ..Default::default()
        };
        Profile {
            header,
            channel_1,
            channel_2,
        }
        .encode(&mut out)?;
    }
    out.flush()?;
    Ok(())
}

fn write_afterpulse(path: &Path) -> Result<()> {
    let range = range_km(BIN_TIME, BINS);
    let header = AfterpulseHeader {
        ap_header: AFTERPULSE_MAGIC,
        ap_file_version: 1,
        ap_number_channels: 2,
        ap_number_bins: BINS as u32,
        ap_energy: ENERGY_UJ,
        ap_background_average_copol: 0.01,
        ap_background_average_crosspol: 0.005,
    };
    let mut out = BufWriter::new(File::create(path)?);
    header.encode(&mut out)?;
    for &r in range.iter() {
        out.write_f64::<LittleEndian>(r)?;
    }
    for &r in range.iter() {
        out.write_f64::<LittleEndian>(afterpulse_copol(r))?;
    }
    for &r in range.iter() {
        out.write_f64::<LittleEndian>(0.5 * afterpulse_copol(r))?;
    }
    out.flush()?;
    Ok(())
}

fn write_overlap(path: &Path) -> Result<()> {
    let range: Vec<f64> = (0..400).map(|i| i as f64 * 0.03).collect();
    let mut out = BufWriter::new(File::create(path)?);
    for &r in &range {
        out.write_f64::<LittleEndian>(r)?;
    }
    for &r in &range {
        out.write_f64::<LittleEndian>(overlap_factor(r))?;
    }
    out.flush()?;
    Ok(())
}

fn write_dead_time(path: &Path) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    for c in [1e-9f32, 1e-6, 1.0] {
        out.write_f32::<LittleEndian>(c)?;
    }
    out.flush()?;
    Ok(())
}

fn main() -> Result<()> {
    let dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("sample_data"));
    fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;

    let mut rng = SimpleRng::new(42);
    write_profiles(&dir.join("202103040000.mpl"), &mut rng)?;
    write_afterpulse(&dir.join("afterpulse.bin"))?;
    write_overlap(&dir.join("overlap.bin"))?;
    write_dead_time(&dir.join("deadtime.bin"))?;

    println!(
        "Wrote {PROFILES} profiles ({BINS} bins each) and correction files to {}",
        dir.display()
    );
    Ok(())
}
