use std::io::{self, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use ndarray::{arr0, Array1};

use super::model::Values;

// ---------------------------------------------------------------------------
// LeScalar – one little-endian header field type
// ---------------------------------------------------------------------------

/// A scalar type that can appear in a fixed binary header.
pub trait LeScalar: Copy + Sized {
    const SIZE: usize;

    fn read_le<R: Read>(r: &mut R) -> io::Result<Self>;
    fn write_le<W: Write>(self, w: &mut W) -> io::Result<()>;

    /// Wrap a per-profile column of this type.
    fn column(values: Vec<Self>) -> Values;
    /// Wrap a single value as a 0-d array.
    fn scalar(value: Self) -> Values;
}

macro_rules! le_scalar {
    ($ty:ty, $variant:ident, $read:ident, $write:ident) => {
        impl LeScalar for $ty {
            const SIZE: usize = std::mem::size_of::<$ty>();

            fn read_le<R: Read>(r: &mut R) -> io::Result<Self> {
                r.$read::<LittleEndian>()
            }

            fn write_le<W: Write>(self, w: &mut W) -> io::Result<()> {
                w.$write::<LittleEndian>(self)
            }

            fn column(values: Vec<Self>) -> Values {
                Values::$variant(Array1::from_vec(values).into_dyn())
            }

            fn scalar(value: Self) -> Values {
                Values::$variant(arr0(value).into_dyn())
            }
        }
    };
}

le_scalar!(u16, U16, read_u16, write_u16);
le_scalar!(u32, U32, read_u32, write_u32);
le_scalar!(u64, U64, read_u64, write_u64);
le_scalar!(i16, I16, read_i16, write_i16);
le_scalar!(i32, I32, read_i32, write_i32);
le_scalar!(f32, F32, read_f32, write_f32);
le_scalar!(f64, F64, read_f64, write_f64);

// single bytes have no byte order
impl LeScalar for u8 {
    const SIZE: usize = 1;

    fn read_le<R: Read>(r: &mut R) -> io::Result<Self> {
        r.read_u8()
    }

    fn write_le<W: Write>(self, w: &mut W) -> io::Result<()> {
        w.write_u8(self)
    }

    fn column(values: Vec<Self>) -> Values {
        Values::U8(Array1::from_vec(values).into_dyn())
    }

    fn scalar(value: Self) -> Values {
        Values::U8(arr0(value).into_dyn())
    }
}

// ---------------------------------------------------------------------------
// binary_header! – typed struct + layout from one ordered field list
// ---------------------------------------------------------------------------

macro_rules! binary_header {
    (
        $(#[$attr:meta])*
        pub struct $name:ident { $($field:ident: $ty:ty,)* }
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, Copy, Default, PartialEq)]
        pub struct $name {
            $(pub $field: $ty,)*
        }

        impl $name {
            /// Encoded size in bytes; fields are packed without padding.
            pub const SIZE: usize = 0 $(+ <$ty as LeScalar>::SIZE)*;

            /// Field names in wire order.
            pub const FIELDS: &'static [&'static str] = &[$(stringify!($field)),*];

            /// Decode from a buffer holding at least [`Self::SIZE`] bytes.
            pub fn decode(mut buf: &[u8]) -> io::Result<Self> {
                Ok(Self {
                    $($field: <$ty as LeScalar>::read_le(&mut buf)?,)*
                })
            }

            pub fn encode<W: Write>(&self, w: &mut W) -> io::Result<()> {
                $(<$ty as LeScalar>::write_le(self.$field, w)?;)*
                Ok(())
            }

            /// Collect one field across a sequence of headers.
            pub fn column(headers: &[Self], field: &str) -> Option<Values> {
                match field {
                    $(stringify!($field) => Some(<$ty as LeScalar>::column(
                        headers.iter().map(|h| h.$field).collect(),
                    )),)*
                    _ => None,
                }
            }

            /// Every field as a 0-d value, in wire order.
            pub fn scalars(&self) -> Vec<(&'static str, Values)> {
                vec![$((stringify!($field), <$ty as LeScalar>::scalar(self.$field)),)*]
            }
        }
    };
}

binary_header! {
    /// Fixed header preceding the two signal channels of every profile.
    pub struct ProfileHeader {
        unit: u16,
        version: u16,
        year: u16,
        month: u16,
        day: u16,
        hours: u16,
        minutes: u16,
        seconds: u16,
        shots_sum: u32,
        trigger_frequency: i32,
        energy_monitor: u32,
        temp_0: u32,
        temp_1: u32,
        temp_2: u32,
        temp_3: u32,
        temp_4: u32,
        background_average: f32,
        background_stddev: f32,
        number_channels: u16,
        number_bins: u32,
        bin_time: f32,
        range_calibration: f32,
        number_data_bins: u16,
        scan_scenario_flags: u16,
        num_background_bins: u16,
        azimuth_angle: f32,
        elevation_angle: f32,
        compass_degrees: f32,
        polarization_voltage_0: f32,
        polarization_voltage_1: f32,
        gps_latitude: f32,
        gps_longitude: f32,
        gps_altitude: f32,
        ad_data_bad_flag: u8,
        data_file_version: u8,
        background_average_2: f32,
        background_stddev_2: f32,
        mcs_mode: u8,
        first_data_bin: u16,
        system_type: u8,
        sync_pulses_seen_per_second: u16,
        first_background_bin: u16,
        header_size: u16,
        ws_used: u8,
        ws_inside_temp: f32,
        ws_outside_temp: f32,
        ws_inside_humidity: f32,
        ws_outside_humidity: f32,
        ws_dewpoint: f32,
        ws_wind_speed: f32,
        ws_wind_direction: i16,
        ws_barometric_pressure: f32,
        ws_rain_rate: f32,
    }
}

binary_header! {
    /// Header of an afterpulse calibration file.
    pub struct AfterpulseHeader {
        ap_header: u32,
        ap_file_version: u16,
        ap_number_channels: u8,
        ap_number_bins: u32,
        ap_energy: f64,
        ap_background_average_copol: f64,
        ap_background_average_crosspol: f64,
    }
}

/// Magic number opening every afterpulse file.
pub const AFTERPULSE_MAGIC: u32 = 0xAAEE_EEAA;
