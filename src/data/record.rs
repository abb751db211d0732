use std::io::{self, ErrorKind, Read, Write};

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};

use super::header::ProfileHeader;
use crate::error::FormatError;

// ---------------------------------------------------------------------------
// Profile – one decoded record
// ---------------------------------------------------------------------------

/// One profile: the fixed header plus both signal channels.
///
/// `channel_1` and `channel_2` each hold `header.number_bins` values.
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub header: ProfileHeader,
    pub channel_1: Vec<f32>,
    pub channel_2: Vec<f32>,
}

impl Profile {
    pub fn bins(&self) -> usize {
        self.header.number_bins as usize
    }

    /// Write the record in instrument layout.
    pub fn encode<W: Write>(&self, w: &mut W) -> io::Result<()> {
        self.header.encode(w)?;
        for &v in self.channel_1.iter().chain(&self.channel_2) {
            w.write_f32::<LittleEndian>(v)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Fill as much of `buf` as the reader allows, returning the byte count.
///
/// Unlike `read_exact` this reports how many bytes were available, so the
/// caller can tell a clean end of stream from a truncated record.
pub(crate) fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Read exactly `len` bytes or fail as truncated.
///
/// The buffer grows only with the bytes the reader yields, so a corrupt
/// length field cannot force a huge allocation.
pub(crate) fn read_block<R: Read>(
    reader: &mut R,
    len: usize,
    what: &'static str,
) -> Result<Vec<u8>, FormatError> {
    let mut buf = Vec::new();
    reader
        .by_ref()
        .take(u64::try_from(len).unwrap_or(u64::MAX))
        .read_to_end(&mut buf)?;
    if buf.len() < len {
        return Err(FormatError::Truncated {
            what,
            expected: len,
            actual: buf.len(),
        });
    }
    Ok(buf)
}

/// Read `n` little-endian `f32` values or fail as truncated.
fn read_f32_block<R: Read>(
    reader: &mut R,
    n: usize,
    what: &'static str,
) -> Result<Vec<f32>, FormatError> {
    let buf = read_block(reader, n.saturating_mul(4), what)?;
    let mut values = vec![0f32; n];
    LittleEndian::read_f32_into(&buf, &mut values);
    Ok(values)
}

/// Decode the next profile from a stream positioned at a record boundary.
///
/// Returns `Ok(None)` when the stream is exhausted exactly at a boundary.
pub fn read_profile<R: Read>(reader: &mut R) -> Result<Option<Profile>, FormatError> {
    let mut buf = [0u8; ProfileHeader::SIZE];
    let got = read_full(reader, &mut buf)?;
    if got == 0 {
        return Ok(None);
    }
    if got < buf.len() {
        return Err(FormatError::Truncated {
            what: "header",
            expected: buf.len(),
            actual: got,
        });
    }
    let header = ProfileHeader::decode(&buf)?;

    let n = header.number_bins as usize;
    let channel_1 = read_f32_block(reader, n, "channel_1 data")?;
    let channel_2 = read_f32_block(reader, n, "channel_2 data")?;

    Ok(Some(Profile {
        header,
        channel_1,
        channel_2,
    }))
}

/// Iterator over the profiles of a stream, in file order.
///
/// Yields at most one error, after which it is fused.
pub struct ProfileReader<R> {
    reader: R,
    done: bool,
}

impl<R: Read> ProfileReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            done: false,
        }
    }
}

impl<R: Read> Iterator for ProfileReader<R> {
    type Item = Result<Profile, FormatError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match read_profile(&mut self.reader) {
            Ok(Some(profile)) => Some(Ok(profile)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(bins: u32, seed: f32) -> Profile {
        Profile {
            header: ProfileHeader {
                number_bins: bins,
                energy_monitor: 1000,
                ..Default::default()
            },
            channel_1: (0..bins).map(|j| seed + j as f32).collect(),
            channel_2: (0..bins).map(|j| seed - j as f32).collect(),
        }
    }

    fn encode_all(profiles: &[Profile]) -> Vec<u8> {
        let mut buf = Vec::new();
        for p in profiles {
            p.encode(&mut buf).unwrap();
        }
        buf
    }

    #[test]
    fn empty_stream_is_end_of_stream() {
        let mut empty: &[u8] = &[];
        assert!(read_profile(&mut empty).unwrap().is_none());
    }

    #[test]
    fn decodes_records_in_file_order() {
        let profiles = vec![profile(4, 1.0), profile(4, 10.0), profile(4, 100.0)];
        let bytes = encode_all(&profiles);
        assert_eq!(bytes.len(), 3 * (ProfileHeader::SIZE + 2 * 4 * 4));

        let decoded: Vec<Profile> = ProfileReader::new(&bytes[..])
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(decoded, profiles);
    }

    #[test]
    fn trailing_partial_record_is_an_error_after_complete_ones() {
        let profiles = vec![profile(3, 1.0), profile(3, 2.0)];
        let mut bytes = encode_all(&profiles);
        bytes.extend_from_slice(&[0u8; 17]);

        let results: Vec<_> = ProfileReader::new(&bytes[..]).collect();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap(), &profiles[0]);
        assert_eq!(results[1].as_ref().unwrap(), &profiles[1]);
        assert!(matches!(
            results[2],
            Err(FormatError::Truncated { what: "header", expected: 163, actual: 17 })
        ));
    }

    #[test]
    fn truncated_signal_is_an_error() {
        let mut bytes = encode_all(&[profile(5, 1.0)]);
        bytes.truncate(bytes.len() - 1);
        let err = read_profile(&mut &bytes[..]).unwrap_err();
        assert!(matches!(
            err,
            FormatError::Truncated { what: "channel_2 data", expected: 20, actual: 19 }
        ));

        let bytes = encode_all(&[profile(5, 1.0)]);
        let cut = &bytes[..ProfileHeader::SIZE + 8];
        let err = read_profile(&mut &cut[..]).unwrap_err();
        assert!(matches!(err, FormatError::Truncated { what: "channel_1 data", .. }));
    }

    #[test]
    fn oversized_bin_count_is_truncation_not_allocation() {
        let mut bytes = Vec::new();
        ProfileHeader {
            number_bins: u32::MAX,
            ..Default::default()
        }
        .encode(&mut bytes)
        .unwrap();
        bytes.extend_from_slice(&[0u8; 8]);

        let err = read_profile(&mut &bytes[..]).unwrap_err();
        match err {
            FormatError::Truncated { what, expected, actual } => {
                assert_eq!(what, "channel_1 data");
                assert_eq!(expected, u32::MAX as usize * 4);
                assert_eq!(actual, 8);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn zero_bin_profiles_are_valid() {
        let bytes = encode_all(&[profile(0, 0.0)]);
        let p = read_profile(&mut &bytes[..]).unwrap().unwrap();
        assert!(p.channel_1.is_empty() && p.channel_2.is_empty());
    }
}
