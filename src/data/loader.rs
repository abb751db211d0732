use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use log::debug;

use super::aggregate::aggregate;
use super::model::Dataset;
use super::record::ProfileReader;
use crate::error::Result;

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load an MPL data file: decode every profile, then stack them.
///
/// A truncated trailing record fails the whole file; no partial dataset is
/// returned.
pub fn load_file(path: &Path) -> Result<Dataset> {
    let file = File::open(path)?;
    load_reader(BufReader::new(file))
}

/// Same as [`load_file`] for an arbitrary byte stream.
pub fn load_reader<R: Read>(reader: R) -> Result<Dataset> {
    let profiles = ProfileReader::new(reader).collect::<std::result::Result<Vec<_>, _>>()?;
    debug!("decoded {} profiles", profiles.len());
    aggregate(&profiles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::header::ProfileHeader;
    use crate::data::model::Dim;
    use crate::data::record::Profile;
    use crate::error::{Error, FormatError};

    fn encoded(n: usize) -> Vec<u8> {
        let mut buf = Vec::new();
        for i in 0..n {
            Profile {
                header: ProfileHeader {
                    year: 2020,
                    month: 1,
                    day: 1,
                    seconds: i as u16,
                    number_bins: 2,
                    ..Default::default()
                },
                channel_1: vec![1.0, 2.0],
                channel_2: vec![3.0, 4.0],
            }
            .encode(&mut buf)
            .unwrap();
        }
        buf
    }

    #[test]
    fn loads_every_profile() {
        let ds = load_reader(&encoded(3)[..]).unwrap();
        assert_eq!(ds.dim_len(Dim::Profile), Some(3));
    }

    #[test]
    fn truncated_file_yields_no_dataset() {
        let mut bytes = encoded(2);
        bytes.pop();
        let err = load_reader(&bytes[..]).unwrap_err();
        assert!(matches!(err, Error::Format(FormatError::Truncated { .. })));
    }
}
