/*
 * SPDX-FileCopyrightText: 2026 mapi-mime contributors
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

//! The TNEF container format: a flat little-endian stream of per-block
//! checksummed attributes carrying a message's property bag and its
//! attachments. Named properties travel inline as GUID plus id or name,
//! so no registry is needed to round-trip them.

pub mod read;
pub mod write;

use chrono::{DateTime, Utc};

pub use read::{decode, TnefReader};
pub use write::{encode, encode_with_names, TnefWriter};

use crate::{ConvertError, Result};

pub(crate) const SIGNATURE: u32 = 0x223E_9F78;

pub(crate) const LVL_MESSAGE: u8 = 1;
pub(crate) const LVL_ATTACHMENT: u8 = 2;

// Attribute ids carry their legacy value type in the high word.
pub(crate) const ATT_TNEF_VERSION: u32 = 0x0008_9006;
pub(crate) const ATT_OEM_CODEPAGE: u32 = 0x0006_9007;
pub(crate) const ATT_MESSAGE_CLASS: u32 = 0x0007_8008;
pub(crate) const ATT_MAPI_PROPS: u32 = 0x0006_9003;
pub(crate) const ATT_RECIP_TABLE: u32 = 0x0006_9004;
pub(crate) const ATT_ATTACH_REND_DATA: u32 = 0x0006_9002;
pub(crate) const ATT_ATTACHMENT: u32 = 0x0006_9005;
pub(crate) const ATT_ATTACH_DATA: u32 = 0x0006_800F;
pub(crate) const ATT_ATTACH_TITLE: u32 = 0x0001_8010;

pub(crate) const TNEF_VERSION: u32 = 0x0001_0000;

/// Embedded messages nest at most this deep before the stream is
/// rejected as too complex.
pub(crate) const MAX_NESTING: usize = 8;

const FILETIME_EPOCH_DIFF: i64 = 11_644_473_600;

/// Block checksum: the byte sum of the payload, modulo 2^16.
pub(crate) fn checksum(payload: &[u8]) -> u16 {
    payload
        .iter()
        .fold(0u16, |acc, &b| acc.wrapping_add(b as u16))
}

pub(crate) fn to_filetime(time: DateTime<Utc>) -> i64 {
    (time.timestamp() + FILETIME_EPOCH_DIFF) * 10_000_000
        + (time.timestamp_subsec_nanos() / 100) as i64
}

pub(crate) fn from_filetime(ticks: i64) -> Result<DateTime<Utc>> {
    let secs = ticks.div_euclid(10_000_000) - FILETIME_EPOCH_DIFF;
    let nanos = (ticks.rem_euclid(10_000_000) * 100) as u32;
    DateTime::from_timestamp(secs, nanos)
        .ok_or(ConvertError::Corrupt("timestamp out of range"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn checksum_wraps_mod_64k() {
        assert_eq!(checksum(&[]), 0);
        assert_eq!(checksum(&[1, 2, 3]), 6);
        assert_eq!(checksum(&[0xFF; 1024]), (0xFFu32 * 1024 % 65536) as u16);
    }

    #[test]
    fn filetime_round_trip() {
        let t = Utc.with_ymd_and_hms(2003, 6, 15, 12, 30, 45).unwrap();
        assert_eq!(from_filetime(to_filetime(t)).unwrap(), t);
        // The FILETIME epoch itself.
        assert_eq!(
            from_filetime(0).unwrap(),
            Utc.with_ymd_and_hms(1601, 1, 1, 0, 0, 0).unwrap()
        );
    }
}
