//! miniSEED 2 record classification and header parsing.

use arcstream_types::MseedRecord;
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use bytes::Bytes;
use chrono::{DateTime, NaiveDate, TimeDelta, Utc};

use crate::{DecodeError, RecordDecoder};

/// Size of the fixed section of the data header.
const FIXED_HEADER_SIZE: usize = 48;

/// Blockette type carrying the record length.
const BLOCKETTE_1000: u16 = 1000;

/// Smallest and largest record length exponents accepted from blockette 1000.
const MIN_EXPONENT: u8 = 7;
const MAX_EXPONENT: u8 = 20;

/// Decoder for miniSEED 2 records that carry blockette 1000.
///
/// The probe is the smallest legal record (128 bytes), so it never reads past
/// the end of a record.
#[derive(Debug, Clone, Copy, Default)]
pub struct MseedDecoder;

impl MseedDecoder {
    /// Creates a decoder.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl RecordDecoder for MseedDecoder {
    type Record = MseedRecord;

    const PROBE_SIZE: usize = 1 << MIN_EXPONENT;

    fn classify_length(&self, probe: &[u8]) -> Result<usize, DecodeError> {
        let header = Header::read(probe)?;
        match header.order {
            Order::Big => record_length::<BigEndian>(probe),
            Order::Little => record_length::<LittleEndian>(probe),
        }
    }

    fn parse(&self, bytes: Bytes) -> Result<MseedRecord, DecodeError> {
        let header = Header::read(&bytes)?;
        Ok(MseedRecord {
            sequence: header.sequence,
            quality: char::from(header.quality),
            network: code(&bytes[18..20]),
            station: code(&bytes[8..13]),
            location: code(&bytes[13..15]),
            channel: code(&bytes[15..18]),
            start_time: header.start_time,
            sample_count: header.sample_count,
            sample_rate: header.sample_rate,
            raw: bytes,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Order {
    Big,
    Little,
}

/// Decoded fixed header fields.
#[derive(Debug)]
struct Header {
    order: Order,
    sequence: u32,
    quality: u8,
    start_time: DateTime<Utc>,
    sample_count: u16,
    sample_rate: f64,
}

impl Header {
    fn read(data: &[u8]) -> Result<Self, DecodeError> {
        if data.len() < FIXED_HEADER_SIZE {
            return Err(DecodeError::TooShort {
                needed: FIXED_HEADER_SIZE,
                got: data.len(),
            });
        }

        let sequence_field = &data[0..6];
        if !sequence_field
            .iter()
            .all(|b| b.is_ascii_digit() || *b == b' ')
        {
            return Err(DecodeError::InvalidSequence);
        }
        let sequence = sequence_field
            .iter()
            .filter(|b| b.is_ascii_digit())
            .fold(0u32, |acc, b| acc * 10 + u32::from(b - b'0'));

        let quality = data[6];
        if !matches!(quality, b'D' | b'R' | b'Q' | b'M') {
            return Err(DecodeError::InvalidQuality(quality));
        }

        let order = detect_order(data)?;
        match order {
            Order::Big => Self::fields::<BigEndian>(data, order, sequence, quality),
            Order::Little => Self::fields::<LittleEndian>(data, order, sequence, quality),
        }
    }

    fn fields<B: ByteOrder>(
        data: &[u8],
        order: Order,
        sequence: u32,
        quality: u8,
    ) -> Result<Self, DecodeError> {
        Ok(Self {
            order,
            sequence,
            quality,
            start_time: start_time::<B>(&data[20..30])?,
            sample_count: B::read_u16(&data[30..32]),
            sample_rate: sample_rate(B::read_i16(&data[32..34]), B::read_i16(&data[34..36])),
        })
    }
}

const fn plausible_time(year: u16, day: u16) -> bool {
    year >= 1900 && year <= 2100 && day >= 1 && day <= 366
}

/// Picks the byte order in which the start time's year and day make sense.
fn detect_order(data: &[u8]) -> Result<Order, DecodeError> {
    let btime = &data[20..24];
    if plausible_time(BigEndian::read_u16(&btime[0..2]), BigEndian::read_u16(&btime[2..4])) {
        Ok(Order::Big)
    } else if plausible_time(
        LittleEndian::read_u16(&btime[0..2]),
        LittleEndian::read_u16(&btime[2..4]),
    ) {
        Ok(Order::Little)
    } else {
        Err(DecodeError::InvalidTime)
    }
}

/// Decodes a 10-byte BTIME. Fractions are in units of 100 µs.
fn start_time<B: ByteOrder>(btime: &[u8]) -> Result<DateTime<Utc>, DecodeError> {
    let year = B::read_u16(&btime[0..2]);
    let day = B::read_u16(&btime[2..4]);
    let (hour, minute, second) = (btime[4], btime[5], btime[6]);
    let fract = B::read_u16(&btime[8..10]);

    if hour > 23 || minute > 59 || second > 60 || fract > 9999 {
        return Err(DecodeError::InvalidTime);
    }

    let midnight = NaiveDate::from_yo_opt(i32::from(year), u32::from(day))
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .ok_or(DecodeError::InvalidTime)?;

    let offset = TimeDelta::hours(i64::from(hour))
        + TimeDelta::minutes(i64::from(minute))
        + TimeDelta::seconds(i64::from(second))
        + TimeDelta::microseconds(i64::from(fract) * 100);
    Ok((midnight + offset).and_utc())
}

/// Nominal sample rate from the header's factor and multiplier.
fn sample_rate(factor: i16, multiplier: i16) -> f64 {
    let (f, m) = (f64::from(factor), f64::from(multiplier));
    match (factor, multiplier) {
        (0, _) | (_, 0) => 0.0,
        (1.., 1..) => f * m,
        (1.., ..=-1) => -f / m,
        (..=-1, 1..) => -m / f,
        (..=-1, ..=-1) => 1.0 / (f * m),
    }
}

/// Follows the blockette chain to blockette 1000 and returns `2^exponent`.
fn record_length<B: ByteOrder>(data: &[u8]) -> Result<usize, DecodeError> {
    let mut offset = usize::from(B::read_u16(&data[46..48]));
    let mut previous = 0;

    while offset >= FIXED_HEADER_SIZE && offset > previous && offset + 8 <= data.len() {
        let blockette = &data[offset..offset + 8];
        if B::read_u16(&blockette[0..2]) == BLOCKETTE_1000 {
            let exponent = blockette[6];
            if !(MIN_EXPONENT..=MAX_EXPONENT).contains(&exponent) {
                return Err(DecodeError::InvalidRecordLength(exponent));
            }
            return Ok(1 << exponent);
        }
        previous = offset;
        offset = usize::from(B::read_u16(&blockette[2..4]));
    }

    Err(DecodeError::MissingBlockette1000)
}

/// Header code field with padding removed.
fn code(field: &[u8]) -> String {
    String::from_utf8_lossy(field)
        .trim_end_matches(['\0', ' '])
        .trim_start()
        .to_string()
}
