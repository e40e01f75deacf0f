//! MySQL cell values in the text and binary protocols

use crate::constant::ColumnType;
use crate::error::{Error, Result};
use crate::protocol::field::Field;
use crate::protocol::primitive::*;
use zerocopy::byteorder::little_endian::{U16 as U16LE, U32 as U32LE};
use zerocopy::{FromBytes, Immutable, KnownLayout};

/// A decoded cell, or a bound parameter
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value<'a> {
    /// NULL value
    Null,
    /// Signed integer (TINYINT, SMALLINT, INT, BIGINT)
    SignedInt(i64),
    /// Unsigned integer (TINYINT UNSIGNED, SMALLINT UNSIGNED, INT UNSIGNED, BIGINT UNSIGNED)
    UnsignedInt(u64),
    /// FLOAT - 4-byte floating point
    Float(f32),
    /// DOUBLE - 8-byte floating point
    Double(f64),
    /// DATE
    Date(Date),
    /// DATETIME/TIMESTAMP
    DateTime(DateTime),
    /// TIME
    Time(Time),
    /// BLOB, GEOMETRY, STRING, VARCHAR, VAR_STRING, DECIMAL, ..
    Bytes(&'a [u8]),
}

/// Calendar date; all-zero for `0000-00-00`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, PartialOrd, Ord, Hash)]
pub struct Date {
    pub year: u16,
    pub month: u8,
    pub day: u8,
}

/// Date and time of day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, PartialOrd, Ord, Hash)]
pub struct DateTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub microsecond: u32,
}

impl DateTime {
    pub fn date(&self) -> Date {
        Date {
            year: self.year,
            month: self.month,
            day: self.day,
        }
    }
}

impl From<Date> for DateTime {
    fn from(date: Date) -> Self {
        Self {
            year: date.year,
            month: date.month,
            day: date.day,
            ..Self::default()
        }
    }
}

/// Signed duration as MySQL TIME represents it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Time {
    pub negative: bool,
    pub days: u32,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub microsecond: u32,
}

impl<'a> Value<'a> {
    /// Decode a binary protocol cell.
    ///
    /// `cell` excludes the length prefix of variable-length cells, as split off
    /// by [`binary_cell_len`].
    pub fn decode_binary(field: &Field, cell: &'a [u8]) -> Result<Self> {
        let is_unsigned = field.is_unsigned();

        match field.column_type() {
            ColumnType::MYSQL_TYPE_NULL => Ok(Value::Null),

            // Integer types
            ColumnType::MYSQL_TYPE_TINY => {
                let (val, _) = read_int_1(cell)?;
                Ok(if is_unsigned {
                    Value::UnsignedInt(u64::from(val))
                } else {
                    Value::SignedInt(i64::from(val as i8))
                })
            }

            ColumnType::MYSQL_TYPE_SHORT | ColumnType::MYSQL_TYPE_YEAR => {
                let (val, _) = read_int_2(cell)?;
                Ok(if is_unsigned {
                    Value::UnsignedInt(u64::from(val))
                } else {
                    Value::SignedInt(i64::from(val as i16))
                })
            }

            ColumnType::MYSQL_TYPE_INT24 | ColumnType::MYSQL_TYPE_LONG => {
                let (val, _) = read_int_4(cell)?;
                Ok(if is_unsigned {
                    Value::UnsignedInt(u64::from(val))
                } else {
                    Value::SignedInt(i64::from(val as i32))
                })
            }

            ColumnType::MYSQL_TYPE_LONGLONG => {
                let (val, _) = read_int_8(cell)?;
                Ok(if is_unsigned {
                    Value::UnsignedInt(val)
                } else {
                    Value::SignedInt(val as i64)
                })
            }

            // Floating point types
            ColumnType::MYSQL_TYPE_FLOAT => {
                let (val, _) = read_int_4(cell)?;
                Ok(Value::Float(f32::from_bits(val)))
            }

            ColumnType::MYSQL_TYPE_DOUBLE => {
                let (val, _) = read_int_8(cell)?;
                Ok(Value::Double(f64::from_bits(val)))
            }

            ColumnType::MYSQL_TYPE_DATE | ColumnType::MYSQL_TYPE_NEWDATE => {
                Ok(Value::Date(decode_binary_datetime(cell)?.date()))
            }

            ColumnType::MYSQL_TYPE_DATETIME
            | ColumnType::MYSQL_TYPE_TIMESTAMP
            | ColumnType::MYSQL_TYPE_TIMESTAMP2
            | ColumnType::MYSQL_TYPE_DATETIME2 => {
                Ok(Value::DateTime(decode_binary_datetime(cell)?))
            }

            ColumnType::MYSQL_TYPE_TIME | ColumnType::MYSQL_TYPE_TIME2 => {
                Ok(Value::Time(decode_binary_time(cell)?))
            }

            // String and BLOB types
            ColumnType::MYSQL_TYPE_VARCHAR
            | ColumnType::MYSQL_TYPE_VAR_STRING
            | ColumnType::MYSQL_TYPE_STRING
            | ColumnType::MYSQL_TYPE_BLOB
            | ColumnType::MYSQL_TYPE_TINY_BLOB
            | ColumnType::MYSQL_TYPE_MEDIUM_BLOB
            | ColumnType::MYSQL_TYPE_LONG_BLOB
            | ColumnType::MYSQL_TYPE_GEOMETRY
            | ColumnType::MYSQL_TYPE_JSON
            | ColumnType::MYSQL_TYPE_DECIMAL
            | ColumnType::MYSQL_TYPE_NEWDECIMAL
            | ColumnType::MYSQL_TYPE_ENUM
            | ColumnType::MYSQL_TYPE_SET
            | ColumnType::MYSQL_TYPE_BIT
            | ColumnType::MYSQL_TYPE_TYPED_ARRAY => Ok(Value::Bytes(cell)),
        }
    }

    /// Decode a text protocol cell
    pub fn decode_text(field: &Field, cell: &'a [u8]) -> Result<Self> {
        let column_type = field.column_type();
        match column_type {
            ColumnType::MYSQL_TYPE_NULL => Ok(Value::Null),

            ColumnType::MYSQL_TYPE_TINY
            | ColumnType::MYSQL_TYPE_SHORT
            | ColumnType::MYSQL_TYPE_INT24
            | ColumnType::MYSQL_TYPE_LONG
            | ColumnType::MYSQL_TYPE_LONGLONG
            | ColumnType::MYSQL_TYPE_YEAR => {
                let text = ascii(cell, column_type)?;
                if field.is_unsigned() {
                    text.parse()
                        .map(Value::UnsignedInt)
                        .map_err(|_| conversion_error(cell, column_type))
                } else {
                    text.parse()
                        .map(Value::SignedInt)
                        .map_err(|_| conversion_error(cell, column_type))
                }
            }

            ColumnType::MYSQL_TYPE_FLOAT => ascii(cell, column_type)?
                .parse()
                .map(Value::Float)
                .map_err(|_| conversion_error(cell, column_type)),

            ColumnType::MYSQL_TYPE_DOUBLE => ascii(cell, column_type)?
                .parse()
                .map(Value::Double)
                .map_err(|_| conversion_error(cell, column_type)),

            ColumnType::MYSQL_TYPE_DATE | ColumnType::MYSQL_TYPE_NEWDATE => {
                let text = ascii(cell, column_type)?;
                parse_text_date(text)
                    .map(Value::Date)
                    .ok_or_else(|| conversion_error(cell, column_type))
            }

            ColumnType::MYSQL_TYPE_DATETIME
            | ColumnType::MYSQL_TYPE_TIMESTAMP
            | ColumnType::MYSQL_TYPE_TIMESTAMP2
            | ColumnType::MYSQL_TYPE_DATETIME2 => {
                let text = ascii(cell, column_type)?;
                parse_text_datetime(text)
                    .map(Value::DateTime)
                    .ok_or_else(|| conversion_error(cell, column_type))
            }

            ColumnType::MYSQL_TYPE_TIME | ColumnType::MYSQL_TYPE_TIME2 => {
                let text = ascii(cell, column_type)?;
                parse_text_time(text)
                    .map(Value::Time)
                    .ok_or_else(|| conversion_error(cell, column_type))
            }

            _ => Ok(Value::Bytes(cell)),
        }
    }

    /// Wire type and unsigned flag announced for a bound parameter
    pub fn param_type(&self) -> (ColumnType, bool) {
        match self {
            Value::Null => (ColumnType::MYSQL_TYPE_NULL, false),
            Value::SignedInt(_) => (ColumnType::MYSQL_TYPE_LONGLONG, false),
            Value::UnsignedInt(_) => (ColumnType::MYSQL_TYPE_LONGLONG, true),
            Value::Float(_) => (ColumnType::MYSQL_TYPE_FLOAT, false),
            Value::Double(_) => (ColumnType::MYSQL_TYPE_DOUBLE, false),
            Value::Date(_) => (ColumnType::MYSQL_TYPE_DATE, false),
            Value::DateTime(_) => (ColumnType::MYSQL_TYPE_DATETIME, false),
            Value::Time(_) => (ColumnType::MYSQL_TYPE_TIME, false),
            Value::Bytes(_) => (ColumnType::MYSQL_TYPE_VAR_STRING, false),
        }
    }

    /// Append the binary protocol encoding. NULL writes nothing; its nullness
    /// travels in the parameter null bitmap.
    pub fn encode_binary(&self, out: &mut Vec<u8>) {
        match *self {
            Value::Null => {}
            Value::SignedInt(v) => write_int_8(out, v as u64),
            Value::UnsignedInt(v) => write_int_8(out, v),
            Value::Float(v) => write_int_4(out, v.to_bits()),
            Value::Double(v) => write_int_8(out, v.to_bits()),
            Value::Date(d) => {
                // time-of-day bytes are present but always zero
                write_int_1(out, 7);
                write_int_2(out, d.year);
                write_int_1(out, d.month);
                write_int_1(out, d.day);
                out.extend_from_slice(&[0, 0, 0]);
            }
            Value::DateTime(dt) => {
                let with_micros = dt.microsecond != 0;
                write_int_1(out, if with_micros { 11 } else { 7 });
                write_int_2(out, dt.year);
                write_int_1(out, dt.month);
                write_int_1(out, dt.day);
                write_int_1(out, dt.hour);
                write_int_1(out, dt.minute);
                write_int_1(out, dt.second);
                if with_micros {
                    write_int_4(out, dt.microsecond);
                }
            }
            Value::Time(t) => {
                let with_micros = t.microsecond != 0;
                write_int_1(out, if with_micros { 12 } else { 8 });
                write_int_1(out, u8::from(t.negative));
                write_int_4(out, t.days);
                write_int_1(out, t.hour);
                write_int_1(out, t.minute);
                write_int_1(out, t.second);
                if with_micros {
                    write_int_4(out, t.microsecond);
                }
            }
            Value::Bytes(bytes) => write_bytes_lenenc(out, bytes),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

/// Split the next binary protocol cell of `column_type` off `data`.
///
/// Returns `(prefix, len)`: the cell occupies `data[prefix..prefix + len]`.
pub fn binary_cell_len(column_type: ColumnType, data: &[u8]) -> Result<(usize, usize)> {
    let fixed = match column_type {
        ColumnType::MYSQL_TYPE_NULL => 0,
        ColumnType::MYSQL_TYPE_TINY => 1,
        ColumnType::MYSQL_TYPE_SHORT | ColumnType::MYSQL_TYPE_YEAR => 2,
        ColumnType::MYSQL_TYPE_INT24 | ColumnType::MYSQL_TYPE_LONG | ColumnType::MYSQL_TYPE_FLOAT => {
            4
        }
        ColumnType::MYSQL_TYPE_LONGLONG | ColumnType::MYSQL_TYPE_DOUBLE => 8,
        _ => {
            let (len, rest) = read_int_lenenc(data)?;
            let len = usize::try_from(len).map_err(|_| Error::InvalidPacket)?;
            let prefix = data.len() - rest.len();
            if rest.len() < len {
                return Err(Error::UnexpectedEof);
            }
            return Ok((prefix, len));
        }
    };
    if data.len() < fixed {
        return Err(Error::UnexpectedEof);
    }
    Ok((0, fixed))
}

fn decode_binary_datetime(cell: &[u8]) -> Result<DateTime> {
    match cell.len() {
        0 => Ok(DateTime::default()),
        4 => {
            let ts = Timestamp4::ref_from_bytes(cell).map_err(Error::from_debug)?;
            Ok(DateTime {
                year: ts.year(),
                month: ts.month,
                day: ts.day,
                ..DateTime::default()
            })
        }
        7 => {
            let ts = Timestamp7::ref_from_bytes(cell).map_err(Error::from_debug)?;
            Ok(DateTime {
                year: ts.year(),
                month: ts.month,
                day: ts.day,
                hour: ts.hour,
                minute: ts.minute,
                second: ts.second,
                microsecond: 0,
            })
        }
        11 => {
            let ts = Timestamp11::ref_from_bytes(cell).map_err(Error::from_debug)?;
            Ok(DateTime {
                year: ts.year(),
                month: ts.month,
                day: ts.day,
                hour: ts.hour,
                minute: ts.minute,
                second: ts.second,
                microsecond: ts.microsecond(),
            })
        }
        len => Err(Error::ProtocolViolation(format!(
            "invalid timestamp length: {}",
            len
        ))),
    }
}

fn decode_binary_time(cell: &[u8]) -> Result<Time> {
    match cell.len() {
        0 => Ok(Time::default()),
        8 => {
            let time = Time8::ref_from_bytes(cell).map_err(Error::from_debug)?;
            Ok(Time {
                negative: time.is_negative(),
                days: time.days(),
                hour: time.hour,
                minute: time.minute,
                second: time.second,
                microsecond: 0,
            })
        }
        12 => {
            let time = Time12::ref_from_bytes(cell).map_err(Error::from_debug)?;
            Ok(Time {
                negative: time.is_negative(),
                days: time.days(),
                hour: time.hour,
                minute: time.minute,
                second: time.second,
                microsecond: time.microsecond(),
            })
        }
        len => Err(Error::ProtocolViolation(format!("invalid time length: {}", len))),
    }
}

fn ascii(cell: &[u8], column_type: ColumnType) -> Result<&str> {
    simdutf8::basic::from_utf8(cell).map_err(|_| conversion_error(cell, column_type))
}

fn conversion_error(cell: &[u8], column_type: ColumnType) -> Error {
    Error::ProtocolViolation(format!(
        "cannot convert '{}' to {:?}",
        String::from_utf8_lossy(cell),
        column_type
    ))
}

fn parse_text_date(text: &str) -> Option<Date> {
    let mut parts = text.splitn(3, '-');
    Some(Date {
        year: parts.next()?.parse().ok()?,
        month: parts.next()?.parse().ok()?,
        day: parts.next()?.parse().ok()?,
    })
}

/// `HH:MM:SS[.ffffff]` into (hours, minute, second, microsecond)
fn parse_clock(text: &str) -> Option<(u32, u8, u8, u32)> {
    let (hms, fraction) = match text.split_once('.') {
        Some((hms, fraction)) => (hms, Some(fraction)),
        None => (text, None),
    };
    let mut parts = hms.splitn(3, ':');
    let hours = parts.next()?.parse().ok()?;
    let minute = parts.next()?.parse().ok()?;
    let second = parts.next()?.parse().ok()?;
    let microsecond = match fraction {
        None => 0,
        Some(f) if f.is_empty() || f.len() > 6 || !f.bytes().all(|b| b.is_ascii_digit()) => {
            return None;
        }
        // right-pad to 6 digits: ".5" is 500000 µs
        Some(f) => format!("{:0<6}", f).parse().ok()?,
    };
    Some((hours, minute, second, microsecond))
}

fn parse_text_datetime(text: &str) -> Option<DateTime> {
    let (date, clock) = match text.split_once(' ') {
        Some((date, clock)) => (date, Some(clock)),
        None => (text, None),
    };
    let date = parse_text_date(date)?;
    let mut datetime = DateTime::from(date);
    if let Some(clock) = clock {
        let (hour, minute, second, microsecond) = parse_clock(clock)?;
        datetime.hour = u8::try_from(hour).ok()?;
        datetime.minute = minute;
        datetime.second = second;
        datetime.microsecond = microsecond;
    }
    Some(datetime)
}

fn parse_text_time(text: &str) -> Option<Time> {
    let (negative, rest) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let (hours, minute, second, microsecond) = parse_clock(rest)?;
    Some(Time {
        negative,
        days: hours / 24,
        hour: u8::try_from(hours % 24).ok()?,
        minute,
        second,
        microsecond,
    })
}

// ============================================================================
// Temporal Types
// ============================================================================

/// TIMESTAMP - 4 bytes (DATE/DATETIME/TIMESTAMP with date only)
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable)]
pub struct Timestamp4 {
    pub year: U16LE,
    pub month: u8,
    pub day: u8,
}

impl Timestamp4 {
    pub fn year(&self) -> u16 {
        self.year.get()
    }
}

/// TIMESTAMP - 7 bytes (DATE/DATETIME/TIMESTAMP without microseconds)
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable)]
pub struct Timestamp7 {
    pub year: U16LE,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl Timestamp7 {
    pub fn year(&self) -> u16 {
        self.year.get()
    }
}

/// TIMESTAMP - 11 bytes (DATE/DATETIME/TIMESTAMP with microseconds)
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable)]
pub struct Timestamp11 {
    pub year: U16LE,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub microsecond: U32LE,
}

impl Timestamp11 {
    pub fn year(&self) -> u16 {
        self.year.get()
    }

    pub fn microsecond(&self) -> u32 {
        self.microsecond.get()
    }
}

/// TIME - 8 bytes
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable)]
pub struct Time8 {
    pub is_negative: u8,
    pub days: U32LE,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl Time8 {
    pub fn is_negative(&self) -> bool {
        self.is_negative != 0
    }

    pub fn days(&self) -> u32 {
        self.days.get()
    }
}

/// TIME - 12 bytes: negative (1), days (4 LE), hour (1), minute (1), second (1), microsecond (4 LE)
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable)]
pub struct Time12 {
    pub is_negative: u8,
    pub days: U32LE,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub microsecond: U32LE,
}

impl Time12 {
    pub fn is_negative(&self) -> bool {
        self.is_negative != 0
    }

    pub fn days(&self) -> u32 {
        self.days.get()
    }

    pub fn microsecond(&self) -> u32 {
        self.microsecond.get()
    }
}

// ============================================================================
// NULL Bitmap
// ============================================================================

/// NULL bitmap for binary protocol
///
/// In MySQL binary protocol, NULL values are indicated by a bitmap where each bit
/// represents whether a column is NULL (1 = NULL, 0 = not NULL).
///
/// For result sets (COM_STMT_EXECUTE response), the bitmap has an offset of 2 bits.
/// For prepared statement parameters, the offset is 0 bits.
#[derive(Debug, Clone, Copy)]
pub struct NullBitmap<'a> {
    bitmap: &'a [u8],
    offset: usize,
}

impl<'a> NullBitmap<'a> {
    /// Bitmap length of a result row with `num_columns` columns
    pub fn result_set_len(num_columns: usize) -> usize {
        (num_columns + 7 + 2) / 8
    }

    /// Bitmap length of `num_params` parameters
    pub fn parameters_len(num_params: usize) -> usize {
        (num_params + 7) / 8
    }

    /// Create a NULL bitmap for result sets (offset = 2)
    pub fn for_result_set(bitmap: &'a [u8]) -> Self {
        Self { bitmap, offset: 2 }
    }

    /// Create a NULL bitmap for parameters (offset = 0)
    pub fn for_parameters(bitmap: &'a [u8]) -> Self {
        Self { bitmap, offset: 0 }
    }

    /// Check if the column at the given index is NULL
    pub fn is_null(&self, idx: usize) -> bool {
        let bit_pos = idx + self.offset;
        let byte_pos = bit_pos >> 3;
        let bit_offset = bit_pos & 7;

        if byte_pos >= self.bitmap.len() {
            return false;
        }

        (self.bitmap[byte_pos] & (1 << bit_offset)) != 0
    }

    /// Get the raw bitmap bytes
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bitmap
    }
}

#[cfg(feature = "with-chrono")]
mod chrono_impl {
    use super::{Date, DateTime, Time};

    impl TryFrom<Date> for chrono::NaiveDate {
        type Error = crate::error::Error;

        fn try_from(d: Date) -> Result<Self, Self::Error> {
            chrono::NaiveDate::from_ymd_opt(i32::from(d.year), u32::from(d.month), u32::from(d.day))
                .ok_or_else(|| {
                    crate::error::Error::ProtocolViolation(format!("invalid date: {:?}", d))
                })
        }
    }

    impl TryFrom<DateTime> for chrono::NaiveDateTime {
        type Error = crate::error::Error;

        fn try_from(dt: DateTime) -> Result<Self, Self::Error> {
            let date = chrono::NaiveDate::try_from(dt.date())?;
            date.and_hms_micro_opt(
                u32::from(dt.hour),
                u32::from(dt.minute),
                u32::from(dt.second),
                dt.microsecond,
            )
            .ok_or_else(|| {
                crate::error::Error::ProtocolViolation(format!("invalid datetime: {:?}", dt))
            })
        }
    }

    impl From<Time> for chrono::TimeDelta {
        fn from(t: Time) -> Self {
            let seconds = i64::from(t.days) * 86_400
                + i64::from(t.hour) * 3_600
                + i64::from(t.minute) * 60
                + i64::from(t.second);
            let delta = chrono::TimeDelta::seconds(seconds)
                + chrono::TimeDelta::microseconds(i64::from(t.microsecond));
            if t.negative { -delta } else { delta }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_cell_len() {
        assert_eq!(binary_cell_len(ColumnType::MYSQL_TYPE_TINY, &[1]).unwrap(), (0, 1));
        assert_eq!(binary_cell_len(ColumnType::MYSQL_TYPE_YEAR, &[0xE8, 0x07]).unwrap(), (0, 2));
        assert_eq!(binary_cell_len(ColumnType::MYSQL_TYPE_FLOAT, &[0; 4]).unwrap(), (0, 4));
        assert_eq!(binary_cell_len(ColumnType::MYSQL_TYPE_DOUBLE, &[0; 8]).unwrap(), (0, 8));
        assert_eq!(binary_cell_len(ColumnType::MYSQL_TYPE_NULL, &[]).unwrap(), (0, 0));
        assert_eq!(
            binary_cell_len(ColumnType::MYSQL_TYPE_DATETIME, &[7, 0, 0, 0, 0, 0, 0, 0]).unwrap(),
            (1, 7)
        );
        assert_eq!(
            binary_cell_len(ColumnType::MYSQL_TYPE_VAR_STRING, &[2, b'h', b'i', 9]).unwrap(),
            (1, 2)
        );
        assert!(matches!(
            binary_cell_len(ColumnType::MYSQL_TYPE_LONGLONG, &[0; 7]),
            Err(Error::UnexpectedEof)
        ));
        assert!(matches!(
            binary_cell_len(ColumnType::MYSQL_TYPE_BLOB, &[5, 1, 2]),
            Err(Error::UnexpectedEof)
        ));
    }

    #[test]
    fn test_encode_date_has_zero_time() {
        let mut out = Vec::new();
        Value::Date(Date {
            year: 2024,
            month: 2,
            day: 29,
        })
        .encode_binary(&mut out);
        assert_eq!(out, vec![7, 0xE8, 0x07, 2, 29, 0, 0, 0]);
    }

    #[test]
    fn test_encode_datetime_length() {
        let mut dt = DateTime {
            year: 2024,
            month: 12,
            day: 25,
            hour: 15,
            minute: 30,
            second: 45,
            microsecond: 0,
        };
        let mut out = Vec::new();
        Value::DateTime(dt).encode_binary(&mut out);
        assert_eq!(out[0], 7);
        assert_eq!(out.len(), 8);

        dt.microsecond = 123_456;
        out.clear();
        Value::DateTime(dt).encode_binary(&mut out);
        assert_eq!(out[0], 11);
        assert_eq!(out.len(), 12);
    }

    #[test]
    fn test_encode_time_length() {
        let mut time = Time {
            negative: true,
            days: 1,
            hour: 12,
            minute: 30,
            second: 45,
            microsecond: 0,
        };
        let mut out = Vec::new();
        Value::Time(time).encode_binary(&mut out);
        assert_eq!(out, vec![8, 1, 1, 0, 0, 0, 12, 30, 45]);

        time.microsecond = 5;
        out.clear();
        Value::Time(time).encode_binary(&mut out);
        assert_eq!(out[0], 12);
        assert_eq!(out.len(), 13);
    }

    #[test]
    fn test_decode_binary_time_layouts() {
        let time = decode_binary_time(&[1, 1, 0, 0, 0, 12, 30, 45]).unwrap();
        assert!(time.negative);
        assert_eq!(time.days, 1);
        assert_eq!((time.hour, time.minute, time.second), (12, 30, 45));

        assert_eq!(decode_binary_time(&[]).unwrap(), Time::default());
        assert!(decode_binary_time(&[0; 5]).is_err());
    }

    #[test]
    fn test_decode_binary_datetime_layouts() {
        let dt = decode_binary_datetime(&[0xE8, 0x07, 12, 25]).unwrap();
        assert_eq!((dt.year, dt.month, dt.day, dt.hour), (2024, 12, 25, 0));

        let mut cell = vec![0xE8, 0x07, 12, 25, 15, 30, 45];
        cell.extend_from_slice(&999_999u32.to_le_bytes());
        let dt = decode_binary_datetime(&cell).unwrap();
        assert_eq!(dt.microsecond, 999_999);
        assert_eq!(dt.second, 45);

        assert!(matches!(
            decode_binary_datetime(&[0; 6]),
            Err(Error::ProtocolViolation(_))
        ));
    }

    #[test]
    fn test_parse_text_temporal() {
        assert_eq!(
            parse_text_date("2024-02-29"),
            Some(Date {
                year: 2024,
                month: 2,
                day: 29
            })
        );
        let dt = parse_text_datetime("2024-12-25 15:30:45.5").unwrap();
        assert_eq!((dt.hour, dt.minute, dt.second), (15, 30, 45));
        assert_eq!(dt.microsecond, 500_000);
        assert_eq!(parse_text_datetime("0000-00-00 00:00:00"), Some(DateTime::default()));

        let time = parse_text_time("-838:59:59").unwrap();
        assert!(time.negative);
        assert_eq!(time.days, 34);
        assert_eq!(time.hour, 22);
        assert_eq!(time.minute, 59);

        assert_eq!(parse_text_time("12:00:00.1234567"), None);
        assert_eq!(parse_text_date("2024/01/01"), None);
    }

    #[test]
    fn test_param_type() {
        assert_eq!(
            Value::UnsignedInt(1).param_type(),
            (ColumnType::MYSQL_TYPE_LONGLONG, true)
        );
        assert_eq!(
            Value::Bytes(b"x").param_type(),
            (ColumnType::MYSQL_TYPE_VAR_STRING, false)
        );
        assert_eq!(Value::Null.param_type(), (ColumnType::MYSQL_TYPE_NULL, false));
    }

    #[test]
    fn test_null_bitmap_result_set() {
        // Bitmap bytes: [0b00000100, 0b00010000]
        // With offset=2, column 0 is bit 2 and column 10 is bit 12
        let bitmap = [0b00000100, 0b00010000];
        let null_bitmap = NullBitmap::for_result_set(&bitmap);

        assert!(null_bitmap.is_null(0));
        assert!(!null_bitmap.is_null(1));
        assert!(!null_bitmap.is_null(2));
        assert!(null_bitmap.is_null(10));
    }

    #[test]
    fn test_null_bitmap_ten_columns() {
        assert_eq!(NullBitmap::result_set_len(10), 2);
        assert_eq!(NullBitmap::result_set_len(6), 1);
        assert_eq!(NullBitmap::result_set_len(7), 2);
        assert_eq!(NullBitmap::parameters_len(8), 1);
        assert_eq!(NullBitmap::parameters_len(9), 2);

        // column 5 is bit 7 of byte 0, column 6 wraps to bit 0 of byte 1
        let bitmap = [0b1000_0000, 0b0000_0001];
        let null_bitmap = NullBitmap::for_result_set(&bitmap);
        assert!(null_bitmap.is_null(5));
        assert!(null_bitmap.is_null(6));
        assert!(!null_bitmap.is_null(9));
    }

    #[test]
    fn test_null_bitmap_parameters() {
        let bitmap = [0b00000101];
        let null_bitmap = NullBitmap::for_parameters(&bitmap);

        assert!(null_bitmap.is_null(0));
        assert!(!null_bitmap.is_null(1));
        assert!(null_bitmap.is_null(2));
        assert!(!null_bitmap.is_null(3));
    }
}
