//! Collation to character encoding lookup.
//!
//! Column definitions carry a collation index, not a character set. The
//! tables below are immutable and shared by every connection.

use std::borrow::Cow;

use auto_impl::auto_impl;
use encoding_rs::Encoding;

use crate::session::ServerVersion;

/// Encoding name used for numeric and temporal columns
pub const ASCII_ENCODING: &str = "US-ASCII";

/// Modern name of the 16-bit unicode encoding
pub const UTF16_ENCODING: &str = "UTF-16";

/// Resolves a collation index to the name of its character encoding
#[auto_impl(&, Box, Arc)]
pub trait CharsetLookup {
    fn encoding_for_collation(&self, index: u16, server_version: ServerVersion)
    -> Option<&'static str>;
}

/// Built-in collation table
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticCharsets;

impl CharsetLookup for StaticCharsets {
    fn encoding_for_collation(
        &self,
        index: u16,
        server_version: ServerVersion,
    ) -> Option<&'static str> {
        let charset = mysql_charset_for_collation(index)?;
        // utf8mb4 and its collations first shipped in 5.5.3
        if charset == "utf8mb4" && !server_version.meets_minimum(5, 5, 3) {
            return None;
        }
        java_encoding_for_charset(charset)
    }
}

/// MySQL character set name of a collation index
pub fn mysql_charset_for_collation(index: u16) -> Option<&'static str> {
    let charset = match index {
        1 | 84 => "big5",
        2 | 9 | 21 | 27 | 77 => "latin2",
        3 | 69 => "dec8",
        4 | 80 => "cp850",
        5 | 8 | 15 | 31 | 47 | 48 | 49 | 94 => "latin1",
        6 | 72 => "hp8",
        7 | 74 => "koi8r",
        10 | 82 => "swe7",
        11 | 65 => "ascii",
        12 | 91 => "ujis",
        13 | 88 => "sjis",
        14 | 23 | 50 | 51 | 52 => "cp1251",
        16 | 71 => "hebrew",
        18 | 89 => "tis620",
        19 | 85 => "euckr",
        20 | 41 | 42 | 79 => "latin7",
        22 | 75 => "koi8u",
        24 | 86 => "gb2312",
        25 | 70 => "greek",
        26 | 34 | 44 | 66 | 99 => "cp1250",
        28 | 87 => "gbk",
        29 | 58 | 59 => "cp1257",
        30 | 78 => "latin5",
        32 | 64 => "armscii8",
        33 | 83 | 192..=215 | 223 => "utf8",
        35 | 90 | 128..=151 | 159 => "ucs2",
        36 | 68 => "cp866",
        37 | 73 => "keybcs2",
        38 | 43 => "macce",
        39 | 53 => "macroman",
        40 | 81 => "cp852",
        45 | 46 | 224..=247 | 255..=323 => "utf8mb4",
        54 | 55 | 101..=124 => "utf16",
        56 | 62 => "utf16le",
        57 | 67 => "cp1256",
        60 | 61 | 160..=183 => "utf32",
        63 => "binary",
        92 | 93 => "geostd8",
        95 | 96 => "cp932",
        97 | 98 => "eucjpms",
        248..=250 => "gb18030",
        _ => return None,
    };
    Some(charset)
}

/// Driver-side encoding name of a MySQL character set
pub fn java_encoding_for_charset(charset: &str) -> Option<&'static str> {
    let encoding = match charset {
        "utf8" | "utf8mb3" | "utf8mb4" => "UTF-8",
        "latin1" => "Cp1252",
        "latin2" => "ISO8859_2",
        "latin5" => "ISO8859_9",
        "latin7" => "ISO8859_13",
        "ascii" | "dec8" | "hp8" | "swe7" | "keybcs2" | "armscii8" | "geostd8" => "US-ASCII",
        "big5" => "Big5",
        "cp850" => "Cp850",
        "cp852" => "Cp852",
        "cp866" => "Cp866",
        "cp932" => "Cp932",
        "cp1250" => "Cp1250",
        "cp1251" => "Cp1251",
        "cp1256" => "Cp1256",
        "cp1257" => "Cp1257",
        "koi8r" => "KOI8_R",
        "koi8u" => "KOI8_U",
        "ujis" => "EUC_JP",
        "eucjpms" => "EUC_JP_Solaris",
        "sjis" => "SJIS",
        "hebrew" => "ISO8859_8",
        "greek" => "ISO8859_7",
        "tis620" => "TIS620",
        "euckr" => "EUC_KR",
        "gb2312" => "EUC_CN",
        "gbk" => "GBK",
        "gb18030" => "GB18030",
        "macce" => "MacCentralEurope",
        "macroman" => "MacRoman",
        "ucs2" | "utf16" => "UnicodeBig",
        "utf16le" => "UTF-16LE",
        "utf32" => "UTF-32",
        "binary" => "ISO8859_1",
        _ => return None,
    };
    Some(encoding)
}

/// Map legacy names of the 16-bit unicode encoding to `UTF-16`
pub fn normalize_encoding(name: &'static str) -> &'static str {
    if name.eq_ignore_ascii_case("UnicodeBig")
        || name.eq_ignore_ascii_case("UNICODE")
        || name.eq_ignore_ascii_case("UCS-2")
        || name.eq_ignore_ascii_case("UCS2")
    {
        UTF16_ENCODING
    } else {
        name
    }
}

/// `encoding_rs` codec for a driver encoding name
fn codec_for(name: &str) -> Option<&'static Encoding> {
    let label: &[u8] = match name {
        "UTF-8" => b"utf-8",
        "UTF-16" | "UnicodeBig" => b"utf-16be",
        "UTF-16LE" => b"utf-16le",
        // Latin-1 bytes decode losslessly through windows-1252
        "Cp1252" | "ISO8859_1" | "US-ASCII" => b"windows-1252",
        "ISO8859_2" => b"iso-8859-2",
        "ISO8859_7" => b"iso-8859-7",
        "ISO8859_8" => b"iso-8859-8",
        "ISO8859_9" => b"windows-1254",
        "ISO8859_13" => b"iso-8859-13",
        "Cp866" => b"ibm866",
        "Cp1250" => b"windows-1250",
        "Cp1251" => b"windows-1251",
        "Cp1256" => b"windows-1256",
        "Cp1257" => b"windows-1257",
        "KOI8_R" => b"koi8-r",
        "KOI8_U" => b"koi8-u",
        "EUC_JP" | "EUC_JP_Solaris" => b"euc-jp",
        "SJIS" | "Cp932" => b"shift_jis",
        "EUC_KR" => b"euc-kr",
        "EUC_CN" | "GBK" => b"gbk",
        "GB18030" => b"gb18030",
        "Big5" => b"big5",
        "TIS620" => b"windows-874",
        "MacRoman" => b"macintosh",
        _ => return None,
    };
    Encoding::for_label(label)
}

/// Decode bytes of the given driver encoding into a string
///
/// UTF-8 input is validated with `simdutf8` and borrowed. Unknown encodings
/// fall back to lossy UTF-8.
pub fn decode<'a>(bytes: &'a [u8], encoding: &str) -> Cow<'a, str> {
    if encoding == "UTF-8" {
        return match simdutf8::basic::from_utf8(bytes) {
            Ok(s) => Cow::Borrowed(s),
            Err(_) => String::from_utf8_lossy(bytes),
        };
    }
    match codec_for(encoding) {
        Some(codec) => codec.decode_without_bom_handling(bytes).0,
        None => {
            tracing::debug!(encoding, "no codec for encoding, decoding as UTF-8");
            String::from_utf8_lossy(bytes)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_collations() {
        let lookup = StaticCharsets;
        let version = ServerVersion::new(8, 0, 36);
        assert_eq!(lookup.encoding_for_collation(33, version), Some("UTF-8"));
        assert_eq!(lookup.encoding_for_collation(45, version), Some("UTF-8"));
        assert_eq!(lookup.encoding_for_collation(255, version), Some("UTF-8"));
        assert_eq!(lookup.encoding_for_collation(8, version), Some("Cp1252"));
        assert_eq!(lookup.encoding_for_collation(63, version), Some("ISO8859_1"));
        assert_eq!(lookup.encoding_for_collation(35, version), Some("UnicodeBig"));
        assert_eq!(lookup.encoding_for_collation(17, version), None);
    }

    #[test]
    fn test_utf8mb4_requires_5_5_3() {
        let lookup = StaticCharsets;
        assert_eq!(
            lookup.encoding_for_collation(45, ServerVersion::new(5, 1, 73)),
            None
        );
        assert_eq!(
            lookup.encoding_for_collation(45, ServerVersion::new(5, 5, 3)),
            Some("UTF-8")
        );
    }

    #[test]
    fn test_normalize_encoding() {
        assert_eq!(normalize_encoding("UnicodeBig"), "UTF-16");
        assert_eq!(normalize_encoding("UNICODE"), "UTF-16");
        assert_eq!(normalize_encoding("UTF-8"), "UTF-8");
    }

    #[test]
    fn test_decode() {
        assert_eq!(decode(b"caf\xc3\xa9", "UTF-8"), "café");
        assert_eq!(decode(b"caf\xe9", "Cp1252"), "café");
        assert_eq!(decode(&[0x00, 0x41, 0x00, 0x42], "UTF-16"), "AB");
        assert_eq!(decode(b"plain", "no-such-encoding"), "plain");
    }
}
