//! Column metadata of a result set.
//!
//! One [`Field`] is unpacked from each column definition packet. Everything a
//! consumer asks about the column (SQL type, encoding, binary-ness) is derived
//! once here from the raw definition and the driver [`Opts`].

use std::fmt;
use std::sync::OnceLock;

use crate::charset::{self, ASCII_ENCODING, CharsetLookup};
use crate::constant::{
    BINARY_COLLATION, ColumnFlags, ColumnType, IMPLICIT_TEMP_TABLE_PREFIX, LENGTH_BLOB,
    LENGTH_LONGBLOB, LENGTH_MEDIUMBLOB, LENGTH_TINYBLOB,
};
use crate::error::{Error, Result};
use crate::opts::Opts;
use crate::protocol::packet::Payload;
use crate::session::ServerSession;

/// A string whose raw bytes are kept and decoded on first access
#[derive(Clone)]
pub struct LazyString {
    bytes: Box<[u8]>,
    encoding: &'static str,
    decoded: OnceLock<String>,
}

impl LazyString {
    pub fn new(bytes: &[u8], encoding: &'static str) -> Self {
        Self {
            bytes: bytes.into(),
            encoding,
            decoded: OnceLock::new(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn as_str(&self) -> &str {
        self.decoded
            .get_or_init(|| charset::decode(&self.bytes, self.encoding).into_owned())
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn encoding(&self) -> &'static str {
        self.encoding
    }
}

impl fmt::Debug for LazyString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

impl fmt::Display for LazyString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PartialEq for LazyString {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes && self.encoding == other.encoding
    }
}

impl Eq for LazyString {}

/// Generic SQL type reported for a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlType {
    Bit,
    Boolean,
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    Real,
    Double,
    Decimal,
    Char,
    VarChar,
    LongVarChar,
    Date,
    Time,
    Timestamp,
    Binary,
    VarBinary,
    LongVarBinary,
    Null,
}

impl SqlType {
    /// Default SQL type of a wire type
    pub fn from_column_type(column_type: ColumnType) -> Self {
        match column_type {
            ColumnType::MYSQL_TYPE_DECIMAL | ColumnType::MYSQL_TYPE_NEWDECIMAL => SqlType::Decimal,
            ColumnType::MYSQL_TYPE_TINY => SqlType::TinyInt,
            ColumnType::MYSQL_TYPE_SHORT => SqlType::SmallInt,
            ColumnType::MYSQL_TYPE_LONG | ColumnType::MYSQL_TYPE_INT24 => SqlType::Integer,
            ColumnType::MYSQL_TYPE_LONGLONG => SqlType::BigInt,
            ColumnType::MYSQL_TYPE_FLOAT => SqlType::Real,
            ColumnType::MYSQL_TYPE_DOUBLE => SqlType::Double,
            ColumnType::MYSQL_TYPE_NULL => SqlType::Null,
            ColumnType::MYSQL_TYPE_TIMESTAMP
            | ColumnType::MYSQL_TYPE_TIMESTAMP2
            | ColumnType::MYSQL_TYPE_DATETIME
            | ColumnType::MYSQL_TYPE_DATETIME2 => SqlType::Timestamp,
            ColumnType::MYSQL_TYPE_DATE
            | ColumnType::MYSQL_TYPE_NEWDATE
            | ColumnType::MYSQL_TYPE_YEAR => SqlType::Date,
            ColumnType::MYSQL_TYPE_TIME | ColumnType::MYSQL_TYPE_TIME2 => SqlType::Time,
            ColumnType::MYSQL_TYPE_VARCHAR | ColumnType::MYSQL_TYPE_VAR_STRING => SqlType::VarChar,
            ColumnType::MYSQL_TYPE_STRING
            | ColumnType::MYSQL_TYPE_ENUM
            | ColumnType::MYSQL_TYPE_SET => SqlType::Char,
            ColumnType::MYSQL_TYPE_JSON => SqlType::LongVarChar,
            ColumnType::MYSQL_TYPE_TINY_BLOB => SqlType::VarBinary,
            ColumnType::MYSQL_TYPE_BLOB
            | ColumnType::MYSQL_TYPE_MEDIUM_BLOB
            | ColumnType::MYSQL_TYPE_LONG_BLOB => SqlType::LongVarBinary,
            ColumnType::MYSQL_TYPE_GEOMETRY | ColumnType::MYSQL_TYPE_TYPED_ARRAY => SqlType::Binary,
            ColumnType::MYSQL_TYPE_BIT => SqlType::Bit,
        }
    }
}

/// What a column definition is decoded against
#[derive(Clone, Copy)]
pub struct FieldContext<'a> {
    pub session: &'a ServerSession,
    pub opts: &'a Opts,
    pub charsets: &'a dyn CharsetLookup,
}

/// Metadata of one result column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    db: LazyString,
    table: LazyString,
    org_table: LazyString,
    name: LazyString,
    org_name: LazyString,
    length: u32,
    wire_type: ColumnType,
    column_type: ColumnType,
    flags: ColumnFlags,
    decimals: u8,
    collation_index: u16,
    encoding: &'static str,
    sql_type: SqlType,
    precision_adjust_factor: i8,
    single_bit: bool,
}

impl Field {
    /// Unpack a column definition packet
    pub fn unpack(payload: &mut Payload, ctx: &FieldContext<'_>) -> Result<Self> {
        let name_encoding = ctx.session.metadata_encoding;

        let _catalog = payload.read_bytes_lenenc()?;
        let db = LazyString::new(payload.read_bytes_lenenc()?, name_encoding);
        let table = LazyString::new(payload.read_bytes_lenenc()?, name_encoding);
        let org_table = LazyString::new(payload.read_bytes_lenenc()?, name_encoding);
        let name = LazyString::new(payload.read_bytes_lenenc()?, name_encoding);
        let org_name = LazyString::new(payload.read_bytes_lenenc()?, name_encoding);

        // length of the fixed fields, always 0x0c
        let _filler = payload.read_u8()?;
        let collation_index = payload.read_u16()?;
        let length = payload.read_u32()?;
        let type_byte = payload.read_u8()?;
        let flags = if ctx.session.has_long_column_info() {
            payload.read_u16()?
        } else {
            u16::from(payload.read_u8()?)
        };
        let decimals = payload.read_u8()?;

        let wire_type = ColumnType::from_u8(type_byte).ok_or_else(|| {
            Error::ProtocolViolation(format!("unknown column type 0x{:02X}", type_byte))
        })?;

        let mut field = Field {
            db,
            table,
            org_table,
            name,
            org_name,
            length,
            wire_type,
            column_type: wire_type,
            flags: ColumnFlags::from_bits_truncate(flags),
            decimals,
            collation_index,
            encoding: ASCII_ENCODING,
            sql_type: SqlType::from_column_type(wire_type),
            precision_adjust_factor: 0,
            single_bit: false,
        };
        field.derive(ctx);

        tracing::trace!(
            name = field.name.as_str(),
            column_type = ?field.column_type,
            sql_type = ?field.sql_type,
            "unpacked field"
        );
        Ok(field)
    }

    fn derive(&mut self, ctx: &FieldContext<'_>) {
        let opts = ctx.opts;

        if self.column_type == ColumnType::MYSQL_TYPE_BLOB {
            if opts.blobs_are_strings
                || (opts.functions_never_return_blobs && self.is_from_function())
            {
                self.column_type = ColumnType::MYSQL_TYPE_VARCHAR;
                self.sql_type = SqlType::VarChar;
            } else if self.collation_index == BINARY_COLLATION {
                self.column_type = blob_type_for_length(self.length);
                self.sql_type = SqlType::from_column_type(self.column_type);
            } else {
                // TEXT reported as BLOB
                self.column_type = ColumnType::MYSQL_TYPE_VAR_STRING;
                self.sql_type = SqlType::LongVarChar;
            }
        }

        if self.sql_type == SqlType::TinyInt && self.length == 1 && opts.tiny_int1_is_bit {
            self.sql_type = if opts.transformed_bit_is_boolean {
                SqlType::Boolean
            } else {
                SqlType::Bit
            };
        }

        if self.column_type.is_numeric() || self.column_type.is_temporal() {
            self.encoding = ASCII_ENCODING;
        } else {
            self.encoding = ctx
                .charsets
                .encoding_for_collation(self.collation_index, ctx.session.server_version)
                .map(charset::normalize_encoding)
                .unwrap_or(ctx.session.metadata_encoding);
            if self.column_type == ColumnType::MYSQL_TYPE_JSON {
                self.encoding = "UTF-8";
            }

            let binary_collation = self.collation_index == BINARY_COLLATION;
            let mut is_binary = self.is_binary();

            if self.column_type == ColumnType::MYSQL_TYPE_VAR_STRING && is_binary && binary_collation
            {
                if opts.functions_never_return_blobs && self.is_from_function() {
                    self.column_type = ColumnType::MYSQL_TYPE_VARCHAR;
                    self.sql_type = SqlType::VarChar;
                } else if self.opaque_binary(opts) {
                    self.sql_type = SqlType::VarBinary;
                }
            }

            if self.column_type == ColumnType::MYSQL_TYPE_STRING
                && is_binary
                && binary_collation
                && self.opaque_binary(opts)
                && !opts.blobs_are_strings
            {
                self.sql_type = SqlType::Binary;
            }

            if self.column_type == ColumnType::MYSQL_TYPE_BIT {
                self.single_bit = self.length <= 1;
                if self.single_bit {
                    self.sql_type = SqlType::Bit;
                } else {
                    self.flags |= ColumnFlags::BINARY_FLAG | ColumnFlags::BLOB_FLAG;
                    self.sql_type = SqlType::VarBinary;
                    is_binary = true;
                }
            }

            if !is_binary {
                match self.sql_type {
                    SqlType::LongVarBinary => self.sql_type = SqlType::LongVarChar,
                    SqlType::VarBinary => self.sql_type = SqlType::VarChar,
                    _ => {}
                }
            }
        }

        if self.is_unsigned() {
            self.precision_adjust_factor = match self.column_type {
                ColumnType::MYSQL_TYPE_DECIMAL | ColumnType::MYSQL_TYPE_NEWDECIMAL => -1,
                ColumnType::MYSQL_TYPE_FLOAT | ColumnType::MYSQL_TYPE_DOUBLE => 1,
                _ => 0,
            };
        }
    }

    fn opaque_binary(&self, opts: &Opts) -> bool {
        if self.collation_index != BINARY_COLLATION || !self.is_binary() {
            return false;
        }
        if !matches!(
            self.column_type,
            ColumnType::MYSQL_TYPE_STRING | ColumnType::MYSQL_TYPE_VAR_STRING
        ) {
            return false;
        }
        // probably a function result
        if self.is_from_function() && !opts.functions_never_return_blobs {
            return false;
        }
        !self.is_implicit_temporary_table()
    }

    /// Re-type the column, e.g. when cached metadata is reinterpreted
    pub fn retype(&mut self, column_type: ColumnType) {
        self.column_type = column_type;
        self.sql_type = SqlType::from_column_type(column_type);
    }

    pub fn db(&self) -> &LazyString {
        &self.db
    }

    pub fn table(&self) -> &LazyString {
        &self.table
    }

    pub fn org_table(&self) -> &LazyString {
        &self.org_table
    }

    pub fn name(&self) -> &LazyString {
        &self.name
    }

    pub fn org_name(&self) -> &LazyString {
        &self.org_name
    }

    /// `table.name`, or just the name for computed columns
    pub fn full_name(&self) -> String {
        if self.table.is_empty() {
            self.name.as_str().to_string()
        } else {
            format!("{}.{}", self.table, self.name)
        }
    }

    /// Declared column length in bytes
    pub fn length(&self) -> u32 {
        self.length
    }

    /// Type code as sent by the server
    pub fn wire_type(&self) -> ColumnType {
        self.wire_type
    }

    /// Type code after reinterpretation
    pub fn column_type(&self) -> ColumnType {
        self.column_type
    }

    pub fn sql_type(&self) -> SqlType {
        self.sql_type
    }

    pub fn flags(&self) -> ColumnFlags {
        self.flags
    }

    pub fn decimals(&self) -> u8 {
        self.decimals
    }

    pub fn collation_index(&self) -> u16 {
        self.collation_index
    }

    pub fn encoding(&self) -> &'static str {
        self.encoding
    }

    pub fn precision_adjust_factor(&self) -> i8 {
        self.precision_adjust_factor
    }

    pub fn is_binary(&self) -> bool {
        self.flags.contains(ColumnFlags::BINARY_FLAG) || self.collation_index == BINARY_COLLATION
    }

    pub fn is_blob(&self) -> bool {
        self.flags.contains(ColumnFlags::BLOB_FLAG)
    }

    pub fn is_unsigned(&self) -> bool {
        self.flags.contains(ColumnFlags::UNSIGNED_FLAG)
    }

    pub fn is_not_null(&self) -> bool {
        self.flags.contains(ColumnFlags::NOT_NULL_FLAG)
    }

    pub fn is_primary_key(&self) -> bool {
        self.flags.contains(ColumnFlags::PRI_KEY_FLAG)
    }

    pub fn is_unique_key(&self) -> bool {
        self.flags.contains(ColumnFlags::UNIQUE_KEY_FLAG)
    }

    pub fn is_multiple_key(&self) -> bool {
        self.flags.contains(ColumnFlags::MULTIPLE_KEY_FLAG)
    }

    pub fn is_auto_increment(&self) -> bool {
        self.flags.contains(ColumnFlags::AUTO_INCREMENT_FLAG)
    }

    pub fn is_zero_fill(&self) -> bool {
        self.flags.contains(ColumnFlags::ZEROFILL_FLAG)
    }

    pub fn is_single_bit(&self) -> bool {
        self.single_bit
    }

    /// Computed columns have no originating table
    pub fn is_from_function(&self) -> bool {
        self.org_table.is_empty()
    }

    /// Columns of a server-internal temporary table (`#sql_...`)
    pub fn is_implicit_temporary_table(&self) -> bool {
        self.table
            .as_bytes()
            .starts_with(IMPLICIT_TEMP_TABLE_PREFIX.as_bytes())
    }

    /// Whether the column is a real BINARY/VARBINARY column rather than a
    /// computed value that merely carries the binary collation
    pub fn is_opaque_binary(&self, opts: &Opts) -> bool {
        self.opaque_binary(opts)
    }
}

fn blob_type_for_length(length: u32) -> ColumnType {
    match length {
        LENGTH_TINYBLOB => ColumnType::MYSQL_TYPE_TINY_BLOB,
        LENGTH_BLOB => ColumnType::MYSQL_TYPE_BLOB,
        LENGTH_MEDIUMBLOB => ColumnType::MYSQL_TYPE_MEDIUM_BLOB,
        LENGTH_LONGBLOB => ColumnType::MYSQL_TYPE_LONG_BLOB,
        _ => ColumnType::MYSQL_TYPE_BLOB,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charset::StaticCharsets;
    use crate::protocol::primitive::*;

    struct Def<'a> {
        table: &'a str,
        org_table: &'a str,
        name: &'a str,
        collation: u16,
        length: u32,
        column_type: ColumnType,
        flags: ColumnFlags,
    }

    impl Default for Def<'_> {
        fn default() -> Self {
            Self {
                table: "t",
                org_table: "t",
                name: "c",
                collation: 45,
                length: 0,
                column_type: ColumnType::MYSQL_TYPE_VAR_STRING,
                flags: ColumnFlags::empty(),
            }
        }
    }

    fn packet(def: &Def<'_>) -> Payload {
        let mut out = Vec::new();
        write_bytes_lenenc(&mut out, b"def");
        write_bytes_lenenc(&mut out, b"test");
        write_bytes_lenenc(&mut out, def.table.as_bytes());
        write_bytes_lenenc(&mut out, def.org_table.as_bytes());
        write_bytes_lenenc(&mut out, def.name.as_bytes());
        write_bytes_lenenc(&mut out, def.name.as_bytes());
        write_int_1(&mut out, 0x0c);
        write_int_2(&mut out, def.collation);
        write_int_4(&mut out, def.length);
        write_int_1(&mut out, def.column_type as u8);
        write_int_2(&mut out, def.flags.bits());
        write_int_1(&mut out, 0);
        write_int_2(&mut out, 0);
        Payload::from_vec(out)
    }

    fn unpack_with(def: Def<'_>, opts: &Opts) -> Field {
        let session = ServerSession::default();
        let ctx = FieldContext {
            session: &session,
            opts,
            charsets: &StaticCharsets,
        };
        Field::unpack(&mut packet(&def), &ctx).unwrap()
    }

    fn unpack(def: Def<'_>) -> Field {
        unpack_with(def, &Opts::default())
    }

    #[test]
    fn test_unpack_names() {
        let field = unpack(Def {
            table: "u",
            org_table: "users",
            name: "id",
            column_type: ColumnType::MYSQL_TYPE_LONG,
            flags: ColumnFlags::NOT_NULL_FLAG | ColumnFlags::PRI_KEY_FLAG,
            length: 11,
            ..Def::default()
        });
        assert_eq!(field.db().as_str(), "test");
        assert_eq!(field.table().as_str(), "u");
        assert_eq!(field.org_table().as_str(), "users");
        assert_eq!(field.name().as_str(), "id");
        assert_eq!(field.full_name(), "u.id");
        assert!(field.is_primary_key());
        assert!(field.is_not_null());
        assert_eq!(field.sql_type(), SqlType::Integer);
        assert_eq!(field.encoding(), "US-ASCII");
    }

    #[test]
    fn test_short_flags_without_long_column_info() {
        let mut out = Vec::new();
        for name in [&b"def"[..], b"", b"", b"", b"n", b"n"] {
            write_bytes_lenenc(&mut out, name);
        }
        write_int_1(&mut out, 0x0c);
        write_int_2(&mut out, 33);
        write_int_4(&mut out, 10);
        write_int_1(&mut out, ColumnType::MYSQL_TYPE_LONG as u8);
        write_int_1(&mut out, ColumnFlags::UNSIGNED_FLAG.bits() as u8);
        write_int_1(&mut out, 3);

        let mut session = ServerSession::default();
        session.capabilities.remove(crate::constant::CapabilityFlags::CLIENT_LONG_FLAG);
        let opts = Opts::default();
        let ctx = FieldContext {
            session: &session,
            opts: &opts,
            charsets: &StaticCharsets,
        };
        let field = Field::unpack(&mut Payload::from_vec(out), &ctx).unwrap();
        assert!(field.is_unsigned());
        assert_eq!(field.decimals(), 3);
    }

    #[test]
    fn test_unknown_column_type() {
        let mut payload = packet(&Def::default());
        // type byte sits 6 bytes before the end: type, flags(2), decimals, filler(2)
        let offset = payload.len() - 6;
        payload.set_u8_at(offset, 0x50).unwrap();
        let session = ServerSession::default();
        let opts = Opts::default();
        let ctx = FieldContext {
            session: &session,
            opts: &opts,
            charsets: &StaticCharsets,
        };
        assert!(matches!(
            Field::unpack(&mut payload, &ctx),
            Err(Error::ProtocolViolation(_))
        ));
    }

    #[test]
    fn test_binary_blob_by_exact_length() {
        let cases = [
            (LENGTH_TINYBLOB, ColumnType::MYSQL_TYPE_TINY_BLOB),
            (LENGTH_BLOB, ColumnType::MYSQL_TYPE_BLOB),
            (LENGTH_MEDIUMBLOB, ColumnType::MYSQL_TYPE_MEDIUM_BLOB),
            (LENGTH_LONGBLOB, ColumnType::MYSQL_TYPE_LONG_BLOB),
            (256, ColumnType::MYSQL_TYPE_BLOB),
            (254, ColumnType::MYSQL_TYPE_BLOB),
            (LENGTH_MEDIUMBLOB - 1, ColumnType::MYSQL_TYPE_BLOB),
        ];
        for (length, expected) in cases {
            let field = unpack(Def {
                collation: BINARY_COLLATION,
                length,
                column_type: ColumnType::MYSQL_TYPE_BLOB,
                flags: ColumnFlags::BLOB_FLAG | ColumnFlags::BINARY_FLAG,
                ..Def::default()
            });
            assert_eq!(field.column_type(), expected, "length {}", length);
            assert_eq!(field.wire_type(), ColumnType::MYSQL_TYPE_BLOB);
        }
    }

    #[test]
    fn test_text_blob_is_long_varchar() {
        let field = unpack(Def {
            length: 262_140,
            column_type: ColumnType::MYSQL_TYPE_BLOB,
            flags: ColumnFlags::BLOB_FLAG,
            ..Def::default()
        });
        assert_eq!(field.column_type(), ColumnType::MYSQL_TYPE_VAR_STRING);
        assert_eq!(field.sql_type(), SqlType::LongVarChar);
        assert_eq!(field.encoding(), "UTF-8");
    }

    #[test]
    fn test_blobs_are_strings() {
        let opts = Opts {
            blobs_are_strings: true,
            ..Opts::default()
        };
        let field = unpack_with(
            Def {
                collation: BINARY_COLLATION,
                length: LENGTH_BLOB,
                column_type: ColumnType::MYSQL_TYPE_BLOB,
                ..Def::default()
            },
            &opts,
        );
        assert_eq!(field.column_type(), ColumnType::MYSQL_TYPE_VARCHAR);
        assert_eq!(field.sql_type(), SqlType::VarChar);
    }

    #[test]
    fn test_functions_never_return_blobs() {
        let opts = Opts {
            functions_never_return_blobs: true,
            ..Opts::default()
        };
        let computed = Def {
            table: "",
            org_table: "",
            collation: BINARY_COLLATION,
            length: LENGTH_BLOB,
            column_type: ColumnType::MYSQL_TYPE_BLOB,
            ..Def::default()
        };
        assert_eq!(unpack_with(computed, &opts).sql_type(), SqlType::VarChar);

        let from_table = Def {
            collation: BINARY_COLLATION,
            length: LENGTH_BLOB,
            column_type: ColumnType::MYSQL_TYPE_BLOB,
            ..Def::default()
        };
        assert_eq!(
            unpack_with(from_table, &opts).column_type(),
            ColumnType::MYSQL_TYPE_BLOB
        );
    }

    #[test]
    fn test_tiny_int1_is_bit() {
        let def = || Def {
            length: 1,
            column_type: ColumnType::MYSQL_TYPE_TINY,
            ..Def::default()
        };
        assert_eq!(unpack(def()).sql_type(), SqlType::Bit);

        let opts = Opts {
            transformed_bit_is_boolean: true,
            ..Opts::default()
        };
        assert_eq!(unpack_with(def(), &opts).sql_type(), SqlType::Boolean);

        let opts = Opts {
            tiny_int1_is_bit: false,
            ..Opts::default()
        };
        assert_eq!(unpack_with(def(), &opts).sql_type(), SqlType::TinyInt);

        let wide = Def {
            length: 4,
            column_type: ColumnType::MYSQL_TYPE_TINY,
            ..Def::default()
        };
        assert_eq!(unpack(wide).sql_type(), SqlType::TinyInt);
    }

    #[test]
    fn test_binary_string_column_is_binary() {
        let field = unpack(Def {
            table: "orders",
            org_table: "orders",
            name: "status",
            collation: BINARY_COLLATION,
            length: 16,
            column_type: ColumnType::MYSQL_TYPE_STRING,
            flags: ColumnFlags::BINARY_FLAG,
        });
        assert!(field.is_opaque_binary(&Opts::default()));
        assert_eq!(field.sql_type(), SqlType::Binary);
    }

    #[test]
    fn test_binary_string_from_function_stays_char() {
        // e.g. DATE_FORMAT(...) on old servers
        let field = unpack(Def {
            table: "",
            org_table: "",
            collation: BINARY_COLLATION,
            length: 10,
            column_type: ColumnType::MYSQL_TYPE_STRING,
            flags: ColumnFlags::BINARY_FLAG,
            ..Def::default()
        });
        assert!(field.is_from_function());
        assert_eq!(field.sql_type(), SqlType::Char);
    }

    #[test]
    fn test_implicit_temporary_table() {
        let field = unpack(Def {
            table: "#sql_1f2e_0",
            org_table: "#sql_1f2e_0",
            collation: BINARY_COLLATION,
            length: 20,
            column_type: ColumnType::MYSQL_TYPE_VAR_STRING,
            flags: ColumnFlags::BINARY_FLAG,
            ..Def::default()
        });
        assert!(field.is_implicit_temporary_table());
        assert_eq!(field.sql_type(), SqlType::VarChar);
    }

    #[test]
    fn test_varbinary_column() {
        let field = unpack(Def {
            collation: BINARY_COLLATION,
            length: 20,
            column_type: ColumnType::MYSQL_TYPE_VAR_STRING,
            flags: ColumnFlags::BINARY_FLAG,
            ..Def::default()
        });
        assert_eq!(field.sql_type(), SqlType::VarBinary);
        assert_eq!(field.encoding(), "ISO8859_1");
    }

    #[test]
    fn test_bit_columns() {
        let single = unpack(Def {
            length: 1,
            column_type: ColumnType::MYSQL_TYPE_BIT,
            ..Def::default()
        });
        assert!(single.is_single_bit());
        assert_eq!(single.sql_type(), SqlType::Bit);

        let multi = unpack(Def {
            length: 8,
            column_type: ColumnType::MYSQL_TYPE_BIT,
            ..Def::default()
        });
        assert!(!multi.is_single_bit());
        assert_eq!(multi.sql_type(), SqlType::VarBinary);
        assert!(multi.flags().contains(ColumnFlags::BINARY_FLAG | ColumnFlags::BLOB_FLAG));
    }

    #[test]
    fn test_json_forces_utf8() {
        let field = unpack(Def {
            collation: 8,
            column_type: ColumnType::MYSQL_TYPE_JSON,
            length: LENGTH_LONGBLOB,
            ..Def::default()
        });
        assert_eq!(field.encoding(), "UTF-8");
        assert_eq!(field.sql_type(), SqlType::LongVarChar);
    }

    #[test]
    fn test_ucs2_encoding_normalized() {
        let field = unpack(Def {
            collation: 35,
            length: 40,
            ..Def::default()
        });
        assert_eq!(field.encoding(), "UTF-16");
    }

    #[test]
    fn test_precision_adjust_factor() {
        let decimal = unpack(Def {
            column_type: ColumnType::MYSQL_TYPE_NEWDECIMAL,
            flags: ColumnFlags::UNSIGNED_FLAG,
            length: 10,
            ..Def::default()
        });
        assert_eq!(decimal.precision_adjust_factor(), -1);

        let double = unpack(Def {
            column_type: ColumnType::MYSQL_TYPE_DOUBLE,
            flags: ColumnFlags::UNSIGNED_FLAG,
            length: 22,
            ..Def::default()
        });
        assert_eq!(double.precision_adjust_factor(), 1);

        let signed = unpack(Def {
            column_type: ColumnType::MYSQL_TYPE_NEWDECIMAL,
            length: 10,
            ..Def::default()
        });
        assert_eq!(signed.precision_adjust_factor(), 0);
    }

    #[test]
    fn test_retype() {
        let mut field = unpack(Def::default());
        field.retype(ColumnType::MYSQL_TYPE_LONG_BLOB);
        assert_eq!(field.column_type(), ColumnType::MYSQL_TYPE_LONG_BLOB);
        assert_eq!(field.sql_type(), SqlType::LongVarBinary);
    }

    #[test]
    fn test_lazy_string_decodes_with_encoding() {
        let s = LazyString::new(b"caf\xe9", "Cp1252");
        assert_eq!(s.as_bytes(), b"caf\xe9");
        assert_eq!(s.as_str(), "café");
        assert_eq!(s.as_str(), "café");
    }
}
