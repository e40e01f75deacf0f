use smart_default::SmartDefault;

use crate::error::Error;

/// Driver options that influence how results are decoded
///
/// ```rs
/// let mut opts = Opts::default();
/// opts.tiny_int1_is_bit = false;
///
/// let opts = Opts::try_from("mysql://localhost/test?blobsAreStrings=true&useCursorFetch=true")?;
/// ```
#[derive(Debug, Clone, SmartDefault)]
pub struct Opts {
    /// Report BLOB columns as VARCHAR
    pub blobs_are_strings: bool,

    /// Report BLOB columns without an originating table (function results) as VARCHAR
    pub functions_never_return_blobs: bool,

    /// Report TINYINT(1) columns as BIT or BOOLEAN
    #[default = true]
    pub tiny_int1_is_bit: bool,

    /// With `tiny_int1_is_bit`, report BOOLEAN instead of BIT
    pub transformed_bit_is_boolean: bool,

    /// Use server-side cursors for forward-only binary results with a fetch size
    pub use_cursor_fetch: bool,

    /// Silently drain an outstanding streaming result when a new command is issued
    pub clobber_streaming_results: bool,

    /// `net_write_timeout` (seconds) applied while a streaming result is open, 0 disables
    #[default = 600]
    pub net_timeout_for_streaming_results: u32,

    /// `net_write_timeout` restored when a streaming result is closed
    #[default = 60]
    pub default_net_write_timeout: u32,

    /// Honor LOAD DATA LOCAL INFILE requests from the server
    pub allow_load_local_infile: bool,

    /// Accept `file:` URLs as LOCAL INFILE names
    pub allow_url_in_local_infile: bool,

    /// Turn truncation warnings of updates into errors
    #[default = true]
    pub jdbc_compliant_truncation: bool,

    /// Rows whose packet exceeds this many bytes are decoded from a full packet
    #[default = 2048]
    pub large_row_size_threshold: usize,

    /// Keep the info string of OK packets (e.g. `Rows matched: 1  Changed: 1`)
    #[default = true]
    pub read_info_msg: bool,
}

fn parse_bool(key: &str, value: &str) -> Result<bool, Error> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Ok(true),
        "false" | "no" | "0" | "off" => Ok(false),
        _ => Err(Error::BadConfigError(format!(
            "Invalid boolean '{}' for option '{}'",
            value, key
        ))),
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, Error> {
    value.parse().map_err(|_| {
        Error::BadConfigError(format!("Invalid number '{}' for option '{}'", value, key))
    })
}

impl Opts {
    /// Apply a single `key=value` option. Keys are accepted in camelCase and snake_case.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), Error> {
        let normalized: String = key
            .chars()
            .filter(|c| *c != '_')
            .map(|c| c.to_ascii_lowercase())
            .collect();

        match normalized.as_str() {
            "blobsarestrings" => self.blobs_are_strings = parse_bool(key, value)?,
            "functionsneverreturnblobs" => {
                self.functions_never_return_blobs = parse_bool(key, value)?
            }
            "tinyint1isbit" => self.tiny_int1_is_bit = parse_bool(key, value)?,
            "transformedbitisboolean" => self.transformed_bit_is_boolean = parse_bool(key, value)?,
            "usecursorfetch" => self.use_cursor_fetch = parse_bool(key, value)?,
            "clobberstreamingresults" => self.clobber_streaming_results = parse_bool(key, value)?,
            "nettimeoutforstreamingresults" => {
                self.net_timeout_for_streaming_results = parse_number(key, value)?
            }
            "allowloadlocalinfile" => self.allow_load_local_infile = parse_bool(key, value)?,
            "allowurlinlocalinfile" => self.allow_url_in_local_infile = parse_bool(key, value)?,
            "jdbccomplianttruncation" => self.jdbc_compliant_truncation = parse_bool(key, value)?,
            "largerowsizethreshold" => self.large_row_size_threshold = parse_number(key, value)?,
            "readinfomsg" => self.read_info_msg = parse_bool(key, value)?,
            _ => {
                tracing::warn!(key, "ignoring unknown option");
            }
        }
        Ok(())
    }
}

impl TryFrom<&str> for Opts {
    type Error = Error;

    fn try_from(url: &str) -> Result<Self, Self::Error> {
        let parsed = url::Url::parse(url)
            .map_err(|e| Error::BadConfigError(format!("Failed to parse MySQL URL: {}", e)))?;

        if parsed.scheme() != "mysql" {
            return Err(Error::BadConfigError(format!(
                "Invalid URL scheme '{}', expected 'mysql'",
                parsed.scheme()
            )));
        }

        let mut opts = Self::default();
        for (key, value) in parsed.query_pairs() {
            opts.set(&key, &value)?;
        }
        Ok(opts)
    }
}
