// People Import - Configuration
// Fixed limits of the import format plus the server's runtime settings

use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

// ============================================================================
// IMPORT FORMAT
// ============================================================================

/// Number of positional person columns at the start of every row
pub const PERSON_COLUMN_COUNT: usize = 17;

/// Rows wider than this are treated as malformed
pub const MAX_COLUMNS: usize = 50;

/// First column holding a phone-number candidate
pub const PHONE_COLUMNS_START: usize = PERSON_COLUMN_COUNT;

/// Shorter numbers (after stripping non-digits) are discarded
pub const PHONE_MIN_DIGITS: usize = 8;

// ============================================================================
// STORE & BROWSE
// ============================================================================

pub const DEFAULT_DB_PATH: &str = "people.db";

/// How long a writer waits for SQLite's write lock before failing
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Rows per browse page
pub const PAGE_SIZE: u32 = 20;

// ============================================================================
// SERVER
// ============================================================================

pub const MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

/// Region list cache lifetime
pub const REGION_CACHE_TTL_HOURS: i64 = 24;

pub const GEO_HTTP_TIMEOUT: Duration = Duration::from_secs(5);

/// Where the geographic reference data comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum GeoSource {
    /// Public IBGE localities API
    Ibge,
    /// Built-in table of states and main cities
    Static,
}

/// Web server settings (CLI flags with environment fallbacks)
#[derive(Parser, Debug, Clone)]
#[command(name = "people-server")]
#[command(about = "Upload and browse imported people records")]
#[command(version)]
pub struct ServerConfig {
    /// Port to listen on
    #[arg(short, long, default_value = "3000", env = "PORT")]
    pub port: u16,

    /// SQLite database holding the people and phones tables
    #[arg(long = "db", default_value = DEFAULT_DB_PATH, env = "PEOPLE_DB_PATH")]
    pub db_path: PathBuf,

    /// Scratch directory for uploaded spreadsheets
    #[arg(long, default_value = "uploads", env = "UPLOAD_DIR")]
    pub upload_dir: PathBuf,

    /// Largest accepted upload body
    #[arg(long, default_value_t = MAX_UPLOAD_BYTES, env = "MAX_UPLOAD_BYTES")]
    pub max_upload_bytes: usize,

    #[arg(long, value_enum, default_value = "ibge", env = "GEO_SOURCE")]
    pub geo_source: GeoSource,
}
