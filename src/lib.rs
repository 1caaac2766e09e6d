// People Import - Core Library
// Exposes all modules for use in CLI, web server, and tests

pub mod config;
pub mod error;
pub mod normalize;
pub mod db;
pub mod fields;
pub mod parser;
pub mod loader;
pub mod importer;
pub mod affiliation;
pub mod browse;
pub mod geo;

#[cfg(feature = "server")]
pub mod web;

// Re-export commonly used types
pub use affiliation::{Affiliation, AffiliationError};
pub use browse::{list_affiliations, query_people, PeopleFilter, PeoplePage, PersonSummary};
pub use db::{
    PersonRecord, PhoneRecord,
    open_connection, setup_database,
    count_people, count_phones, get_person, get_phones,
};
pub use error::{GeoError, ImportError, ImportResult, RowDiagnostic};
pub use geo::{GeoService, Region, RegionSource, StaticRegions, TtlCache};
#[cfg(feature = "server")]
pub use geo::IbgeClient;
pub use importer::{import, ImportOutcome, ImportReport};
pub use loader::{load_batch, LoadCounts};
pub use parser::{ParsedBatch, RecordParser};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
