use crate::config::BUSY_TIMEOUT;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One person, keyed by national identifier
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonRecord {
    // ========================================================================
    // IDENTITY
    // ========================================================================
    /// Digits only, never empty once built by the parser
    pub national_id: String,
    pub full_name: Option<String>,
    pub birth_date: Option<NaiveDate>,

    // ========================================================================
    // BANKING & EMPLOYMENT
    // ========================================================================
    pub bank_account: Option<String>,
    pub bank_branch: Option<String>,
    pub salary: Option<f64>,
    pub age: Option<i64>,
    pub occupation_code: Option<String>,

    // ========================================================================
    // HOME ADDRESS
    // ========================================================================
    pub address_state: Option<String>,
    pub address_city: Option<String>,
    pub street: Option<String>,
    pub street_number: Option<String>,
    pub postal_code: Option<String>,

    // ========================================================================
    // EMPLOYER
    // ========================================================================
    pub org_type: Option<String>,
    pub org_state: Option<String>,
    pub org_city: Option<String>,

    /// None = unknown
    pub do_not_disturb: Option<bool>,

    /// Batch label chosen by the operator, never read from the file
    pub affiliation: String,
}

impl PersonRecord {
    pub fn new(national_id: impl Into<String>, affiliation: impl Into<String>) -> Self {
        PersonRecord {
            national_id: national_id.into(),
            affiliation: affiliation.into(),
            ..Default::default()
        }
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(PersonRecord {
            national_id: row.get(0)?,
            full_name: row.get(1)?,
            birth_date: row.get(2)?,
            bank_account: row.get(3)?,
            bank_branch: row.get(4)?,
            salary: row.get(5)?,
            age: row.get(6)?,
            occupation_code: row.get(7)?,
            address_state: row.get(8)?,
            address_city: row.get(9)?,
            street: row.get(10)?,
            street_number: row.get(11)?,
            postal_code: row.get(12)?,
            org_type: row.get(13)?,
            org_state: row.get(14)?,
            org_city: row.get(15)?,
            do_not_disturb: row.get(16)?,
            affiliation: row.get(17)?,
        })
    }
}

/// Phone number owned by a person
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PhoneRecord {
    pub owner_id: String,
    /// Digits only, at least 8 long
    pub number: String,
}

impl PhoneRecord {
    pub fn new(owner_id: impl Into<String>, number: impl Into<String>) -> Self {
        PhoneRecord {
            owner_id: owner_id.into(),
            number: number.into(),
        }
    }
}

/// Column order of the `people` table; staging tables and merges use the same order
pub const PERSON_COLUMNS: [&str; 18] = [
    "national_id",
    "full_name",
    "birth_date",
    "bank_account",
    "bank_branch",
    "salary",
    "age",
    "occupation_code",
    "address_state",
    "address_city",
    "street",
    "street_number",
    "postal_code",
    "org_type",
    "org_state",
    "org_city",
    "do_not_disturb",
    "affiliation",
];

/// Open a connection ready for concurrent importers
pub fn open_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)
        .with_context(|| format!("Failed to open database: {}", db_path.display()))?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    Ok(conn)
}

/// Create the permanent store. Imports expect these tables to exist already;
/// this is for `init-db` and tests.
pub fn setup_database(conn: &Connection) -> Result<()> {
    // WAL lets browse queries run while an import holds the write lock
    // (in-memory databases ignore this)
    conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS people (
            national_id TEXT NOT NULL UNIQUE,
            full_name TEXT,
            birth_date TEXT,
            bank_account TEXT,
            bank_branch TEXT,
            salary REAL,
            age INTEGER,
            occupation_code TEXT,
            address_state TEXT,
            address_city TEXT,
            street TEXT,
            street_number TEXT,
            postal_code TEXT,
            org_type TEXT,
            org_state TEXT,
            org_city TEXT,
            do_not_disturb INTEGER,
            affiliation TEXT
        )",
        [],
    )
    .context("Failed to create people table")?;

    // (owner_id, number) uniqueness is enforced by the merge, not by a constraint
    conn.execute(
        "CREATE TABLE IF NOT EXISTS phones (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            owner_id TEXT NOT NULL REFERENCES people(national_id),
            number TEXT NOT NULL
        )",
        [],
    )
    .context("Failed to create phones table")?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_phones_owner_number ON phones(owner_id, number)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_people_name ON people(full_name, national_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_people_affiliation ON people(affiliation)",
        [],
    )?;

    Ok(())
}

pub fn count_people(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM people", [], |row| row.get(0))?;
    Ok(count)
}

pub fn count_phones(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM phones", [], |row| row.get(0))?;
    Ok(count)
}

pub fn get_person(conn: &Connection, national_id: &str) -> Result<Option<PersonRecord>> {
    let sql = format!(
        "SELECT {} FROM people WHERE national_id = ?1",
        PERSON_COLUMNS.join(", ")
    );
    let person = conn
        .query_row(&sql, params![national_id], PersonRecord::from_row)
        .optional()?;
    Ok(person)
}

/// Phone numbers stored for one person, in insertion order
pub fn get_phones(conn: &Connection, owner_id: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT number FROM phones WHERE owner_id = ?1 ORDER BY id")?;
    let numbers = stmt
        .query_map(params![owner_id], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(numbers)
}
