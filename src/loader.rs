// 💾 Bulk Loader - staging tables + set-based merge in one transaction
//
// People and phones are copied into constraint-free TEMP tables with a single
// reused prepared statement, then merged into the permanent tables:
//   people: INSERT ... ON CONFLICT(national_id) DO NOTHING (existing row wins)
//   phones: only when the owner exists and the exact pair is not stored yet
// Either both merges commit or neither does.

use crate::db::{PersonRecord, PhoneRecord, PERSON_COLUMNS};
use rusqlite::{params, Connection, TransactionBehavior};
use tracing::{debug, info, warn};

/// Rows moved by one load
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadCounts {
    pub people_staged: usize,
    pub people_inserted: usize,
    pub phones_staged: usize,
    pub phones_inserted: usize,
}

impl LoadCounts {
    /// Staged people that already existed in the store
    pub fn people_skipped(&self) -> usize {
        self.people_staged - self.people_inserted
    }
}

// ============================================================================
// STAGING TABLE GUARD
// ============================================================================

/// A uniquely named TEMP table that is dropped on every exit path.
///
/// `release` drops it explicitly and surfaces errors; if the guard goes out
/// of scope first (an error unwinding through `?`), `Drop` removes it and the
/// surrounding transaction's rollback discards whatever is left.
struct StagingTable<'conn> {
    conn: &'conn Connection,
    name: String,
    released: bool,
}

impl<'conn> StagingTable<'conn> {
    /// Same columns as `people`, no constraints
    fn create_like_people(conn: &'conn Connection) -> rusqlite::Result<Self> {
        let name = unique_name("people");
        conn.execute_batch(&format!(
            "CREATE TEMP TABLE \"{}\" AS SELECT {} FROM main.people WHERE 0",
            name,
            PERSON_COLUMNS.join(", ")
        ))?;
        debug!(table = %name, "Created people staging table");
        Ok(StagingTable { conn, name, released: false })
    }

    fn create_for_phones(conn: &'conn Connection) -> rusqlite::Result<Self> {
        let name = unique_name("phones");
        conn.execute_batch(&format!(
            "CREATE TEMP TABLE \"{}\" (owner_id TEXT, number TEXT)",
            name
        ))?;
        debug!(table = %name, "Created phones staging table");
        Ok(StagingTable { conn, name, released: false })
    }

    /// Quoted, schema-qualified identifier for SQL
    fn ident(&self) -> String {
        format!("temp.\"{}\"", self.name)
    }

    fn release(mut self) -> rusqlite::Result<()> {
        self.released = true;
        self.conn
            .execute_batch(&format!("DROP TABLE IF EXISTS {}", self.ident()))
    }
}

impl Drop for StagingTable<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self
            .conn
            .execute_batch(&format!("DROP TABLE IF EXISTS {}", self.ident()))
        {
            warn!(table = %self.name, error = %e, "Failed to drop staging table");
        }
    }
}

fn unique_name(kind: &str) -> String {
    format!("staging_{}_{}", kind, uuid::Uuid::new_v4().simple())
}

// ============================================================================
// STAGE + MERGE
// ============================================================================

fn stage_people(conn: &Connection, staging: &StagingTable<'_>, people: &[PersonRecord]) -> rusqlite::Result<usize> {
    let placeholders: Vec<String> = (1..=PERSON_COLUMNS.len()).map(|i| format!("?{}", i)).collect();
    let mut stmt = conn.prepare(&format!(
        "INSERT INTO {} ({}) VALUES ({})",
        staging.ident(),
        PERSON_COLUMNS.join(", "),
        placeholders.join(", ")
    ))?;

    for p in people {
        stmt.execute(params![
            p.national_id,
            p.full_name,
            p.birth_date,
            p.bank_account,
            p.bank_branch,
            p.salary,
            p.age,
            p.occupation_code,
            p.address_state,
            p.address_city,
            p.street,
            p.street_number,
            p.postal_code,
            p.org_type,
            p.org_state,
            p.org_city,
            p.do_not_disturb,
            p.affiliation,
        ])?;
    }

    Ok(people.len())
}

fn merge_people(conn: &Connection, staging: &StagingTable<'_>) -> rusqlite::Result<usize> {
    let columns = PERSON_COLUMNS.join(", ");
    // "WHERE true" keeps SQLite from reading ON CONFLICT as a join constraint
    conn.execute(
        &format!(
            "INSERT INTO main.people ({cols})
             SELECT {cols} FROM {staging} WHERE true
             ON CONFLICT(national_id) DO NOTHING",
            cols = columns,
            staging = staging.ident()
        ),
        [],
    )
}

fn stage_phones(conn: &Connection, staging: &StagingTable<'_>, phones: &[PhoneRecord]) -> rusqlite::Result<usize> {
    let mut stmt = conn.prepare(&format!(
        "INSERT INTO {} (owner_id, number) VALUES (?1, ?2)",
        staging.ident()
    ))?;

    for phone in phones {
        stmt.execute(params![phone.owner_id, phone.number])?;
    }

    Ok(phones.len())
}

fn merge_phones(conn: &Connection, staging: &StagingTable<'_>) -> rusqlite::Result<usize> {
    conn.execute(
        &format!(
            "INSERT INTO main.phones (owner_id, number)
             SELECT DISTINCT s.owner_id, s.number
             FROM {} s
             WHERE EXISTS (
                 SELECT 1 FROM main.people p WHERE p.national_id = s.owner_id
             ) AND NOT EXISTS (
                 SELECT 1 FROM main.phones t
                 WHERE t.owner_id = s.owner_id AND t.number = s.number
             )",
            staging.ident()
        ),
        [],
    )
}

/// Merge a parsed batch into the permanent store, all or nothing.
///
/// On error nothing from this call remains: the transaction is rolled back
/// when it is dropped uncommitted.
pub fn load_batch(
    conn: &mut Connection,
    people: &[PersonRecord],
    phones: &[PhoneRecord],
) -> rusqlite::Result<LoadCounts> {
    let mut counts = LoadCounts::default();

    // Write lock taken up front; concurrent importers wait on the busy timeout
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    {
        let staging = StagingTable::create_like_people(&tx)?;
        counts.people_staged = stage_people(&tx, &staging, people)?;
        counts.people_inserted = merge_people(&tx, &staging)?;
        staging.release()?;
    }
    info!(
        staged = counts.people_staged,
        inserted = counts.people_inserted,
        "Merged people"
    );

    if phones.is_empty() {
        info!("No valid phone numbers to load");
    } else {
        let staging = StagingTable::create_for_phones(&tx)?;
        counts.phones_staged = stage_phones(&tx, &staging, phones)?;
        counts.phones_inserted = merge_phones(&tx, &staging)?;
        staging.release()?;
        info!(
            staged = counts.phones_staged,
            inserted = counts.phones_inserted,
            "Merged phones"
        );
    }

    tx.commit()?;
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{count_people, count_phones, get_phones, open_connection, setup_database};

    fn test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        conn
    }

    fn person(id: &str) -> PersonRecord {
        let mut p = PersonRecord::new(id, "FEDERAL");
        p.full_name = Some(format!("Pessoa {}", id));
        p
    }

    fn staging_tables_left(conn: &Connection) -> i64 {
        conn.query_row(
            "SELECT COUNT(*) FROM sqlite_temp_master WHERE type = 'table' AND name LIKE 'staging_%'",
            [],
            |row| row.get(0),
        )
        .unwrap()
    }

    #[test]
    fn test_load_twice_is_idempotent() {
        let mut conn = test_db();
        let people = vec![person("1"), person("2"), person("3")];
        let phones = vec![PhoneRecord::new("1", "11999998888")];

        let first = load_batch(&mut conn, &people, &phones).unwrap();
        let count1 = count_people(&conn).unwrap();

        let second = load_batch(&mut conn, &people, &phones).unwrap();
        let count2 = count_people(&conn).unwrap();

        assert_eq!(first.people_inserted, 3);
        assert_eq!(first.phones_inserted, 1);
        assert_eq!(second.people_inserted, 0);
        assert_eq!(second.people_skipped(), 3);
        assert_eq!(second.phones_inserted, 0);
        assert_eq!(count1, count2);
        assert_eq!(count_phones(&conn).unwrap(), 1);
    }

    #[test]
    fn test_existing_person_wins_on_conflict() {
        let mut conn = test_db();

        let mut original = person("10");
        original.affiliation = "FEDERAL".to_string();
        load_batch(&mut conn, &[original], &[]).unwrap();

        let mut incoming = person("10");
        incoming.full_name = Some("Outro Nome".to_string());
        incoming.affiliation = "ESTADUAL_RJ".to_string();
        let counts = load_batch(&mut conn, &[incoming], &[]).unwrap();

        let stored = crate::db::get_person(&conn, "10").unwrap().unwrap();
        assert_eq!(counts.people_inserted, 0);
        assert_eq!(stored.full_name.as_deref(), Some("Pessoa 10"));
        assert_eq!(stored.affiliation, "FEDERAL");
    }

    #[test]
    fn test_staging_accepts_duplicates_merge_collapses_them() {
        let mut conn = test_db();
        let people = vec![person("5"), person("5")];

        let counts = load_batch(&mut conn, &people, &[]).unwrap();

        assert_eq!(counts.people_staged, 2);
        assert_eq!(counts.people_inserted, 1);
    }

    #[test]
    fn test_orphan_phones_are_not_stored() {
        let mut conn = test_db();
        let phones = vec![
            PhoneRecord::new("1", "11999998888"),
            PhoneRecord::new("404", "21988887777"),
        ];

        let counts = load_batch(&mut conn, &[person("1")], &phones).unwrap();

        assert_eq!(counts.phones_staged, 2);
        assert_eq!(counts.phones_inserted, 1);
        assert_eq!(get_phones(&conn, "404").unwrap(), Vec::<String>::new());
    }

    #[test]
    fn test_phones_attach_to_previously_imported_people() {
        let mut conn = test_db();
        load_batch(&mut conn, &[person("1")], &[PhoneRecord::new("1", "11999998888")]).unwrap();

        // Person skipped as existing, new number still attached
        let counts = load_batch(
            &mut conn,
            &[person("1")],
            &[
                PhoneRecord::new("1", "11999998888"),
                PhoneRecord::new("1", "1133334444"),
            ],
        )
        .unwrap();

        assert_eq!(counts.people_inserted, 0);
        assert_eq!(counts.phones_inserted, 1);
        assert_eq!(
            get_phones(&conn, "1").unwrap(),
            vec!["11999998888".to_string(), "1133334444".to_string()]
        );
    }

    #[test]
    fn test_failure_mid_merge_rolls_back_everything() {
        let mut conn = test_db();
        conn.execute_batch(
            "CREATE TRIGGER fail_phone_merge BEFORE INSERT ON phones
             BEGIN SELECT RAISE(ABORT, 'simulated store failure'); END;",
        )
        .unwrap();

        let result = load_batch(
            &mut conn,
            &[person("1"), person("2")],
            &[PhoneRecord::new("1", "11999998888")],
        );

        assert!(result.is_err());
        assert_eq!(count_people(&conn).unwrap(), 0, "people merge must be rolled back");
        assert_eq!(count_phones(&conn).unwrap(), 0);
        assert_eq!(staging_tables_left(&conn), 0);
        assert!(conn.is_autocommit(), "no transaction left open");
    }

    #[test]
    fn test_staging_tables_removed_after_success() {
        let mut conn = test_db();
        load_batch(&mut conn, &[person("1")], &[PhoneRecord::new("1", "11999998888")]).unwrap();

        assert_eq!(staging_tables_left(&conn), 0);
    }

    #[test]
    fn test_concurrent_loads_share_the_store_safely() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("people.db");
        setup_database(&open_connection(&db_path).unwrap()).unwrap();

        // Overlapping identifiers across the two batches
        let batches: Vec<Vec<PersonRecord>> = vec![
            (0..50).map(|i| person(&i.to_string())).collect(),
            (25..75).map(|i| person(&i.to_string())).collect(),
        ];

        let handles: Vec<_> = batches
            .into_iter()
            .map(|batch| {
                let db_path = db_path.clone();
                std::thread::spawn(move || {
                    let mut conn = open_connection(&db_path).unwrap();
                    load_batch(&mut conn, &batch, &[]).unwrap()
                })
            })
            .collect();

        let inserted: usize = handles
            .into_iter()
            .map(|h| h.join().unwrap().people_inserted)
            .sum();

        let conn = open_connection(&db_path).unwrap();
        assert_eq!(inserted, 75);
        assert_eq!(count_people(&conn).unwrap(), 75);
    }
}
