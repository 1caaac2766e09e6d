// 📥 Import Entry Point - parse + load, failures reported, never raised

use crate::error::{ImportError, ImportResult};
use crate::loader::load_batch;
use crate::parser::RecordParser;
use rusqlite::Connection;
use serde::Serialize;
use std::path::Path;
use tracing::{error, info};

/// Counts from a committed import
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub affiliation: String,
    pub rows_read: usize,
    pub people_staged: usize,
    pub people_inserted: usize,
    /// Already present in the store (existing row kept)
    pub people_skipped: usize,
    pub phones_staged: usize,
    pub phones_inserted: usize,
    pub source_sha256: String,
}

impl ImportReport {
    pub fn summary(&self) -> String {
        format!(
            "Import finished for affiliation '{}'. Rows read: {}. People inserted: {}. \
             People skipped (identifier already present): {}. Phones inserted: {}.",
            self.affiliation,
            self.rows_read,
            self.people_inserted,
            self.people_skipped,
            self.phones_inserted
        )
    }
}

/// What the caller of [`import`] gets back
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportOutcome {
    pub success: bool,
    pub summary: String,
    /// Skipped / dropped rows, one message each
    pub diagnostics: Vec<String>,
    /// Present only when the import committed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<ImportReport>,
}

/// Import one spreadsheet into the store.
///
/// Never fails: missing files, empty input and store errors all come back as
/// `success = false` with the reason in `summary`. Store errors roll back the
/// whole run, so no partial counts are ever reported.
pub fn import(conn: &mut Connection, file_path: &Path, affiliation: &str) -> ImportOutcome {
    match run_import(conn, file_path, affiliation) {
        Ok((report, diagnostics)) => {
            let summary = report.summary();
            info!("{}", summary);
            ImportOutcome {
                success: true,
                summary,
                diagnostics,
                report: Some(report),
            }
        }
        Err(e) => {
            error!(path = %file_path.display(), affiliation, error = %e, "Import failed");
            ImportOutcome {
                success: false,
                summary: format!("Import failed: {}", e),
                diagnostics: Vec::new(),
                report: None,
            }
        }
    }
}

/// Parse then load; diagnostics are returned as display strings
pub fn run_import(
    conn: &mut Connection,
    file_path: &Path,
    affiliation: &str,
) -> ImportResult<(ImportReport, Vec<String>)> {
    info!(path = %file_path.display(), affiliation, "Starting import");

    let batch = RecordParser::new().parse_file(file_path, affiliation)?;
    let counts = load_batch(conn, &batch.people, &batch.phones).map_err(ImportError::Load)?;

    let report = ImportReport {
        affiliation: affiliation.trim().to_string(),
        rows_read: batch.rows_read,
        people_staged: counts.people_staged,
        people_inserted: counts.people_inserted,
        people_skipped: counts.people_skipped(),
        phones_staged: counts.phones_staged,
        phones_inserted: counts.phones_inserted,
        source_sha256: batch.source_sha256,
    };
    info!(sha256 = %report.source_sha256, "Import committed");

    let diagnostics = batch.diagnostics.iter().map(|d| d.to_string()).collect();
    Ok((report, diagnostics))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{count_people, count_phones, get_phones, get_person, setup_database};
    use std::io::Write;
    use tempfile::NamedTempFile;

    const HEADER: &str = "cpf;nome;nascimento;conta;agencia;salario;idade;cbo;uf;municipio;endereco;numero;cep;tipo_orgao;uf_orgao;municipio_orgao;nao_perturbe;fone1;fone2";

    fn person_line(id: &str, name: &str, phones: &str) -> String {
        format!(
            "{};{};10/10/1970;999;12;2000,00;54;1234;RJ;Niterói;Rua B;5;24000-000;ESTADUAL;RJ;Rio de Janeiro;N;{}",
            id, name, phones
        )
    }

    fn write_csv(lines: &[String]) -> NamedTempFile {
        let mut tmp = NamedTempFile::new().unwrap();
        writeln!(tmp, "{}", HEADER).unwrap();
        for line in lines {
            writeln!(tmp, "{}", line).unwrap();
        }
        tmp
    }

    fn test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        conn
    }

    #[test]
    fn test_scenario_malformed_duplicate_and_short_phone() {
        let mut conn = test_db();
        let file = write_csv(&[
            person_line("111.111.111-11", "Ana", "(21) 9876;"),
            "linha;quebrada;sem;campos".to_string(),
            person_line("22222222222", "Bruno", "21 3333-4444;"),
            person_line("111.111.111-11", "Ana Duplicada", ";"),
            person_line("33333333333", "Carla", ";"),
        ]);

        let outcome = import(&mut conn, file.path(), "ESTADUAL_RJ");

        assert!(outcome.success, "{}", outcome.summary);
        let report = outcome.report.unwrap();
        assert_eq!(report.rows_read, 4);
        assert_eq!(report.people_inserted, 3);
        assert_eq!(report.phones_inserted, 1);
        assert_eq!(outcome.diagnostics.len(), 1);
        assert!(outcome.diagnostics[0].starts_with("line 3:"));
        assert!(outcome.summary.contains("ESTADUAL_RJ"));
        assert!(outcome.summary.contains("People inserted: 3"));
        assert!(outcome.summary.contains("Phones inserted: 1"));

        assert_eq!(get_phones(&conn, "22222222222").unwrap(), vec!["2133334444".to_string()]);
        assert_eq!(
            get_person(&conn, "11111111111").unwrap().unwrap().full_name.as_deref(),
            Some("Ana")
        );
    }

    #[test]
    fn test_reimport_keeps_row_counts() {
        let mut conn = test_db();
        let file = write_csv(&[
            person_line("1", "Um", "11999998888;"),
            person_line("2", "Dois", ";"),
        ]);

        let first = import(&mut conn, file.path(), "FEDERAL");
        let people_after_first = count_people(&conn).unwrap();
        let phones_after_first = count_phones(&conn).unwrap();

        let second = import(&mut conn, file.path(), "FEDERAL");

        assert!(first.success && second.success);
        assert_eq!(count_people(&conn).unwrap(), people_after_first);
        assert_eq!(count_phones(&conn).unwrap(), phones_after_first);
        let report = second.report.unwrap();
        assert_eq!(report.people_inserted, 0);
        assert_eq!(report.people_skipped, 2);
    }

    #[test]
    fn test_latin1_file_imports() {
        let mut conn = test_db();
        let mut tmp = NamedTempFile::new().unwrap();
        writeln!(tmp, "{}", HEADER).unwrap();
        let line = person_line("5", "Jo?o", ";");
        let mut bytes = line.into_bytes();
        let pos = bytes.iter().position(|&b| b == b'?').unwrap();
        bytes[pos] = 0xE3; // 'ã' in Latin-1
        tmp.write_all(&bytes).unwrap();
        tmp.write_all(b"\n").unwrap();

        let outcome = import(&mut conn, tmp.path(), "FEDERAL");

        assert!(outcome.success, "{}", outcome.summary);
        let stored = get_person(&conn, "5").unwrap().unwrap();
        assert_eq!(stored.full_name.as_deref(), Some("João"));
    }

    #[test]
    fn test_missing_file_reports_failure() {
        let mut conn = test_db();

        let outcome = import(&mut conn, Path::new("/nonexistent/planilha.csv"), "FEDERAL");

        assert!(!outcome.success);
        assert!(outcome.summary.contains("not found"));
        assert!(outcome.report.is_none());
    }

    #[test]
    fn test_empty_file_reports_failure() {
        let mut conn = test_db();
        let tmp = NamedTempFile::new().unwrap();

        let outcome = import(&mut conn, tmp.path(), "FEDERAL");

        assert!(!outcome.success);
        assert!(outcome.summary.contains("empty"));
        assert_eq!(count_people(&conn).unwrap(), 0);
    }

    #[test]
    fn test_store_failure_rolls_back_and_reports() {
        let mut conn = test_db();
        conn.execute_batch(
            "CREATE TRIGGER fail_phone_merge BEFORE INSERT ON phones
             BEGIN SELECT RAISE(ABORT, 'simulated store failure'); END;",
        )
        .unwrap();
        let file = write_csv(&[
            person_line("1", "Um", "11999998888;"),
            person_line("2", "Dois", ";"),
        ]);

        let outcome = import(&mut conn, file.path(), "FEDERAL");

        assert!(!outcome.success);
        assert!(outcome.summary.contains("rolled back"));
        assert!(outcome.report.is_none());
        assert_eq!(count_people(&conn).unwrap(), 0);
        assert_eq!(count_phones(&conn).unwrap(), 0);
    }

    #[test]
    fn test_missing_permanent_tables_is_a_load_error() {
        let mut conn = Connection::open_in_memory().unwrap();
        let file = write_csv(&[person_line("1", "Um", ";")]);

        let outcome = import(&mut conn, file.path(), "FEDERAL");

        assert!(!outcome.success);
        assert!(outcome.summary.contains("load failed"));
    }
}
