// 🔎 Browse - filtered, paginated listing of imported people

use crate::config::PAGE_SIZE;
use anyhow::Result;
use chrono::NaiveDate;
use rusqlite::{params_from_iter, types::Value, Connection};
use serde::{Deserialize, Serialize};

/// Sentinel the UI sends for "no filter" in select boxes
const ALL: &str = "TODOS";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PeopleFilter {
    /// Exact home state code
    #[serde(default)]
    pub region: Option<String>,
    /// Exact affiliation label
    #[serde(default)]
    pub affiliation: Option<String>,
    /// Substring of the identifier
    #[serde(default, rename = "id")]
    pub id_fragment: Option<String>,
    /// Case-insensitive substring of the name
    #[serde(default, rename = "name")]
    pub name_fragment: Option<String>,
    #[serde(default)]
    pub page: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersonSummary {
    pub national_id: String,
    pub full_name: Option<String>,
    /// dd/mm/yyyy
    pub birth_date: Option<String>,
    pub affiliation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeoplePage {
    pub rows: Vec<PersonSummary>,
    pub page: u32,
    /// Never below 1, even with no matches
    pub total_pages: u32,
    pub total: i64,
}

fn selected(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty() && *v != ALL)
}

impl PeopleFilter {
    /// WHERE clause plus its bound values
    fn where_clause(&self) -> (String, Vec<Value>) {
        let mut sql = String::from("WHERE 1=1");
        let mut values = Vec::new();

        if let Some(region) = selected(&self.region) {
            sql.push_str(" AND address_state = ?");
            values.push(Value::Text(region.to_string()));
        }
        if let Some(affiliation) = selected(&self.affiliation) {
            sql.push_str(" AND affiliation = ?");
            values.push(Value::Text(affiliation.to_string()));
        }
        if let Some(id) = selected(&self.id_fragment) {
            sql.push_str(" AND national_id LIKE ?");
            values.push(Value::Text(format!("%{}%", id)));
        }
        if let Some(name) = selected(&self.name_fragment) {
            // LIKE is case-insensitive for ASCII in SQLite
            sql.push_str(" AND full_name LIKE ?");
            values.push(Value::Text(format!("%{}%", name)));
        }

        (sql, values)
    }
}

pub fn query_people(conn: &Connection, filter: &PeopleFilter) -> Result<PeoplePage> {
    let page = filter.page.unwrap_or(1).max(1);
    let (where_sql, values) = filter.where_clause();

    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM people {}", where_sql),
        params_from_iter(values.iter()),
        |row| row.get(0),
    )?;
    let total_pages = ((total as u64 + PAGE_SIZE as u64 - 1) / PAGE_SIZE as u64).max(1) as u32;

    let mut page_values = values;
    page_values.push(Value::Integer(PAGE_SIZE as i64));
    page_values.push(Value::Integer((page as i64 - 1) * PAGE_SIZE as i64));

    let mut stmt = conn.prepare(&format!(
        "SELECT national_id, full_name, birth_date, affiliation
         FROM people {}
         ORDER BY full_name, national_id
         LIMIT ? OFFSET ?",
        where_sql
    ))?;
    let rows = stmt
        .query_map(params_from_iter(page_values.iter()), |row| {
            let birth_date: Option<NaiveDate> = row.get(2)?;
            Ok(PersonSummary {
                national_id: row.get(0)?,
                full_name: row.get(1)?,
                birth_date: birth_date.map(|d| d.format("%d/%m/%Y").to_string()),
                affiliation: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(PeoplePage {
        rows,
        page,
        total_pages,
        total,
    })
}

/// Distinct affiliation labels, for the filter drop-down
pub fn list_affiliations(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT affiliation FROM people WHERE affiliation IS NOT NULL ORDER BY affiliation",
    )?;
    let labels = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(labels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{setup_database, PersonRecord};
    use crate::loader::load_batch;

    fn seeded_db() -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();

        let mut people = Vec::new();
        for i in 0..45 {
            let mut p = PersonRecord::new(format!("{:011}", i), if i % 3 == 0 { "FEDERAL" } else { "ESTADUAL_SP" });
            p.full_name = Some(format!("Pessoa {:02}", i));
            p.address_state = Some(if i % 2 == 0 { "SP" } else { "RJ" }.to_string());
            p.birth_date = NaiveDate::from_ymd_opt(1980, 1, 1 + (i % 28) as u32);
            people.push(p);
        }
        let mut maria = PersonRecord::new("98765432100", "PREFEITURA_CAMPINAS_SP");
        maria.full_name = Some("Maria Souza".to_string());
        people.push(maria);

        load_batch(&mut conn, &people, &[]).unwrap();
        conn
    }

    #[test]
    fn test_pagination() {
        let conn = seeded_db();

        let first = query_people(&conn, &PeopleFilter::default()).unwrap();
        assert_eq!(first.total, 46);
        assert_eq!(first.total_pages, 3);
        assert_eq!(first.rows.len(), 20);
        assert_eq!(first.rows[0].full_name.as_deref(), Some("Maria Souza"));
        assert_eq!(first.rows[1].full_name.as_deref(), Some("Pessoa 00"));
        assert_eq!(first.rows[1].birth_date.as_deref(), Some("01/01/1980"));

        let last = query_people(&conn, &PeopleFilter { page: Some(3), ..Default::default() }).unwrap();
        assert_eq!(last.rows.len(), 6);
        assert_eq!(last.page, 3);
    }

    #[test]
    fn test_page_zero_is_clamped() {
        let conn = seeded_db();
        let page = query_people(&conn, &PeopleFilter { page: Some(0), ..Default::default() }).unwrap();
        assert_eq!(page.page, 1);
    }

    #[test]
    fn test_filters_combine() {
        let conn = seeded_db();

        let filter = PeopleFilter {
            region: Some("SP".to_string()),
            affiliation: Some("FEDERAL".to_string()),
            ..Default::default()
        };
        let page = query_people(&conn, &filter).unwrap();
        // i divisible by 6 in 0..45
        assert_eq!(page.total, 8);
        assert!(page.rows.iter().all(|r| r.affiliation.as_deref() == Some("FEDERAL")));
    }

    #[test]
    fn test_name_and_id_fragments() {
        let conn = seeded_db();

        let by_name = query_people(
            &conn,
            &PeopleFilter { name_fragment: Some("maria".to_string()), ..Default::default() },
        )
        .unwrap();
        assert_eq!(by_name.total, 1);
        assert_eq!(by_name.rows[0].national_id, "98765432100");

        let by_id = query_people(
            &conn,
            &PeopleFilter { id_fragment: Some(" 7654 ".to_string()), ..Default::default() },
        )
        .unwrap();
        assert_eq!(by_id.total, 1);
    }

    #[test]
    fn test_all_sentinel_and_empty_results() {
        let conn = seeded_db();

        let all = query_people(
            &conn,
            &PeopleFilter { region: Some("TODOS".to_string()), ..Default::default() },
        )
        .unwrap();
        assert_eq!(all.total, 46);

        let none = query_people(
            &conn,
            &PeopleFilter { region: Some("AC".to_string()), ..Default::default() },
        )
        .unwrap();
        assert_eq!(none.total, 0);
        assert_eq!(none.total_pages, 1);
        assert!(none.rows.is_empty());
    }

    #[test]
    fn test_list_affiliations() {
        let conn = seeded_db();
        assert_eq!(
            list_affiliations(&conn).unwrap(),
            vec!["ESTADUAL_SP", "FEDERAL", "PREFEITURA_CAMPINAS_SP"]
        );
    }
}
