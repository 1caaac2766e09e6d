// 🏛️ Field Descriptors - Positional schema of the people spreadsheet
// Source files carry unreliable headers, so columns are bound by position

use crate::db::PersonRecord;
use crate::normalize;
use chrono::NaiveDate;

// ============================================================================
// FIELD KINDS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Digits-only key
    Identifier,
    Text,
    /// dd/mm/yyyy
    Date,
    /// Decimal comma or dot
    Decimal,
    Integer,
    /// sim/não style flag
    Flag,
}

/// A coerced cell. `Absent` covers both empty cells and values that failed
/// to coerce.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Date(NaiveDate),
    Decimal(f64),
    Integer(i64),
    Flag(bool),
    Absent,
}

impl FieldKind {
    pub fn coerce(&self, raw: &str) -> FieldValue {
        let value = match self {
            FieldKind::Identifier => {
                let digits = normalize::digits_only(raw);
                (!digits.is_empty()).then(|| FieldValue::Text(digits))
            }
            FieldKind::Text => normalize::text(raw).map(FieldValue::Text),
            FieldKind::Date => normalize::date_dmy(raw).map(FieldValue::Date),
            FieldKind::Decimal => normalize::decimal(raw).map(FieldValue::Decimal),
            FieldKind::Integer => normalize::integer(raw).map(FieldValue::Integer),
            FieldKind::Flag => normalize::flag(raw).map(FieldValue::Flag),
        };
        value.unwrap_or(FieldValue::Absent)
    }
}

impl FieldValue {
    pub fn is_absent(&self) -> bool {
        matches!(self, FieldValue::Absent)
    }

    fn into_text(self) -> Option<String> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    fn into_date(self) -> Option<NaiveDate> {
        match self {
            FieldValue::Date(d) => Some(d),
            _ => None,
        }
    }

    fn into_decimal(self) -> Option<f64> {
        match self {
            FieldValue::Decimal(v) => Some(v),
            _ => None,
        }
    }

    fn into_integer(self) -> Option<i64> {
        match self {
            FieldValue::Integer(v) => Some(v),
            _ => None,
        }
    }

    fn into_flag(self) -> Option<bool> {
        match self {
            FieldValue::Flag(v) => Some(v),
            _ => None,
        }
    }
}

// ============================================================================
// FIELD DESCRIPTORS
// ============================================================================

/// One positional column of the person schema
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    /// Rows whose required fields coerce to `Absent` are dropped
    pub required: bool,
    /// Stores the coerced value on the record
    pub assign: fn(&mut PersonRecord, FieldValue),
}

impl std::fmt::Debug for FieldSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldSpec")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("required", &self.required)
            .finish()
    }
}

const fn field(
    name: &'static str,
    kind: FieldKind,
    assign: fn(&mut PersonRecord, FieldValue),
) -> FieldSpec {
    FieldSpec {
        name,
        kind,
        required: false,
        assign,
    }
}

/// Column i of every data row maps to `PERSON_FIELDS[i]`
pub static PERSON_FIELDS: [FieldSpec; 17] = [
    FieldSpec {
        name: "national_id",
        kind: FieldKind::Identifier,
        required: true,
        assign: |p, v| p.national_id = v.into_text().unwrap_or_default(),
    },
    field("full_name", FieldKind::Text, |p, v| p.full_name = v.into_text()),
    field("birth_date", FieldKind::Date, |p, v| p.birth_date = v.into_date()),
    field("bank_account", FieldKind::Text, |p, v| p.bank_account = v.into_text()),
    field("bank_branch", FieldKind::Text, |p, v| p.bank_branch = v.into_text()),
    field("salary", FieldKind::Decimal, |p, v| p.salary = v.into_decimal()),
    field("age", FieldKind::Integer, |p, v| p.age = v.into_integer()),
    field("occupation_code", FieldKind::Text, |p, v| p.occupation_code = v.into_text()),
    field("address_state", FieldKind::Text, |p, v| p.address_state = v.into_text()),
    field("address_city", FieldKind::Text, |p, v| p.address_city = v.into_text()),
    field("street", FieldKind::Text, |p, v| p.street = v.into_text()),
    field("street_number", FieldKind::Text, |p, v| p.street_number = v.into_text()),
    field("postal_code", FieldKind::Text, |p, v| p.postal_code = v.into_text()),
    field("org_type", FieldKind::Text, |p, v| p.org_type = v.into_text()),
    field("org_state", FieldKind::Text, |p, v| p.org_state = v.into_text()),
    field("org_city", FieldKind::Text, |p, v| p.org_city = v.into_text()),
    field("do_not_disturb", FieldKind::Flag, |p, v| p.do_not_disturb = v.into_flag()),
];

/// Apply the descriptors to the leading cells of a row.
///
/// Returns the record, or the names of required fields that came out absent.
pub fn apply_fields(
    fields: &[FieldSpec],
    cells: &[String],
    affiliation: &str,
) -> Result<PersonRecord, Vec<&'static str>> {
    let mut record = PersonRecord::new(String::new(), affiliation);
    let mut missing = Vec::new();

    for (spec, raw) in fields.iter().zip(cells) {
        let value = spec.kind.coerce(raw);
        if value.is_absent() {
            if spec.required {
                missing.push(spec.name);
            } else if !raw.trim().is_empty() {
                tracing::trace!(field = spec.name, raw = raw.as_str(), "value did not coerce, storing as absent");
            }
        }
        (spec.assign)(&mut record, value);
    }

    if missing.is_empty() {
        Ok(record)
    } else {
        Err(missing)
    }
}
