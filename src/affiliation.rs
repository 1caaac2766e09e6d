// Affiliation labels - which sponsoring body a batch belongs to

use serde::{Deserialize, Serialize};

/// Sponsoring body chosen by the operator when uploading a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "sphere", rename_all = "snake_case")]
pub enum Affiliation {
    Federal,
    /// State government, by two-letter state code
    State { state: String },
    /// City hall
    Municipality { state: String, city: String },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AffiliationError {
    #[error("choose the sponsoring sphere (federal, state or municipality)")]
    UnknownSphere,
    #[error("choose the state of the agreement")]
    MissingState,
    #[error("choose the state and the city of the agreement")]
    MissingCity,
}

impl Affiliation {
    /// Build from the upload form fields; blank values count as missing
    pub fn from_form(
        sphere: Option<&str>,
        state: Option<&str>,
        city: Option<&str>,
    ) -> Result<Self, AffiliationError> {
        let state = state.map(str::trim).filter(|s| !s.is_empty());
        let city = city.map(str::trim).filter(|s| !s.is_empty());

        match sphere.map(|s| s.trim().to_lowercase()).as_deref() {
            Some("federal") => Ok(Affiliation::Federal),
            Some("state") | Some("estadual") => {
                let state = state.ok_or(AffiliationError::MissingState)?;
                Ok(Affiliation::State {
                    state: state.to_uppercase(),
                })
            }
            Some("municipality") | Some("prefeitura") => match (state, city) {
                (Some(state), Some(city)) => Ok(Affiliation::Municipality {
                    state: state.to_uppercase(),
                    city: city.to_string(),
                }),
                _ => Err(AffiliationError::MissingCity),
            },
            _ => Err(AffiliationError::UnknownSphere),
        }
    }

    /// Label stored on every imported person.
    ///
    /// `FEDERAL`, `ESTADUAL_<UF>`, `PREFEITURA_<CITY>_<UF>` with spaces in the
    /// city name replaced by underscores.
    pub fn label(&self) -> String {
        match self {
            Affiliation::Federal => "FEDERAL".to_string(),
            Affiliation::State { state } => format!("ESTADUAL_{}", state),
            Affiliation::Municipality { state, city } => {
                format!("PREFEITURA_{}_{}", city.replace(' ', "_").to_uppercase(), state)
            }
        }
    }
}
