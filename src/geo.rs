// 🗺️ Geographic Reference - states and cities for the upload/browse forms
// Region list is cached in an explicit TtlCache owned by GeoService

use crate::config::REGION_CACHE_TTL_HOURS;
use crate::error::GeoError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, error, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    /// Two-letter state code
    pub code: String,
    pub name: String,
}

impl Region {
    pub fn new(code: &str, name: &str) -> Self {
        Region {
            code: code.to_string(),
            name: name.to_string(),
        }
    }
}

// ============================================================================
// TTL CACHE
// ============================================================================

/// Single value with the time it was stored
#[derive(Debug, Clone)]
pub struct TtlCache<T> {
    value: Option<T>,
    stored_at: DateTime<Utc>,
    ttl: Duration,
}

impl<T: Clone> TtlCache<T> {
    pub fn new(ttl: Duration) -> Self {
        TtlCache {
            value: None,
            stored_at: DateTime::<Utc>::MIN_UTC,
            ttl,
        }
    }

    /// The cached value if it is younger than the TTL at `now`
    pub fn get_at(&self, now: DateTime<Utc>) -> Option<T> {
        let value = self.value.as_ref()?;
        if now - self.stored_at < self.ttl {
            Some(value.clone())
        } else {
            None
        }
    }

    pub fn put_at(&mut self, value: T, now: DateTime<Utc>) {
        self.value = Some(value);
        self.stored_at = now;
    }

    pub fn invalidate(&mut self) {
        self.value = None;
    }
}

// ============================================================================
// SOURCES
// ============================================================================

/// Boxed future returned by [`RegionSource`] lookups
pub type SourceFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, GeoError>> + Send + 'a>>;

/// Where regions and localities come from
pub trait RegionSource: Send + Sync {
    /// All regions, ordered by name
    fn fetch_regions(&self) -> SourceFuture<'_, Vec<Region>>;

    fn fetch_localities<'a>(&'a self, region_code: &'a str) -> SourceFuture<'a, Vec<String>>;
}

/// Built-in table of the 27 Brazilian states and a few main cities each
pub struct StaticRegions;

const STATES: [(&str, &str, &[&str]); 27] = [
    ("AC", "Acre", &["Rio Branco", "Cruzeiro do Sul"]),
    ("AL", "Alagoas", &["Maceió", "Arapiraca"]),
    ("AP", "Amapá", &["Macapá", "Santana"]),
    ("AM", "Amazonas", &["Manaus", "Parintins"]),
    ("BA", "Bahia", &["Salvador", "Feira de Santana", "Vitória da Conquista"]),
    ("CE", "Ceará", &["Fortaleza", "Caucaia", "Juazeiro do Norte"]),
    ("DF", "Distrito Federal", &["Brasília"]),
    ("ES", "Espírito Santo", &["Vitória", "Vila Velha", "Serra"]),
    ("GO", "Goiás", &["Goiânia", "Aparecida de Goiânia", "Anápolis"]),
    ("MA", "Maranhão", &["São Luís", "Imperatriz"]),
    ("MT", "Mato Grosso", &["Cuiabá", "Várzea Grande"]),
    ("MS", "Mato Grosso do Sul", &["Campo Grande", "Dourados"]),
    ("MG", "Minas Gerais", &["Belo Horizonte", "Uberlândia", "Contagem", "Juiz de Fora"]),
    ("PA", "Pará", &["Belém", "Ananindeua"]),
    ("PB", "Paraíba", &["João Pessoa", "Campina Grande"]),
    ("PR", "Paraná", &["Curitiba", "Londrina", "Maringá"]),
    ("PE", "Pernambuco", &["Recife", "Jaboatão dos Guararapes", "Olinda"]),
    ("PI", "Piauí", &["Teresina", "Parnaíba"]),
    ("RJ", "Rio de Janeiro", &["Rio de Janeiro", "São Gonçalo", "Duque de Caxias"]),
    ("RN", "Rio Grande do Norte", &["Natal", "Mossoró"]),
    ("RS", "Rio Grande do Sul", &["Porto Alegre", "Caxias do Sul"]),
    ("RO", "Rondônia", &["Porto Velho", "Ji-Paraná"]),
    ("RR", "Roraima", &["Boa Vista", "Rorainópolis"]),
    ("SC", "Santa Catarina", &["Florianópolis", "Joinville", "Blumenau"]),
    ("SP", "São Paulo", &["São Paulo", "Guarulhos", "Campinas", "São Bernardo do Campo", "Santo André"]),
    ("SE", "Sergipe", &["Aracaju", "Nossa Senhora do Socorro"]),
    ("TO", "Tocantins", &["Palmas", "Araguaína"]),
];

impl StaticRegions {
    fn regions(&self) -> Vec<Region> {
        STATES
            .iter()
            .map(|(code, name, _)| Region::new(code, name))
            .collect()
    }

    fn localities(&self, region_code: &str) -> Result<Vec<String>, GeoError> {
        let code = region_code.trim().to_uppercase();
        STATES
            .iter()
            .find(|(c, _, _)| *c == code)
            .map(|(_, _, cities)| cities.iter().map(|c| c.to_string()).collect())
            .ok_or(GeoError::UnknownRegion(code))
    }
}

impl RegionSource for StaticRegions {
    fn fetch_regions(&self) -> SourceFuture<'_, Vec<Region>> {
        Box::pin(std::future::ready(Ok(self.regions())))
    }

    fn fetch_localities<'a>(&'a self, region_code: &'a str) -> SourceFuture<'a, Vec<String>> {
        Box::pin(std::future::ready(self.localities(region_code)))
    }
}

/// Public IBGE localities API
#[cfg(feature = "server")]
pub struct IbgeClient {
    http: reqwest::Client,
    base_url: String,
}

#[cfg(feature = "server")]
impl IbgeClient {
    pub const BASE_URL: &'static str = "https://servicodados.ibge.gov.br/api/v1/localidades";

    pub fn new() -> Result<Self, GeoError> {
        Self::with_base_url(Self::BASE_URL)
    }

    pub fn with_base_url(base_url: &str) -> Result<Self, GeoError> {
        let http = reqwest::Client::builder()
            .timeout(crate::config::GEO_HTTP_TIMEOUT)
            .build()?;
        Ok(IbgeClient {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: String) -> Result<T, GeoError> {
        debug!("Fetching {}", url);
        Ok(self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?)
    }

    async fn regions(&self) -> Result<Vec<Region>, GeoError> {
        let states: Vec<IbgeState> = self
            .get_json(format!("{}/estados?orderBy=nome", self.base_url))
            .await?;
        Ok(states
            .into_iter()
            .map(|s| Region { code: s.sigla, name: s.nome })
            .collect())
    }

    async fn localities(&self, region_code: &str) -> Result<Vec<String>, GeoError> {
        let cities: Vec<IbgeCity> = self
            .get_json(format!(
                "{}/estados/{}/municipios",
                self.base_url,
                region_code.trim().to_uppercase()
            ))
            .await?;
        Ok(cities.into_iter().map(|c| c.nome).collect())
    }
}

#[cfg(feature = "server")]
#[derive(Deserialize)]
struct IbgeState {
    sigla: String,
    nome: String,
}

#[cfg(feature = "server")]
#[derive(Deserialize)]
struct IbgeCity {
    nome: String,
}

#[cfg(feature = "server")]
impl RegionSource for IbgeClient {
    fn fetch_regions(&self) -> SourceFuture<'_, Vec<Region>> {
        Box::pin(self.regions())
    }

    fn fetch_localities<'a>(&'a self, region_code: &'a str) -> SourceFuture<'a, Vec<String>> {
        Box::pin(self.localities(region_code))
    }
}

// ============================================================================
// SERVICE
// ============================================================================

/// Region lookups with the region list cached for a day
pub struct GeoService {
    source: Box<dyn RegionSource>,
    regions: Mutex<TtlCache<Vec<Region>>>,
}

impl GeoService {
    pub fn new(source: Box<dyn RegionSource>, cache: TtlCache<Vec<Region>>) -> Self {
        GeoService {
            source,
            regions: Mutex::new(cache),
        }
    }

    pub fn with_default_ttl(source: Box<dyn RegionSource>) -> Self {
        Self::new(source, TtlCache::new(Duration::hours(REGION_CACHE_TTL_HOURS)))
    }

    // A poisoned lock only means another reader panicked mid-update
    fn cache(&self) -> MutexGuard<'_, TtlCache<Vec<Region>>> {
        self.regions.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub async fn list_regions(&self) -> Result<Vec<Region>, GeoError> {
        self.list_regions_at(Utc::now()).await
    }

    /// Failures are not cached; the next call retries the source.
    ///
    /// The lock is never held across the fetch, so two concurrent misses may
    /// both hit the source.
    pub async fn list_regions_at(&self, now: DateTime<Utc>) -> Result<Vec<Region>, GeoError> {
        let cached = self.cache().get_at(now);
        if let Some(regions) = cached {
            debug!("Serving region list from cache");
            return Ok(regions);
        }

        info!("Fetching region list");
        let regions = self.source.fetch_regions().await.map_err(|e| {
            error!(error = %e, "Failed to fetch region list");
            e
        })?;
        self.cache().put_at(regions.clone(), now);
        Ok(regions)
    }

    /// Not cached
    pub async fn list_localities(&self, region_code: &str) -> Result<Vec<String>, GeoError> {
        self.source.fetch_localities(region_code).await.map_err(|e| {
            error!(region = region_code, error = %e, "Failed to fetch localities");
            e
        })
    }

    pub fn invalidate(&self) {
        self.cache().invalidate();
    }
}
