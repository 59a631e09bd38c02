use anyhow::{bail, Context, Result};
use std::{env, str::FromStr, time::Duration};

pub const DEFAULT_ORS_URL: &str = "https://api.openrouteservice.org";
pub const DEFAULT_NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Where directions come from: the hosted openrouteservice API (needs a key)
/// or a self-hosted instance (no key).
#[derive(Debug, Clone, PartialEq)]
pub enum OrsConfig {
    Remote { api_key: String },
    Local { base_url: String },
}

impl OrsConfig {
    pub fn from_env() -> Result<Self> {
        if let Some(base_url) = non_empty_var("ORS_LOCAL_URL") {
            return Ok(OrsConfig::Local { base_url });
        }
        let api_key = non_empty_var("ORS_API_KEY")
            .context("ORS_API_KEY must be set (or ORS_LOCAL_URL for a self-hosted instance)")?;
        Ok(OrsConfig::Remote { api_key })
    }

    pub fn base_url(&self) -> &str {
        match self {
            OrsConfig::Remote { .. } => DEFAULT_ORS_URL,
            OrsConfig::Local { base_url } => base_url,
        }
    }

    pub fn api_key(&self) -> Option<&str> {
        match self {
            OrsConfig::Remote { api_key } => Some(api_key),
            OrsConfig::Local { .. } => None,
        }
    }
}

/// Unit the directions provider reports distances in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceUnit {
    Meters,
    Kilometers,
}

impl DistanceUnit {
    pub fn as_query(&self) -> &'static str {
        match self {
            DistanceUnit::Meters => "m",
            DistanceUnit::Kilometers => "km",
        }
    }

    pub fn to_meters(&self, value: f64) -> f64 {
        match self {
            DistanceUnit::Meters => value,
            DistanceUnit::Kilometers => value * 1000.0,
        }
    }
}

impl FromStr for DistanceUnit {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "m" | "meters" => Ok(DistanceUnit::Meters),
            "km" | "kilometers" => Ok(DistanceUnit::Kilometers),
            other => bail!("unsupported distance unit \"{}\" (expected m or km)", other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DirectionsConfig {
    pub ors: OrsConfig,
    pub profile: String,
    pub language: String,
    pub units: DistanceUnit,
    pub per_minute: u32,
}

#[derive(Debug, Clone)]
pub struct GeocoderConfig {
    pub base_url: String,
    pub user_agent: String,
    pub per_second: u32,
}

#[derive(Debug, Clone)]
pub struct MapConfig {
    pub directions: DirectionsConfig,
    pub geocoder: GeocoderConfig,
    pub timeout: Duration,
}

impl MapConfig {
    pub fn from_env() -> Result<Self> {
        let directions = DirectionsConfig {
            ors: OrsConfig::from_env()?,
            profile: non_empty_var("ORS_PROFILE").unwrap_or_else(|| "driving-car".to_string()),
            language: non_empty_var("ORS_LANGUAGE").unwrap_or_else(|| "ja".to_string()),
            units: parsed_var("ORS_UNITS")?.unwrap_or(DistanceUnit::Kilometers),
            per_minute: parsed_var("DIRECTIONS_RATE_PER_MINUTE")?.unwrap_or(40),
        };
        let geocoder = GeocoderConfig {
            base_url: non_empty_var("NOMINATIM_URL")
                .unwrap_or_else(|| DEFAULT_NOMINATIM_URL.to_string()),
            user_agent: non_empty_var("GEOCODER_USER_AGENT").unwrap_or_else(default_user_agent),
            per_second: parsed_var("GEOCODE_RATE_PER_SECOND")?.unwrap_or(1),
        };
        let timeout_secs: u64 = parsed_var("REQUEST_TIMEOUT_SECS")?.unwrap_or(DEFAULT_TIMEOUT_SECS);

        Ok(Self {
            directions,
            geocoder,
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

pub fn default_user_agent() -> String {
    format!("travel-route/{}", env!("CARGO_PKG_VERSION"))
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parsed_var<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match non_empty_var(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("invalid value for {}: {}", key, e)),
        None => Ok(None),
    }
}
