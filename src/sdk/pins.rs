use crate::sdk::routing::geo::Coordinate;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fs, io::Result as IoResult, path::Path, str::FromStr};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PinCategory {
    Tourist,
    Food,
    Shopping,
    Hotel,
    Culture,
    Cafe,
    Transport,
    Kpop,
}

impl PinCategory {
    pub fn display_name(&self) -> &'static str {
        match self {
            PinCategory::Tourist => "観光地",
            PinCategory::Food => "グルメ",
            PinCategory::Shopping => "ショッピング",
            PinCategory::Hotel => "宿泊",
            PinCategory::Culture => "文化",
            PinCategory::Cafe => "カフェ",
            PinCategory::Transport => "交通",
            PinCategory::Kpop => "エンターテイメント",
        }
    }
}

impl FromStr for PinCategory {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tourist" => Ok(PinCategory::Tourist),
            "food" => Ok(PinCategory::Food),
            "shopping" => Ok(PinCategory::Shopping),
            "hotel" => Ok(PinCategory::Hotel),
            "culture" => Ok(PinCategory::Culture),
            "cafe" => Ok(PinCategory::Cafe),
            "transport" => Ok(PinCategory::Transport),
            "kpop" => Ok(PinCategory::Kpop),
            other => Err(format!("unknown pin category \"{}\"", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pin {
    pub id: String,
    pub name: String,
    #[serde(flatten)]
    pub coordinate: Coordinate,
    pub category: PinCategory,
    #[serde(default)]
    pub memo: String,
    #[serde(default)]
    pub visited: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// What route endpoint selection needs to know about a pin.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PinSummary {
    pub id: String,
    pub coordinate: Coordinate,
    pub label: String,
}

pub trait PinStore {
    fn list_pins(&self) -> Vec<PinSummary>;
}

const EXPORT_VERSION: &str = "1.0";

/// Exchange document written by `export_json`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PinExport {
    pins: Vec<Pin>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    export_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    version: Option<String>,
}

/// Older exports are a bare array.
#[derive(Deserialize)]
#[serde(untagged)]
enum ImportDocument {
    Envelope(PinExport),
    Bare(Vec<Pin>),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PinEditError {
    #[error("Pin not found")]
    NotFound,
    #[error("Pin name must not be empty")]
    EmptyName,
}

/// Pins persisted as one flat JSON document. An exported document can be
/// loaded as a store directly.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct JsonPinStore {
    pins: Vec<Pin>,
}

impl JsonPinStore {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> IoResult<Self> {
        if path.as_ref().exists() {
            let data = fs::read_to_string(path)?;
            Ok(serde_json::from_str(&data)?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> IoResult<()> {
        let data = serde_json::to_string_pretty(self)?;
        fs::write(path, data)
    }

    pub fn add_pin(
        &mut self,
        name: &str,
        coordinate: Coordinate,
        category: PinCategory,
        memo: &str,
    ) -> &Pin {
        let index = self.pins.len();
        self.pins.push(Pin {
            id: Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            coordinate,
            category,
            memo: memo.trim().to_string(),
            visited: false,
            created_at: Utc::now(),
            updated_at: None,
        });
        &self.pins[index]
    }

    /// Replaces name, category and memo and stamps `updated_at`.
    pub fn update_pin(
        &mut self,
        id: &str,
        name: &str,
        category: PinCategory,
        memo: &str,
    ) -> Result<&Pin, PinEditError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(PinEditError::EmptyName);
        }
        let pin = self
            .pins
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(PinEditError::NotFound)?;
        pin.name = name.to_string();
        pin.category = category;
        pin.memo = memo.trim().to_string();
        pin.updated_at = Some(Utc::now());
        Ok(pin)
    }

    pub fn get(&self, id: &str) -> Option<&Pin> {
        self.pins.iter().find(|p| p.id == id)
    }

    pub fn remove_pin(&mut self, id: &str) -> Option<Pin> {
        let index = self.pins.iter().position(|p| p.id == id)?;
        Some(self.pins.remove(index))
    }

    /// Flips the visited flag and returns the new value.
    pub fn toggle_visited(&mut self, id: &str) -> Option<bool> {
        let pin = self.pins.iter_mut().find(|p| p.id == id)?;
        pin.visited = !pin.visited;
        Some(pin.visited)
    }

    /// Newest first.
    pub fn pins(&self) -> Vec<&Pin> {
        let mut pins: Vec<&Pin> = self.pins.iter().collect();
        pins.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        pins
    }

    pub fn export_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&PinExport {
            pins: self.pins.clone(),
            export_date: Some(Utc::now()),
            version: Some(EXPORT_VERSION.to_string()),
        })
    }

    /// Merges pins from an exported document (`{pins, exportDate, version}`
    /// or a bare array); pins with a known id replace the stored ones.
    /// Returns how many pins were read.
    pub fn import_json(&mut self, data: &str) -> serde_json::Result<usize> {
        let incoming = match serde_json::from_str(data)? {
            ImportDocument::Envelope(doc) => doc.pins,
            ImportDocument::Bare(pins) => pins,
        };
        let count = incoming.len();
        for pin in incoming {
            match self.pins.iter_mut().find(|p| p.id == pin.id) {
                Some(existing) => *existing = pin,
                None => self.pins.push(pin),
            }
        }
        Ok(count)
    }
}

impl PinStore for JsonPinStore {
    fn list_pins(&self) -> Vec<PinSummary> {
        self.pins()
            .into_iter()
            .map(|p| PinSummary {
                id: p.id.clone(),
                coordinate: p.coordinate,
                label: p.name.clone(),
            })
            .collect()
    }
}
