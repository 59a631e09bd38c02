//! Turn-by-turn guidance.
//!
//! Converts the maneuver codes of the directions provider into localized
//! (Japanese) instruction text, a distance label and an icon category.
//! Unrecognized codes never fail; they fall through to a generic rendering.

use super::geo::{Coordinate, RoutePath};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ManeuverType {
    Depart,
    Arrive,
    Turn,
    Continue,
    Merge,
    Ramp,
    Roundabout,
    Unknown(String),
}

impl ManeuverType {
    pub fn from_code(code: &str) -> Self {
        match code.trim().to_ascii_lowercase().as_str() {
            "depart" => ManeuverType::Depart,
            "arrive" => ManeuverType::Arrive,
            "turn" => ManeuverType::Turn,
            "continue" => ManeuverType::Continue,
            "merge" => ManeuverType::Merge,
            "ramp" => ManeuverType::Ramp,
            "roundabout" => ManeuverType::Roundabout,
            _ => ManeuverType::Unknown(code.to_string()),
        }
    }

    /// Localized noun for the maneuver, or the raw code when there is none.
    pub fn phrase(&self) -> &str {
        match self {
            ManeuverType::Depart => "出発",
            ManeuverType::Arrive => "到着",
            ManeuverType::Turn => "曲がる",
            ManeuverType::Continue => "直進",
            ManeuverType::Merge => "合流",
            ManeuverType::Ramp => "ランプ",
            ManeuverType::Roundabout => "ロータリー",
            ManeuverType::Unknown(code) => code,
        }
    }

    pub fn icon(&self) -> StepIcon {
        match self {
            ManeuverType::Depart => StepIcon::Depart,
            ManeuverType::Arrive => StepIcon::Arrive,
            ManeuverType::Turn => StepIcon::Turn,
            ManeuverType::Continue => StepIcon::Continue,
            ManeuverType::Merge => StepIcon::Merge,
            ManeuverType::Ramp => StepIcon::Ramp,
            ManeuverType::Roundabout => StepIcon::Roundabout,
            ManeuverType::Unknown(_) => StepIcon::Forward,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ManeuverModifier {
    Left,
    Right,
    SharpLeft,
    SharpRight,
    SlightLeft,
    SlightRight,
    Straight,
    UTurn,
    Unknown(String),
}

impl ManeuverModifier {
    /// Accepts `sharp left`, `sharp-left` and `sharp_left` alike.
    pub fn from_code(code: &str) -> Self {
        let normalized = code.trim().to_ascii_lowercase().replace(['-', '_'], " ");
        match normalized.as_str() {
            "left" => ManeuverModifier::Left,
            "right" => ManeuverModifier::Right,
            "sharp left" => ManeuverModifier::SharpLeft,
            "sharp right" => ManeuverModifier::SharpRight,
            "slight left" => ManeuverModifier::SlightLeft,
            "slight right" => ManeuverModifier::SlightRight,
            "straight" => ManeuverModifier::Straight,
            "uturn" | "u turn" => ManeuverModifier::UTurn,
            _ => ManeuverModifier::Unknown(code.to_string()),
        }
    }

    pub fn phrase(&self) -> &str {
        match self {
            ManeuverModifier::Left => "左",
            ManeuverModifier::Right => "右",
            ManeuverModifier::SharpLeft => "大きく左",
            ManeuverModifier::SharpRight => "大きく右",
            ManeuverModifier::SlightLeft => "やや左",
            ManeuverModifier::SlightRight => "やや右",
            ManeuverModifier::Straight => "直進",
            ManeuverModifier::UTurn => "Uターン",
            ManeuverModifier::Unknown(code) => code,
        }
    }
}

/// Icon category shown next to a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepIcon {
    Turn,
    Continue,
    Merge,
    Ramp,
    Roundabout,
    Depart,
    Arrive,
    Forward,
}

impl StepIcon {
    /// Font Awesome class used by the web renderer.
    pub fn css_class(&self) -> &'static str {
        match self {
            StepIcon::Turn => "fas fa-share",
            StepIcon::Continue => "fas fa-arrow-up",
            StepIcon::Merge => "fas fa-code-branch",
            StepIcon::Ramp => "fas fa-road",
            StepIcon::Roundabout => "fas fa-circle-notch",
            StepIcon::Depart => "fas fa-play",
            StepIcon::Arrive => "fas fa-flag-checkered",
            StepIcon::Forward => "fas fa-arrow-right",
        }
    }
}

/// One maneuver as the directions provider reported it.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderStep {
    pub maneuver: ManeuverType,
    pub modifier: Option<ManeuverModifier>,
    pub street_name: Option<String>,
    pub distance_m: f64,
    pub duration_s: f64,
    /// Index into the route path of the first vertex of this step.
    pub waypoint_index: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NavigationStep {
    pub ordinal: usize,
    pub instruction: String,
    pub distance_label: String,
    pub duration_min: u32,
    pub anchor: Option<Coordinate>,
    pub maneuver: ManeuverType,
    pub modifier: Option<ManeuverModifier>,
    pub icon: StepIcon,
}

/// Translates provider steps in order; `ordinal` is the 1-based position.
pub fn translate(steps: &[ProviderStep], path: &RoutePath) -> Vec<NavigationStep> {
    steps
        .iter()
        .enumerate()
        .map(|(index, step)| NavigationStep {
            ordinal: index + 1,
            instruction: instruction_text(step),
            distance_label: format_distance(step.distance_m),
            duration_min: (step.duration_s.max(0.0) / 60.0).round() as u32,
            anchor: step.waypoint_index.and_then(|i| path.get(i)),
            maneuver: step.maneuver.clone(),
            modifier: step.modifier.clone(),
            icon: step.maneuver.icon(),
        })
        .collect()
}

pub fn instruction_text(step: &ProviderStep) -> String {
    let street = step.street_name.as_deref().filter(|s| !s.trim().is_empty());

    match (&step.maneuver, &step.modifier) {
        (ManeuverType::Depart, _) => match street {
            Some(name) => format!("{}を出発", name),
            None => "出発します".to_string(),
        },
        (ManeuverType::Arrive, _) => "目的地に到着します".to_string(),
        (ManeuverType::Turn, Some(modifier)) => match street {
            Some(name) => format!("{}に曲がって{}に入ります", modifier.phrase(), name),
            None => format!("{}に曲がります", modifier.phrase()),
        },
        (ManeuverType::Continue, _) => match street {
            Some(name) => format!("{}を直進します", name),
            None => "直進します".to_string(),
        },
        (maneuver, modifier) => {
            let mut text = maneuver.phrase().to_string();
            if let Some(m) = modifier.as_ref().map(|m| m.phrase()).filter(|m| !m.is_empty()) {
                text.push_str(&format!(" ({})", m));
            }
            if let Some(name) = street {
                text.push_str(&format!(" - {}", name));
            }
            text
        }
    }
}

/// `1.5km` from 1000 m upward, whole meters below.
pub fn format_distance(meters: f64) -> String {
    if meters >= 1000.0 {
        format!("{:.1}km", meters / 1000.0)
    } else {
        format!("{}m", meters.max(0.0).round() as u64)
    }
}
