//! Rendering surface the route pipeline draws onto.
//!
//! The pipeline only pushes primitives and never reads them back. Click input
//! does not flow through this trait; it arrives as
//! [`RouteCommand::MapClicked`](crate::sdk::events::RouteCommand::MapClicked).

use crate::sdk::routing::geo::{Bounds, Coordinate};
use crate::sdk::routing::navigation::StepIcon;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct DrawableHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PolylineStyle {
    Routed,
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LineStyle {
    pub color: &'static str,
    pub weight: u32,
    pub opacity: f32,
    pub dash_array: &'static str,
}

impl PolylineStyle {
    pub fn line_style(&self) -> LineStyle {
        match self {
            PolylineStyle::Routed => LineStyle {
                color: "#4285f4",
                weight: 5,
                opacity: 0.8,
                dash_array: "0, 10",
            },
            PolylineStyle::Fallback => LineStyle {
                color: "#ff6b6b",
                weight: 4,
                opacity: 0.7,
                dash_array: "10, 10",
            },
        }
    }

    /// Padding in pixels when fitting the view to a route of this style.
    pub fn fit_padding(&self) -> u32 {
        match self {
            PolylineStyle::Routed => 20,
            PolylineStyle::Fallback => 50,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MarkerIcon {
    RouteStart,
    RouteEnd,
    Step { ordinal: usize, icon: StepIcon },
}

impl MarkerIcon {
    pub fn label(&self) -> String {
        match self {
            MarkerIcon::RouteStart => "START".to_string(),
            MarkerIcon::RouteEnd => "GOAL".to_string(),
            MarkerIcon::Step { ordinal, .. } => ordinal.to_string(),
        }
    }
}

pub trait MapView {
    fn draw_polyline(&mut self, points: &[Coordinate], style: PolylineStyle) -> DrawableHandle;
    fn draw_marker(&mut self, at: Coordinate, icon: MarkerIcon) -> DrawableHandle;
    fn remove_drawable(&mut self, handle: DrawableHandle);
    fn fit_to(&mut self, bounds: Bounds, padding_px: u32);
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Drawable {
    Polyline {
        points: Vec<Coordinate>,
        style: PolylineStyle,
    },
    Marker {
        at: Coordinate,
        icon: MarkerIcon,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Viewport {
    pub bounds: Bounds,
    pub padding_px: u32,
}

/// In-memory map: keeps whatever is currently drawn so it can be inspected
/// or written out as JSON.
#[derive(Debug, Default, Serialize)]
pub struct SceneMap {
    #[serde(skip)]
    next_id: u64,
    drawables: BTreeMap<DrawableHandle, Drawable>,
    viewport: Option<Viewport>,
}

impl SceneMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drawables(&self) -> impl Iterator<Item = &Drawable> {
        self.drawables.values()
    }

    pub fn polylines(&self) -> Vec<(&[Coordinate], PolylineStyle)> {
        self.drawables
            .values()
            .filter_map(|d| match d {
                Drawable::Polyline { points, style } => Some((points.as_slice(), *style)),
                Drawable::Marker { .. } => None,
            })
            .collect()
    }

    pub fn markers(&self) -> Vec<(Coordinate, MarkerIcon)> {
        self.drawables
            .values()
            .filter_map(|d| match d {
                Drawable::Marker { at, icon } => Some((*at, *icon)),
                Drawable::Polyline { .. } => None,
            })
            .collect()
    }

    pub fn viewport(&self) -> Option<&Viewport> {
        self.viewport.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.drawables.is_empty()
    }

    fn insert(&mut self, drawable: Drawable) -> DrawableHandle {
        self.next_id += 1;
        let handle = DrawableHandle(self.next_id);
        self.drawables.insert(handle, drawable);
        handle
    }
}

impl MapView for SceneMap {
    fn draw_polyline(&mut self, points: &[Coordinate], style: PolylineStyle) -> DrawableHandle {
        self.insert(Drawable::Polyline {
            points: points.to_vec(),
            style,
        })
    }

    fn draw_marker(&mut self, at: Coordinate, icon: MarkerIcon) -> DrawableHandle {
        self.insert(Drawable::Marker { at, icon })
    }

    fn remove_drawable(&mut self, handle: DrawableHandle) {
        if self.drawables.remove(&handle).is_none() {
            log::debug!("[MAP] Drawable {:?} was already removed", handle);
        }
    }

    fn fit_to(&mut self, bounds: Bounds, padding_px: u32) {
        self.viewport = Some(Viewport { bounds, padding_px });
    }
}
