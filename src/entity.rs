//! Entity model: one synchronized scene-graph node.
//!
//! An entity is placed either by a world transform (position, rotation and a
//! scale *or* size) or by a canvas transform (screen percentages). The mode
//! is chosen by the constructor and cannot be changed afterwards.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::terrain::TerrainGrid;
use crate::types::{Quat, Vec3};

// ---------------------------------------------------------------------------
// Entity type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Container,
    Mesh,
    Character,
    Button,
    Canvas,
    Input,
    Light,
    Terrain,
    Text,
    Voxel,
}

/// Which transform an entity type is created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementKind {
    World,
    Canvas,
}

impl EntityType {
    pub const ALL: [EntityType; 10] = [
        EntityType::Container,
        EntityType::Mesh,
        EntityType::Character,
        EntityType::Button,
        EntityType::Canvas,
        EntityType::Input,
        EntityType::Light,
        EntityType::Terrain,
        EntityType::Text,
        EntityType::Voxel,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Container => "container",
            EntityType::Mesh => "mesh",
            EntityType::Character => "character",
            EntityType::Button => "button",
            EntityType::Canvas => "canvas",
            EntityType::Input => "input",
            EntityType::Light => "light",
            EntityType::Terrain => "terrain",
            EntityType::Text => "text",
            EntityType::Voxel => "voxel",
        }
    }

    /// UI element types live on a canvas; everything else, including the
    /// canvas itself, is placed in the world.
    pub fn placement(&self) -> PlacementKind {
        match self {
            EntityType::Button | EntityType::Input | EntityType::Text => PlacementKind::Canvas,
            _ => PlacementKind::World,
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown entity type '{}'", s))
    }
}

// ---------------------------------------------------------------------------
// Placement
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CanvasType {
    #[default]
    World,
    Screen,
}

/// The extent an entity was created with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Extent {
    Scale(Vec3),
    Size(Vec3),
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorldTransform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Option<Vec3>,
    pub size: Option<Vec3>,
    /// Fixed at creation; selects which of `scale`/`size` is reported.
    pub is_size: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CanvasTransform {
    pub position_percent: Vec3,
    pub size_percent: Vec3,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Placement {
    World(WorldTransform),
    Canvas(CanvasTransform),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("entity {entity_id} is canvas-placed and has no {field}")]
pub struct PlacementError {
    pub entity_id: String,
    pub field: &'static str,
}

// ---------------------------------------------------------------------------
// Type-specific content
// ---------------------------------------------------------------------------

/// Fields only some entity types carry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityContent {
    pub resources: Option<Vec<String>>,
    pub on_click: Option<String>,
    pub terrain: Option<TerrainGrid>,
    pub text: Option<String>,
    pub font_size: Option<f64>,
}

// ---------------------------------------------------------------------------
// Runtime state groups
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Motion {
    pub angular_velocity: Vec3,
    pub velocity: Vec3,
    pub stationary: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysicalProperties {
    pub angular_drag: f64,
    pub center_of_mass: Vec3,
    pub drag: f64,
    pub gravitational: bool,
    pub mass: f64,
}

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub id: String,
    pub tag: String,
    pub kind: EntityType,
    pub path: Option<String>,
    /// Id of the parent entity in the same session. Not validated against
    /// cycles.
    pub parent: Option<String>,
    placement: Placement,
    pub canvas_type: CanvasType,
    pub content: EntityContent,

    pub visible: bool,
    pub highlighted: bool,
    pub angular_velocity: Vec3,
    pub velocity: Vec3,
    pub stationary: bool,
    pub angular_drag: f64,
    pub drag: f64,
    pub center_of_mass: Vec3,
    pub gravitational: bool,
    pub mass: f64,
}

impl Entity {
    fn new(id: String, tag: String, kind: EntityType, placement: Placement) -> Self {
        Self {
            id,
            tag,
            kind,
            path: None,
            parent: None,
            placement,
            canvas_type: CanvasType::default(),
            content: EntityContent::default(),
            visible: false,
            highlighted: false,
            angular_velocity: Vec3::zero(),
            velocity: Vec3::zero(),
            stationary: true,
            angular_drag: 0.0,
            drag: 0.0,
            center_of_mass: Vec3::zero(),
            gravitational: false,
            mass: 0.0,
        }
    }

    pub fn with_world_transform(
        id: impl Into<String>,
        tag: impl Into<String>,
        kind: EntityType,
        position: Vec3,
        rotation: Quat,
        extent: Extent,
    ) -> Self {
        let (scale, size, is_size) = match extent {
            Extent::Scale(s) => (Some(s), None, false),
            Extent::Size(s) => (None, Some(s), true),
        };
        Self::new(
            id.into(),
            tag.into(),
            kind,
            Placement::World(WorldTransform {
                position,
                rotation,
                scale,
                size,
                is_size,
            }),
        )
    }

    pub fn with_canvas_transform(
        id: impl Into<String>,
        tag: impl Into<String>,
        kind: EntityType,
        position_percent: Vec3,
        size_percent: Vec3,
    ) -> Self {
        Self::new(
            id.into(),
            tag.into(),
            kind,
            Placement::Canvas(CanvasTransform {
                position_percent,
                size_percent,
            }),
        )
    }

    pub fn with_parent(mut self, parent: Option<String>) -> Self {
        self.parent = parent;
        self
    }

    pub fn with_path(mut self, path: Option<String>) -> Self {
        self.path = path;
        self
    }

    pub fn with_content(mut self, content: EntityContent) -> Self {
        self.content = content;
        self
    }

    pub fn placement(&self) -> &Placement {
        &self.placement
    }

    pub fn world_transform(&self) -> Option<&WorldTransform> {
        match &self.placement {
            Placement::World(t) => Some(t),
            Placement::Canvas(_) => None,
        }
    }

    pub fn canvas_transform(&self) -> Option<&CanvasTransform> {
        match &self.placement {
            Placement::Canvas(t) => Some(t),
            Placement::World(_) => None,
        }
    }

    pub fn is_size(&self) -> bool {
        self.world_transform().is_some_and(|t| t.is_size)
    }

    fn world_mut(&mut self, field: &'static str) -> Result<&mut WorldTransform, PlacementError> {
        match &mut self.placement {
            Placement::World(t) => Ok(t),
            Placement::Canvas(_) => Err(PlacementError {
                entity_id: self.id.clone(),
                field,
            }),
        }
    }

    pub fn set_position(&mut self, position: Vec3) -> Result<(), PlacementError> {
        self.world_mut("position")?.position = position;
        Ok(())
    }

    pub fn set_rotation(&mut self, rotation: Quat) -> Result<(), PlacementError> {
        self.world_mut("rotation")?.rotation = rotation;
        Ok(())
    }

    pub fn set_scale(&mut self, scale: Vec3) -> Result<(), PlacementError> {
        self.world_mut("scale")?.scale = Some(scale);
        Ok(())
    }

    pub fn set_size(&mut self, size: Vec3) -> Result<(), PlacementError> {
        self.world_mut("size")?.size = Some(size);
        Ok(())
    }

    pub fn set_motion(&mut self, motion: Motion) {
        self.angular_velocity = motion.angular_velocity;
        self.velocity = motion.velocity;
        self.stationary = motion.stationary;
    }

    pub fn set_physical_properties(&mut self, props: PhysicalProperties) {
        self.angular_drag = props.angular_drag;
        self.center_of_mass = props.center_of_mass;
        self.drag = props.drag;
        self.gravitational = props.gravitational;
        self.mass = props.mass;
    }
}
