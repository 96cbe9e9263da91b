//! The parsed map and its post-processing.
//!
//! Sections are routed into named fields as they arrive. Once the last one
//! is in, the derived sections (`skybox_info`, `map_bounds`, `id_map`) are
//! computed from the finished tree.

use crate::config::MergePolicy;
use crate::parser::{BlockBuilder, Comment, Section};
use crate::value::{Block, Value, Vec3};
use serde::Serialize;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

/// Block-valued sections, in the order they are written.
///
/// `entity` sections are collected separately into [`Document::entities`].
pub const BLOCK_SECTIONS: [&str; 13] = [
    "versioninfo",
    "visgroups",
    "viewsettings",
    "world",
    "cameras",
    "cordons",
    "custom_visgroups",
    "instances",
    "instance_parameters",
    "palette_plus",
    "colorcorrection_plus",
    "light_plus",
    "bgimages_plus",
];

/// Sky name and the first `sky_camera` entity.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SkyboxInfo {
    pub skyname: Option<String>,
    pub sky_camera: Option<Block>,
}

/// Axis-aligned bounds of every `vertices_plus` vertex.
///
/// An empty map keeps `min = f64::MAX` and `max = f64::MIN`; check
/// [`MapBounds::is_empty`] before using the numbers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MapBounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for MapBounds {
    fn default() -> Self {
        Self {
            min: Vec3::new(f64::MAX, f64::MAX, f64::MAX),
            max: Vec3::new(f64::MIN, f64::MIN, f64::MIN),
        }
    }
}

impl MapBounds {
    pub fn include(&mut self, v: Vec3) {
        self.min = self.min.min(v);
        self.max = self.max.max(v);
    }

    /// No vertex has been seen.
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x
    }

    pub fn size(&self) -> Option<Vec3> {
        if self.is_empty() {
            return None;
        }
        Some(Vec3::new(
            self.max.x - self.min.x,
            self.max.y - self.min.y,
            self.max.z - self.min.z,
        ))
    }
}

/// A parsed VMF file.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Document {
    pub versioninfo: Block,
    pub visgroups: Block,
    pub viewsettings: Block,
    pub world: Block,
    pub entities: Vec<Block>,
    pub cameras: Block,
    pub cordons: Block,
    pub custom_visgroups: Block,
    pub instances: Block,
    pub instance_parameters: Block,
    pub palette_plus: Block,
    pub colorcorrection_plus: Block,
    pub light_plus: Block,
    pub bgimages_plus: Block,
    /// Sections with unrecognized names, or known names holding a scalar.
    pub unknown_sections: Block,
    pub skybox_info: SkyboxInfo,
    pub map_bounds: MapBounds,
    /// Object id to its dotted path. Side ids are not included.
    pub id_map: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub comments: Vec<Comment>,
}

impl Document {
    /// A block section by name. `entity` and unknown names are not sections.
    pub fn section(&self, name: &str) -> Option<&Block> {
        Some(match name {
            "versioninfo" => &self.versioninfo,
            "visgroups" => &self.visgroups,
            "viewsettings" => &self.viewsettings,
            "world" => &self.world,
            "cameras" => &self.cameras,
            "cordons" => &self.cordons,
            "custom_visgroups" => &self.custom_visgroups,
            "instances" => &self.instances,
            "instance_parameters" => &self.instance_parameters,
            "palette_plus" => &self.palette_plus,
            "colorcorrection_plus" => &self.colorcorrection_plus,
            "light_plus" => &self.light_plus,
            "bgimages_plus" => &self.bgimages_plus,
            _ => return None,
        })
    }

    fn section_mut(&mut self, name: &str) -> Option<&mut Block> {
        Some(match name {
            "versioninfo" => &mut self.versioninfo,
            "visgroups" => &mut self.visgroups,
            "viewsettings" => &mut self.viewsettings,
            "world" => &mut self.world,
            "cameras" => &mut self.cameras,
            "cordons" => &mut self.cordons,
            "custom_visgroups" => &mut self.custom_visgroups,
            "instances" => &mut self.instances,
            "instance_parameters" => &mut self.instance_parameters,
            "palette_plus" => &mut self.palette_plus,
            "colorcorrection_plus" => &mut self.colorcorrection_plus,
            "light_plus" => &mut self.light_plus,
            "bgimages_plus" => &mut self.bgimages_plus,
            _ => return None,
        })
    }

    /// Every block section with its name, in write order.
    pub fn block_sections(&self) -> impl Iterator<Item = (&'static str, &Block)> + '_ {
        BLOCK_SECTIONS
            .iter()
            .filter_map(move |name| self.section(name).map(|b| (*name, b)))
    }

    /// Resolve a dotted path such as `entities.3.solid.0` to a block.
    pub fn lookup_block(&self, path: &str) -> Option<&Block> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut block = if first == "entities" {
            let index = segments.next()?.parse::<usize>().ok()?;
            self.entities.get(index)?
        } else {
            self.section(first)?
        };
        let mut pending: Option<&Value> = None;
        for segment in segments {
            let value = match pending {
                None => block.get(segment)?,
                Some(Value::List(items)) => items.get(segment.parse::<usize>().ok()?)?,
                Some(_) => return None,
            };
            match value {
                Value::Block(b) => {
                    block = b;
                    pending = None;
                }
                other => pending = Some(other),
            }
        }
        match pending {
            None => Some(block),
            Some(_) => None,
        }
    }

    /// The object carrying `id`, through [`Document::id_map`].
    pub fn find_by_id(&self, id: &str) -> Option<&Block> {
        self.lookup_block(self.id_map.get(id)?)
    }

    /// Check the shape invariants the differ relies on.
    pub fn validate(&self) -> Result<(), String> {
        check_solid_owner("world", &self.world)?;
        for (i, entity) in self.entities.iter().enumerate() {
            check_solid_owner(&format!("entities.{}", i), entity)?;
        }
        Ok(())
    }
}

fn check_solid_owner(path: &str, owner: &Block) -> Result<(), String> {
    let solids = match owner.get("solid") {
        None => return Ok(()),
        Some(Value::List(items)) => items,
        Some(other) => {
            return Err(format!(
                "{}.solid is a {}, expected a list",
                path,
                other.type_name()
            ))
        }
    };
    for (i, solid) in solids.iter().enumerate() {
        let solid = match solid {
            Value::Block(b) => b,
            _ => continue,
        };
        let sides = match solid.get("side") {
            None => continue,
            Some(Value::List(items)) => items,
            Some(other) => {
                return Err(format!(
                    "{}.solid.{}.side is a {}, expected a list",
                    path,
                    i,
                    other.type_name()
                ))
            }
        };
        for (j, side) in sides.iter().enumerate() {
            if let Some(vertices) = side.as_block().and_then(|s| s.get("vertices_plus")) {
                if crate::vertex::vertex_sets(vertices).is_none() {
                    return Err(format!(
                        "{}.solid.{}.side.{}.vertices_plus is not a list of vertex sets",
                        path, i, j
                    ));
                }
            }
        }
    }
    Ok(())
}

/// Wrap a single occurrence of `key` in a list.
fn ensure_list(block: &mut Block, key: &str) {
    if let Some(value) = block.get_mut(key) {
        if !matches!(value, Value::List(_)) {
            let single = std::mem::replace(value, Value::List(Vec::new()));
            *value = Value::List(vec![single]);
        }
    }
}

fn for_each_block_mut(value: &mut Value, mut f: impl FnMut(&mut Block)) {
    match value {
        Value::Block(b) => f(b),
        Value::List(items) => items.iter_mut().filter_map(Value::as_block_mut).for_each(f),
        _ => {}
    }
}

fn normalize_solids(owner: &mut Block) {
    ensure_list(owner, "solid");
    if let Some(solids) = owner.get_mut("solid") {
        for_each_block_mut(solids, |solid| ensure_list(solid, "side"));
    }
}

fn normalize_solid_owner(owner: &mut Block) {
    normalize_solids(owner);
    for key in ["hidden", "entity"] {
        if let Some(nested) = owner.get_mut(key) {
            for_each_block_mut(nested, normalize_solids);
        }
    }
}

/// Bring a freshly parsed section into its canonical shape.
pub fn normalize_section(name: &str, value: &mut Value) {
    let block = match value.as_block_mut() {
        Some(block) => block,
        None => return,
    };
    match name {
        "world" | "entity" => normalize_solid_owner(block),
        "cameras" => ensure_list(block, "camera"),
        "cordons" => ensure_list(block, "cordon"),
        _ => {}
    }
}

/// Solids of a world or entity, including hidden ones.
pub(crate) fn solids_of(owner: &Block) -> Vec<&Block> {
    let mut solids: Vec<&Block> = owner.get("solid").map(|v| v.blocks().collect()).unwrap_or_default();
    if let Some(hidden) = owner.get("hidden") {
        for h in hidden.blocks() {
            if let Some(s) = h.get("solid") {
                solids.extend(s.blocks());
            }
        }
    }
    solids
}

pub(crate) fn sides_of(solid: &Block) -> impl Iterator<Item = &Block> {
    solid.get("side").into_iter().flat_map(Value::blocks)
}

/// Every `vertices_plus` vertex of one side.
pub(crate) fn vertices_of(side: &Block) -> impl Iterator<Item = Vec3> + '_ {
    side.get("vertices_plus")
        .and_then(Value::as_list)
        .unwrap_or(&[])
        .iter()
        .filter_map(Value::as_list)
        .flatten()
        .filter_map(Value::as_vector3)
}

/// Entities nested inside the world block, hidden ones included.
pub(crate) fn world_entities(world: &Block) -> Vec<&Block> {
    let mut found: Vec<&Block> = world.get("entity").map(|v| v.blocks().collect()).unwrap_or_default();
    if let Some(hidden) = world.get("hidden") {
        for h in hidden.blocks() {
            if let Some(e) = h.get("entity") {
                found.extend(e.blocks());
            }
        }
    }
    found
}

pub(crate) fn is_sky_camera(entity: &Block) -> bool {
    entity.text("classname").as_deref() == Some("sky_camera")
}

fn skybox_info(world: &Block, entities: &[Block]) -> SkyboxInfo {
    let sky_camera = world_entities(world)
        .into_iter()
        .chain(entities.iter())
        .find(|e| is_sky_camera(e))
        .cloned();
    SkyboxInfo {
        skyname: world.text("skyname").map(|s| s.into_owned()),
        sky_camera,
    }
}

fn map_bounds(world: &Block, entities: &[Block]) -> MapBounds {
    let mut bounds = MapBounds::default();
    let owners = std::iter::once(world)
        .chain(world_entities(world))
        .chain(entities.iter());
    for owner in owners {
        for solid in solids_of(owner) {
            for side in sides_of(solid) {
                vertices_of(side).for_each(|v| bounds.include(v));
            }
        }
    }
    bounds
}

fn index_ids(doc: &Document) -> BTreeMap<String, String> {
    let mut ids = BTreeMap::new();
    let mut roots: Vec<(String, &Block)> = Vec::new();
    for name in ["versioninfo", "visgroups", "viewsettings", "world"] {
        if let Some(b) = doc.section(name) {
            roots.push((name.to_string(), b));
        }
    }
    for (i, entity) in doc.entities.iter().enumerate() {
        roots.push((format!("entities.{}", i), entity));
    }
    for name in &BLOCK_SECTIONS[4..] {
        if let Some(b) = doc.section(name) {
            roots.push((name.to_string(), b));
        }
    }

    let mut stack: Vec<(String, &Block)> = roots.into_iter().rev().collect();
    while let Some((path, block)) = stack.pop() {
        if let Some(id) = block.text("id") {
            match ids.entry(id.into_owned()) {
                Entry::Occupied(first) => {
                    log::warn!(
                        "Duplicate id {} at {}, keeping {}",
                        first.key(),
                        path,
                        first.get()
                    );
                }
                Entry::Vacant(slot) => {
                    slot.insert(path.clone());
                }
            }
        }
        let mut children = Vec::new();
        for (key, value) in block.iter() {
            if key == "side" {
                continue;
            }
            match value {
                Value::Block(b) => children.push((format!("{}.{}", path, key), b)),
                Value::List(items) => {
                    for (i, item) in items.iter().enumerate() {
                        if let Value::Block(b) = item {
                            children.push((format!("{}.{}.{}", path, key, i), b));
                        }
                    }
                }
                _ => {}
            }
        }
        stack.extend(children.into_iter().rev());
    }
    ids
}

/// Routes sections into a [`Document`].
pub(crate) struct DocumentBuilder {
    doc: Document,
    seen: Vec<String>,
    unknown: BlockBuilder,
    policy: MergePolicy,
}

impl DocumentBuilder {
    pub(crate) fn new(policy: MergePolicy) -> Self {
        Self {
            doc: Document::default(),
            seen: Vec::new(),
            unknown: BlockBuilder::new(policy),
            policy,
        }
    }

    pub(crate) fn add_section(&mut self, section: Section) {
        let Section { name, value, line } = section;
        let block = match value {
            Value::Block(block) => block,
            scalar => {
                log::debug!("Section \"{}\" at line {} holds a scalar", name, line);
                self.unknown.add(name, scalar);
                return;
            }
        };
        if name == "entity" {
            self.doc.entities.push(block);
            return;
        }
        let policy = self.policy;
        let repeated = self.seen.iter().any(|s| s == &name);
        match self.doc.section_mut(&name) {
            Some(slot) if !repeated => {
                log::debug!("Section \"{}\" at line {}", name, line);
                *slot = block;
            }
            Some(slot) => {
                log::warn!("Repeated section \"{}\" at line {}, merging", name, line);
                let mut merged = BlockBuilder::from_block(std::mem::take(slot), policy);
                for (key, value) in block.into_entries() {
                    merged.add(key, value);
                }
                *slot = merged.finish();
            }
            None => {
                log::debug!("Unknown section \"{}\" at line {}", name, line);
                self.unknown.add(name, Value::Block(block));
                return;
            }
        }
        self.seen.push(name);
    }

    pub(crate) fn finish(self, comments: Vec<Comment>) -> Document {
        let mut doc = self.doc;
        doc.unknown_sections = self.unknown.finish();
        doc.skybox_info = skybox_info(&doc.world, &doc.entities);
        doc.map_bounds = map_bounds(&doc.world, &doc.entities);
        doc.id_map = index_ids(&doc);
        doc.comments = comments;
        doc
    }
}
