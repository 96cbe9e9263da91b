//! Per-map statistics.
//!
//! [`MapStats`] is an accumulator fed one section at a time, so the
//! streaming comparison can count without holding a whole document.

use crate::document::{
    is_sky_camera, sides_of, solids_of, vertices_of, world_entities, Document, MapBounds,
    SkyboxInfo,
};
use crate::parser::{is_palette_color, Section};
use crate::value::{Block, Value};
use crate::vertex::VertexDeviation;
use serde::Serialize;
use std::collections::BTreeMap;

/// Counts of gameplay-relevant entity classes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct SpecialEntities {
    pub spawn_points: usize,
    pub buy_zones: usize,
    pub bomb_sites: usize,
    pub hostage_rescue_zones: usize,
    pub hostage_entities: usize,
    pub weapon_spawns: usize,
    pub lights: usize,
    pub triggers: usize,
    pub ladders: usize,
    pub water_volumes: usize,
    pub func_detail: usize,
    pub areaportals: usize,
    pub occluders: usize,
    /// Solids with at least one `tools/toolshint` face.
    pub hint_brushes: usize,
}

impl SpecialEntities {
    fn record(&mut self, classname: &str) {
        let slot = match classname {
            "info_player_terrorist"
            | "info_player_counterterrorist"
            | "info_player_start"
            | "info_player_deathmatch"
            | "info_player_teamspawn" => &mut self.spawn_points,
            "func_buyzone" => &mut self.buy_zones,
            "func_bomb_target" | "info_bomb_target" => &mut self.bomb_sites,
            "func_hostage_rescue" | "info_hostage_rescue" => &mut self.hostage_rescue_zones,
            "hostage_entity" | "info_hostage_spawn" => &mut self.hostage_entities,
            "func_ladder" => &mut self.ladders,
            "func_water" | "func_water_analog" => &mut self.water_volumes,
            "func_detail" => &mut self.func_detail,
            "func_areaportal" | "func_areaportalwindow" => &mut self.areaportals,
            "func_occluder" => &mut self.occluders,
            c if c.starts_with("weapon_") => &mut self.weapon_spawns,
            c if c.starts_with("light") => &mut self.lights,
            c if c.starts_with("trigger_") => &mut self.triggers,
            _ => return,
        };
        *slot += 1;
    }
}

/// Entry counts of the Hammer++ extension sections.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct HammerPlusCounts {
    pub palette_colors: usize,
    pub colorcorrection_entries: usize,
    pub light_entries: usize,
    pub bgimage_entries: usize,
}

/// Statistics for one map.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct MapStats {
    pub brushes: usize,
    pub sides: usize,
    pub vertices: usize,
    pub displacements: usize,
    pub entities: BTreeMap<String, usize>,
    pub textures: BTreeMap<String, usize>,
    pub smoothing_groups: BTreeMap<String, usize>,
    pub connections: usize,
    pub visgroups: usize,
    pub cameras: usize,
    pub cordons: usize,
    pub groups: usize,
    pub custom_visgroups: usize,
    pub instances: usize,
    pub special: SpecialEntities,
    pub hammer_plus: HammerPlusCounts,
    pub skybox: SkyboxInfo,
    pub map_bounds: MapBounds,
}

impl MapStats {
    /// Count a whole document.
    pub fn of(doc: &Document) -> Self {
        let mut stats = MapStats::default();
        for (name, block) in doc.block_sections() {
            stats.observe_block(name, block);
        }
        for entity in &doc.entities {
            stats.observe_entity(entity);
        }
        stats
    }

    /// Count one top-level section.
    pub fn observe(&mut self, section: &Section) {
        if let Value::Block(block) = &section.value {
            if section.name == "entity" {
                self.observe_entity(block);
            } else {
                self.observe_block(&section.name, block);
            }
        }
    }

    fn observe_block(&mut self, name: &str, block: &Block) {
        match name {
            "world" => self.observe_world(block),
            "visgroups" => self.visgroups += count_visgroups(block),
            "cameras" => self.cameras += block.get("camera").map_or(0, |v| v.blocks().count()),
            "cordons" => self.cordons += block.get("cordon").map_or(0, |v| v.blocks().count()),
            "custom_visgroups" => self.custom_visgroups += entry_count(block),
            "instances" => self.instances += entry_count(block),
            "palette_plus" => {
                self.hammer_plus.palette_colors += block
                    .iter()
                    .filter(|(k, _)| is_palette_color(k))
                    .map(|(_, v)| multiplicity(v))
                    .sum::<usize>();
            }
            "colorcorrection_plus" => self.hammer_plus.colorcorrection_entries += entry_count(block),
            "light_plus" => self.hammer_plus.light_entries += entry_count(block),
            "bgimages_plus" => self.hammer_plus.bgimage_entries += entry_count(block),
            _ => {}
        }
    }

    fn observe_world(&mut self, world: &Block) {
        if self.skybox.skyname.is_none() {
            self.skybox.skyname = world.text("skyname").map(|s| s.into_owned());
        }
        self.groups += world.get("group").map_or(0, |v| v.blocks().count());
        self.observe_solids(world);
        for entity in world_entities(world) {
            self.observe_entity(entity);
        }
    }

    fn observe_entity(&mut self, entity: &Block) {
        let classname = entity
            .text("classname")
            .map(|s| s.into_owned())
            .unwrap_or_else(|| "unknown".to_string());
        self.special.record(&classname);
        if classname == "func_instance" {
            self.instances += 1;
        }
        if self.skybox.sky_camera.is_none() && is_sky_camera(entity) {
            self.skybox.sky_camera = Some(entity.clone());
        }
        if let Some(connections) = entity.get("connections") {
            self.connections += connections.blocks().map(entry_count).sum::<usize>();
        }
        *self.entities.entry(classname).or_default() += 1;
        self.observe_solids(entity);
    }

    fn observe_solids(&mut self, owner: &Block) {
        for solid in solids_of(owner) {
            self.brushes += 1;
            let mut hint = false;
            for side in sides_of(solid) {
                self.sides += 1;
                let material = side
                    .text("material")
                    .map(|s| s.into_owned())
                    .unwrap_or_else(|| "unknown".to_string());
                hint |= material.eq_ignore_ascii_case("tools/toolshint");
                *self.textures.entry(material).or_default() += 1;
                if side.contains_key("dispinfo") {
                    self.displacements += 1;
                }
                if let Some(groups) = side.text("smoothing_groups") {
                    *self.smoothing_groups.entry(groups.into_owned()).or_default() += 1;
                }
                for v in vertices_of(side) {
                    self.vertices += 1;
                    self.map_bounds.include(v);
                }
            }
            if hint {
                self.special.hint_brushes += 1;
            }
        }
    }
}

fn multiplicity(value: &Value) -> usize {
    match value {
        Value::List(items) => items.len(),
        _ => 1,
    }
}

fn entry_count(block: &Block) -> usize {
    block.iter().map(|(_, v)| multiplicity(v)).sum()
}

/// `visgroup` blocks at any depth.
fn count_visgroups(root: &Block) -> usize {
    let mut count = 0;
    let mut stack = vec![root];
    while let Some(block) = stack.pop() {
        if let Some(groups) = block.get("visgroup") {
            for group in groups.blocks() {
                count += 1;
                stack.push(group);
            }
        }
    }
    count
}

/// Aggregates accumulated while walking the differences.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DiffTotals {
    pub total_differences: usize,
    pub vertex_changes: usize,
    pub total_vertex_deviation: f64,
    pub max_vertex_deviation: f64,
}

impl DiffTotals {
    pub fn record_vertex(&mut self, deviation: &VertexDeviation) {
        self.vertex_changes += deviation.changed_count;
        self.total_vertex_deviation += deviation.total_deviation;
        self.max_vertex_deviation = self.max_vertex_deviation.max(deviation.max_deviation);
    }

    /// Present only when some vertex changed.
    pub fn average_vertex_deviation(&self) -> Option<f64> {
        if self.vertex_changes == 0 {
            return None;
        }
        Some(self.total_vertex_deviation / self.vertex_changes as f64)
    }
}

/// A statistic for each side of a comparison.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Pair<T> {
    pub doc1: T,
    pub doc2: T,
}

impl<T> Pair<T> {
    pub fn new(doc1: T, doc2: T) -> Self {
        Self { doc1, doc2 }
    }
}

impl<T: PartialEq> Pair<T> {
    pub fn differs(&self) -> bool {
        self.doc1 != self.doc2
    }
}

/// Side-by-side statistics plus comparison totals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stats {
    pub brush_counts: Pair<usize>,
    pub side_counts: Pair<usize>,
    pub vertex_counts: Pair<usize>,
    pub displacement_counts: Pair<usize>,
    pub entity_counts: Pair<BTreeMap<String, usize>>,
    pub texture_counts: Pair<BTreeMap<String, usize>>,
    pub smoothing_groups: Pair<BTreeMap<String, usize>>,
    pub connection_counts: Pair<usize>,
    pub visgroup_counts: Pair<usize>,
    pub camera_counts: Pair<usize>,
    pub cordon_counts: Pair<usize>,
    pub group_counts: Pair<usize>,
    pub custom_visgroup_counts: Pair<usize>,
    pub instance_counts: Pair<usize>,
    pub special_entities: Pair<SpecialEntities>,
    pub hammer_plus: Pair<HammerPlusCounts>,
    pub skybox_info: Pair<SkyboxInfo>,
    pub map_bounds: Pair<MapBounds>,
    pub total_differences: usize,
    pub vertex_changes: usize,
    pub total_vertex_deviation: f64,
    pub max_vertex_deviation: f64,
    pub average_vertex_deviation: Option<f64>,
}

impl Stats {
    pub fn new(a: MapStats, b: MapStats, totals: &DiffTotals) -> Self {
        Self {
            brush_counts: Pair::new(a.brushes, b.brushes),
            side_counts: Pair::new(a.sides, b.sides),
            vertex_counts: Pair::new(a.vertices, b.vertices),
            displacement_counts: Pair::new(a.displacements, b.displacements),
            entity_counts: Pair::new(a.entities, b.entities),
            texture_counts: Pair::new(a.textures, b.textures),
            smoothing_groups: Pair::new(a.smoothing_groups, b.smoothing_groups),
            connection_counts: Pair::new(a.connections, b.connections),
            visgroup_counts: Pair::new(a.visgroups, b.visgroups),
            camera_counts: Pair::new(a.cameras, b.cameras),
            cordon_counts: Pair::new(a.cordons, b.cordons),
            group_counts: Pair::new(a.groups, b.groups),
            custom_visgroup_counts: Pair::new(a.custom_visgroups, b.custom_visgroups),
            instance_counts: Pair::new(a.instances, b.instances),
            special_entities: Pair::new(a.special, b.special),
            hammer_plus: Pair::new(a.hammer_plus, b.hammer_plus),
            skybox_info: Pair::new(a.skybox, b.skybox),
            map_bounds: Pair::new(a.map_bounds, b.map_bounds),
            total_differences: totals.total_differences,
            vertex_changes: totals.vertex_changes,
            total_vertex_deviation: totals.total_vertex_deviation,
            max_vertex_deviation: totals.max_vertex_deviation,
            average_vertex_deviation: totals.average_vertex_deviation(),
        }
    }
}
