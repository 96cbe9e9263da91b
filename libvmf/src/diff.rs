//! Structural comparison of two maps.
//!
//! The differ walks the union of keys of both trees, building dotted paths
//! as it goes. Blocks recurse by key, lists by index, and entities are
//! matched by identity rather than position. `vertices_plus` lists are
//! scored numerically instead of being reported value by value.

use crate::config::ParserConfig;
use crate::document::{Document, BLOCK_SECTIONS};
use crate::error::{DiffError, DiffResult};
use crate::ignore::IgnoreSet;
use crate::parser::{Section, SectionStream};
use crate::stats::{DiffTotals, MapStats, Stats};
use crate::value::{Block, Value};
use crate::vertex::{compare_vertex_sets, vertex_sets, VertexDeviation};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// A value present on one side only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entry {
    pub path: String,
    pub value: Value,
}

/// A value present on both sides with different contents.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Change {
    pub path: String,
    pub old_value: Value,
    pub new_value: Value,
}

/// Moved vertices of one `vertices_plus` list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VertexChange {
    pub path: String,
    #[serde(flatten)]
    pub deviation: VertexDeviation,
}

/// Every difference found, grouped by kind.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Differences {
    pub removed: Vec<Entry>,
    pub added: Vec<Entry>,
    pub changed: Vec<Change>,
    pub vertex_changed: Vec<VertexChange>,
}

impl Differences {
    pub fn total(&self) -> usize {
        self.removed.len() + self.added.len() + self.changed.len() + self.vertex_changed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Result of comparing two maps.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    pub differences: Differences,
    pub stats: Stats,
}

fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", path, key)
    }
}

/// Hands out entity keys: `id:<id>`, else `targetname:<name>`, else a
/// content-derived `anon:` key. Repeats get a `#k` suffix.
#[derive(Default)]
struct EntityKeys {
    seen: HashMap<String, usize>,
}

impl EntityKeys {
    fn key(&mut self, entity: &Block) -> String {
        let base = if let Some(id) = entity.text("id") {
            format!("id:{}", id)
        } else if let Some(name) = entity.text("targetname") {
            format!("targetname:{}", name)
        } else {
            let classname = entity.text("classname").unwrap_or_default();
            match entity.text("origin") {
                Some(origin) => format!("anon:{}@{}", classname, origin),
                None => format!("anon:{}", classname),
            }
        };
        let count = self.seen.entry(base.clone()).or_insert(0);
        *count += 1;
        if *count == 1 {
            base
        } else {
            format!("{}#{}", base, count)
        }
    }
}

struct Differ<'a> {
    ignore: &'a IgnoreSet,
    differences: Differences,
    totals: DiffTotals,
}

impl<'a> Differ<'a> {
    fn new(ignore: &'a IgnoreSet) -> Self {
        Self {
            ignore,
            differences: Differences::default(),
            totals: DiffTotals::default(),
        }
    }

    fn removed(&mut self, path: String, value: &Value) {
        self.differences.removed.push(Entry {
            path,
            value: value.clone(),
        });
    }

    fn added(&mut self, path: String, value: &Value) {
        self.differences.added.push(Entry {
            path,
            value: value.clone(),
        });
    }

    fn diff_blocks(&mut self, path: &str, a: &Block, b: &Block) {
        self.diff_fields(path, a, b, &[]);
    }

    /// Diff two entities paired under `key`. An `id` pair is the same
    /// entity, so its `targetname` is not an edit.
    fn diff_entity(&mut self, path: &str, key: &str, a: &Block, b: &Block) {
        let skip: &[&str] = if key.starts_with("id:") {
            &["targetname"]
        } else {
            &[]
        };
        self.diff_fields(path, a, b, skip);
    }

    fn diff_fields(&mut self, path: &str, a: &Block, b: &Block, skip: &[&str]) {
        for (key, va) in a.iter() {
            if skip.contains(&key) {
                continue;
            }
            let child = join(path, key);
            if self.ignore.matches(&child) {
                continue;
            }
            match b.get(key) {
                Some(vb) => self.diff_values(&child, key, va, vb),
                None => self.removed(child, va),
            }
        }
        for (key, vb) in b.iter() {
            if a.contains_key(key) || skip.contains(&key) {
                continue;
            }
            let child = join(path, key);
            if self.ignore.matches(&child) {
                continue;
            }
            self.added(child, vb);
        }
    }

    fn diff_values(&mut self, path: &str, key: &str, a: &Value, b: &Value) {
        if key == "vertices_plus" {
            if let (Some(sa), Some(sb)) = (vertex_sets(a), vertex_sets(b)) {
                if let Some(deviation) = compare_vertex_sets(&sa, &sb) {
                    self.totals.record_vertex(&deviation);
                    self.differences.vertex_changed.push(VertexChange {
                        path: path.to_string(),
                        deviation,
                    });
                }
                return;
            }
        }
        match (a, b) {
            (Value::Block(ba), Value::Block(bb)) => self.diff_blocks(path, ba, bb),
            (Value::List(la), Value::List(lb)) => self.diff_lists(path, la, lb),
            _ if a == b => {}
            _ => self.differences.changed.push(Change {
                path: path.to_string(),
                old_value: a.clone(),
                new_value: b.clone(),
            }),
        }
    }

    fn diff_lists(&mut self, path: &str, a: &[Value], b: &[Value]) {
        for i in 0..a.len().max(b.len()) {
            let index = i.to_string();
            let child = join(path, &index);
            if self.ignore.matches(&child) {
                continue;
            }
            match (a.get(i), b.get(i)) {
                (Some(va), Some(vb)) => self.diff_values(&child, &index, va, vb),
                (Some(va), None) => self.removed(child, va),
                (None, Some(vb)) => self.added(child, vb),
                (None, None) => {}
            }
        }
    }

    fn diff_section(&mut self, name: &str, a: &Block, b: &Block) {
        if self.ignore.matches(name) {
            return;
        }
        self.diff_blocks(name, a, b);
    }

    fn diff_entities(&mut self, a: &[Block], b: &[Block]) {
        if self.ignore.matches("entities") {
            return;
        }
        let mut keys = EntityKeys::default();
        let keyed_a: Vec<(String, &Block)> = a.iter().map(|e| (keys.key(e), e)).collect();
        let mut keys = EntityKeys::default();
        let keyed_b: Vec<(String, &Block)> = b.iter().map(|e| (keys.key(e), e)).collect();

        let index_b: HashMap<&str, &Block> = keyed_b.iter().map(|(k, e)| (k.as_str(), *e)).collect();
        let in_a: HashSet<&str> = keyed_a.iter().map(|(k, _)| k.as_str()).collect();

        for (key, ea) in &keyed_a {
            let path = join("entities", key);
            if self.ignore.matches(&path) {
                continue;
            }
            match index_b.get(key.as_str()) {
                Some(eb) => self.diff_entity(&path, key, ea, eb),
                None => self.removed(path, &Value::Block((*ea).clone())),
            }
        }
        for (key, eb) in &keyed_b {
            if in_a.contains(key.as_str()) {
                continue;
            }
            let path = join("entities", key);
            if self.ignore.matches(&path) {
                continue;
            }
            self.added(path, &Value::Block((*eb).clone()));
        }
    }

    fn finish(mut self, a: MapStats, b: MapStats) -> Comparison {
        self.totals.total_differences = self.differences.total();
        Comparison {
            stats: Stats::new(a, b, &self.totals),
            differences: self.differences,
        }
    }
}

/// Compare two parsed maps.
///
/// Paths matching any of `ignore_patterns` are skipped along with their
/// whole subtree.
pub fn compare<S: AsRef<str>>(
    doc1: &Document,
    doc2: &Document,
    ignore_patterns: &[S],
) -> DiffResult<Comparison> {
    doc1.validate()
        .map_err(|reason| DiffError::InvalidInput { side: "first", reason })?;
    doc2.validate()
        .map_err(|reason| DiffError::InvalidInput { side: "second", reason })?;
    let ignore = IgnoreSet::new(ignore_patterns)?;

    let mut differ = Differ::new(&ignore);
    for (name, a) in doc1.block_sections() {
        if let Some(b) = doc2.section(name) {
            differ.diff_section(name, a, b);
        }
    }
    differ.diff_entities(&doc1.entities, &doc2.entities);
    differ.diff_section("unknown_sections", &doc1.unknown_sections, &doc2.unknown_sections);

    Ok(differ.finish(MapStats::of(doc1), MapStats::of(doc2)))
}

/// One side of a streaming comparison.
struct StreamSide<R: Read> {
    stream: SectionStream<R>,
    stats: MapStats,
    keys: EntityKeys,
}

impl<R: Read> StreamSide<R> {
    fn new(stream: SectionStream<R>) -> Self {
        Self {
            stream,
            stats: MapStats::default(),
            keys: EntityKeys::default(),
        }
    }

    /// Next section with its diff path.
    fn pull(&mut self) -> DiffResult<Option<(String, Section)>> {
        let section = match self.stream.next_section()? {
            Some(section) => section,
            None => return Ok(None),
        };
        self.stats.observe(&section);
        let path = match (&section.value, section.name.as_str()) {
            (Value::Block(entity), "entity") => join("entities", &self.keys.key(entity)),
            (Value::Block(_), name) if BLOCK_SECTIONS.contains(&name) => name.to_string(),
            (_, name) => join("unknown_sections", name),
        };
        Ok(Some((path, section)))
    }
}

/// Compare two map files section by section.
///
/// Sections are merge-joined by path, which is the section name except for
/// entities, keyed as in [`compare`]. Equal paths are diffed, otherwise the
/// lexically smaller one is reported whole and skipped. Files whose sections
/// appear in different orders therefore produce add/remove pairs that
/// [`compare`] would not.
pub fn compare_streaming<S: AsRef<str>>(
    path1: impl AsRef<Path>,
    path2: impl AsRef<Path>,
    ignore_patterns: &[S],
    config: &ParserConfig,
) -> DiffResult<Comparison> {
    let ignore = IgnoreSet::new(ignore_patterns)?;
    let left = SectionStream::<File>::open(path1, config)?;
    let right = SectionStream::<File>::open(path2, config)?;
    compare_section_streams(left, right, &ignore)
}

pub(crate) fn compare_section_streams<R1: Read, R2: Read>(
    left: SectionStream<R1>,
    right: SectionStream<R2>,
    ignore: &IgnoreSet,
) -> DiffResult<Comparison> {
    let mut left = StreamSide::new(left);
    let mut right = StreamSide::new(right);
    let mut differ = Differ::new(ignore);

    let mut a = left.pull()?;
    let mut b = right.pull()?;
    loop {
        match (a.take(), b.take()) {
            (None, None) => break,
            (Some((path, section)), None) => {
                report_whole(&mut differ, path, &section, true);
                a = left.pull()?;
            }
            (None, Some((path, section))) => {
                report_whole(&mut differ, path, &section, false);
                b = right.pull()?;
            }
            (Some((path_a, sa)), Some((path_b, sb))) => match path_a.cmp(&path_b) {
                Ordering::Equal => {
                    log::debug!("Diffing section {}", path_a);
                    if !ignore.matches(&path_a) {
                        match (path_a.strip_prefix("entities."), &sa.value, &sb.value) {
                            (Some(key), Value::Block(ea), Value::Block(eb)) => {
                                differ.diff_entity(&path_a, key, ea, eb)
                            }
                            _ => differ.diff_values(&path_a, &sa.name, &sa.value, &sb.value),
                        }
                    }
                    a = left.pull()?;
                    b = right.pull()?;
                }
                Ordering::Less => {
                    log::debug!("Section {} only in first stream", path_a);
                    report_whole(&mut differ, path_a, &sa, true);
                    a = left.pull()?;
                    b = Some((path_b, sb));
                }
                Ordering::Greater => {
                    log::debug!("Section {} only in second stream", path_b);
                    report_whole(&mut differ, path_b, &sb, false);
                    a = Some((path_a, sa));
                    b = right.pull()?;
                }
            },
        }
    }

    Ok(differ.finish(left.stats, right.stats))
}

fn report_whole(differ: &mut Differ<'_>, path: String, section: &Section, removed: bool) {
    if differ.ignore.matches(&path) {
        return;
    }
    if removed {
        differ.removed(path, &section.value);
    } else {
        differ.added(path, &section.value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_str;
    use crate::value::Vec3;

    fn doc(text: &str) -> Document {
        parse_str(text, &ParserConfig::default()).unwrap()
    }

    const NONE: &[&str] = &[];

    #[test]
    fn test_scalar_change() {
        let a = doc("versioninfo\n{\n\"mapversion\" \"1\"\n}\n");
        let b = doc("versioninfo\n{\n\"mapversion\" \"2\"\n}\n");
        let c = compare(&a, &b, NONE).unwrap();
        assert_eq!(c.differences.changed.len(), 1);
        let change = &c.differences.changed[0];
        assert_eq!(change.path, "versioninfo.mapversion");
        assert_eq!(change.old_value, Value::Integer(1));
        assert_eq!(change.new_value, Value::Integer(2));
        assert_eq!(c.stats.total_differences, 1);
    }

    #[test]
    fn test_added_and_removed_keys() {
        let a = doc("viewsettings\n{\n\"bSnapToGrid\" \"1\"\n}\n");
        let b = doc("viewsettings\n{\n\"nGridSpacing\" \"64\"\n}\n");
        let c = compare(&a, &b, NONE).unwrap();
        assert_eq!(c.differences.removed[0].path, "viewsettings.bSnapToGrid");
        assert_eq!(c.differences.added[0].path, "viewsettings.nGridSpacing");
    }

    #[test]
    fn test_container_kind_mismatch_is_a_change() {
        let a = doc("world\n{\n\"a\" \"1\"\n}\n");
        let b = doc("world\n{\na\n{\n}\n}\n");
        let c = compare(&a, &b, NONE).unwrap();
        assert_eq!(c.differences.changed.len(), 1);
        assert_eq!(c.differences.changed[0].path, "world.a");
    }

    #[test]
    fn test_list_recurses_by_index() {
        let a = doc("world\n{\n\"a\" \"1\"\n\"a\" \"2\"\n}\n");
        let b = doc("world\n{\n\"a\" \"1\"\n\"a\" \"3\"\n\"a\" \"4\"\n}\n");
        let c = compare(&a, &b, NONE).unwrap();
        assert_eq!(c.differences.changed[0].path, "world.a.1");
        assert_eq!(c.differences.added[0].path, "world.a.2");
    }

    #[test]
    fn test_entity_keys() {
        let mut keys = EntityKeys::default();
        let mut with_id = Block::new();
        with_id.insert("id", Value::Integer(5));
        let mut named = Block::new();
        named.insert("targetname", Value::from("door"));
        let mut anon = Block::new();
        anon.insert("classname", Value::from("light"));
        assert_eq!(keys.key(&with_id), "id:5");
        assert_eq!(keys.key(&named), "targetname:door");
        assert_eq!(keys.key(&anon), "anon:light");
        assert_eq!(keys.key(&anon), "anon:light#2");
    }

    #[test]
    fn test_whole_entity_added() {
        let a = doc("entity\n{\n\"id\" \"1\"\n}\n");
        let b = doc("entity\n{\n\"id\" \"1\"\n}\nentity\n{\n\"id\" \"2\"\n\"classname\" \"light\"\n}\n");
        let c = compare(&a, &b, NONE).unwrap();
        assert_eq!(c.differences.added.len(), 1);
        assert_eq!(c.differences.added[0].path, "entities.id:2");
        assert!(matches!(c.differences.added[0].value, Value::Block(_)));
    }

    #[test]
    fn test_vertex_change_recorded() {
        let a = doc("world\n{\nsolid\n{\nside\n{\nvertices_plus\n{\n\"v\" \"0 0 0\"\n}\n}\n}\n}\n");
        let b = doc("world\n{\nsolid\n{\nside\n{\nvertices_plus\n{\n\"v\" \"0 0 2\"\n}\n}\n}\n}\n");
        let c = compare(&a, &b, NONE).unwrap();
        assert!(c.differences.changed.is_empty());
        let vc = &c.differences.vertex_changed[0];
        assert_eq!(vc.path, "world.solid.0.side.0.vertices_plus");
        assert_eq!(vc.deviation.max_deviation, 2.0);
        assert_eq!(c.stats.vertex_changes, 1);
        assert_eq!(c.stats.average_vertex_deviation, Some(2.0));
        assert_eq!(c.stats.map_bounds.doc2.max, Vec3::new(0.0, 0.0, 2.0));
    }

    #[test]
    fn test_ignored_section() {
        let a = doc("versioninfo\n{\n\"mapversion\" \"1\"\n}\n");
        let b = doc("versioninfo\n{\n\"mapversion\" \"2\"\n}\n");
        let c = compare(&a, &b, &["versioninfo"]).unwrap();
        assert!(c.differences.is_empty());
    }

    #[test]
    fn test_invalid_input() {
        let mut bad = Document::default();
        bad.world.insert("solid", Value::Integer(1));
        let err = compare(&bad, &Document::default(), NONE).unwrap_err();
        assert!(matches!(err, DiffError::InvalidInput { side: "first", .. }));
    }

    #[test]
    fn test_streaming_entities_pair_by_key() {
        let config = ParserConfig::default();
        let left = SectionStream::new(
            &b"entity\n{\n\"targetname\" \"door\"\n}\n"[..],
            &config,
        );
        let right = SectionStream::new(
            &b"entity\n{\n\"id\" \"3\"\n\"classname\" \"light\"\n}\n"[..],
            &config,
        );
        let c = compare_section_streams(left, right, &IgnoreSet::default()).unwrap();
        assert!(c.differences.changed.is_empty());
        assert_eq!(c.differences.added[0].path, "entities.id:3");
        assert_eq!(c.differences.removed[0].path, "entities.targetname:door");
    }

    #[test]
    fn test_streaming_merge_join() {
        let config = ParserConfig::default();
        let left = SectionStream::new(
            &b"versioninfo\n{\n\"mapversion\" \"1\"\n}\nentity\n{\n\"id\" \"7\"\n\"classname\" \"light\"\n}\n"[..],
            &config,
        );
        let right = SectionStream::new(
            &b"versioninfo\n{\n\"mapversion\" \"2\"\n}\nentity\n{\n\"id\" \"7\"\n\"classname\" \"light_spot\"\n}\n"[..],
            &config,
        );
        let c = compare_section_streams(left, right, &IgnoreSet::default()).unwrap();
        let paths: Vec<_> = c.differences.changed.iter().map(|ch| ch.path.as_str()).collect();
        assert_eq!(paths, vec!["versioninfo.mapversion", "entities.id:7.classname"]);
        assert_eq!(c.stats.entity_counts.doc2.get("light_spot"), Some(&1));
    }
}
