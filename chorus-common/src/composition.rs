//! Program composition
//!
//! A program's script is its own `element_ids` followed by the expansion of
//! each child in `program_ids`, depth-first, in stored order. `program_ids`
//! is a general directed graph: nothing in storage guarantees acyclicity, so
//! traversal carries a visited set and skips programs it has already
//! expanded. A child that points back at a program still being expanded is
//! a cycle and is logged at `warn`.

use crate::db::ProgramVersion;
use crate::programs::{current_program_version, resolve_current_versions, ProgramScope};
use crate::versions::{get_version_summaries, VersionSummary};
use crate::Result;
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, warn};

/// Current versions of a root program and every program reachable from it
#[derive(Debug, Clone)]
pub struct ProgramGraph {
    root: ProgramVersion,
    programs: HashMap<i64, ProgramVersion>,
}

impl ProgramGraph {
    /// Build a graph from already-resolved current versions
    pub fn new(root: ProgramVersion, programs: impl IntoIterator<Item = ProgramVersion>) -> Self {
        let mut map: HashMap<i64, ProgramVersion> =
            programs.into_iter().map(|v| (v.program_id, v)).collect();
        map.insert(root.program_id, root.clone());
        Self { root, programs: map }
    }

    /// Resolve the root and all reachable programs, one batch per depth level
    pub async fn load(pool: &SqlitePool, program_id: i64) -> Result<Self> {
        let root = current_program_version(pool, program_id).await?;

        let mut programs: HashMap<i64, ProgramVersion> = HashMap::new();
        let mut requested: HashSet<i64> = HashSet::from([root.program_id]);
        let mut frontier: Vec<i64> = root.program_ids.clone();
        programs.insert(root.program_id, root.clone());

        while !frontier.is_empty() {
            frontier.retain(|id| requested.insert(*id));
            if frontier.is_empty() {
                break;
            }

            let level = resolve_current_versions(pool, ProgramScope::Ids(&frontier)).await?;
            for id in &frontier {
                if !level.contains_key(id) {
                    warn!("Program {} references program {} which has no versions", program_id, id);
                }
            }

            frontier = level
                .values()
                .flat_map(|v| v.program_ids.iter().copied())
                .filter(|id| !requested.contains(id))
                .collect();
            programs.extend(level);
        }

        debug!("Program {} reaches {} programs", program_id, programs.len());
        Ok(Self { root, programs })
    }

    pub fn root(&self) -> &ProgramVersion {
        &self.root
    }

    pub fn current(&self, program_id: i64) -> Option<&ProgramVersion> {
        self.programs.get(&program_id)
    }

    /// Flattened song version ids of the root program
    pub fn version_ids(&self) -> Vec<i64> {
        collect_version_ids(self, Some(&self.root), &mut HashSet::new())
    }

    /// Sub-programs in the order traversal first expands them
    pub fn sub_programs(&self) -> Vec<&ProgramVersion> {
        let mut visited = HashSet::from([self.root.program_id]);
        let mut ordered = Vec::new();
        self.walk_children(&self.root, &mut visited, &mut ordered);
        ordered
    }

    fn walk_children<'a>(
        &'a self,
        program: &'a ProgramVersion,
        visited: &mut HashSet<i64>,
        ordered: &mut Vec<&'a ProgramVersion>,
    ) {
        for child_id in &program.program_ids {
            if let Some(child) = self.current(*child_id) {
                if visited.insert(child.program_id) {
                    ordered.push(child);
                    self.walk_children(child, visited, ordered);
                }
            }
        }
    }
}

/// Expand `program` into its ordered song version ids
///
/// Returns nothing for a missing program or one already in `visited`.
/// Duplicated song versions across programs are kept.
pub fn collect_version_ids(
    graph: &ProgramGraph,
    program: Option<&ProgramVersion>,
    visited: &mut HashSet<i64>,
) -> Vec<i64> {
    let mut expansion = Expansion {
        graph,
        visited,
        path: Vec::new(),
        cycles: Vec::new(),
    };
    let ids = expansion.expand(program);
    if !expansion.cycles.is_empty() {
        debug!("Expansion cut {} cyclic reference(s)", expansion.cycles.len());
    }
    ids
}

/// Depth-first expansion state; `path` holds the programs currently being
/// expanded, root first
struct Expansion<'g, 'v> {
    graph: &'g ProgramGraph,
    visited: &'v mut HashSet<i64>,
    path: Vec<i64>,
    /// (parent, child) edges that point back into `path`
    cycles: Vec<(i64, i64)>,
}

impl Expansion<'_, '_> {
    fn expand(&mut self, program: Option<&ProgramVersion>) -> Vec<i64> {
        let Some(program) = program else {
            return Vec::new();
        };
        if !self.visited.insert(program.program_id) {
            debug!("Program {} already expanded, skipping", program.program_id);
            return Vec::new();
        }

        self.path.push(program.program_id);
        let mut ids = program.element_ids.clone();
        for child_id in &program.program_ids {
            if self.path.contains(child_id) {
                warn!(
                    "Composition cycle: program {} refers back to program {} (path {:?})",
                    program.program_id, child_id, self.path
                );
                self.cycles.push((program.program_id, *child_id));
                continue;
            }
            let graph = self.graph;
            ids.extend(self.expand(graph.current(*child_id)));
        }
        self.path.pop();
        ids
    }
}

/// Assembled script of a program
#[derive(Debug, Clone, Serialize)]
pub struct ProgramScript {
    pub program: ProgramVersion,
    /// Sub-programs reached during expansion, first-visit order
    pub programs: Vec<ProgramVersion>,
    /// Song version ids in performance order
    pub version_ids: Vec<i64>,
    pub versions: BTreeMap<i64, VersionSummary>,
}

/// Resolve a program into its printable script
pub async fn resolve_program_script(pool: &SqlitePool, program_id: i64) -> Result<ProgramScript> {
    let graph = ProgramGraph::load(pool, program_id).await?;
    let version_ids = graph.version_ids();
    let versions = get_version_summaries(pool, &version_ids).await?;

    Ok(ProgramScript {
        program: graph.root().clone(),
        programs: graph.sub_programs().into_iter().cloned().collect(),
        version_ids,
        versions,
    })
}
