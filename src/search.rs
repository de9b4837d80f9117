//! A* over the cells of a [Mesh] with the octile distance as heuristic.
//!
//! Nodes are stored once in an arena and addressed by [NodeId] from the open map, the closed map
//! and the payload of the open [PriorityQueue]. When a shorter path to an open node is found its
//! `g` and parent are updated in place but its key in the queue is left as it was, since the
//! queue has no decrease-key. Such a node may be popped later than an exact A* would pop it, so
//! routes are not guaranteed to be optimal once relaxations happen before the target is closed.
//! [SearchContext::relaxations] counts how often this occurred.
use fxhash::FxBuildHasher;
use grid_util::point::Point;
use indexmap::map::Entry::{Occupied, Vacant};
use indexmap::IndexMap;
use log::trace;

use crate::cell::{octile_distance, CellId, Direction};
use crate::mesh::Mesh;
use crate::priority_queue::{HeapOrder, PriorityQueue};

type FxIndexMap<K, V> = IndexMap<K, V, FxBuildHasher>;

/// Handle of a [NodeInfo] in the arena of a [SearchContext].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(pub usize);

/// Search state of a discovered cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NodeInfo {
    pub cell: CellId,
    /// Cost of the best known path from the source.
    pub g: i32,
    /// Heuristic to the target, fixed at discovery.
    pub h: i32,
    /// Direction pointing back to the predecessor on the best known path.
    pub parent: Option<Direction>,
}

impl NodeInfo {
    #[inline]
    pub fn f(&self) -> i32 {
        self.g + self.h
    }
}

/// One entry of a route. `direction` is the step taken from the previous entry and is [None]
/// for the source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RouteStep {
    pub cell: CellId,
    pub position: Point,
    pub direction: Option<Direction>,
}

/// Outcome of [Mesh::find_route]: the route, if any, and every cell closed during the search in
/// the order they were closed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteResult {
    pub route: Option<Vec<RouteStep>>,
    pub visited: Vec<CellId>,
}

/// A single route query on a [Mesh]. Owns its open and closed sets, so any number of contexts
/// can run against the same mesh at once.
#[derive(Clone, Debug)]
pub struct SearchContext<'a> {
    mesh: &'a Mesh,
    source: CellId,
    target: CellId,
    target_position: Point,
    nodes: Vec<NodeInfo>,
    open_queue: PriorityQueue<NodeId>,
    open: FxIndexMap<CellId, NodeId>,
    closed: FxIndexMap<CellId, NodeId>,
    steps: usize,
    relaxations: usize,
    finished: bool,
}

impl<'a> SearchContext<'a> {
    /// Both cells must be walkable cells of `mesh`, see [Mesh::search].
    pub(crate) fn new(mesh: &'a Mesh, source: CellId, target: CellId) -> SearchContext<'a> {
        let target_position = mesh.position(target);
        let source_node = NodeInfo {
            cell: source,
            g: 0,
            h: octile_distance(mesh.position(source), target_position),
            parent: None,
        };
        let mut open_queue = PriorityQueue::new(HeapOrder::Min);
        open_queue.insert(source_node.f(), NodeId(0));
        let mut open = FxIndexMap::default();
        open.insert(source, NodeId(0));
        SearchContext {
            mesh,
            source,
            target,
            target_position,
            nodes: vec![source_node],
            open_queue,
            open,
            closed: FxIndexMap::default(),
            steps: 0,
            relaxations: 0,
            finished: false,
        }
    }

    pub fn source(&self) -> CellId {
        self.source
    }
    pub fn target(&self) -> CellId {
        self.target
    }

    /// Closes the open node with the smallest key and expands it. Returns whether the search
    /// should continue: [false] once the target is closed or the open set is exhausted.
    pub fn step(&mut self) -> bool {
        if self.finished {
            return false;
        }
        let Ok((_, node_id)) = self.open_queue.pop_best() else {
            self.finished = true;
            return false;
        };
        self.steps += 1;
        let node = self.nodes[node_id.0];
        self.open.swap_remove(&node.cell);
        self.closed.insert(node.cell, node_id);
        if node.cell == self.target {
            self.finished = true;
            return false;
        }
        let mesh = self.mesh;
        let Some(cell) = mesh.cell(node.cell) else {
            return true;
        };
        for (dir, neighbour) in cell.neighbours() {
            if self.closed.contains_key(&neighbour) {
                continue;
            }
            let g = node.g + dir.step_cost();
            match self.open.entry(neighbour) {
                Vacant(e) => {
                    let h = octile_distance(mesh.position(neighbour), self.target_position);
                    let id = NodeId(self.nodes.len());
                    self.nodes.push(NodeInfo {
                        cell: neighbour,
                        g,
                        h,
                        parent: Some(dir.backward()),
                    });
                    e.insert(id);
                    self.open_queue.insert(g + h, id);
                }
                Occupied(e) => {
                    let info = &mut self.nodes[e.get().0];
                    if g + info.h < info.f() {
                        trace!(
                            "Relaxing {:?} from g={} to g={} without requeueing",
                            info.cell,
                            info.g,
                            g
                        );
                        info.g = g;
                        info.parent = Some(dir.backward());
                        self.relaxations += 1;
                    }
                }
            }
        }
        true
    }

    /// Steps until the target is closed or the open set is exhausted.
    pub fn run(&mut self) {
        while self.step() {}
    }

    /// Performs at most `max_steps` steps. Returns whether the search could continue.
    pub fn run_bounded(&mut self, max_steps: usize) -> bool {
        (0..max_steps).all(|_| self.step())
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
    /// Whether the target has been closed.
    pub fn found(&self) -> bool {
        self.closed.contains_key(&self.target)
    }
    /// Number of nodes popped from the open set so far.
    pub fn steps(&self) -> usize {
        self.steps
    }
    /// Number of in-place `g` improvements of open nodes whose queue key was left stale.
    pub fn relaxations(&self) -> usize {
        self.relaxations
    }
    pub fn open_count(&self) -> usize {
        self.open.len()
    }
    /// Search state of a discovered cell.
    pub fn node(&self, cell: CellId) -> Option<&NodeInfo> {
        self.open
            .get(&cell)
            .or_else(|| self.closed.get(&cell))
            .map(|id| &self.nodes[id.0])
    }

    /// The route from source to target, or [None] if the target has not been closed.
    pub fn route(&self) -> Option<Vec<RouteStep>> {
        let &target_node = self.closed.get(&self.target)?;
        let mut route = std::iter::successors(Some(target_node), |&node_id| {
            let node = &self.nodes[node_id.0];
            let parent = self.mesh.neighbour(node.cell, node.parent?)?;
            self.closed.get(&parent).copied()
        })
        .map(|node_id| {
            let node = &self.nodes[node_id.0];
            RouteStep {
                cell: node.cell,
                position: self.mesh.position(node.cell),
                direction: node.parent.map(Direction::backward),
            }
        })
        .collect::<Vec<_>>();
        route.reverse();
        Some(route)
    }

    /// Every closed cell in the order it was closed.
    pub fn visited(&self) -> Vec<CellId> {
        self.closed.keys().copied().collect()
    }
    pub fn visited_count(&self) -> usize {
        self.closed.len()
    }

    pub fn into_result(self) -> RouteResult {
        RouteResult {
            route: self.route(),
            visited: self.visited(),
        }
    }
}
