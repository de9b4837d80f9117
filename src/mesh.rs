use core::fmt;
use grid_util::point::Point;
use log::{debug, info, warn};
use petgraph::unionfind::UnionFind;
use thiserror::Error;

use crate::cell::{CellId, Direction, GridCell};
use crate::region::{Region, RegionId};
use crate::search::{RouteResult, SearchContext};
use crate::sweep::{corridors, RowSweep};

/// Errors that can occur when building a [Mesh] or querying routes on it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MeshError {
    /// Happens when the walkability grid has no rows at all.
    #[error("walkability grid has no rows")]
    EmptyGrid,
    /// Happens when a row of the walkability grid has no columns.
    #[error("row {row} of the walkability grid is empty")]
    EmptyRow {
        /// Index of the empty row
        row: usize,
    },
    /// Happens when the rows of the walkability grid differ in length.
    #[error("row {row} has {found} columns but the first row has {expected}")]
    InconsistentShape {
        /// Index of the first offending row
        row: usize,
        /// Length of the first row
        expected: usize,
        /// Length of the offending row
        found: usize,
    },
    /// Happens when a route endpoint lies outside the mesh.
    #[error("point ({x}, {y}) lies outside the mesh")]
    OutOfBounds {
        /// Column of the point
        x: i32,
        /// Row of the point
        y: i32,
    },
    /// Happens when a route endpoint is an obstacle.
    #[error("point ({x}, {y}) is not walkable")]
    NotWalkable {
        /// Column of the point
        x: i32,
        /// Row of the point
        y: i32,
    },
    /// The row sweep reached a configuration it cannot be in. This is a defect of the sweep, not
    /// of the input.
    #[error("row sweep is inconsistent in row {row}: {reason}")]
    SweepInconsistency {
        /// Row being swept
        row: usize,
        /// What went wrong
        reason: &'static str,
    },
}

/// [Mesh] owns one [GridCell] per walkable position, linked to its walkable 8-neighbours, and the
/// [Region]s the cells are partitioned into. It is built once from a walkability grid and is
/// read-only afterwards, so route queries can run concurrently from several threads.
///
/// In addition to the regions, 8-connected components are kept in a [UnionFind] structure to
/// answer reachability questions without searching.
#[derive(Clone, Debug)]
pub struct Mesh {
    width: usize,
    height: usize,
    cells: Vec<Option<GridCell>>,
    regions: Vec<Region>,
    components: UnionFind<usize>,
}

impl Mesh {
    /// Builds the mesh from a row-major walkability grid in which [true] marks a walkable cell.
    ///
    /// Every row must have the same, non-zero length.
    pub fn build<R: AsRef<[bool]>>(grid: &[R]) -> Result<Mesh, MeshError> {
        let first = grid.first().ok_or(MeshError::EmptyGrid)?;
        let width = first.as_ref().len();
        for (row, values) in grid.iter().enumerate() {
            let found = values.as_ref().len();
            if found == 0 {
                return Err(MeshError::EmptyRow { row });
            }
            if found != width {
                return Err(MeshError::InconsistentShape {
                    row,
                    expected: width,
                    found,
                });
            }
        }
        let height = grid.len();
        let cells = grid
            .iter()
            .enumerate()
            .flat_map(|(y, values)| {
                values.as_ref().iter().enumerate().map(move |(x, &walkable)| {
                    walkable.then(|| GridCell::new(Point::new(x as i32, y as i32)))
                })
            })
            .collect::<Vec<_>>();
        let mut mesh = Mesh {
            width,
            height,
            cells,
            regions: Vec::new(),
            components: UnionFind::new(0),
        };
        mesh.link_cells();
        mesh.generate_regions(grid)?;
        mesh.generate_components();
        info!(
            "Built {}x{} mesh with {} walkable cells in {} regions",
            width,
            height,
            mesh.cell_count(),
            mesh.regions.len()
        );
        Ok(mesh)
    }

    /// Links every cell to its W, NW, N and NE neighbours. The reciprocal E, SE, S and SW links
    /// follow from [Mesh::link].
    fn link_cells(&mut self) {
        for y in 0..self.height {
            for x in 0..self.width {
                let Some(id) = self.cell_id_at(x, y) else {
                    continue;
                };
                let mut targets = vec![];
                if x > 0 {
                    targets.push((Direction::W, self.cell_id_at(x - 1, y)));
                }
                if y > 0 {
                    targets.push((Direction::N, self.cell_id_at(x, y - 1)));
                    if x > 0 {
                        targets.push((Direction::NW, self.cell_id_at(x - 1, y - 1)));
                    }
                    if x + 1 < self.width {
                        targets.push((Direction::NE, self.cell_id_at(x + 1, y - 1)));
                    }
                }
                for (dir, target) in targets {
                    if let Some(target) = target {
                        self.link(id, dir, Some(target));
                    }
                }
            }
        }
    }

    /// Sets the link of `id` in `dir` to `target` and the reciprocal link of `target` back to
    /// `id`. Links that pointed at either side before are cleared on the far end as well, so
    /// links always come in pairs. Passing [None] removes the link.
    pub(crate) fn link(&mut self, id: CellId, dir: Direction, target: Option<CellId>) {
        let back = dir.backward();
        if let Some(old) = self.cell(id).and_then(|cell| cell.neighbour(dir)) {
            if let Some(old_cell) = self.cell_mut(old) {
                old_cell.neighbours[back.num()] = None;
            }
        }
        if let Some(target) = target {
            if let Some(old) = self.cell(target).and_then(|cell| cell.neighbour(back)) {
                if let Some(old_cell) = self.cell_mut(old) {
                    old_cell.neighbours[dir.num()] = None;
                }
            }
            if let Some(target_cell) = self.cell_mut(target) {
                target_cell.neighbours[back.num()] = Some(id);
            }
        }
        if let Some(cell) = self.cell_mut(id) {
            cell.neighbours[dir.num()] = target;
        }
    }

    /// Sweeps the rows from top to bottom and attaches every walkable cell to a [Region].
    fn generate_regions<R: AsRef<[bool]>>(&mut self, grid: &[R]) -> Result<(), MeshError> {
        let mut regions = Vec::new();
        let mut prev = Vec::new();
        for (y, values) in grid.iter().enumerate() {
            let row = corridors(y, values.as_ref());
            let cur = RowSweep::new(y, self.width, &prev, row, &mut regions)
                .run()?;
            for corridor in &cur {
                for x in corridor.columns() {
                    if let Some(cell) = self.cell_mut(CellId(y * self.width + x)) {
                        cell.region = corridor.region;
                    }
                }
            }
            prev = cur;
        }
        self.regions = regions;
        Ok(())
    }

    /// Generates a new [UnionFind] structure and joins linked cells into the same component.
    fn generate_components(&mut self) {
        let mut components = UnionFind::new(self.width * self.height);
        for cell in self.cells.iter().flatten() {
            let ix = self.ix(cell.position());
            for (_, neighbour) in cell.neighbours() {
                components.union(ix, neighbour.0);
            }
        }
        self.components = components;
    }

    pub fn width(&self) -> usize {
        self.width
    }
    pub fn height(&self) -> usize {
        self.height
    }
    fn ix(&self, point: Point) -> usize {
        point.y as usize * self.width + point.x as usize
    }
    /// Coordinates addressed by a cell handle.
    pub fn position(&self, id: CellId) -> Point {
        Point::new((id.0 % self.width) as i32, (id.0 / self.width) as i32)
    }
    pub fn in_bounds(&self, point: Point) -> bool {
        point.x >= 0
            && point.y >= 0
            && (point.x as usize) < self.width
            && (point.y as usize) < self.height
    }
    fn cell_id_at(&self, x: usize, y: usize) -> Option<CellId> {
        let id = CellId(y * self.width + x);
        self.cell(id).map(|_| id)
    }
    /// Handle of the walkable cell at `point`, if there is one.
    pub fn cell_id(&self, point: Point) -> Option<CellId> {
        if self.in_bounds(point) {
            self.cell_id_at(point.x as usize, point.y as usize)
        } else {
            None
        }
    }
    pub fn cell(&self, id: CellId) -> Option<&GridCell> {
        self.cells.get(id.0).and_then(Option::as_ref)
    }
    fn cell_mut(&mut self, id: CellId) -> Option<&mut GridCell> {
        self.cells.get_mut(id.0).and_then(Option::as_mut)
    }
    pub fn cell_at(&self, point: Point) -> Option<&GridCell> {
        self.cell_id(point).and_then(|id| self.cell(id))
    }
    pub fn is_walkable(&self, point: Point) -> bool {
        self.cell_id(point).is_some()
    }
    /// All walkable cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = (CellId, &GridCell)> {
        self.cells
            .iter()
            .enumerate()
            .filter_map(|(ix, cell)| cell.as_ref().map(|cell| (CellId(ix), cell)))
    }
    pub fn cell_count(&self) -> usize {
        self.cells.iter().flatten().count()
    }
    /// The cell linked to `id` in direction `dir`.
    pub fn neighbour(&self, id: CellId, dir: Direction) -> Option<CellId> {
        self.cell(id).and_then(|cell| cell.neighbour(dir))
    }

    pub fn region(&self, id: RegionId) -> Option<&Region> {
        self.regions.get(id.0)
    }
    /// Mutable access for callers that populate region cuts themselves.
    pub fn region_mut(&mut self, id: RegionId) -> Option<&mut Region> {
        self.regions.get_mut(id.0)
    }
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }
    pub fn region_count(&self) -> usize {
        self.regions.len()
    }
    /// Region of the walkable cell at `point`.
    pub fn region_of(&self, point: Point) -> Option<RegionId> {
        self.cell_at(point).and_then(GridCell::region)
    }

    /// Retrieves the component id a given [Point] belongs to.
    pub fn component(&self, point: &Point) -> Option<usize> {
        self.cell_id(*point).map(|id| self.components.find(id.0))
    }
    /// Checks if start and goal are walkable and on the same component.
    pub fn reachable(&self, start: &Point, goal: &Point) -> bool {
        match (self.cell_id(*start), self.cell_id(*goal)) {
            (Some(start), Some(goal)) => self.components.equiv(start.0, goal.0),
            _ => false,
        }
    }
    /// Checks if start and goal are not on the same component.
    pub fn unreachable(&self, start: &Point, goal: &Point) -> bool {
        !self.reachable(start, goal)
    }

    fn endpoint(&self, point: Point) -> Result<CellId, MeshError> {
        if !self.in_bounds(point) {
            return Err(MeshError::OutOfBounds {
                x: point.x,
                y: point.y,
            });
        }
        self.cell_id(point).ok_or(MeshError::NotWalkable {
            x: point.x,
            y: point.y,
        })
    }

    /// Prepares a route query between two walkable cells without running it.
    pub fn search(&self, source: Point, target: Point) -> Result<SearchContext<'_>, MeshError> {
        let source = self.endpoint(source)?;
        let target = self.endpoint(target)?;
        Ok(SearchContext::new(self, source, target))
    }

    /// Searches a route between two walkable cells. An unreachable target is not an error: the
    /// result then has no route but still lists the cells visited while searching.
    pub fn find_route(&self, source: Point, target: Point) -> Result<RouteResult, MeshError> {
        let mut context = self.search(source, target)?;
        context.run();
        debug!(
            "Route query {} -> {}: {} steps, {} cells visited, found: {}",
            source,
            target,
            context.steps(),
            context.visited_count(),
            context.found()
        );
        Ok(context.into_result())
    }

    /// Computes the positions of a route from start to goal. Returns [None] without searching
    /// if the goal is not on the component of the start.
    pub fn get_path_single_goal(&self, start: Point, goal: Point) -> Option<Vec<Point>> {
        if self.unreachable(&start, &goal) {
            info!("{} is not reachable from {}", goal, start);
            return None;
        }
        let result = self.find_route(start, goal).ok()?;
        if result.route.is_none() {
            warn!("Reachable goal {} could not be routed to from {}", goal, start);
        }
        result
            .route
            .map(|route| route.iter().map(|step| step.position).collect())
    }
}

/// Base-36 label of a region, cycling for large meshes.
fn region_label(region: RegionId) -> char {
    char::from_digit((region.0 % 36) as u32, 36).unwrap_or('?')
}

impl fmt::Display for Mesh {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Regions:")?;
        for y in 0..self.height {
            let row = (0..self.width)
                .map(|x| match &self.cells[y * self.width + x] {
                    Some(cell) => cell.region().map_or('?', region_label),
                    None => '#',
                })
                .collect::<String>();
            writeln!(f, "{}", row)?;
        }
        Ok(())
    }
}
