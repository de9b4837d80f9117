use core::fmt;
use grid_util::direction::Direction as GridDirection;
use grid_util::point::Point;

use crate::region::RegionId;
use crate::{DIAGONAL_LENGTH, SIDE_LENGTH};

/// Compass directions in clockwise order starting at north. Even indices are cardinal, odd
/// indices diagonal. Rows grow downward, so [Direction::N] points to `y - 1`.
///
/// The numbering is that of [grid_util::Direction], which has `NORTH` at `y + 1`. Geometry is
/// delegated to it with the y axis flipped, and the two convert into each other by number.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    N = 0,
    NE = 1,
    E = 2,
    SE = 3,
    S = 4,
    SW = 5,
    W = 6,
    NW = 7,
}

impl Direction {
    pub const ALL: [Direction; 8] = [
        Direction::N,
        Direction::NE,
        Direction::E,
        Direction::SE,
        Direction::S,
        Direction::SW,
        Direction::W,
        Direction::NW,
    ];

    #[inline]
    pub fn num(self) -> usize {
        self as usize
    }
    /// Wraps around, so any integer maps onto a direction.
    #[inline]
    pub fn from_num(num: usize) -> Direction {
        Direction::ALL[num % 8]
    }
    #[inline]
    pub fn diagonal(self) -> bool {
        self.num() % 2 == 1
    }
    #[inline]
    pub fn backward(self) -> Direction {
        Direction::from_num(GridDirection::from(self).rotate_cw(4).num() as usize)
    }
    /// The direction with the same number, or [None] for [GridDirection::NONE].
    pub fn from_grid(dir: GridDirection) -> Option<Direction> {
        usize::try_from(dir.num())
            .ok()
            .and_then(|num| Direction::ALL.get(num).copied())
    }
    /// Cost of a single step in this direction.
    #[inline]
    pub fn step_cost(self) -> i32 {
        if self.diagonal() {
            DIAGONAL_LENGTH
        } else {
            SIDE_LENGTH
        }
    }
    pub fn offset(self) -> (i32, i32) {
        let delta = mirror(Point::from(GridDirection::from(self)));
        (delta.x, delta.y)
    }
    /// The point one step from `point` in this direction.
    pub fn apply(self, point: Point) -> Point {
        mirror(mirror(point) + GridDirection::from(self))
    }
    /// Direction of a single step from `from` to `to`, if the two are 8-adjacent.
    pub fn between(from: Point, to: Point) -> Option<Direction> {
        if (to.x - from.x).abs() > 1 || (to.y - from.y).abs() > 1 {
            return None;
        }
        Direction::from_grid(mirror(from).dir_obj(&mirror(to)))
    }
}

/// Flips the y axis, mapping between rows growing downward and [grid_util]'s upward y.
#[inline]
fn mirror(point: Point) -> Point {
    Point::new(point.x, -point.y)
}

impl From<Direction> for GridDirection {
    fn from(dir: Direction) -> GridDirection {
        GridDirection::NORTH.rotate_cw(dir.num() as i32)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Handle of a cell inside a [Mesh](crate::mesh::Mesh): its row-major index `y * width + x`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CellId(pub usize);

/// Octile distance between two points using the integer step costs.
///
/// Takes as many diagonal steps as the smaller axis allows and walks the remainder straight.
#[inline]
pub fn octile_distance(p1: Point, p2: Point) -> i32 {
    let delta_x = (p1.x - p2.x).abs();
    let delta_y = (p1.y - p2.y).abs();
    delta_x.min(delta_y) * DIAGONAL_LENGTH + (delta_x - delta_y).abs() * SIDE_LENGTH
}

/// A walkable cell of the mesh with its eight directional links.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GridCell {
    position: Point,
    pub(crate) neighbours: [Option<CellId>; 8],
    pub(crate) region: Option<RegionId>,
}

impl GridCell {
    pub(crate) fn new(position: Point) -> GridCell {
        GridCell {
            position,
            neighbours: [None; 8],
            region: None,
        }
    }
    pub fn position(&self) -> Point {
        self.position
    }
    pub fn x(&self) -> i32 {
        self.position.x
    }
    pub fn y(&self) -> i32 {
        self.position.y
    }
    pub fn neighbour(&self, dir: Direction) -> Option<CellId> {
        self.neighbours[dir.num()]
    }
    /// Linked neighbours together with the direction leading to them.
    pub fn neighbours(&self) -> impl Iterator<Item = (Direction, CellId)> + '_ {
        Direction::ALL
            .into_iter()
            .filter_map(|dir| self.neighbour(dir).map(|n| (dir, n)))
    }
    /// Region containing this cell. Only [None] while the mesh is still being built.
    pub fn region(&self) -> Option<RegionId> {
        self.region
    }
    pub fn heuristic(&self, target: &GridCell) -> i32 {
        octile_distance(self.position, target.position)
    }
}
