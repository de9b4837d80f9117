//! # grid_navmesh
//!
//! A grid-based navigation mesh. A boolean walkability grid is turned into a [Mesh] of linked
//! cells whose walkable cells are partitioned into [Region]s by a single top-to-bottom
//! [row sweep](sweep). Routes between two cells are found with
//! [A*](https://en.wikipedia.org/wiki/A*_search_algorithm) over the 8-connected grid using the
//! [octile distance](cell::octile_distance) as heuristic. Step costs are integral: [SIDE_LENGTH]
//! for cardinal moves and [DIAGONAL_LENGTH] for diagonal moves.
//!
//! ```
//! use grid_navmesh::Mesh;
//! use grid_util::point::Point;
//!
//! let mesh = Mesh::build(&[[true, true, true], [true, false, true], [true, true, true]]).unwrap();
//! let result = mesh.find_route(Point::new(0, 0), Point::new(2, 2)).unwrap();
//! assert!(result.route.is_some());
//! ```
pub mod cell;
pub mod mesh;
pub mod priority_queue;
pub mod region;
pub mod search;
pub mod sweep;

use grid_util::point::Point;
use itertools::Itertools;

pub use cell::{octile_distance, CellId, Direction, GridCell};
pub use mesh::{Mesh, MeshError};
pub use priority_queue::{HeapOrder, PriorityQueue, QueueError};
pub use region::{Cut, Orientation, Region, RegionId, Side};
pub use search::{NodeInfo, RouteResult, RouteStep, SearchContext};

/// Cost of a cardinal step. Together with [DIAGONAL_LENGTH] this approximates 1 : √2.
pub const SIDE_LENGTH: i32 = 2;
/// Cost of a diagonal step.
pub const DIAGONAL_LENGTH: i32 = 3;

pub(crate) const N_SMALLVEC_SIZE: usize = 8;

/// Total step cost of a route.
pub fn route_cost(route: &[RouteStep]) -> i32 {
    route
        .iter()
        .filter_map(|step| step.direction)
        .map(Direction::step_cost)
        .sum()
}

/// Cost of a path given as consecutive positions, charging the octile distance between each
/// pair. For a path of 8-adjacent positions this equals the sum of its step costs.
pub fn path_cost(path: &[Point]) -> i32 {
    path.iter()
        .tuple_windows()
        .map(|(a, b)| octile_distance(*a, *b))
        .sum()
}

/// Converts the integer cost to an approximate floating point equivalent where cardinal
/// directions have cost 1.0.
pub fn convert_cost_to_unit_cost_float(cost: i32) -> f64 {
    (cost as f64) / (SIDE_LENGTH as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_and_path_cost_agree() {
        let mesh = Mesh::build(&[[true; 4], [true; 4], [false, true, true, true]]).unwrap();
        let start = Point::new(0, 0);
        let goal = Point::new(3, 2);
        let route = mesh.find_route(start, goal).unwrap().route.unwrap();
        let path = mesh.get_path_single_goal(start, goal).unwrap();
        assert_eq!(path.len(), route.len());
        assert_eq!(path_cost(&path), route_cost(&route));
        assert_eq!(route_cost(&route), octile_distance(start, goal));
    }

    #[test]
    fn unit_cost_conversion() {
        assert_eq!(convert_cost_to_unit_cost_float(SIDE_LENGTH * 3), 3.0);
        assert_eq!(convert_cost_to_unit_cost_float(DIAGONAL_LENGTH), 1.5);
    }

    #[test]
    fn concurrent_queries_share_a_mesh() {
        let rows = (0..16)
            .map(|y| (0..16).map(|x| (x * 7 + y * 3) % 5 != 0).collect::<Vec<bool>>())
            .collect::<Vec<_>>();
        let mesh = Mesh::build(&rows).unwrap();
        let walkable = mesh.cells().map(|(_, c)| c.position()).collect::<Vec<_>>();
        let expected = walkable
            .iter()
            .map(|p| mesh.find_route(walkable[0], *p).unwrap())
            .collect::<Vec<_>>();
        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    for (p, expected) in walkable.iter().zip(&expected) {
                        assert_eq!(&mesh.find_route(walkable[0], *p).unwrap(), expected);
                    }
                });
            }
        });
    }
}
