//! The row sweep that partitions walkable cells into regions.
//!
//! Every row is split into corridors, maximal runs of walkable columns. The corridors of a row
//! are then merged against those of the row above with a streaming automaton that advances one
//! cursor per row. A corridor keeps the region of the corridor above it only when the two
//! overlap exclusively; splits (forks), merges (joins) and unconnected corridors all start new
//! regions.
use itertools::Itertools;
use log::trace;
use smallvec::{smallvec, SmallVec};

use crate::cell::CellId;
use crate::mesh::MeshError;
use crate::region::{Region, RegionId};
use crate::N_SMALLVEC_SIZE;

/// A maximal run `first..=last` of walkable columns within one row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Corridor {
    pub row: usize,
    pub first: usize,
    pub last: usize,
    pub region: Option<RegionId>,
}

impl Corridor {
    pub fn new(row: usize, first: usize, last: usize) -> Corridor {
        Corridor {
            row,
            first,
            last,
            region: None,
        }
    }
    /// Two closed intervals intersect iff neither lies strictly before the other.
    #[inline]
    pub fn intersects(&self, other: &Corridor) -> bool {
        !(self.last < other.first || other.last < self.first)
    }
    pub fn columns(&self) -> std::ops::RangeInclusive<usize> {
        self.first..=self.last
    }
}

/// Extracts the corridors of a row from left to right.
pub fn corridors(row: usize, walkable: &[bool]) -> Vec<Corridor> {
    walkable
        .iter()
        .enumerate()
        .filter(|&(_, &w)| w)
        .map(|(x, _)| Corridor::new(row, x, x))
        .coalesce(|a, b| {
            if a.last + 1 == b.first {
                Ok(Corridor::new(row, a.first, b.last))
            } else {
                Err((a, b))
            }
        })
        .collect()
}

type Indices = SmallVec<[usize; N_SMALLVEC_SIZE]>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum SweepState {
    /// The corridors under both cursors are unrelated so far.
    NoConnection,
    /// The corridors under both cursors overlap and neither overlapped anything before.
    InConnection,
    /// The previous-row corridor `origin` overlaps every current-row corridor in `branches`.
    /// The current cursor sits on the last branch.
    InFork { origin: usize, branches: Indices },
    /// The current-row corridor `target` overlaps every previous-row corridor in `branches`.
    /// The previous cursor sits on the last branch.
    InJoin { target: usize, branches: Indices },
}

/// Merges the corridors of one row against the already assigned corridors of the row above.
pub(crate) struct RowSweep<'a> {
    row: usize,
    width: usize,
    prev: &'a [Corridor],
    cur: Vec<Corridor>,
    prev_ix: usize,
    cur_ix: usize,
    state: SweepState,
    regions: &'a mut Vec<Region>,
}

impl<'a> RowSweep<'a> {
    pub(crate) fn new(
        row: usize,
        width: usize,
        prev: &'a [Corridor],
        cur: Vec<Corridor>,
        regions: &'a mut Vec<Region>,
    ) -> RowSweep<'a> {
        RowSweep {
            row,
            width,
            prev,
            cur,
            prev_ix: 0,
            cur_ix: 0,
            state: SweepState::NoConnection,
            regions,
        }
    }

    /// Runs the automaton to completion and returns the current row with every corridor
    /// assigned to a region.
    pub(crate) fn run(mut self) -> Result<Vec<Corridor>, MeshError> {
        while self.step()? {}
        if self.cur.iter().any(|c| c.region.is_none()) {
            return Err(self.inconsistency("corridor left without a region"));
        }
        trace!(
            "Row {}: {} corridors against {} above",
            self.row,
            self.cur.len(),
            self.prev.len()
        );
        Ok(self.cur)
    }

    /// Performs a single transition. Returns [false] once the current row is exhausted.
    pub(crate) fn step(&mut self) -> Result<bool, MeshError> {
        let state = std::mem::replace(&mut self.state, SweepState::NoConnection);
        self.state = match state {
            SweepState::NoConnection => {
                let Some(cur) = self.cur.get(self.cur_ix) else {
                    return Ok(false);
                };
                match self.prev.get(self.prev_ix) {
                    Some(prev) if prev.intersects(cur) => SweepState::InConnection,
                    Some(prev) if prev.last < cur.first => {
                        self.prev_ix += 1;
                        SweepState::NoConnection
                    }
                    // The current corridor lies before every remaining corridor above it.
                    _ => {
                        self.attach_fresh(self.cur_ix)?;
                        self.cur_ix += 1;
                        SweepState::NoConnection
                    }
                }
            }
            SweepState::InConnection => {
                let (p, c) = (self.prev_ix, self.cur_ix);
                if !self.overlaps(p, c) {
                    return Err(self.inconsistency("connection without overlap"));
                }
                if self.overlaps(p, c + 1) {
                    self.cur_ix = c + 1;
                    SweepState::InFork {
                        origin: p,
                        branches: smallvec![c, c + 1],
                    }
                } else if self.overlaps(p + 1, c) {
                    self.prev_ix = p + 1;
                    SweepState::InJoin {
                        target: c,
                        branches: smallvec![p, p + 1],
                    }
                } else {
                    let region = self.prev[p]
                        .region
                        .ok_or_else(|| self.inconsistency("corridor above has no region"))?;
                    self.cur[c].region = Some(region);
                    self.prev_ix = p + 1;
                    self.cur_ix = c + 1;
                    SweepState::NoConnection
                }
            }
            SweepState::InFork {
                origin,
                mut branches,
            } => {
                let c = self.cur_ix;
                if self.overlaps(origin, c + 1) {
                    branches.push(c + 1);
                    self.cur_ix = c + 1;
                    SweepState::InFork { origin, branches }
                } else if self.overlaps(origin + 1, c) {
                    // The last branch also joins the next corridor above; the join decides it.
                    for &branch in &branches[..branches.len() - 1] {
                        self.attach_fresh(branch)?;
                    }
                    self.prev_ix = origin + 1;
                    SweepState::InJoin {
                        target: c,
                        branches: smallvec![origin, origin + 1],
                    }
                } else {
                    for &branch in &branches {
                        self.attach_fresh(branch)?;
                    }
                    self.prev_ix = origin + 1;
                    self.cur_ix = c + 1;
                    SweepState::NoConnection
                }
            }
            SweepState::InJoin {
                target,
                mut branches,
            } => {
                let p = self.prev_ix;
                if self.overlaps(p + 1, target) {
                    branches.push(p + 1);
                    self.prev_ix = p + 1;
                    SweepState::InJoin { target, branches }
                } else if self.overlaps(p, target + 1) {
                    self.attach_fresh(target)?;
                    self.cur_ix = target + 1;
                    SweepState::InFork {
                        origin: p,
                        branches: smallvec![target + 1],
                    }
                } else {
                    self.attach_fresh(target)?;
                    self.prev_ix = p + 1;
                    self.cur_ix = target + 1;
                    SweepState::NoConnection
                }
            }
        };
        Ok(true)
    }

    fn overlaps(&self, prev_ix: usize, cur_ix: usize) -> bool {
        match (self.prev.get(prev_ix), self.cur.get(cur_ix)) {
            (Some(prev), Some(cur)) => prev.intersects(cur),
            _ => false,
        }
    }

    fn attach_fresh(&mut self, ix: usize) -> Result<RegionId, MeshError> {
        if self.cur[ix].region.is_some() {
            return Err(self.inconsistency("corridor assigned twice"));
        }
        let id = RegionId(self.regions.len());
        let corridor = &mut self.cur[ix];
        let reference = CellId(corridor.row * self.width + corridor.first);
        self.regions.push(Region::new(id, Some(reference)));
        corridor.region = Some(id);
        Ok(id)
    }

    fn inconsistency(&self, reason: &'static str) -> MeshError {
        MeshError::SweepInconsistency {
            row: self.row,
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::prelude::*;

    const WIDTH: usize = 16;

    fn rows(
        prev: &[(usize, usize)],
        cur: &[(usize, usize)],
    ) -> (Vec<Corridor>, Vec<Corridor>, Vec<Region>) {
        let mut regions = Vec::new();
        let prev = prev
            .iter()
            .map(|&(first, last)| {
                let id = RegionId(regions.len());
                regions.push(Region::new(id, None));
                Corridor {
                    region: Some(id),
                    ..Corridor::new(0, first, last)
                }
            })
            .collect();
        let cur = cur
            .iter()
            .map(|&(first, last)| Corridor::new(1, first, last))
            .collect();
        (prev, cur, regions)
    }

    #[test]
    fn corridors_are_maximal_runs() {
        let row = [true, true, false, true, false, false, true, true, true];
        let found = corridors(3, &row)
            .iter()
            .map(|c| (c.first, c.last))
            .collect::<Vec<_>>();
        assert_eq!(found, vec![(0, 1), (3, 3), (6, 8)]);
        assert!(corridors(0, &[false, false]).is_empty());
    }

    #[test]
    fn intersection_is_inclusive() {
        let a = Corridor::new(0, 2, 4);
        assert!(a.intersects(&Corridor::new(1, 4, 6)));
        assert!(a.intersects(&Corridor::new(1, 0, 2)));
        assert!(a.intersects(&Corridor::new(1, 3, 3)));
        assert!(!a.intersects(&Corridor::new(1, 5, 6)));
        assert!(!a.intersects(&Corridor::new(1, 0, 1)));
    }

    #[test]
    fn no_connection_finds_overlap() {
        let (prev, cur, mut regions) = rows(&[(0, 2)], &[(1, 3)]);
        let mut sweep = RowSweep::new(1, WIDTH, &prev, cur, &mut regions);
        assert!(sweep.step().unwrap());
        assert_eq!(sweep.state, SweepState::InConnection);
        assert_eq!((sweep.prev_ix, sweep.cur_ix), (0, 0));
    }

    #[test]
    fn no_connection_skips_corridor_above() {
        let (prev, cur, mut regions) = rows(&[(0, 1), (5, 6)], &[(4, 6)]);
        let mut sweep = RowSweep::new(1, WIDTH, &prev, cur, &mut regions);
        assert!(sweep.step().unwrap());
        assert_eq!(sweep.state, SweepState::NoConnection);
        assert_eq!((sweep.prev_ix, sweep.cur_ix), (1, 0));
        assert_eq!(sweep.regions.len(), 2);
    }

    #[test]
    fn no_connection_opens_fresh_region() {
        let (prev, cur, mut regions) = rows(&[(5, 6)], &[(0, 2), (5, 5)]);
        let mut sweep = RowSweep::new(1, WIDTH, &prev, cur, &mut regions);
        assert!(sweep.step().unwrap());
        assert_eq!(sweep.state, SweepState::NoConnection);
        assert_eq!((sweep.prev_ix, sweep.cur_ix), (0, 1));
        assert_eq!(sweep.cur[0].region, Some(RegionId(1)));
        assert_eq!(sweep.regions[1].reference(), Some(CellId(WIDTH)));
    }

    #[test]
    fn no_connection_without_row_above() {
        let (prev, cur, mut regions) = rows(&[], &[(0, 0), (2, 3)]);
        let sweep = RowSweep::new(0, WIDTH, &prev, cur, &mut regions);
        let cur = sweep.run().unwrap();
        assert_eq!(cur[0].region, Some(RegionId(0)));
        assert_eq!(cur[1].region, Some(RegionId(1)));
    }

    #[test]
    fn no_connection_stops_at_end_of_row() {
        let (prev, cur, mut regions) = rows(&[(0, 3)], &[]);
        let mut sweep = RowSweep::new(1, WIDTH, &prev, cur, &mut regions);
        assert!(!sweep.step().unwrap());
    }

    #[test]
    fn connection_becomes_fork() {
        let (prev, cur, mut regions) = rows(&[(0, 6)], &[(0, 1), (3, 4)]);
        let mut sweep = RowSweep::new(1, WIDTH, &prev, cur, &mut regions);
        sweep.state = SweepState::InConnection;
        assert!(sweep.step().unwrap());
        assert_eq!(
            sweep.state,
            SweepState::InFork {
                origin: 0,
                branches: smallvec![0, 1]
            }
        );
        assert_eq!((sweep.prev_ix, sweep.cur_ix), (0, 1));
    }

    #[test]
    fn connection_becomes_join() {
        let (prev, cur, mut regions) = rows(&[(0, 1), (3, 4)], &[(0, 6)]);
        let mut sweep = RowSweep::new(1, WIDTH, &prev, cur, &mut regions);
        sweep.state = SweepState::InConnection;
        assert!(sweep.step().unwrap());
        assert_eq!(
            sweep.state,
            SweepState::InJoin {
                target: 0,
                branches: smallvec![0, 1]
            }
        );
        assert_eq!((sweep.prev_ix, sweep.cur_ix), (1, 0));
    }

    #[test]
    fn connection_propagates_region() {
        let (prev, cur, mut regions) = rows(&[(0, 2), (6, 7)], &[(1, 3), (8, 9)]);
        let mut sweep = RowSweep::new(1, WIDTH, &prev, cur, &mut regions);
        sweep.state = SweepState::InConnection;
        assert!(sweep.step().unwrap());
        assert_eq!(sweep.state, SweepState::NoConnection);
        assert_eq!((sweep.prev_ix, sweep.cur_ix), (1, 1));
        assert_eq!(sweep.cur[0].region, Some(RegionId(0)));
        assert_eq!(sweep.regions.len(), 2);
    }

    #[test]
    fn connection_without_overlap_is_inconsistent() {
        let (prev, cur, mut regions) = rows(&[(0, 1)], &[(5, 6)]);
        let mut sweep = RowSweep::new(1, WIDTH, &prev, cur, &mut regions);
        sweep.state = SweepState::InConnection;
        assert!(matches!(
            sweep.step(),
            Err(MeshError::SweepInconsistency { row: 1, .. })
        ));
    }

    #[test]
    fn fork_extends() {
        let (prev, cur, mut regions) = rows(&[(0, 9)], &[(0, 1), (3, 4), (6, 7)]);
        let mut sweep = RowSweep::new(1, WIDTH, &prev, cur, &mut regions);
        sweep.state = SweepState::InFork {
            origin: 0,
            branches: smallvec![0, 1],
        };
        sweep.cur_ix = 1;
        assert!(sweep.step().unwrap());
        assert_eq!(
            sweep.state,
            SweepState::InFork {
                origin: 0,
                branches: smallvec![0, 1, 2]
            }
        );
        assert_eq!(sweep.cur_ix, 2);
    }

    #[test]
    fn fork_turns_into_join() {
        //  row 0: #####.####
        //  row 1: ##.#####..
        let (prev, cur, mut regions) = rows(&[(0, 4), (6, 9)], &[(0, 1), (3, 7)]);
        let mut sweep = RowSweep::new(1, WIDTH, &prev, cur, &mut regions);
        sweep.state = SweepState::InFork {
            origin: 0,
            branches: smallvec![0, 1],
        };
        sweep.cur_ix = 1;
        assert!(sweep.step().unwrap());
        assert_eq!(
            sweep.state,
            SweepState::InJoin {
                target: 1,
                branches: smallvec![0, 1]
            }
        );
        assert_eq!((sweep.prev_ix, sweep.cur_ix), (1, 1));
        assert_eq!(sweep.cur[0].region, Some(RegionId(2)));
        assert_eq!(sweep.cur[1].region, None);
    }

    #[test]
    fn fork_ends() {
        let (prev, cur, mut regions) = rows(&[(0, 4), (8, 9)], &[(0, 1), (3, 4), (6, 6)]);
        let mut sweep = RowSweep::new(1, WIDTH, &prev, cur, &mut regions);
        sweep.state = SweepState::InFork {
            origin: 0,
            branches: smallvec![0, 1],
        };
        sweep.cur_ix = 1;
        assert!(sweep.step().unwrap());
        assert_eq!(sweep.state, SweepState::NoConnection);
        assert_eq!((sweep.prev_ix, sweep.cur_ix), (1, 2));
        assert_eq!(sweep.cur[0].region, Some(RegionId(2)));
        assert_eq!(sweep.cur[1].region, Some(RegionId(3)));
        assert_eq!(sweep.cur[2].region, None);
    }

    #[test]
    fn join_extends() {
        let (prev, cur, mut regions) = rows(&[(0, 1), (3, 4), (6, 7)], &[(0, 9)]);
        let mut sweep = RowSweep::new(1, WIDTH, &prev, cur, &mut regions);
        sweep.state = SweepState::InJoin {
            target: 0,
            branches: smallvec![0, 1],
        };
        sweep.prev_ix = 1;
        assert!(sweep.step().unwrap());
        assert_eq!(
            sweep.state,
            SweepState::InJoin {
                target: 0,
                branches: smallvec![0, 1, 2]
            }
        );
        assert_eq!(sweep.prev_ix, 2);
    }

    #[test]
    fn join_turns_into_fork() {
        let (prev, cur, mut regions) = rows(&[(0, 1), (3, 6)], &[(0, 4), (6, 7)]);
        let mut sweep = RowSweep::new(1, WIDTH, &prev, cur, &mut regions);
        sweep.state = SweepState::InJoin {
            target: 0,
            branches: smallvec![0, 1],
        };
        sweep.prev_ix = 1;
        assert!(sweep.step().unwrap());
        assert_eq!(
            sweep.state,
            SweepState::InFork {
                origin: 1,
                branches: smallvec![1]
            }
        );
        assert_eq!((sweep.prev_ix, sweep.cur_ix), (1, 1));
        assert_eq!(sweep.cur[0].region, Some(RegionId(2)));
    }

    #[test]
    fn join_ends() {
        let (prev, cur, mut regions) = rows(&[(0, 1), (3, 4), (8, 9)], &[(0, 4), (6, 6)]);
        let mut sweep = RowSweep::new(1, WIDTH, &prev, cur, &mut regions);
        sweep.state = SweepState::InJoin {
            target: 0,
            branches: smallvec![0, 1],
        };
        sweep.prev_ix = 1;
        assert!(sweep.step().unwrap());
        assert_eq!(sweep.state, SweepState::NoConnection);
        assert_eq!((sweep.prev_ix, sweep.cur_ix), (2, 1));
        assert_eq!(sweep.cur[0].region, Some(RegionId(3)));
    }

    /// A join never reuses the regions of the corridors it merges.
    #[test]
    fn join_gets_fresh_region() {
        let (prev, cur, mut regions) = rows(&[(0, 1), (3, 4)], &[(0, 4)]);
        let cur = RowSweep::new(1, WIDTH, &prev, cur, &mut regions)
            .run()
            .unwrap();
        assert_eq!(cur[0].region, Some(RegionId(2)));
    }

    fn random_row(rng: &mut StdRng) -> Vec<bool> {
        (0..WIDTH).map(|_| rng.gen_bool(0.6)).collect()
    }

    /// Compares full row sweeps against the direct rule: a corridor inherits a region iff it
    /// and the corridor above overlap each other and nothing else.
    #[test]
    fn sweep_matches_exclusive_overlap_rule() {
        let mut rng = StdRng::seed_from_u64(0);
        for _ in 0..5000 {
            let mut regions = Vec::new();
            let prev_row = corridors(0, &random_row(&mut rng));
            let prev = RowSweep::new(0, WIDTH, &[], prev_row, &mut regions)
                .run()
                .unwrap();
            let n_prev_regions = regions.len();
            let cur_row = corridors(1, &random_row(&mut rng));
            let cur = RowSweep::new(1, WIDTH, &prev, cur_row, &mut regions)
                .run()
                .unwrap();
            for (c_ix, c) in cur.iter().enumerate() {
                let above = prev
                    .iter()
                    .filter(|p| p.intersects(c))
                    .collect::<Vec<_>>();
                let exclusive = above.len() == 1
                    && cur.iter().filter(|other| other.intersects(above[0])).count() == 1;
                let region = c.region.unwrap();
                if exclusive {
                    assert_eq!(region, above[0].region.unwrap());
                } else {
                    assert!(region.0 >= n_prev_regions);
                    assert!(cur
                        .iter()
                        .enumerate()
                        .all(|(o_ix, o)| o_ix == c_ix || o.region != c.region));
                }
            }
        }
    }
}
