use crate::cell::CellId;

/// Identity of a [Region]. Regions are numbered in creation order, starting at zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RegionId(pub usize);

/// Orientation of the boundary line a [Cut] lies on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Orientation {
    /// The cut lies between two rows.
    Horizontal,
    /// The cut lies between two columns.
    Vertical,
}

/// Which side of a [Region] a [Cut] borders.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    Top,
    Bottom,
    Left,
    Right,
}

impl Side {
    pub const ALL: [Side; 4] = [Side::Top, Side::Bottom, Side::Left, Side::Right];

    /// Orientation of the cuts on this side.
    pub fn orientation(self) -> Orientation {
        match self {
            Side::Top | Side::Bottom => Orientation::Horizontal,
            Side::Left | Side::Right => Orientation::Vertical,
        }
    }
}

/// A boundary segment shared by two adjacent regions.
///
/// `before` is the row (horizontal) or column (vertical) immediately before the cut, and
/// `first..=last` the covered range along the other axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Cut {
    orientation: Orientation,
    before: usize,
    first: usize,
    last: usize,
}

impl Cut {
    /// Returns [None] if `first > last`.
    pub fn new(orientation: Orientation, before: usize, first: usize, last: usize) -> Option<Cut> {
        (first <= last).then_some(Cut {
            orientation,
            before,
            first,
            last,
        })
    }
    pub fn orientation(&self) -> Orientation {
        self.orientation
    }
    pub fn before(&self) -> usize {
        self.before
    }
    pub fn first(&self) -> usize {
        self.first
    }
    pub fn last(&self) -> usize {
        self.last
    }
    pub fn len(&self) -> usize {
        self.last - self.first + 1
    }
    pub fn contains(&self, index: usize) -> bool {
        self.first <= index && index <= self.last
    }
}

/// A set of connected cells produced by the row sweep of [Mesh](crate::mesh::Mesh).
///
/// The four cut lists are left empty by the mesh build; they are filled by callers that need
/// region boundaries for macro-level planning, see [Region::push_cut].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Region {
    id: RegionId,
    top: Vec<Cut>,
    bottom: Vec<Cut>,
    left: Vec<Cut>,
    right: Vec<Cut>,
    reference: Option<CellId>,
}

impl Region {
    pub(crate) fn new(id: RegionId, reference: Option<CellId>) -> Region {
        Region {
            id,
            top: Vec::new(),
            bottom: Vec::new(),
            left: Vec::new(),
            right: Vec::new(),
            reference,
        }
    }
    pub fn id(&self) -> RegionId {
        self.id
    }
    /// The first cell attached to the region during the sweep.
    pub fn reference(&self) -> Option<CellId> {
        self.reference
    }
    pub fn cuts(&self, side: Side) -> &[Cut] {
        match side {
            Side::Top => &self.top,
            Side::Bottom => &self.bottom,
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }
    /// Appends `cut` to the list of `side`. Returns [false] and leaves the region untouched if
    /// the orientation of the cut does not fit the side.
    pub fn push_cut(&mut self, side: Side, cut: Cut) -> bool {
        if cut.orientation() != side.orientation() {
            return false;
        }
        match side {
            Side::Top => self.top.push(cut),
            Side::Bottom => self.bottom.push(cut),
            Side::Left => self.left.push(cut),
            Side::Right => self.right.push(cut),
        }
        true
    }
    pub fn cut_count(&self) -> usize {
        Side::ALL.iter().map(|side| self.cuts(*side).len()).sum()
    }
}
