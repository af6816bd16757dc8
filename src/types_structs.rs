use std::fmt;

/// Side of a canonical k-mer. Walking to the `Right` reads the k-mer as stored,
/// walking to the `Left` reads its reverse complement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Side {
    Right,
    Left,
}

impl Side {
    pub fn flip(self) -> Side {
        match self {
            Side::Right => Side::Left,
            Side::Left => Side::Right,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Side::Right => 0,
            Side::Left => 1,
        }
    }

    pub fn is_forward(self) -> bool {
        self == Side::Right
    }

    pub fn from_forward(forward: bool) -> Side {
        if forward {
            Side::Right
        } else {
            Side::Left
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PathStep {
    pub node: usize,
    pub side: Side,
    /// Orientation of the edge used to reach this node; true for the first step.
    pub same_orientation: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeBruijnPath {
    pub steps: Vec<PathStep>,
}

impl DeBruijnPath {
    pub fn new(start: usize, side: Side) -> DeBruijnPath {
        DeBruijnPath {
            steps: vec![PathStep {
                node: start,
                side,
                same_orientation: true,
            }],
        }
    }

    pub fn from_sides(walk: Vec<(usize, Side)>) -> DeBruijnPath {
        let mut steps = Vec::with_capacity(walk.len());
        let mut prev_side = None;
        for (node, side) in walk {
            let same_orientation = match prev_side {
                Some(prev) => prev == side,
                None => true,
            };
            steps.push(PathStep {
                node,
                side,
                same_orientation,
            });
            prev_side = Some(side);
        }
        DeBruijnPath { steps }
    }

    pub fn push(&mut self, node: usize, side: Side) {
        let same_orientation = self.steps.last().map_or(true, |last| last.side == side);
        self.steps.push(PathStep {
            node,
            side,
            same_orientation,
        });
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn contains(&self, node: usize) -> bool {
        self.steps.iter().any(|s| s.node == node)
    }

    pub fn nodes(&self) -> impl Iterator<Item = usize> + '_ {
        self.steps.iter().map(|s| s.node)
    }

    /// The same walk read from the other strand.
    pub fn reversed(&self) -> DeBruijnPath {
        DeBruijnPath::from_sides(
            self.steps
                .iter()
                .rev()
                .map(|s| (s.node, s.side.flip()))
                .collect(),
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssembledRead {
    pub read_index: usize,
    /// Start of the read in contig coordinates; negative if the read starts before the contig.
    pub position: i64,
    pub is_complemented: bool,
    pub is_reversed: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Contig {
    pub sequence: Vec<u8>,
    pub coverage: f64,
    pub reads: Vec<AssembledRead>,
}

impl Contig {
    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }
}

impl fmt::Display for Contig {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}_LEN:{}_COV:{:.2}",
            String::from_utf8_lossy(&self.sequence),
            self.sequence.len(),
            self.coverage
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SequenceRecord {
    pub id: String,
    pub seq: Vec<u8>,
}

impl AsRef<[u8]> for SequenceRecord {
    fn as_ref(&self) -> &[u8] {
        &self.seq
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SimplificationStats {
    pub eroded_per_round: Vec<usize>,
    pub dangling_nodes_removed: usize,
    pub redundant_nodes_removed: usize,
    pub low_coverage_nodes_removed: usize,
    pub erosion_threshold: u32,
    pub coverage_threshold: f64,
}

impl SimplificationStats {
    pub fn total_removed(&self) -> usize {
        self.eroded_per_round.iter().sum::<usize>()
            + self.dangling_nodes_removed
            + self.redundant_nodes_removed
            + self.low_coverage_nodes_removed
    }
}
