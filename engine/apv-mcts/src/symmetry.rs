//! Dihedral board symmetries used to augment evaluator input.
//!
//! A square board has 8 symmetries: 4 rotations, each optionally followed by
//! a mirror. Each leaf evaluation draws one at random; the encoder lays the
//! board out in transformed coordinates, and the returned policy is mapped
//! back with [`Symmetry::invert_policy`] before expansion.

use rand::Rng;

/// One element of the dihedral group of the square.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Symmetry {
    /// Mirror columns after rotating.
    pub flip: bool,
    /// Number of 90° counter-clockwise rotations (0-3).
    pub rotations: u8,
}

impl Symmetry {
    pub const IDENTITY: Symmetry = Symmetry {
        flip: false,
        rotations: 0,
    };

    /// All 8 group elements, identity first.
    pub const ALL: [Symmetry; 8] = [
        Symmetry { flip: false, rotations: 0 },
        Symmetry { flip: false, rotations: 1 },
        Symmetry { flip: false, rotations: 2 },
        Symmetry { flip: false, rotations: 3 },
        Symmetry { flip: true, rotations: 0 },
        Symmetry { flip: true, rotations: 1 },
        Symmetry { flip: true, rotations: 2 },
        Symmetry { flip: true, rotations: 3 },
    ];

    /// Draw a symmetry uniformly at random.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            flip: rng.gen_bool(0.5),
            rotations: rng.gen_range(0..4),
        }
    }

    /// Where intersection `index` of a `side`x`side` board lands after the transform.
    #[inline]
    pub fn transform_index(self, index: usize, side: usize) -> usize {
        let (mut row, mut col) = (index / side, index % side);
        for _ in 0..(self.rotations % 4) {
            // rot90: (r, c) -> (side-1-c, r)
            let rotated = (side - 1 - col, row);
            row = rotated.0;
            col = rotated.1;
        }
        if self.flip {
            col = side - 1 - col;
        }
        row * side + col
    }

    /// Lay a `side`x`side` plane out in transformed coordinates.
    ///
    /// A plane of any other length is returned unchanged.
    pub fn apply_plane(self, plane: &[f32], side: usize) -> Vec<f32> {
        if plane.len() != side * side {
            return plane.to_vec();
        }
        let mut out = vec![0.0; plane.len()];
        for (index, &value) in plane.iter().enumerate() {
            out[self.transform_index(index, side)] = value;
        }
        out
    }

    /// Map a policy produced in transformed coordinates back to the true board.
    ///
    /// The last entry is pass and is never moved. Boards that are not square
    /// only admit the identity, so the policy is returned as-is.
    pub fn invert_policy(self, policy: &[f32]) -> Vec<f32> {
        let cells = policy.len().saturating_sub(1);
        let side = square_side(cells);
        match side {
            Some(side) if self != Self::IDENTITY => {
                let mut out = Vec::with_capacity(policy.len());
                for index in 0..cells {
                    out.push(policy[self.transform_index(index, side)]);
                }
                out.push(policy[cells]);
                out
            }
            _ => policy.to_vec(),
        }
    }
}

impl Default for Symmetry {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Side length of a square board with `cells` intersections.
pub fn square_side(cells: usize) -> Option<usize> {
    let side = (cells as f64).sqrt().round() as usize;
    (side * side == cells && side > 0).then_some(side)
}
