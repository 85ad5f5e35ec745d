//! Feature planes for the evaluator.

use apv_mcts::{Encoder, Symmetry};

use crate::position::{Color, GoPosition};

/// Planes per encoded position.
pub const PLANES: usize = 4;

/// Encodes a position as `PLANES` planes of `size * size` floats:
///
/// 0. stones of the side to move
/// 1. opponent stones
/// 2. empty points that are not the ko point
/// 3. constant 1.0 if Black is to move
///
/// Every plane is laid out in the coordinates of the requested symmetry.
#[derive(Debug, Clone, Copy, Default)]
pub struct GoEncoder;

impl GoEncoder {
    pub fn feature_len(size: usize) -> usize {
        PLANES * size * size
    }
}

impl Encoder<GoPosition> for GoEncoder {
    fn encode(&self, position: &GoPosition, symmetry: Symmetry) -> Vec<f32> {
        let size = position.size();
        let cells = size * size;
        let mover = position.to_move();
        let mut planes = vec![vec![0.0f32; cells]; PLANES];

        for index in 0..cells {
            match position.point(index) {
                Some(color) if color == mover => planes[0][index] = 1.0,
                Some(_) => planes[1][index] = 1.0,
                None if position.ko() != Some(index) => planes[2][index] = 1.0,
                None => {}
            }
        }
        if mover == Color::Black {
            planes[3].fill(1.0);
        }

        planes
            .iter()
            .flat_map(|plane| symmetry.apply_plane(plane, size))
            .collect()
    }
}
