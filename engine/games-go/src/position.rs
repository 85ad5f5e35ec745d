//! Go rules: placement, captures, suicide, simple ko and passing.
//!
//! The board is stored in row-major order:
//! ```text
//! Row 0: [ 0][ 1][ 2] ... [n-1]
//! Row 1: [ n][n+1]    ...
//! ```
//! Two consecutive passes end the game; after that every move is illegal.

use std::fmt;

use apv_mcts::{GameState, Move};

/// Stone color, also used for the side to move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Color {
    Black,
    White,
}

impl Color {
    pub fn opponent(self) -> Self {
        match self {
            Color::Black => Color::White,
            Color::White => Color::Black,
        }
    }
}

/// Content of one intersection.
pub type Point = Option<Color>;

/// A Go position with the side to move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoPosition {
    size: usize,
    board: Vec<Point>,
    to_move: Color,
    /// Point where an immediate recapture is forbidden
    ko: Option<usize>,
    consecutive_passes: u8,
    /// Stones captured by Black and by White
    captures: [u32; 2],
    move_number: u32,
}

impl GoPosition {
    /// Empty `size`x`size` board, Black to move.
    pub fn new(size: usize) -> Self {
        Self {
            size,
            board: vec![None; size * size],
            to_move: Color::Black,
            ko: None,
            consecutive_passes: 0,
            captures: [0; 2],
            move_number: 0,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn to_move(&self) -> Color {
        self.to_move
    }

    pub fn point(&self, index: usize) -> Point {
        self.board[index]
    }

    pub fn ko(&self) -> Option<usize> {
        self.ko
    }

    pub fn move_number(&self) -> u32 {
        self.move_number
    }

    /// Stones captured by `color` so far.
    pub fn captures(&self, color: Color) -> u32 {
        self.captures[color as usize]
    }

    /// Two consecutive passes have been played.
    pub fn is_over(&self) -> bool {
        self.consecutive_passes >= 2
    }

    /// Row-major index of (row, col).
    #[inline]
    pub fn index(&self, row: usize, col: usize) -> usize {
        row * self.size + col
    }

    fn neighbors(&self, index: usize) -> impl Iterator<Item = usize> {
        let size = self.size;
        let (row, col) = (index / size, index % size);
        [
            (row > 0).then(|| index - size),
            (row + 1 < size).then(|| index + size),
            (col > 0).then(|| index - 1),
            (col + 1 < size).then(|| index + 1),
        ]
        .into_iter()
        .flatten()
    }

    /// Stones connected to `index` and the number of distinct liberties.
    fn group(&self, index: usize) -> (Vec<usize>, usize) {
        let Some(color) = self.board[index] else {
            return (Vec::new(), 0);
        };
        let mut seen = vec![false; self.board.len()];
        let mut liberty = vec![false; self.board.len()];
        let mut stones = Vec::new();
        let mut stack = vec![index];
        seen[index] = true;

        while let Some(point) = stack.pop() {
            stones.push(point);
            for n in self.neighbors(point) {
                match self.board[n] {
                    None => liberty[n] = true,
                    Some(c) if c == color && !seen[n] => {
                        seen[n] = true;
                        stack.push(n);
                    }
                    _ => {}
                }
            }
        }

        (stones, liberty.iter().filter(|&&l| l).count())
    }

    /// Whether `mv` can be played here.
    pub fn is_legal(&self, mv: Move) -> bool {
        self.play(mv).is_some()
    }

    /// All legal moves, pass included while the game is running.
    pub fn legal_moves(&self) -> Vec<Move> {
        (0..=self.board.len())
            .map(|i| Move::from_index(i, self.board.len()))
            .filter(|&mv| self.is_legal(mv))
            .collect()
    }

    /// Area score (stones plus surrounded empty regions), Black minus White,
    /// minus `komi`.
    pub fn score(&self, komi: f32) -> f32 {
        let mut black = 0i32;
        let mut white = 0i32;
        let mut visited = vec![false; self.board.len()];

        for start in 0..self.board.len() {
            match self.board[start] {
                Some(Color::Black) => black += 1,
                Some(Color::White) => white += 1,
                None if !visited[start] => {
                    // Flood the empty region and note which colors border it
                    let mut region = 0i32;
                    let mut borders = (false, false);
                    let mut stack = vec![start];
                    visited[start] = true;
                    while let Some(point) = stack.pop() {
                        region += 1;
                        for n in self.neighbors(point) {
                            match self.board[n] {
                                None if !visited[n] => {
                                    visited[n] = true;
                                    stack.push(n);
                                }
                                Some(Color::Black) => borders.0 = true,
                                Some(Color::White) => borders.1 = true,
                                None => {}
                            }
                        }
                    }
                    match borders {
                        (true, false) => black += region,
                        (false, true) => white += region,
                        _ => {}
                    }
                }
                None => {}
            }
        }

        (black - white) as f32 - komi
    }

    /// Winner by area score, `None` for a tie.
    pub fn winner(&self, komi: f32) -> Option<Color> {
        let score = self.score(komi);
        if score > 0.0 {
            Some(Color::Black)
        } else if score < 0.0 {
            Some(Color::White)
        } else {
            None
        }
    }

    fn place(&self, index: usize) -> Option<Self> {
        if index >= self.board.len() || self.board[index].is_some() || self.ko == Some(index) {
            return None;
        }

        let mover = self.to_move;
        let mut next = self.clone();
        next.board[index] = Some(mover);

        let mut captured = Vec::new();
        for n in self.neighbors(index) {
            if next.board[n] == Some(mover.opponent()) {
                let (stones, liberties) = next.group(n);
                if liberties == 0 {
                    for &s in &stones {
                        next.board[s] = None;
                    }
                    captured.extend(stones);
                }
            }
        }

        let (own_group, own_liberties) = next.group(index);
        if own_liberties == 0 {
            // Suicide
            return None;
        }

        // A lone stone that captured a lone stone and sits in atari is a ko
        next.ko = match (captured.as_slice(), own_group.len(), own_liberties) {
            ([single], 1, 1) => Some(*single),
            _ => None,
        };
        next.captures[mover as usize] += captured.len() as u32;
        next.consecutive_passes = 0;
        next.to_move = mover.opponent();
        next.move_number += 1;
        Some(next)
    }
}

impl GameState for GoPosition {
    fn board_cells(&self) -> usize {
        self.board.len()
    }

    fn play(&self, mv: Move) -> Option<Self> {
        if self.is_over() {
            return None;
        }
        match mv {
            Move::Place(point) => self.place(point as usize),
            Move::Pass => {
                let mut next = self.clone();
                next.ko = None;
                next.consecutive_passes += 1;
                next.to_move = self.to_move.opponent();
                next.move_number += 1;
                Some(next)
            }
        }
    }
}

impl fmt::Display for GoPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in 0..self.size {
            for col in 0..self.size {
                let c = match self.board[self.index(row, col)] {
                    Some(Color::Black) => 'X',
                    Some(Color::White) => 'O',
                    None => '.',
                };
                write!(f, "{}", c)?;
                if col + 1 < self.size {
                    write!(f, " ")?;
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Play a sequence of (row, col) placements, `None` for pass.
    fn play_all(size: usize, moves: &[Option<(usize, usize)>]) -> GoPosition {
        moves.iter().fold(GoPosition::new(size), |pos, mv| {
            let mv = match mv {
                Some((r, c)) => Move::Place(pos.index(*r, *c) as u16),
                None => Move::Pass,
            };
            pos.play(mv).unwrap()
        })
    }

    #[test]
    fn test_new_position() {
        let pos = GoPosition::new(9);
        assert_eq!(pos.board_cells(), 81);
        assert_eq!(pos.num_actions(), 82);
        assert_eq!(pos.to_move(), Color::Black);
        assert_eq!(pos.legal_moves().len(), 82);
    }

    #[test]
    fn test_occupied_point_is_illegal() {
        let pos = play_all(5, &[Some((2, 2))]);
        assert_eq!(pos.point(12), Some(Color::Black));
        assert_eq!(pos.to_move(), Color::White);
        assert!(pos.play(Move::Place(12)).is_none());
    }

    #[test]
    fn test_corner_capture() {
        // Black takes the corner, White surrounds it
        let pos = play_all(5, &[Some((0, 0)), Some((0, 1)), Some((4, 4)), Some((1, 0))]);
        assert_eq!(pos.point(0), None);
        assert_eq!(pos.captures(Color::White), 1);
    }

    #[test]
    fn test_suicide_is_illegal() {
        // White stones at (0,1) and (1,0); Black to move into the corner
        let pos = play_all(5, &[Some((4, 4)), Some((0, 1)), Some((4, 3)), Some((1, 0))]);
        assert_eq!(pos.to_move(), Color::Black);
        assert!(pos.play(Move::Place(0)).is_none());
    }

    #[test]
    fn test_capture_beats_suicide() {
        let pos = play_all(
            5,
            &[
                Some((0, 1)),
                Some((0, 2)),
                Some((1, 0)),
                Some((1, 1)),
                Some((4, 4)),
                Some((2, 0)),
                Some((4, 3)),
            ],
        );
        // White's corner stone has no liberty until it removes both Black stones
        assert_eq!(pos.to_move(), Color::White);
        let after = pos.play(Move::Place(0)).unwrap();
        assert_eq!(after.point(0), Some(Color::White));
        assert_eq!(after.point(1), None);
        assert_eq!(after.point(5), None);
        assert_eq!(after.captures(Color::White), 2);
    }

    #[test]
    fn test_simple_ko() {
        // Classic ko shape around (1,1)/(1,2)
        let pos = play_all(
            5,
            &[
                Some((0, 1)),
                Some((0, 2)),
                Some((1, 0)),
                Some((1, 3)),
                Some((2, 1)),
                Some((2, 2)),
                Some((1, 2)),
                Some((1, 1)),
            ],
        );
        // White captured the Black stone at (1,2)
        assert_eq!(pos.point(pos.index(1, 2)), None);
        assert_eq!(pos.ko(), Some(pos.index(1, 2)));

        // Immediate recapture is forbidden
        let recapture = Move::Place(pos.index(1, 2) as u16);
        assert!(pos.play(recapture).is_none());

        // After a move elsewhere (and a reply) it is allowed again
        let pos = pos
            .play(Move::Place(pos.index(4, 4) as u16))
            .and_then(|p| p.play(Move::Place(p.index(4, 0) as u16)))
            .unwrap();
        assert!(pos.play(recapture).is_some());
    }

    #[test]
    fn test_two_passes_end_the_game() {
        let pos = play_all(5, &[Some((2, 2)), None]);
        assert!(!pos.is_over());
        let pos = pos.play(Move::Pass).unwrap();
        assert!(pos.is_over());
        assert!(pos.play(Move::Pass).is_none());
        assert!(pos.play(Move::Place(0)).is_none());
        assert!(pos.legal_moves().is_empty());
    }

    #[test]
    fn test_pass_clears_ko_and_streak_resets() {
        let pos = play_all(5, &[None, Some((0, 0))]);
        assert_eq!(pos.to_move(), Color::Black);
        let pos = pos.play(Move::Pass).unwrap();
        assert!(!pos.is_over());
        assert_eq!(pos.ko(), None);
    }

    #[test]
    fn test_area_score() {
        // Black wall on column 1 owns column 0
        let pos = play_all(
            3,
            &[Some((0, 1)), Some((0, 2)), Some((1, 1)), Some((1, 2)), Some((2, 1)), Some((2, 2))],
        );
        // Black: 3 stones + 3 territory, White: 3 stones
        assert!((pos.score(0.0) - 3.0).abs() < 1e-6);
        assert_eq!(pos.winner(0.0), Some(Color::Black));
        assert_eq!(pos.winner(3.0), None);
        assert_eq!(pos.winner(7.5), Some(Color::White));
    }

    #[test]
    fn test_display() {
        let pos = play_all(3, &[Some((0, 0)), Some((2, 2))]);
        assert_eq!(pos.to_string(), "X . .\n. . .\n. . O\n");
    }
}
