//! FrozenLake grid world: deterministic moves, hole / goal rewards.

use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::{PprlError, Result};

pub const GOAL_REWARD: f64 = 1000.0;
pub const HOLE_REWARD: f64 = -1.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Position {
    pub x: usize,
    pub y: usize,
}

impl Position {
    pub fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Moves in index order: 0 ↑, 1 ↓, 2 ←, 3 →.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    Up,
    Down,
    Left,
    Right,
}

impl Action {
    pub const ALL: [Action; 4] = [Action::Up, Action::Down, Action::Left, Action::Right];
    pub const COUNT: usize = 4;

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn arrow(self) -> char {
        match self {
            Action::Up => '↑',
            Action::Down => '↓',
            Action::Left => '←',
            Action::Right => '→',
        }
    }

    fn delta(self) -> (isize, isize) {
        match self {
            Action::Up => (0, -1),
            Action::Down => (0, 1),
            Action::Left => (-1, 0),
            Action::Right => (1, 0),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cell {
    Ground,
    Hole,
}

/// Supported lake presets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
pub enum GridSize {
    #[value(name = "3x3")]
    #[serde(rename = "3x3")]
    Three,
    #[value(name = "4x4")]
    #[serde(rename = "4x4")]
    Four,
    #[value(name = "5x5")]
    #[serde(rename = "5x5")]
    Five,
    #[value(name = "6x6")]
    #[serde(rename = "6x6")]
    Six,
}

impl GridSize {
    pub fn lake(self) -> FrozenLake {
        let rows: &[&str] = match self {
            GridSize::Three => &["oxx", "ooo", "xxo"],
            GridSize::Four => &["ooxx", "oxox", "oooo", "oxxo"],
            GridSize::Five => &["ooxxx", "xooox", "xxxox", "ooooo", "oxxxo"],
            GridSize::Six => &["oooxxx", "xxooxx", "xoxoox", "ooxxoo", "oxooxo", "oooxxo"],
        };
        FrozenLake::from_rows(rows).expect("built-in lake maps are well formed")
    }
}

impl fmt::Display for GridSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = match self {
            GridSize::Three => 3,
            GridSize::Four => 4,
            GridSize::Five => 5,
            GridSize::Six => 6,
        };
        write!(f, "{n}x{n}")
    }
}

/// Lake layout. Start is the top-left cell, goal the bottom-right one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrozenLake {
    cells: Vec<Vec<Cell>>,
    width: usize,
    height: usize,
}

impl FrozenLake {
    /// Parse rows of `o` (ground) and `x` (hole).
    pub fn from_rows(rows: &[&str]) -> Result<Self> {
        let height = rows.len();
        let width = rows.first().map_or(0, |r| r.chars().count());
        if width == 0 || height == 0 {
            return Err(PprlError::Config("lake map is empty".into()));
        }
        let cells = rows
            .iter()
            .map(|row| {
                let parsed = row
                    .chars()
                    .map(|c| match c {
                        'o' => Ok(Cell::Ground),
                        'x' => Ok(Cell::Hole),
                        other => Err(PprlError::Config(format!("unknown lake cell {other:?}"))),
                    })
                    .collect::<Result<Vec<_>>>()?;
                if parsed.len() != width {
                    return Err(PprlError::DimensionMismatch {
                        expected: width,
                        found: parsed.len(),
                    });
                }
                Ok(parsed)
            })
            .collect::<Result<Vec<_>>>()?;
        let lake = Self { cells, width, height };
        if lake.cell(lake.start()) == Cell::Hole || lake.cell(lake.goal()) == Cell::Hole {
            return Err(PprlError::Config("start and goal must be ground".into()));
        }
        Ok(lake)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn start(&self) -> Position {
        Position::new(0, 0)
    }

    pub fn goal(&self) -> Position {
        Position::new(self.width - 1, self.height - 1)
    }

    pub fn cell(&self, pos: Position) -> Cell {
        self.cells[pos.y][pos.x]
    }
}

/// Result of one environment step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepOutcome {
    pub next: Position,
    pub reward: f64,
    pub done: bool,
}

/// One agent's private copy of the lake plus its current position.
#[derive(Clone, Debug)]
pub struct Environment {
    lake: FrozenLake,
    agent: Position,
}

impl Environment {
    pub fn new(lake: FrozenLake) -> Self {
        let agent = lake.start();
        Self { lake, agent }
    }

    pub fn lake(&self) -> &FrozenLake {
        &self.lake
    }

    pub fn height(&self) -> usize {
        self.lake.height
    }

    pub fn width(&self) -> usize {
        self.lake.width
    }

    pub fn num_states(&self) -> usize {
        self.width() * self.height()
    }

    pub fn position(&self) -> Position {
        self.agent
    }

    pub fn reset(&mut self) -> Position {
        self.agent = self.lake.start();
        self.agent
    }

    /// Row-major index: y · width + x.
    pub fn state_index(&self, pos: Position) -> usize {
        pos.y * self.width() + pos.x
    }

    pub fn position_of(&self, index: usize) -> Position {
        Position::new(index % self.width(), index / self.width())
    }

    /// Target of `action` from `state`; off-grid moves stay in place.
    pub fn next_state(&self, state: Position, action: Action) -> Position {
        let (dx, dy) = action.delta();
        match (state.x.checked_add_signed(dx), state.y.checked_add_signed(dy)) {
            (Some(x), Some(y)) if x < self.width() && y < self.height() => Position::new(x, y),
            _ => state,
        }
    }

    pub fn reward(&self, pos: Position) -> f64 {
        if pos == self.lake.goal() {
            GOAL_REWARD
        } else {
            match self.lake.cell(pos) {
                Cell::Ground => 0.0,
                Cell::Hole => HOLE_REWARD,
            }
        }
    }

    pub fn is_goal(&self, pos: Position) -> bool {
        pos == self.lake.goal()
    }

    pub fn step(&mut self, action: Action) -> StepOutcome {
        let next = self.next_state(self.agent, action);
        let reward = self.reward(next);
        let done = self.lake.cell(next) == Cell::Hole || self.is_goal(next);
        self.agent = next;
        StepOutcome { next, reward, done }
    }
}
