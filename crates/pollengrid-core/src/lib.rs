//! Core types for the pollengrid workspace: the toroidal landscape, forager
//! agents, per-tick transition rules, and the Monte Carlo batch driver.

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng, rngs::SmallRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use slotmap::{SlotMap, new_key_type};
use std::fmt;
use thiserror::Error;
use tracing::{debug, trace};

/// Width of one spatial distance bin used by the batch summary.
pub const DISTANCE_BIN_WIDTH: f32 = 2.0;

/// Odd stride decorrelating per-run seeds derived from one base seed.
const SEED_STRIDE: u64 = 0x9E37_79B9_7F4A_7C15;

new_key_type! {
    /// Stable handle for foragers backed by a generational slot map.
    pub struct ForagerId;
}

/// Terrain state of a single landscape cell.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum CellState {
    #[default]
    Empty,
    Neutral,
    Obstacle,
    DonorFlower,
    ReceptorFlower,
    Hive,
    PollinatedFlower,
}

impl CellState {
    /// Whether the cell holds any flower, pollinated or not.
    #[must_use]
    pub const fn is_floral(self) -> bool {
        matches!(
            self,
            Self::DonorFlower | Self::ReceptorFlower | Self::PollinatedFlower
        )
    }
}

/// Discrete grid coordinate (row, column).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct GridPos {
    pub row: u32,
    pub col: u32,
}

impl GridPos {
    /// Construct a new grid coordinate.
    #[must_use]
    pub const fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }
}

/// Errors raised when validating configuration or aggregating run outputs.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SimulationError {
    /// Indicates an invalid configuration value; rejected before any run starts.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    /// A run produced a temporal history whose length does not match the batch.
    #[error("run {run} recorded {actual} ticks, expected {expected}")]
    HistoryLengthMismatch {
        run: usize,
        expected: usize,
        actual: usize,
    },
}

/// Rules specific to the sequential update model: agents persist across the
/// whole run, obstacles alone are impassable, deposition is probabilistic,
/// and pollen loads decay after too long without floral contact.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SequentialRules {
    /// Probability band for obstacle cells during landscape generation.
    pub obstacle_prob: f64,
    /// Probability band for donor flowers during landscape generation.
    pub donor_prob: f64,
    /// Probability band for receptor flowers during landscape generation.
    pub receptor_prob: f64,
    /// Ticks without a productive floral visit before the load is discarded.
    pub contact_decay_ticks: u32,
}

impl Default for SequentialRules {
    fn default() -> Self {
        Self {
            obstacle_prob: 0.05,
            donor_prob: 0.10,
            receptor_prob: 0.05,
            contact_decay_ticks: 20,
        }
    }
}

/// Rules specific to the synchronous update model: occupancy is rebuilt from
/// a per-tick snapshot, empty cells are impassable, deposition is a fixed
/// proportion of the carried load, and spawning is probability gated.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SynchronousRules {
    /// Per-cell probability of growing a flower during landscape generation.
    pub floral_density: f64,
    /// Independent per-cell probability of a sparse empty cell.
    pub empty_density: f64,
    /// Per-tick probability of spawning a forager at an unoccupied hive.
    pub spawn_probability: f64,
    /// Fraction of the carried load deposited on a receptor visit.
    pub deposition_rate: f32,
    /// Minimum deposited amount that converts a receptor into a pollinated flower.
    pub pollination_threshold: f32,
}

impl Default for SynchronousRules {
    fn default() -> Self {
        Self {
            floral_density: 0.15,
            empty_density: 0.05,
            spawn_probability: 0.3,
            deposition_rate: 0.6,
            pollination_threshold: 4.0,
        }
    }
}

/// Update discipline selected per run. The two models are mutually exclusive
/// and never blended within a tick.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum UpdateModel {
    /// Agents are processed in creation order and each sees the mutations of
    /// earlier agents within the same tick.
    Sequential(SequentialRules),
    /// Agents are processed in shuffled order against a next-tick occupancy
    /// snapshot that is swapped in only after every agent has moved.
    Synchronous(SynchronousRules),
}

/// Static configuration for a single simulation run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimulationConfig {
    /// Grid rows.
    pub rows: u32,
    /// Grid columns.
    pub cols: u32,
    /// Attraction strength K added to the weight of floral neighbors.
    pub attraction: f32,
    /// Maximum pollen load a forager can carry.
    pub max_pollen_capacity: f32,
    /// Pollen collected from a donor per productive visit.
    pub collection_efficiency: f32,
    /// Full pollen stock of a donor flower.
    pub max_pollen_stock: f32,
    /// Ticks a depleted donor waits before its stock resets to full.
    pub recharge_threshold: u32,
    /// Maximum number of simultaneously active foragers.
    pub max_foragers: usize,
    /// Optional RNG seed for reproducible runs.
    pub rng_seed: Option<u64>,
    /// Update discipline and model-specific rules.
    pub model: UpdateModel,
}

impl SimulationConfig {
    /// Defaults for the sequential model.
    #[must_use]
    pub fn sequential() -> Self {
        Self {
            rows: 50,
            cols: 50,
            attraction: 10.0,
            max_pollen_capacity: 100.0,
            collection_efficiency: 10.0,
            max_pollen_stock: 100.0,
            recharge_threshold: 50,
            max_foragers: 20,
            rng_seed: None,
            model: UpdateModel::Sequential(SequentialRules::default()),
        }
    }

    /// Defaults for the synchronous model.
    #[must_use]
    pub fn synchronous() -> Self {
        Self {
            rows: 60,
            cols: 60,
            attraction: 12.0,
            max_pollen_capacity: 40.0,
            collection_efficiency: 8.0,
            max_pollen_stock: 100.0,
            recharge_threshold: 50,
            max_foragers: 60,
            rng_seed: None,
            model: UpdateModel::Synchronous(SynchronousRules::default()),
        }
    }

    /// Validates every configuration value, rejecting the run before any
    /// state is built.
    pub fn validate(&self) -> Result<(), SimulationError> {
        if self.rows < 3 || self.cols < 3 {
            return Err(SimulationError::InvalidConfig(
                "grid dimensions must be at least 3x3",
            ));
        }
        if self.attraction < 0.0 {
            return Err(SimulationError::InvalidConfig(
                "attraction must be non-negative",
            ));
        }
        if self.max_pollen_capacity <= 0.0 {
            return Err(SimulationError::InvalidConfig(
                "max_pollen_capacity must be positive",
            ));
        }
        if self.collection_efficiency <= 0.0 {
            return Err(SimulationError::InvalidConfig(
                "collection_efficiency must be positive",
            ));
        }
        if self.max_pollen_stock <= 0.0 {
            return Err(SimulationError::InvalidConfig(
                "max_pollen_stock must be positive",
            ));
        }
        if self.recharge_threshold == 0 {
            return Err(SimulationError::InvalidConfig(
                "recharge_threshold must be positive",
            ));
        }
        if self.max_foragers == 0 {
            return Err(SimulationError::InvalidConfig(
                "max_foragers must be positive",
            ));
        }
        match self.model {
            UpdateModel::Sequential(rules) => {
                if !probability(rules.obstacle_prob)
                    || !probability(rules.donor_prob)
                    || !probability(rules.receptor_prob)
                {
                    return Err(SimulationError::InvalidConfig(
                        "category probabilities must lie in [0, 1]",
                    ));
                }
                if rules.obstacle_prob + rules.donor_prob + rules.receptor_prob > 1.0 {
                    return Err(SimulationError::InvalidConfig(
                        "category probabilities must sum to at most 1",
                    ));
                }
                if rules.contact_decay_ticks == 0 {
                    return Err(SimulationError::InvalidConfig(
                        "contact_decay_ticks must be positive",
                    ));
                }
            }
            UpdateModel::Synchronous(rules) => {
                if !probability(rules.floral_density)
                    || !probability(rules.empty_density)
                    || !probability(rules.spawn_probability)
                {
                    return Err(SimulationError::InvalidConfig(
                        "densities and spawn probability must lie in [0, 1]",
                    ));
                }
                if rules.deposition_rate <= 0.0 || rules.deposition_rate > 1.0 {
                    return Err(SimulationError::InvalidConfig(
                        "deposition_rate must lie in (0, 1]",
                    ));
                }
                if rules.pollination_threshold <= 0.0 {
                    return Err(SimulationError::InvalidConfig(
                        "pollination_threshold must be positive",
                    ));
                }
            }
        }
        Ok(())
    }

    /// Returns the configured RNG, seeding from entropy if no seed is set.
    fn seeded_rng(&self) -> SmallRng {
        match self.rng_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => {
                let seed: u64 = rand::random();
                SmallRng::seed_from_u64(seed)
            }
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self::sequential()
    }
}

fn probability(value: f64) -> bool {
    (0.0..=1.0).contains(&value)
}

/// Toroidal grid of cell states with per-cell pollen stock and recharge timers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Landscape {
    rows: u32,
    cols: u32,
    hive: GridPos,
    states: Vec<CellState>,
    pollen_stock: Vec<f32>,
    recharge_timer: Vec<u32>,
}

impl Landscape {
    fn raw(rows: u32, cols: u32, fill: CellState) -> Self {
        let cells = (rows as usize) * (cols as usize);
        let hive = GridPos::new(rows / 2, cols / 2);
        let mut landscape = Self {
            rows,
            cols,
            hive,
            states: vec![fill; cells],
            pollen_stock: vec![0.0; cells],
            recharge_timer: vec![0; cells],
        };
        let hive_idx = landscape.index(hive);
        landscape.states[hive_idx] = CellState::Hive;
        landscape
    }

    /// Construct a landscape of uniform terrain with a hive at the center.
    pub fn uniform(rows: u32, cols: u32, fill: CellState) -> Result<Self, SimulationError> {
        if rows < 3 || cols < 3 {
            return Err(SimulationError::InvalidConfig(
                "grid dimensions must be at least 3x3",
            ));
        }
        Ok(Self::raw(rows, cols, fill))
    }

    /// Sample a fresh landscape according to the configured model.
    fn generate(config: &SimulationConfig, rng: &mut SmallRng) -> Self {
        let fill = match config.model {
            UpdateModel::Sequential(_) => CellState::Empty,
            UpdateModel::Synchronous(_) => CellState::Neutral,
        };
        let mut landscape = Self::raw(config.rows, config.cols, fill);
        for row in 0..config.rows {
            for col in 0..config.cols {
                let pos = GridPos::new(row, col);
                if pos == landscape.hive {
                    continue;
                }
                let idx = landscape.index(pos);
                match config.model {
                    UpdateModel::Sequential(rules) => {
                        let draw = rng.random::<f64>();
                        if draw < rules.obstacle_prob {
                            landscape.states[idx] = CellState::Obstacle;
                        } else if draw < rules.obstacle_prob + rules.donor_prob {
                            landscape.states[idx] = CellState::DonorFlower;
                            landscape.pollen_stock[idx] = config.max_pollen_stock;
                        } else if draw
                            < rules.obstacle_prob + rules.donor_prob + rules.receptor_prob
                        {
                            landscape.states[idx] = CellState::ReceptorFlower;
                        }
                    }
                    UpdateModel::Synchronous(rules) => {
                        if rng.random::<f64>() < rules.floral_density {
                            if rng.random_bool(0.5) {
                                landscape.states[idx] = CellState::DonorFlower;
                                landscape.pollen_stock[idx] = config.max_pollen_stock;
                            } else {
                                landscape.states[idx] = CellState::ReceptorFlower;
                            }
                        } else if rng.random::<f64>() < rules.empty_density {
                            landscape.states[idx] = CellState::Empty;
                        }
                    }
                }
            }
        }
        landscape
    }

    #[inline]
    fn index(&self, pos: GridPos) -> usize {
        (pos.row as usize) * (self.cols as usize) + (pos.col as usize)
    }

    #[must_use]
    pub const fn rows(&self) -> u32 {
        self.rows
    }

    #[must_use]
    pub const fn cols(&self) -> u32 {
        self.cols
    }

    /// Position of the hive cell.
    #[must_use]
    pub const fn hive(&self) -> GridPos {
        self.hive
    }

    fn cell_count(&self) -> usize {
        (self.rows as usize) * (self.cols as usize)
    }

    /// Row-major slice of every cell state.
    #[must_use]
    pub fn states(&self) -> &[CellState] {
        &self.states
    }

    /// Terrain state at `pos`, or `None` out of bounds.
    #[must_use]
    pub fn state_at(&self, pos: GridPos) -> Option<CellState> {
        (pos.row < self.rows && pos.col < self.cols).then(|| self.states[self.index(pos)])
    }

    /// Pollen stock at `pos`, or `None` out of bounds.
    #[must_use]
    pub fn stock_at(&self, pos: GridPos) -> Option<f32> {
        (pos.row < self.rows && pos.col < self.cols).then(|| self.pollen_stock[self.index(pos)])
    }

    /// Recharge timer at `pos`, or `None` out of bounds.
    #[must_use]
    pub fn timer_at(&self, pos: GridPos) -> Option<u32> {
        (pos.row < self.rows && pos.col < self.cols).then(|| self.recharge_timer[self.index(pos)])
    }

    /// Overwrite the terrain state at `pos`. Returns `false` out of bounds.
    pub fn set_state(&mut self, pos: GridPos, state: CellState) -> bool {
        if pos.row < self.rows && pos.col < self.cols {
            let idx = self.index(pos);
            self.states[idx] = state;
            true
        } else {
            false
        }
    }

    /// Overwrite the pollen stock at `pos`. Returns `false` out of bounds.
    pub fn set_stock(&mut self, pos: GridPos, stock: f32) -> bool {
        if pos.row < self.rows && pos.col < self.cols {
            let idx = self.index(pos);
            self.pollen_stock[idx] = stock;
            true
        } else {
            false
        }
    }

    /// The 8 Moore neighbors of `pos` with toroidal wraparound, excluding
    /// `pos` itself.
    #[must_use]
    pub fn neighbors(&self, pos: GridPos) -> [GridPos; 8] {
        let rows = i64::from(self.rows);
        let cols = i64::from(self.cols);
        let mut out = [GridPos::default(); 8];
        let mut slot = 0;
        for dr in -1..=1i64 {
            for dc in -1..=1i64 {
                if dr == 0 && dc == 0 {
                    continue;
                }
                let row = (i64::from(pos.row) + dr).rem_euclid(rows) as u32;
                let col = (i64::from(pos.col) + dc).rem_euclid(cols) as u32;
                out[slot] = GridPos::new(row, col);
                slot += 1;
            }
        }
        out
    }

    /// Advance the recharge timers of depleted donors. Any cell whose timer
    /// reaches `threshold` has its stock reset to `max_stock` and its timer
    /// cleared on the same tick. Recharge is driven by elapsed ticks, not by
    /// the remaining stock level.
    pub fn recharge_tick(&mut self, max_stock: f32, threshold: u32) {
        for ((state, stock), timer) in self
            .states
            .iter()
            .zip(self.pollen_stock.iter_mut())
            .zip(self.recharge_timer.iter_mut())
        {
            if *state == CellState::DonorFlower && *stock < max_stock {
                *timer += 1;
            }
            if *timer >= threshold {
                *stock = max_stock;
                *timer = 0;
            }
        }
    }

    /// Number of pollinated flowers currently on the grid.
    #[must_use]
    pub fn pollinated_count(&self) -> usize {
        self.states
            .iter()
            .filter(|state| **state == CellState::PollinatedFlower)
            .count()
    }

    /// Straight-line Euclidean distance from `pos` to the hive.
    #[must_use]
    pub fn distance_from_hive(&self, pos: GridPos) -> f32 {
        let dr = f64::from(pos.row) - f64::from(self.hive.row);
        let dc = f64::from(pos.col) - f64::from(self.hive.col);
        (dr * dr + dc * dc).sqrt() as f32
    }

    /// One sample per flower-bearing cell: its hive distance and whether it
    /// ended up pollinated.
    #[must_use]
    pub fn flower_samples(&self) -> Vec<FlowerSample> {
        let mut samples = Vec::new();
        for row in 0..self.rows {
            for col in 0..self.cols {
                let pos = GridPos::new(row, col);
                let state = self.states[self.index(pos)];
                if state.is_floral() {
                    samples.push(FlowerSample {
                        distance: self.distance_from_hive(pos),
                        pollinated: state == CellState::PollinatedFlower,
                    });
                }
            }
        }
        samples
    }
}

/// A mobile forager and its carried pollen payload.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Forager {
    pub pos: GridPos,
    pub pollen_load: f32,
    /// Ticks since the last productive floral visit. Meaningful under the
    /// sequential model only.
    pub ticks_since_contact: u32,
}

impl Forager {
    /// A fresh forager with an empty load at `pos`.
    #[must_use]
    pub const fn at(pos: GridPos) -> Self {
        Self {
            pos,
            pollen_load: 0.0,
            ticks_since_contact: 0,
        }
    }
}

/// Collection of active foragers keyed by generational handles.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ForagerSet {
    foragers: SlotMap<ForagerId, Forager>,
}

impl ForagerSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of active foragers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.foragers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.foragers.is_empty()
    }

    /// Insert a forager, returning its handle.
    pub fn insert(&mut self, forager: Forager) -> ForagerId {
        self.foragers.insert(forager)
    }

    #[must_use]
    pub fn get(&self, id: ForagerId) -> Option<&Forager> {
        self.foragers.get(id)
    }

    #[must_use]
    pub fn get_mut(&mut self, id: ForagerId) -> Option<&mut Forager> {
        self.foragers.get_mut(id)
    }

    /// Handles in creation order.
    #[must_use]
    pub fn ids(&self) -> Vec<ForagerId> {
        self.foragers.keys().collect()
    }

    /// Iterate over handle and forager pairs.
    pub fn iter(&self) -> impl Iterator<Item = (ForagerId, &Forager)> {
        self.foragers.iter()
    }

    /// Whether any forager currently occupies `pos`.
    #[must_use]
    pub fn occupied(&self, pos: GridPos) -> bool {
        self.foragers.values().any(|forager| forager.pos == pos)
    }

    /// Current forager positions.
    #[must_use]
    pub fn positions(&self) -> Vec<GridPos> {
        self.foragers.values().map(|forager| forager.pos).collect()
    }
}

/// Events emitted after processing one simulation tick.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct TickEvents {
    pub tick: u64,
    pub spawned: bool,
    pub pollinated: u32,
}

/// Hive distance and final pollination flag of one flower-bearing cell.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct FlowerSample {
    pub distance: f32,
    pub pollinated: bool,
}

/// Immutable output extracted from a completed run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunOutcome {
    /// Pollinated-flower count after each tick.
    pub temporal: Vec<u32>,
    /// One sample per flower-bearing cell at run end.
    pub spatial: Vec<FlowerSample>,
}

/// Read-only view of the grid and agent positions for rendering collaborators.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GridSnapshot {
    pub rows: u32,
    pub cols: u32,
    pub states: Vec<CellState>,
    pub foragers: Vec<GridPos>,
}

fn passable(state: CellState, model: &UpdateModel) -> bool {
    match model {
        UpdateModel::Sequential(_) => state != CellState::Obstacle,
        UpdateModel::Synchronous(_) => {
            !matches!(state, CellState::Obstacle | CellState::Empty)
        }
    }
}

/// Movement weight of a candidate cell: base 1.0 plus the attraction bonus
/// for floral states. Pollinated flowers keep attracting foragers under the
/// sequential model only.
fn movement_weight(state: CellState, attraction: f32, model: &UpdateModel) -> f32 {
    let floral = match model {
        UpdateModel::Sequential(_) => state.is_floral(),
        UpdateModel::Synchronous(_) => {
            matches!(state, CellState::DonorFlower | CellState::ReceptorFlower)
        }
    };
    if floral { 1.0 + attraction } else { 1.0 }
}

/// One full simulation: a landscape, its foragers, and the accumulated
/// per-tick metrics.
pub struct SimulationRun {
    config: SimulationConfig,
    landscape: Landscape,
    foragers: ForagerSet,
    rng: SmallRng,
    tick: u64,
    temporal: Vec<u32>,
}

impl fmt::Debug for SimulationRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimulationRun")
            .field("tick", &self.tick)
            .field("rows", &self.landscape.rows())
            .field("cols", &self.landscape.cols())
            .field("foragers", &self.foragers.len())
            .finish()
    }
}

impl SimulationRun {
    /// Build a run with a freshly sampled landscape.
    pub fn new(config: SimulationConfig) -> Result<Self, SimulationError> {
        config.validate()?;
        let mut rng = config.seeded_rng();
        let landscape = Landscape::generate(&config, &mut rng);
        Ok(Self {
            config,
            landscape,
            foragers: ForagerSet::new(),
            rng,
            tick: 0,
            temporal: Vec::new(),
        })
    }

    /// Build a run over a caller-supplied landscape.
    pub fn with_landscape(
        config: SimulationConfig,
        landscape: Landscape,
    ) -> Result<Self, SimulationError> {
        config.validate()?;
        if landscape.rows() != config.rows || landscape.cols() != config.cols {
            return Err(SimulationError::InvalidConfig(
                "landscape dimensions do not match configuration",
            ));
        }
        let rng = config.seeded_rng();
        Ok(Self {
            config,
            landscape,
            foragers: ForagerSet::new(),
            rng,
            tick: 0,
            temporal: Vec::new(),
        })
    }

    /// Execute one tick: spawn, recharge, per-forager movement and
    /// interaction, then metric capture.
    pub fn step(&mut self) -> TickEvents {
        self.tick += 1;
        let spawned = self.stage_spawn();
        self.stage_recharge();
        match self.config.model {
            UpdateModel::Sequential(rules) => self.stage_foragers_sequential(rules),
            UpdateModel::Synchronous(rules) => self.stage_foragers_synchronous(rules),
        }
        let pollinated = self.landscape.pollinated_count() as u32;
        self.temporal.push(pollinated);
        TickEvents {
            tick: self.tick,
            spawned,
            pollinated,
        }
    }

    /// Run for `ticks` ticks and extract the final outcome, consuming the run.
    #[must_use]
    pub fn complete(mut self, ticks: u64) -> RunOutcome {
        for _ in 0..ticks {
            self.step();
        }
        self.outcome()
    }

    /// Snapshot of the run's current outputs.
    #[must_use]
    pub fn outcome(&self) -> RunOutcome {
        RunOutcome {
            temporal: self.temporal.clone(),
            spatial: self.landscape.flower_samples(),
        }
    }

    /// Read-only grid snapshot for rendering collaborators.
    #[must_use]
    pub fn snapshot(&self) -> GridSnapshot {
        GridSnapshot {
            rows: self.landscape.rows(),
            cols: self.landscape.cols(),
            states: self.landscape.states().to_vec(),
            foragers: self.foragers.positions(),
        }
    }

    /// Immutable access to the configuration.
    #[must_use]
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Immutable access to the landscape.
    #[must_use]
    pub fn landscape(&self) -> &Landscape {
        &self.landscape
    }

    /// Immutable access to the forager set.
    #[must_use]
    pub fn foragers(&self) -> &ForagerSet {
        &self.foragers
    }

    /// Mutable access to the forager set.
    #[must_use]
    pub fn foragers_mut(&mut self) -> &mut ForagerSet {
        &mut self.foragers
    }

    /// Current tick counter.
    #[must_use]
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Pollinated-flower counts recorded so far, one entry per tick.
    #[must_use]
    pub fn temporal_history(&self) -> &[u32] {
        &self.temporal
    }

    /// Place a forager directly, bypassing the spawn stage. Returns `None`
    /// when `pos` is out of bounds or an obstacle.
    pub fn spawn_forager_at(&mut self, pos: GridPos) -> Option<ForagerId> {
        match self.landscape.state_at(pos) {
            Some(state) if state != CellState::Obstacle => {
                Some(self.foragers.insert(Forager::at(pos)))
            }
            _ => None,
        }
    }

    fn stage_spawn(&mut self) -> bool {
        if self.foragers.len() >= self.config.max_foragers {
            return false;
        }
        let hive = self.landscape.hive();
        match self.config.model {
            UpdateModel::Sequential(_) => {
                self.foragers.insert(Forager::at(hive));
                true
            }
            UpdateModel::Synchronous(rules) => {
                if self.foragers.occupied(hive) {
                    return false;
                }
                if !self.rng.random_bool(rules.spawn_probability) {
                    return false;
                }
                self.foragers.insert(Forager::at(hive));
                true
            }
        }
    }

    fn stage_recharge(&mut self) {
        self.landscape
            .recharge_tick(self.config.max_pollen_stock, self.config.recharge_threshold);
    }

    /// Weighted draw over the eligible neighbors of `from`. `claimed` marks
    /// cells already taken by agents that moved earlier this tick; the
    /// sequential model passes `None`. No eligible neighbor means no move.
    fn choose_destination(&mut self, from: GridPos, claimed: Option<&[bool]>) -> GridPos {
        let neighbors = self.landscape.neighbors(from);
        let mut candidates: Vec<(GridPos, f32)> = Vec::with_capacity(8);
        let mut total = 0.0f32;
        for pos in neighbors {
            let idx = self.landscape.index(pos);
            let state = self.landscape.states[idx];
            if !passable(state, &self.config.model) {
                continue;
            }
            if claimed.is_some_and(|claimed| claimed[idx]) {
                continue;
            }
            let weight = movement_weight(state, self.config.attraction, &self.config.model);
            total += weight;
            candidates.push((pos, weight));
        }
        if candidates.is_empty() {
            return from;
        }
        let mut draw = self.rng.random_range(0.0..total);
        for (pos, weight) in &candidates {
            if draw < *weight {
                return *pos;
            }
            draw -= weight;
        }
        // float rounding can leave a sliver past the last cumulative bound
        candidates[candidates.len() - 1].0
    }

    fn stage_foragers_sequential(&mut self, rules: SequentialRules) {
        for id in self.foragers.ids() {
            let Some(pos) = self.foragers.get(id).map(|forager| forager.pos) else {
                continue;
            };
            let dest = self.choose_destination(pos, None);
            if let Some(forager) = self.foragers.get_mut(id) {
                forager.pos = dest;
            }
            let productive = self.interact_sequential(id, dest);
            let Some(forager) = self.foragers.get_mut(id) else {
                continue;
            };
            if productive {
                forager.ticks_since_contact = 0;
            } else {
                forager.ticks_since_contact += 1;
                if forager.ticks_since_contact >= rules.contact_decay_ticks {
                    // stale pollen is no longer viable
                    forager.pollen_load = 0.0;
                }
            }
        }
    }

    /// Collection or probabilistic deposition at `pos`. Returns whether the
    /// visit counted as productive floral contact.
    fn interact_sequential(&mut self, id: ForagerId, pos: GridPos) -> bool {
        let idx = self.landscape.index(pos);
        match self.landscape.states[idx] {
            CellState::DonorFlower => {
                let available = self.landscape.pollen_stock[idx];
                if available <= 0.0 {
                    return false;
                }
                let Some(forager) = self.foragers.get_mut(id) else {
                    return false;
                };
                let headroom = (self.config.max_pollen_capacity - forager.pollen_load).max(0.0);
                let collected = self
                    .config
                    .collection_efficiency
                    .min(available)
                    .min(headroom);
                forager.pollen_load += collected;
                self.landscape.pollen_stock[idx] -= collected;
                true
            }
            CellState::ReceptorFlower => {
                let Some(forager) = self.foragers.get_mut(id) else {
                    return false;
                };
                if forager.pollen_load <= 0.0 {
                    return false;
                }
                let success_prob =
                    f64::from((forager.pollen_load / self.config.max_pollen_capacity).min(1.0));
                if self.rng.random_bool(success_prob) {
                    self.landscape.states[idx] = CellState::PollinatedFlower;
                    // fixed unit discharge regardless of the carried load
                    forager.pollen_load = (forager.pollen_load - 1.0).max(0.0);
                    true
                } else {
                    false
                }
            }
            _ => false,
        }
    }

    fn stage_foragers_synchronous(&mut self, rules: SynchronousRules) {
        let mut order: Vec<Forager> = self.foragers.iter().map(|(_, forager)| *forager).collect();
        order.shuffle(&mut self.rng);

        let cell_count = self.landscape.cell_count();
        let mut claimed = vec![false; cell_count];
        let mut next_cells: Vec<Option<Forager>> = vec![None; cell_count];

        for mut forager in order {
            let dest = self.choose_destination(forager.pos, Some(&claimed));
            let idx = self.landscape.index(dest);
            match self.landscape.states[idx] {
                CellState::DonorFlower => {
                    let available = self.landscape.pollen_stock[idx];
                    if available > 0.0 {
                        let headroom =
                            (self.config.max_pollen_capacity - forager.pollen_load).max(0.0);
                        let collected = self
                            .config
                            .collection_efficiency
                            .min(available)
                            .min(headroom);
                        forager.pollen_load += collected;
                        self.landscape.pollen_stock[idx] -= collected;
                    }
                }
                CellState::ReceptorFlower => {
                    let deposited = forager.pollen_load * rules.deposition_rate;
                    if deposited > 0.0 {
                        forager.pollen_load -= deposited;
                        if deposited >= rules.pollination_threshold {
                            self.landscape.states[idx] = CellState::PollinatedFlower;
                        }
                    }
                }
                _ => {}
            }
            forager.pos = dest;
            // a stationary forager whose cell was claimed by an earlier mover
            // is overwritten here and dropped from the next snapshot
            claimed[idx] = true;
            next_cells[idx] = Some(forager);
        }

        let mut next = ForagerSet::new();
        for forager in next_cells.into_iter().flatten() {
            next.insert(forager);
        }
        self.foragers = next;
    }
}

/// Per-tick mean and standard deviation of pollinated-flower counts across
/// a batch of runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TemporalSummary {
    pub mean: Vec<f64>,
    pub std_dev: Vec<f64>,
}

/// Pollination success statistics for one hive-distance bin.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct DistanceBin {
    /// Inclusive lower bound of the bin.
    pub lower_bound: f32,
    /// Mean success rate over every sample in the bin, as a percentage.
    pub mean_pct: f64,
    /// Population standard deviation of the success flags, as a percentage.
    pub std_dev_pct: f64,
    /// Number of (run, cell) samples that fell in the bin.
    pub samples: usize,
}

/// Aggregated statistics over a batch of independent runs. Raw per-run data
/// is not retained.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonteCarloSummary {
    pub runs: usize,
    pub temporal: TemporalSummary,
    pub spatial: Vec<DistanceBin>,
}

/// Pure aggregation of per-run outputs. Every history must span exactly
/// `ticks_per_run` entries; a mismatch is an internal consistency error, not
/// something to truncate around.
pub fn summarize(
    outcomes: &[RunOutcome],
    ticks_per_run: u64,
) -> Result<MonteCarloSummary, SimulationError> {
    let expected = ticks_per_run as usize;
    for (run, outcome) in outcomes.iter().enumerate() {
        if outcome.temporal.len() != expected {
            return Err(SimulationError::HistoryLengthMismatch {
                run,
                expected,
                actual: outcome.temporal.len(),
            });
        }
    }

    let runs = outcomes.len();
    let mut mean = vec![0.0f64; expected];
    let mut std_dev = vec![0.0f64; expected];
    if runs > 0 {
        for tick in 0..expected {
            let sum: f64 = outcomes
                .iter()
                .map(|outcome| f64::from(outcome.temporal[tick]))
                .sum();
            let tick_mean = sum / runs as f64;
            let variance: f64 = outcomes
                .iter()
                .map(|outcome| {
                    let delta = f64::from(outcome.temporal[tick]) - tick_mean;
                    delta * delta
                })
                .sum::<f64>()
                / runs as f64;
            mean[tick] = tick_mean;
            std_dev[tick] = variance.sqrt();
        }
    }

    // (sample count, success count) per bin; the axis stays dense so empty
    // bins still appear downstream
    let mut bins: Vec<(usize, usize)> = Vec::new();
    for outcome in outcomes {
        for sample in &outcome.spatial {
            let bin = (sample.distance / DISTANCE_BIN_WIDTH).floor() as usize;
            if bin >= bins.len() {
                bins.resize(bin + 1, (0, 0));
            }
            bins[bin].0 += 1;
            if sample.pollinated {
                bins[bin].1 += 1;
            }
        }
    }
    let spatial = bins
        .iter()
        .enumerate()
        .map(|(bin, &(samples, successes))| {
            let lower_bound = bin as f32 * DISTANCE_BIN_WIDTH;
            if samples == 0 {
                DistanceBin {
                    lower_bound,
                    mean_pct: 0.0,
                    std_dev_pct: 0.0,
                    samples: 0,
                }
            } else {
                let rate = successes as f64 / samples as f64;
                DistanceBin {
                    lower_bound,
                    mean_pct: rate * 100.0,
                    // population sigma of a 0/1 sample set is sqrt(p * (1 - p))
                    std_dev_pct: (rate * (1.0 - rate)).sqrt() * 100.0,
                    samples,
                }
            }
        })
        .collect();

    Ok(MonteCarloSummary {
        runs,
        temporal: TemporalSummary { mean, std_dev },
        spatial,
    })
}

/// Execute `num_runs` independent simulations in parallel and aggregate
/// their outputs. Runs share the configuration but draw from independent
/// seed streams derived from the configured base seed.
pub fn run_batch(
    config: &SimulationConfig,
    num_runs: usize,
    ticks_per_run: u64,
) -> Result<MonteCarloSummary, SimulationError> {
    config.validate()?;
    if num_runs == 0 {
        return Err(SimulationError::InvalidConfig(
            "num_runs must be positive",
        ));
    }
    if ticks_per_run == 0 {
        return Err(SimulationError::InvalidConfig(
            "ticks_per_run must be positive",
        ));
    }

    let base_seed = config.rng_seed.unwrap_or_else(rand::random);
    debug!(num_runs, ticks_per_run, base_seed, "starting Monte Carlo batch");

    let outcomes: Vec<RunOutcome> = (0..num_runs)
        .into_par_iter()
        .map(|run| {
            let mut run_config = config.clone();
            run_config.rng_seed = Some(base_seed ^ (run as u64).wrapping_mul(SEED_STRIDE));
            let outcome = SimulationRun::new(run_config)?.complete(ticks_per_run);
            trace!(run, "simulation run complete");
            Ok(outcome)
        })
        .collect::<Result<_, SimulationError>>()?;

    let summary = summarize(&outcomes, ticks_per_run)?;
    debug!(
        runs = summary.runs,
        bins = summary.spatial.len(),
        "Monte Carlo batch complete"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn blank(rows: u32, cols: u32) -> Landscape {
        Landscape::uniform(rows, cols, CellState::Neutral).expect("landscape")
    }

    fn sequential_config(rows: u32, cols: u32) -> SimulationConfig {
        SimulationConfig {
            rows,
            cols,
            rng_seed: Some(7),
            model: UpdateModel::Sequential(SequentialRules {
                obstacle_prob: 0.0,
                donor_prob: 0.0,
                receptor_prob: 0.0,
                ..SequentialRules::default()
            }),
            ..SimulationConfig::sequential()
        }
    }

    fn synchronous_config(rows: u32, cols: u32) -> SimulationConfig {
        SimulationConfig {
            rows,
            cols,
            rng_seed: Some(7),
            model: UpdateModel::Synchronous(SynchronousRules {
                floral_density: 0.0,
                empty_density: 0.0,
                ..SynchronousRules::default()
            }),
            ..SimulationConfig::synchronous()
        }
    }

    fn ring_of(landscape: &mut Landscape, center: GridPos, state: CellState) {
        for pos in landscape.neighbors(center) {
            landscape.set_state(pos, state);
        }
    }

    #[test]
    fn neighbors_wrap_toroidally() {
        let landscape = blank(5, 5);
        let neighbors = landscape.neighbors(GridPos::new(0, 0));
        let expected: HashSet<GridPos> = [
            (4, 4),
            (4, 0),
            (4, 1),
            (0, 4),
            (0, 1),
            (1, 4),
            (1, 0),
            (1, 1),
        ]
        .iter()
        .map(|&(row, col)| GridPos::new(row, col))
        .collect();
        let actual: HashSet<GridPos> = neighbors.iter().copied().collect();
        assert_eq!(actual, expected);
        assert!(!actual.contains(&GridPos::new(0, 0)));
    }

    #[test]
    fn uniform_landscape_places_hive_at_center() {
        let landscape = blank(11, 7);
        assert_eq!(landscape.hive(), GridPos::new(5, 3));
        assert_eq!(landscape.state_at(GridPos::new(5, 3)), Some(CellState::Hive));
        assert_eq!(landscape.state_at(GridPos::new(0, 0)), Some(CellState::Neutral));
        assert!(Landscape::uniform(2, 5, CellState::Neutral).is_err());
    }

    #[test]
    fn recharge_resets_stock_and_timer_on_threshold_tick() {
        let mut landscape = blank(5, 5);
        let donor = GridPos::new(1, 1);
        landscape.set_state(donor, CellState::DonorFlower);
        landscape.set_stock(donor, 30.0);

        for _ in 0..3 {
            landscape.recharge_tick(100.0, 4);
        }
        assert_eq!(landscape.timer_at(donor), Some(3));
        assert_eq!(landscape.stock_at(donor), Some(30.0));

        landscape.recharge_tick(100.0, 4);
        assert_eq!(landscape.stock_at(donor), Some(100.0));
        assert_eq!(landscape.timer_at(donor), Some(0));

        // a full donor accrues no timer
        landscape.recharge_tick(100.0, 4);
        assert_eq!(landscape.timer_at(donor), Some(0));
    }

    #[test]
    fn movement_weight_favors_floral_neighbors() {
        let sequential = UpdateModel::Sequential(SequentialRules::default());
        let synchronous = UpdateModel::Synchronous(SynchronousRules::default());
        for model in [&sequential, &synchronous] {
            let floral = movement_weight(CellState::DonorFlower, 10.0, model);
            let plain = movement_weight(CellState::Neutral, 10.0, model);
            assert!(floral > plain);
            assert!((plain - 1.0).abs() < f32::EPSILON);
            assert!((floral - 11.0).abs() < f32::EPSILON);
        }
        // pollinated flowers keep attracting only under the sequential model
        assert!(
            (movement_weight(CellState::PollinatedFlower, 10.0, &sequential) - 11.0).abs()
                < f32::EPSILON
        );
        assert!(
            (movement_weight(CellState::PollinatedFlower, 10.0, &synchronous) - 1.0).abs()
                < f32::EPSILON
        );
    }

    #[test]
    fn movement_weights_are_uniform_without_attraction() {
        let model = UpdateModel::Sequential(SequentialRules::default());
        for state in [
            CellState::Empty,
            CellState::Neutral,
            CellState::DonorFlower,
            CellState::ReceptorFlower,
            CellState::PollinatedFlower,
            CellState::Hive,
        ] {
            assert!((movement_weight(state, 0.0, &model) - 1.0).abs() < f32::EPSILON);
        }
    }

    #[test]
    fn obstacles_are_never_destinations() {
        let mut landscape = blank(7, 7);
        let start = GridPos::new(1, 1);
        ring_of(&mut landscape, start, CellState::Obstacle);

        let mut config = sequential_config(7, 7);
        config.max_foragers = 1;
        let mut run = SimulationRun::with_landscape(config, landscape).expect("run");
        let id = run.spawn_forager_at(start).expect("forager");

        for _ in 0..50 {
            run.step();
            let forager = run.foragers().get(id).expect("forager alive");
            assert_eq!(forager.pos, start);
        }
    }

    #[test]
    fn empty_cells_are_impassable_under_synchronous_rules() {
        let mut landscape = blank(7, 7);
        let start = GridPos::new(1, 1);
        ring_of(&mut landscape, start, CellState::Empty);

        let mut config = synchronous_config(7, 7);
        config.max_foragers = 1;
        let mut run = SimulationRun::with_landscape(config, landscape).expect("run");
        run.spawn_forager_at(start).expect("forager");

        for _ in 0..50 {
            run.step();
            assert_eq!(run.foragers().positions(), vec![start]);
        }
    }

    #[test]
    fn uninterrupted_collection_drains_donor_into_load() {
        let mut landscape = blank(10, 10);
        assert_eq!(landscape.hive(), GridPos::new(5, 5));
        let donor = GridPos::new(0, 0);
        landscape.set_state(donor, CellState::DonorFlower);
        landscape.set_stock(donor, 100.0);
        landscape.set_state(GridPos::new(0, 5), CellState::ReceptorFlower);
        ring_of(&mut landscape, donor, CellState::Obstacle);

        let mut config = sequential_config(10, 10);
        config.max_foragers = 1;
        config.max_pollen_capacity = 100.0;
        config.collection_efficiency = 10.0;
        config.recharge_threshold = 1_000;
        let mut run = SimulationRun::with_landscape(config, landscape).expect("run");
        let id = run.spawn_forager_at(donor).expect("forager");

        for tick in 1..=10u32 {
            run.step();
            let forager = run.foragers().get(id).expect("forager");
            assert!((forager.pollen_load - 10.0 * tick as f32).abs() < 1e-3);
        }
        assert_eq!(run.landscape().stock_at(donor), Some(0.0));
        assert!(
            (run.foragers().get(id).expect("forager").pollen_load - 100.0).abs() < 1e-3
        );

        // a further visit at zero stock is unproductive and collects nothing
        run.step();
        let forager = run.foragers().get(id).expect("forager");
        assert!((forager.pollen_load - 100.0).abs() < 1e-3);
        assert_eq!(forager.ticks_since_contact, 1);
    }

    #[test]
    fn full_load_makes_probabilistic_deposition_certain() {
        let mut landscape = blank(7, 7);
        let receptor = GridPos::new(1, 1);
        landscape.set_state(receptor, CellState::ReceptorFlower);
        ring_of(&mut landscape, receptor, CellState::Obstacle);

        let mut config = sequential_config(7, 7);
        config.max_foragers = 1;
        let mut run = SimulationRun::with_landscape(config, landscape).expect("run");
        let id = run.spawn_forager_at(receptor).expect("forager");
        run.foragers_mut().get_mut(id).expect("forager").pollen_load = 100.0;

        let events = run.step();
        assert_eq!(events.pollinated, 1);
        assert_eq!(
            run.landscape().state_at(receptor),
            Some(CellState::PollinatedFlower)
        );
        assert!(
            (run.foragers().get(id).expect("forager").pollen_load - 99.0).abs() < 1e-3
        );
    }

    #[test]
    fn proportional_deposition_splits_load_deterministically() {
        for (threshold, expect_pollinated) in [(4.0, true), (100.0, false)] {
            let mut landscape = blank(7, 7);
            let receptor = GridPos::new(1, 1);
            landscape.set_state(receptor, CellState::ReceptorFlower);
            ring_of(&mut landscape, receptor, CellState::Empty);

            let mut config = synchronous_config(7, 7);
            config.max_foragers = 1;
            if let UpdateModel::Synchronous(rules) = &mut config.model {
                rules.deposition_rate = 0.6;
                rules.pollination_threshold = threshold;
                rules.spawn_probability = 0.0;
            }
            let mut run = SimulationRun::with_landscape(config, landscape).expect("run");
            let id = run.spawn_forager_at(receptor).expect("forager");
            run.foragers_mut().get_mut(id).expect("forager").pollen_load = 10.0;

            run.step();
            assert_eq!(run.foragers().positions(), vec![receptor]);
            let forager = run
                .foragers()
                .iter()
                .next()
                .map(|(_, forager)| *forager)
                .expect("forager");
            assert!((forager.pollen_load - 4.0).abs() < 1e-5);
            let pollinated = run.landscape().state_at(receptor)
                == Some(CellState::PollinatedFlower);
            assert_eq!(pollinated, expect_pollinated);
        }
    }

    #[test]
    fn retention_decay_discards_stale_load() {
        let mut landscape = blank(7, 7);
        let perch = GridPos::new(1, 1);
        ring_of(&mut landscape, perch, CellState::Obstacle);

        let mut config = sequential_config(7, 7);
        config.max_foragers = 1;
        if let UpdateModel::Sequential(rules) = &mut config.model {
            rules.contact_decay_ticks = 3;
        }
        let mut run = SimulationRun::with_landscape(config, landscape).expect("run");
        let id = run.spawn_forager_at(perch).expect("forager");
        run.foragers_mut().get_mut(id).expect("forager").pollen_load = 5.0;

        run.step();
        run.step();
        assert!((run.foragers().get(id).expect("forager").pollen_load - 5.0).abs() < 1e-6);
        run.step();
        let forager = run.foragers().get(id).expect("forager");
        assert_eq!(forager.pollen_load, 0.0);
        assert_eq!(forager.ticks_since_contact, 3);
    }

    #[test]
    fn sequential_spawning_stops_at_the_cap() {
        let mut config = sequential_config(9, 9);
        config.max_foragers = 4;
        let mut run = SimulationRun::new(config).expect("run");
        for tick in 1..=8usize {
            run.step();
            assert_eq!(run.foragers().len(), tick.min(4));
        }
    }

    #[test]
    fn synchronous_snapshot_never_stacks_foragers() {
        let mut config = synchronous_config(6, 6);
        config.max_foragers = 12;
        if let UpdateModel::Synchronous(rules) = &mut config.model {
            rules.spawn_probability = 1.0;
        }
        let mut run = SimulationRun::new(config).expect("run");
        for _ in 0..30 {
            run.step();
            let positions = run.foragers().positions();
            let unique: HashSet<GridPos> = positions.iter().copied().collect();
            assert_eq!(unique.len(), positions.len());
        }
    }

    #[test]
    fn summarize_matches_reference_statistics() {
        let outcomes = vec![
            RunOutcome {
                temporal: vec![1, 2, 3],
                spatial: Vec::new(),
            },
            RunOutcome {
                temporal: vec![3, 2, 1],
                spatial: Vec::new(),
            },
        ];
        let summary = summarize(&outcomes, 3).expect("summary");
        assert_eq!(summary.runs, 2);
        assert_eq!(summary.temporal.mean, vec![2.0, 2.0, 2.0]);
        assert_eq!(summary.temporal.std_dev, vec![1.0, 0.0, 1.0]);
    }

    #[test]
    fn summarize_rejects_mismatched_histories() {
        let outcomes = vec![
            RunOutcome {
                temporal: vec![1, 2, 3],
                spatial: Vec::new(),
            },
            RunOutcome {
                temporal: vec![1, 2],
                spatial: Vec::new(),
            },
        ];
        assert_eq!(
            summarize(&outcomes, 3),
            Err(SimulationError::HistoryLengthMismatch {
                run: 1,
                expected: 3,
                actual: 2,
            })
        );
    }

    #[test]
    fn summarize_is_a_pure_function_of_its_inputs() {
        let outcomes = vec![RunOutcome {
            temporal: vec![0, 1, 4],
            spatial: vec![
                FlowerSample {
                    distance: 0.5,
                    pollinated: true,
                },
                FlowerSample {
                    distance: 5.1,
                    pollinated: false,
                },
            ],
        }];
        let first = summarize(&outcomes, 3).expect("summary");
        let second = summarize(&outcomes, 3).expect("summary");
        assert_eq!(first, second);
    }

    #[test]
    fn spatial_bins_stay_dense_across_gaps() {
        let outcomes = vec![RunOutcome {
            temporal: vec![1],
            spatial: vec![
                FlowerSample {
                    distance: 0.5,
                    pollinated: false,
                },
                FlowerSample {
                    distance: 9.0,
                    pollinated: true,
                },
            ],
        }];
        let summary = summarize(&outcomes, 1).expect("summary");
        assert_eq!(summary.spatial.len(), 5);
        let bounds: Vec<f32> = summary.spatial.iter().map(|bin| bin.lower_bound).collect();
        assert_eq!(bounds, vec![0.0, 2.0, 4.0, 6.0, 8.0]);
        assert_eq!(summary.spatial[0].samples, 1);
        assert_eq!(summary.spatial[0].mean_pct, 0.0);
        for bin in &summary.spatial[1..4] {
            assert_eq!(bin.samples, 0);
            assert_eq!(bin.mean_pct, 0.0);
            assert_eq!(bin.std_dev_pct, 0.0);
        }
        assert_eq!(summary.spatial[4].mean_pct, 100.0);
        assert_eq!(summary.spatial[4].std_dev_pct, 0.0);
    }

    #[test]
    fn configuration_errors_fail_fast() {
        let mut config = SimulationConfig::sequential();
        config.rows = 0;
        assert!(matches!(
            SimulationRun::new(config),
            Err(SimulationError::InvalidConfig(_))
        ));

        let mut config = SimulationConfig::sequential();
        if let UpdateModel::Sequential(rules) = &mut config.model {
            rules.obstacle_prob = 1.5;
        }
        assert!(config.validate().is_err());

        let mut config = SimulationConfig::sequential();
        if let UpdateModel::Sequential(rules) = &mut config.model {
            rules.obstacle_prob = 0.6;
            rules.donor_prob = 0.6;
        }
        assert!(config.validate().is_err());

        let mut config = SimulationConfig::synchronous();
        if let UpdateModel::Synchronous(rules) = &mut config.model {
            rules.deposition_rate = 0.0;
        }
        assert!(config.validate().is_err());

        let mut config = SimulationConfig::synchronous();
        config.max_pollen_capacity = -1.0;
        assert!(config.validate().is_err());

        assert!(run_batch(&SimulationConfig::sequential(), 0, 10).is_err());
        assert!(run_batch(&SimulationConfig::sequential(), 2, 0).is_err());
    }

    #[test]
    fn snapshot_reflects_grid_and_forager_positions() {
        let mut landscape = blank(5, 5);
        landscape.set_state(GridPos::new(0, 1), CellState::DonorFlower);
        let mut run =
            SimulationRun::with_landscape(sequential_config(5, 5), landscape).expect("run");
        run.spawn_forager_at(GridPos::new(3, 3)).expect("forager");

        let snapshot = run.snapshot();
        assert_eq!(snapshot.rows, 5);
        assert_eq!(snapshot.cols, 5);
        assert_eq!(snapshot.states[1], CellState::DonorFlower);
        assert_eq!(snapshot.foragers, vec![GridPos::new(3, 3)]);

        let encoded = serde_json::to_string(&snapshot).expect("encode");
        let decoded: GridSnapshot = serde_json::from_str(&encoded).expect("decode");
        assert_eq!(decoded, snapshot);
    }

    #[test]
    fn config_round_trips_through_serde() {
        for config in [SimulationConfig::sequential(), SimulationConfig::synchronous()] {
            let encoded = serde_json::to_string(&config).expect("encode");
            let decoded: SimulationConfig = serde_json::from_str(&encoded).expect("decode");
            assert_eq!(decoded, config);
        }
    }
}
