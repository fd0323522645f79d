use std::io::{Read, Write};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::adapter::{decode_all, encode_all, Actuator, SpeedMatrix};
use crate::codec::{BitWidth, EncodedPattern};
use crate::error::{HopfieldError, Result};
use crate::geometry::{GridGeometry, Maneuver};
use crate::library::{DegeneratePolicy, PatternLibrary};
use crate::prng::Prng;
use crate::recall::{ExecutionTier, NeuronState, RecallEngine, RecallOutcome};
use crate::weights::{train, WeightMatrix};

/// Relaxation performed by one control cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum CycleMode {
    /// Recompute one randomly picked unit block.
    #[default]
    AsyncBlock,
    /// Recompute one randomly picked neuron.
    AsyncNeuron,
    /// Bounded synchronous recall (`max_iterations`).
    Sync,
}

/// Configuration for a [`SwarmNetwork`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct NetworkConfig {
    /// Grid rows (front to back).
    pub rows: u32,
    /// Grid columns (left to right).
    pub cols: u32,
    /// Side length of one unit.
    pub unit_size: f64,
    /// Wheel radius; divides the forward component.
    pub wheel_radius: f64,
    /// Neurons per unit: one sign bit plus `bit_size - 1` magnitude bits.
    pub bit_size: u32,

    /// Maneuvers stored as attractors, in library order.
    pub maneuvers: Vec<Maneuver>,
    pub degenerate_policy: DegeneratePolicy,

    pub cycle_mode: CycleMode,
    /// Cap for synchronous recall.
    pub max_iterations: usize,

    /// Seed for the initial state and the asynchronous unit picker.
    ///
    /// `None` uses a fixed default, so runs are reproducible either way.
    pub seed: Option<u64>,
    pub execution_tier: ExecutionTier,
}

impl Default for NetworkConfig {
    /// A 3×3 swarm storing right, left and forward, 4 bits per unit.
    fn default() -> Self {
        Self {
            rows: 3,
            cols: 3,
            unit_size: 0.1,
            wheel_radius: 0.025,
            bit_size: 4,
            maneuvers: vec![Maneuver::RIGHT, Maneuver::LEFT, Maneuver::FORWARD],
            degenerate_policy: DegeneratePolicy::Skip,
            cycle_mode: CycleMode::AsyncBlock,
            max_iterations: 20,
            seed: None,
            execution_tier: ExecutionTier::Scalar,
        }
    }
}

impl NetworkConfig {
    pub const MAX_UNITS: u32 = 4096;
    /// Caps `rows * cols * bit_size`; the weight matrix holds N² `f64`s.
    pub const MAX_NEURONS: u64 = 8192;

    pub fn validate(&self) -> std::result::Result<(), &'static str> {
        if self.rows == 0 || self.cols == 0 {
            return Err("rows and cols must be >= 1");
        }
        if self.rows.saturating_mul(self.cols) > Self::MAX_UNITS {
            return Err("rows * cols too large");
        }
        if !self.unit_size.is_finite() || self.unit_size < 0.0 {
            return Err("unit_size must be finite and >= 0");
        }
        if !self.wheel_radius.is_finite() {
            return Err("wheel_radius must be finite");
        }
        if !(BitWidth::MIN_BITS..=BitWidth::MAX_BITS).contains(&self.bit_size) {
            return Err("bit_size must be in [2, 32]");
        }
        if u64::from(self.rows) * u64::from(self.cols) * u64::from(self.bit_size)
            > Self::MAX_NEURONS
        {
            return Err("rows * cols * bit_size too large");
        }
        if self
            .maneuvers
            .iter()
            .any(|m| !m.forward.is_finite() || !m.right.is_finite())
        {
            return Err("maneuver components must be finite");
        }
        Ok(())
    }

    /// Parse a JSON config; missing fields take their defaults.
    #[cfg(feature = "serde")]
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| HopfieldError::Config(e.to_string()))
    }

    pub fn with_grid(mut self, rows: u32, cols: u32) -> Self {
        self.rows = rows;
        self.cols = cols;
        self
    }

    pub fn with_bit_size(mut self, bit_size: u32) -> Self {
        self.bit_size = bit_size;
        self
    }

    pub fn with_maneuvers(mut self, maneuvers: Vec<Maneuver>) -> Self {
        self.maneuvers = maneuvers;
        self
    }

    pub fn with_cycle_mode(mut self, mode: CycleMode) -> Self {
        self.cycle_mode = mode;
        self
    }

    /// Set the random seed for reproducibility.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_execution_tier(mut self, tier: ExecutionTier) -> Self {
        self.execution_tier = tier;
        self
    }

    fn geometry(&self) -> Result<GridGeometry> {
        GridGeometry::new(self.rows, self.cols, self.unit_size)
    }
}

/// A swarm's associative memory: pattern library, trained weights and live state.
pub struct SwarmNetwork {
    cfg: NetworkConfig,
    geometry: GridGeometry,
    width: BitWidth,
    library: PatternLibrary,
    weights: WeightMatrix,
    engine: RecallEngine<Prng>,

    // Library came from a pattern image rather than the config's maneuvers.
    from_image: bool,
}

impl SwarmNetwork {
    /// Validate `cfg`, build and train the library, randomize the state.
    pub fn new(cfg: NetworkConfig) -> Result<Self> {
        cfg.validate().map_err(HopfieldError::InvalidConfig)?;
        let geometry = cfg.geometry()?;
        let width = BitWidth::new(cfg.bit_size)?;
        let library = PatternLibrary::build(
            geometry,
            width,
            &cfg.maneuvers,
            cfg.wheel_radius,
            cfg.degenerate_policy,
        )?;
        Ok(Self::from_library(cfg, geometry, width, library))
    }

    fn from_library(
        cfg: NetworkConfig,
        geometry: GridGeometry,
        width: BitWidth,
        library: PatternLibrary,
    ) -> Self {
        let weights = train(&library);

        let mut init = Prng::new(cfg.seed.unwrap_or(0));
        let picker = Prng::new((u64::from(init.next_u32()) << 1) | 1);
        let mut engine = RecallEngine::new(geometry.unit_count(), width, picker);
        engine.set_execution_tier(cfg.execution_tier);
        engine.randomize(&mut init);

        Self {
            cfg,
            geometry,
            width,
            library,
            weights,
            engine,
            from_image: false,
        }
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.cfg
    }

    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    pub fn width(&self) -> BitWidth {
        self.width
    }

    pub fn library(&self) -> &PatternLibrary {
        &self.library
    }

    pub fn weights(&self) -> &WeightMatrix {
        &self.weights
    }

    pub fn neuron_count(&self) -> usize {
        self.engine.neuron_count()
    }

    /// Whether the patterns were loaded from an image (false when regenerated).
    pub fn patterns_from_image(&self) -> bool {
        self.from_image
    }

    /// Replace library and weights with ones built from `maneuvers`.
    ///
    /// On error the previous library and weights stay in place.
    pub fn regenerate(&mut self, maneuvers: &[Maneuver]) -> Result<()> {
        let library = PatternLibrary::build(
            self.geometry,
            self.width,
            maneuvers,
            self.cfg.wheel_radius,
            self.cfg.degenerate_policy,
        )?;
        self.weights = train(&library);
        self.library = library;
        self.cfg.maneuvers = maneuvers.to_vec();
        self.from_image = false;
        debug!(patterns = self.library.pattern_count(), "library regenerated");
        Ok(())
    }

    pub fn seed(&mut self, pattern: &EncodedPattern) -> Result<()> {
        self.engine.seed(pattern)
    }

    /// Seed from a prefix; the rest of the state is `-1`.
    pub fn seed_partial(&mut self, prefix: &[i8]) -> Result<()> {
        self.engine.seed_partial(prefix)
    }

    /// Seed from per-unit speeds.
    pub fn seed_speeds(&mut self, speeds: &[Vec<i64>]) -> Result<()> {
        let pattern = encode_all(speeds, &self.geometry, self.width)?;
        self.engine.seed(&pattern)
    }

    /// Re-randomize the state from `seed`.
    pub fn reset_state(&mut self, seed: u64) {
        self.engine.randomize(&mut Prng::new(seed));
    }

    pub fn set_execution_tier(&mut self, tier: ExecutionTier) {
        self.cfg.execution_tier = tier;
        self.engine.set_execution_tier(tier);
    }

    /// Synchronous recall, at most `max_iterations` steps.
    pub fn recall(&mut self, max_iterations: usize) -> Result<RecallOutcome> {
        self.require_patterns()?;
        self.engine.recall_sync(&self.weights, max_iterations)
    }

    pub fn step_async_block(&mut self) -> Result<usize> {
        self.require_patterns()?;
        self.engine.step_async_block(&self.weights)
    }

    pub fn step_async_neuron(&mut self) -> Result<usize> {
        self.require_patterns()?;
        self.engine.step_async_neuron(&self.weights)
    }

    /// One control tick: read speeds, seed, relax per `cycle_mode`, push decoded speeds back.
    pub fn control_cycle<A: Actuator>(&mut self, actuator: &mut A) -> Result<SpeedMatrix> {
        self.require_patterns()?;
        let (rows, cols) = actuator.grid();
        if (rows, cols) != (self.geometry.rows(), self.geometry.cols()) {
            return Err(HopfieldError::PatternSizeMismatch {
                expected: self.geometry.unit_count(),
                actual: rows * cols,
            });
        }

        self.seed_speeds(&actuator.all_speeds())?;
        match self.cfg.cycle_mode {
            CycleMode::AsyncBlock => {
                self.engine.step_async_block(&self.weights)?;
            }
            CycleMode::AsyncNeuron => {
                self.engine.step_async_neuron(&self.weights)?;
            }
            CycleMode::Sync => {
                self.engine
                    .recall_sync(&self.weights, self.cfg.max_iterations)?;
            }
        }

        let speeds = self.decoded_speeds()?;
        actuator.set_all_speeds(&speeds);
        Ok(speeds)
    }

    pub fn current_state(&self) -> &NeuronState {
        self.engine.state()
    }

    /// State thresholded to a bipolar pattern.
    pub fn current_pattern(&self) -> EncodedPattern {
        self.engine.state().binarize()
    }

    pub fn decoded_speeds(&self) -> Result<SpeedMatrix> {
        decode_all(self.engine.state().values(), &self.geometry, self.width)
    }

    /// Stored pattern `i` as unit speeds.
    pub fn pattern_speeds(&self, i: usize) -> Option<SpeedMatrix> {
        let pattern = self.library.get(i)?;
        decode_all(pattern.as_slice(), &self.geometry, self.width).ok()
    }

    /// Stored pattern closest to the current state by bit agreement.
    pub fn best_match(&self) -> Option<(usize, usize)> {
        self.library.best_match(self.engine.state().values())
    }

    /// Stored pattern closest to the current state by cosine similarity.
    pub fn assess_recall(&self) -> Option<(usize, f64)> {
        self.library.assess(self.engine.state().values())
    }

    pub fn save_patterns_to<W: Write>(&self, w: &mut W) -> Result<()> {
        Ok(self.library.save_image_to(w)?)
    }

    /// Build a network from a saved pattern image, or regenerate from `cfg`.
    ///
    /// An image that cannot be read, or whose geometry or bit size disagrees
    /// with `cfg`, is logged and ignored.
    pub fn load_or_regenerate<R: Read>(cfg: NetworkConfig, r: &mut R) -> Result<Self> {
        cfg.validate().map_err(HopfieldError::InvalidConfig)?;
        let geometry = cfg.geometry()?;
        let width = BitWidth::new(cfg.bit_size)?;

        match PatternLibrary::load_image_from(r) {
            Ok(library)
                if library.geometry() == geometry
                    && library.width() == width
                    && library.pattern_length() == geometry.unit_count() * width.block_len() =>
            {
                debug!(patterns = library.pattern_count(), "pattern image loaded");
                let cfg = NetworkConfig {
                    maneuvers: library.maneuvers().to_vec(),
                    ..cfg
                };
                let mut net = Self::from_library(cfg, geometry, width, library);
                net.from_image = true;
                Ok(net)
            }
            Ok(library) => {
                warn!(
                    stored_length = library.pattern_length(),
                    expected_length = geometry.unit_count() * width.block_len(),
                    "pattern image does not match configuration; regenerating"
                );
                Self::new(cfg)
            }
            Err(e) => {
                warn!(error = %e, "pattern image unreadable; regenerating");
                Self::new(cfg)
            }
        }
    }

    fn require_patterns(&self) -> Result<()> {
        if self.library.is_empty() {
            return Err(HopfieldError::EmptyLibrary);
        }
        Ok(())
    }
}
