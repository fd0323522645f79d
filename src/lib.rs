//! # hopswarm
//!
//! Swarm motion control through a Hopfield associative memory.
//!
//! Each unit of a `rows × cols` swarm gets its speed command from a block of
//! `bit_size` bipolar neurons. The network stores a handful of maneuver
//! patterns ("turn right", "turn left", "go straight") as attractors and
//! relaxes a seeded (partial, noisy, or measured) state toward them.
//!
//! ## Quick Start
//!
//! ```
//! use hopswarm::prelude::*;
//!
//! let cfg = NetworkConfig::default().with_seed(7);
//! let mut net = SwarmNetwork::new(cfg).unwrap();
//!
//! // Seed with a stored maneuver and relax synchronously.
//! let right = net.library().get(0).unwrap().clone();
//! net.seed(&right).unwrap();
//! let outcome = net.recall(10).unwrap();
//! assert!(outcome.converged);
//!
//! // Drive a swarm for one control cycle.
//! let mut swarm = SpeedTable::new(3, 3);
//! let speeds = net.control_cycle(&mut swarm).unwrap();
//! assert_eq!(speeds.len(), 3);
//! ```
//!
//! ## Feature Flags
//!
//! - `serde` (default): serialization for configuration and snapshots
//! - `parallel`: multi-threaded synchronous recall via rayon
//! - `simd`: SIMD dot products via the `wide` crate
//!
//! ## Modules
//!
//! - [`geometry`]: grid layout and raw maneuver patterns
//! - [`codec`]: bipolar sign-magnitude encoding
//! - [`library`]: normalized and encoded exemplar patterns
//! - [`weights`]: Hebbian weight training
//! - [`recall`]: relaxation dynamics
//! - [`adapter`]: neuron blocks to unit speeds and back
//! - [`network`]: the controller that ties them together
//! - [`observer`]: read-only snapshots for visualization

#[path = "core/error.rs"]
pub mod error;

#[path = "core/prng.rs"]
pub mod prng;

#[path = "core/geometry.rs"]
pub mod geometry;

#[path = "core/codec.rs"]
pub mod codec;

#[path = "core/library.rs"]
pub mod library;

#[path = "core/weights.rs"]
pub mod weights;

#[path = "core/recall.rs"]
pub mod recall;

#[path = "core/adapter.rs"]
pub mod adapter;

#[path = "core/network.rs"]
pub mod network;

#[path = "core/storage.rs"]
pub mod storage;

pub mod observer;

/// Prelude module for convenient imports.
///
/// ```
/// use hopswarm::prelude::*;
/// ```
pub mod prelude {
    pub use crate::adapter::{decode_all, encode_all, Actuator, SpeedMatrix, SpeedTable};
    pub use crate::codec::{decode_value, encode_value, BitWidth, EncodedPattern, NeuronBit};
    pub use crate::error::{HopfieldError, Result};
    pub use crate::geometry::{GridGeometry, Maneuver};
    pub use crate::library::{DegeneratePolicy, PatternLibrary};
    pub use crate::network::{CycleMode, NetworkConfig, SwarmNetwork};
    pub use crate::prng::{Prng, ScriptedPicker, UnitPicker};
    pub use crate::recall::{ExecutionTier, NeuronState, RecallEngine, RecallOutcome};
    pub use crate::weights::{train, WeightMatrix};
}
