#[cfg(feature = "serde")]
use serde::Serialize;

use crate::adapter::SpeedMatrix;
use crate::network::SwarmNetwork;

/// A read-only snapshot of what the network is doing.
///
/// Design intent:
/// - Observers cannot mutate or steer the network.
/// - Snapshotting is *on-demand* and allocates; the control loop stays unchanged.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct NetworkSnapshot {
    /// Raw neuron values, each in `[-1, 1]`.
    pub state: Vec<f64>,
    /// State thresholded to ±1.
    pub pattern: Vec<i8>,
    pub decoded_speeds: SpeedMatrix,
    /// Centered grid positions, row-major, for plotting.
    pub positions: Vec<(f64, f64)>,
    /// `(pattern index, agreeing bits)` of the closest stored pattern.
    pub best_match: Option<(usize, usize)>,
    pub pattern_count: usize,
    pub neuron_count: usize,
}

pub struct NetworkAdapter<'a> {
    network: &'a SwarmNetwork,
}

impl<'a> NetworkAdapter<'a> {
    pub fn new(network: &'a SwarmNetwork) -> Self {
        Self { network }
    }

    pub fn snapshot(&self) -> NetworkSnapshot {
        let net = self.network;
        NetworkSnapshot {
            state: net.current_state().values().to_vec(),
            pattern: net.current_pattern().into_inner(),
            // State length is fixed at construction, so decoding cannot fail here.
            decoded_speeds: net.decoded_speeds().unwrap_or_default(),
            positions: net.geometry().centered_positions(),
            best_match: net.best_match(),
            pattern_count: net.library().pattern_count(),
            neuron_count: net.neuron_count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::NetworkConfig;

    #[test]
    fn snapshot_reflects_seeded_state() {
        let mut net = SwarmNetwork::new(NetworkConfig::default().with_seed(3)).unwrap();
        let left = net.library().get(1).unwrap().clone();
        net.seed(&left).unwrap();

        let snap = NetworkAdapter::new(&net).snapshot();
        assert_eq!(snap.neuron_count, 36);
        assert_eq!(snap.pattern_count, 3);
        assert_eq!(snap.pattern, left.as_slice());
        assert_eq!(snap.best_match, Some((1, 36)));
        assert_eq!(snap.positions.len(), 9);
        assert_eq!(snap.decoded_speeds, net.pattern_speeds(1).unwrap());
    }
}
