// Minimal PRNG (no external crates).
//
// This is NOT cryptographically secure.
// It is used only for state initialization and asynchronous unit selection,
// so a fixed seed replays the same relaxation sequence.

#[derive(Debug, Clone)]
pub struct Prng {
    state: u64,
}

impl Prng {
    pub fn new(seed: u64) -> Self {
        // Avoid a zero state.
        let seed = if seed == 0 { 0x9E3779B97F4A7C15 } else { seed };
        Self { state: seed }
    }

    #[inline]
    fn next_u64(&mut self) -> u64 {
        // xorshift64*
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545F4914F6CDD1D)
    }

    #[inline]
    pub fn next_u32(&mut self) -> u32 {
        (self.next_u64() >> 32) as u32
    }

    #[inline]
    pub fn next_f64_01(&mut self) -> f64 {
        // 53 random mantissa bits -> [0,1).
        let x = self.next_u64() >> 11;
        (x as f64) / ((1u64 << 53) as f64)
    }

    #[inline]
    pub fn gen_range_f64(&mut self, low: f64, high: f64) -> f64 {
        low + (high - low) * self.next_f64_01()
    }

    #[inline]
    pub fn gen_range_usize(&mut self, low: usize, high: usize) -> usize {
        if high <= low {
            return low;
        }
        let span = (high - low) as u64;
        let v = self.next_u64() % span;
        low + v as usize
    }
}

/// Source of unit (or neuron) indices for asynchronous updates.
///
/// Implementations must return a value in `0..upper`; the recall engine wraps
/// anything larger.
pub trait UnitPicker {
    fn pick(&mut self, upper: usize) -> usize;
}

impl UnitPicker for Prng {
    fn pick(&mut self, upper: usize) -> usize {
        self.gen_range_usize(0, upper)
    }
}

/// Replays a fixed index sequence, cycling when exhausted.
#[derive(Debug, Clone, Default)]
pub struct ScriptedPicker {
    script: Vec<usize>,
    cursor: usize,
}

impl ScriptedPicker {
    pub fn new(script: impl Into<Vec<usize>>) -> Self {
        Self {
            script: script.into(),
            cursor: 0,
        }
    }

    /// Number of picks served so far.
    pub fn consumed(&self) -> usize {
        self.cursor
    }
}

impl UnitPicker for ScriptedPicker {
    fn pick(&mut self, upper: usize) -> usize {
        if self.script.is_empty() || upper == 0 {
            return 0;
        }
        let v = self.script[self.cursor % self.script.len()];
        self.cursor += 1;
        v % upper
    }
}
