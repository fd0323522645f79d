use std::io::{self, Read, Write};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::codec::{encode_values, BitWidth, EncodedPattern, NeuronBit};
use crate::error::{HopfieldError, Result};
use crate::geometry::{GridGeometry, Maneuver};
use crate::storage;

/// Raw values divided by their largest magnitude; each in `[-1, 1]`.
pub type NormalizedPattern = Vec<f64>;

/// What to do with a maneuver whose geometry is degenerate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum DegeneratePolicy {
    /// Leave the maneuver out of the library.
    #[default]
    Skip,
    /// Store an all-zero (neutral) pattern in its place.
    Neutral,
}

/// The exemplar patterns the network is trained on.
///
/// Built once and replaced wholesale; individual patterns are never edited.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternLibrary {
    geometry: GridGeometry,
    width: BitWidth,
    maneuvers: Vec<Maneuver>,
    normalized: Vec<NormalizedPattern>,
    encoded: Vec<EncodedPattern>,

    // Indices into the requested maneuver list.
    skipped: Vec<usize>,
    substituted: Vec<usize>,
}

impl PatternLibrary {
    /// Generate, normalize and encode one pattern per maneuver.
    ///
    /// Degenerate maneuvers are handled per `policy` and reported through
    /// `skipped()` / `substituted()`. Encoding errors are returned as is.
    pub fn build(
        geometry: GridGeometry,
        width: BitWidth,
        maneuvers: &[Maneuver],
        wheel_radius: f64,
        policy: DegeneratePolicy,
    ) -> Result<Self> {
        let mut lib = Self::empty(geometry, width);

        for (idx, &maneuver) in maneuvers.iter().enumerate() {
            let normalized = match geometry.raw_pattern(maneuver, wheel_radius) {
                Ok(raw) => normalize(&raw),
                Err(HopfieldError::GeometryDegenerate { row, col }) => match policy {
                    DegeneratePolicy::Skip => {
                        warn!(
                            maneuver = idx,
                            row, col, "degenerate geometry; maneuver skipped"
                        );
                        lib.skipped.push(idx);
                        continue;
                    }
                    DegeneratePolicy::Neutral => {
                        warn!(
                            maneuver = idx,
                            row, col, "degenerate geometry; neutral pattern substituted"
                        );
                        lib.substituted.push(idx);
                        vec![0.0; geometry.unit_count()]
                    }
                },
                Err(e) => return Err(e),
            };

            let encoded = encode_values(&normalized, width)?;
            lib.maneuvers.push(maneuver);
            lib.normalized.push(normalized);
            lib.encoded.push(encoded);
        }

        debug!(
            patterns = lib.pattern_count(),
            length = lib.pattern_length(),
            "pattern library built"
        );
        Ok(lib)
    }

    /// A library with no patterns (trains to an all-zero matrix).
    pub fn empty(geometry: GridGeometry, width: BitWidth) -> Self {
        Self {
            geometry,
            width,
            maneuvers: Vec::new(),
            normalized: Vec::new(),
            encoded: Vec::new(),
            skipped: Vec::new(),
            substituted: Vec::new(),
        }
    }

    /// Reassemble a library from stored parts, checking every dimension.
    pub fn from_parts(
        geometry: GridGeometry,
        width: BitWidth,
        maneuvers: Vec<Maneuver>,
        normalized: Vec<NormalizedPattern>,
        encoded: Vec<EncodedPattern>,
    ) -> Result<Self> {
        let count = encoded.len();
        for len in [maneuvers.len(), normalized.len()] {
            if len != count {
                return Err(HopfieldError::PatternSizeMismatch {
                    expected: count,
                    actual: len,
                });
            }
        }

        let units = geometry.unit_count();
        let length = units * width.block_len();
        for (n, e) in normalized.iter().zip(&encoded) {
            if n.len() != units {
                return Err(HopfieldError::PatternSizeMismatch {
                    expected: units,
                    actual: n.len(),
                });
            }
            if e.len() != length {
                return Err(HopfieldError::PatternSizeMismatch {
                    expected: length,
                    actual: e.len(),
                });
            }
        }

        Ok(Self {
            geometry,
            width,
            maneuvers,
            normalized,
            encoded,
            skipped: Vec::new(),
            substituted: Vec::new(),
        })
    }

    pub fn geometry(&self) -> GridGeometry {
        self.geometry
    }

    pub fn width(&self) -> BitWidth {
        self.width
    }

    pub fn pattern_count(&self) -> usize {
        self.encoded.len()
    }

    /// Neurons per pattern: `rows * cols * bit_size`, even when empty.
    pub fn pattern_length(&self) -> usize {
        self.geometry.unit_count() * self.width.block_len()
    }

    pub fn is_empty(&self) -> bool {
        self.encoded.is_empty()
    }

    pub fn get(&self, i: usize) -> Option<&EncodedPattern> {
        self.encoded.get(i)
    }

    pub fn normalized(&self, i: usize) -> Option<&[f64]> {
        self.normalized.get(i).map(Vec::as_slice)
    }

    pub fn maneuvers(&self) -> &[Maneuver] {
        &self.maneuvers
    }

    pub fn patterns(&self) -> &[EncodedPattern] {
        &self.encoded
    }

    pub fn iter(&self) -> impl Iterator<Item = &EncodedPattern> {
        self.encoded.iter()
    }

    pub fn skipped(&self) -> &[usize] {
        &self.skipped
    }

    pub fn substituted(&self) -> &[usize] {
        &self.substituted
    }

    /// Stored pattern with the most bit agreements, as `(index, agreements)`.
    ///
    /// Ties go to the lowest index.
    pub fn best_match<B: NeuronBit>(&self, bits: &[B]) -> Option<(usize, usize)> {
        self.encoded
            .iter()
            .map(|p| p.agreement(bits))
            .enumerate()
            .fold(None, |best, (i, score)| match best {
                Some((_, s)) if s >= score => best,
                _ => Some((i, score)),
            })
    }

    /// Cosine similarity of `state` against every stored pattern.
    ///
    /// Returns the best `(index, similarity)`; a zero state scores 0 everywhere.
    pub fn assess(&self, state: &[f64]) -> Option<(usize, f64)> {
        let norm_s = state.iter().map(|v| v * v).sum::<f64>().sqrt();
        self.encoded
            .iter()
            .map(|p| {
                let norm_p = (p.len() as f64).sqrt();
                let dot: f64 = p
                    .as_slice()
                    .iter()
                    .zip(state)
                    .map(|(&b, &s)| b as f64 * s)
                    .sum();
                if norm_s == 0.0 || norm_p == 0.0 {
                    0.0
                } else {
                    dot / (norm_s * norm_p)
                }
            })
            .enumerate()
            .fold(None, |best, (i, score)| match best {
                Some((_, s)) if s >= score => best,
                _ => Some((i, score)),
            })
    }

    /// Serialize the library as a chunked pattern image.
    ///
    /// Normalized and encoded pattern sets are written as parallel chunks
    /// keyed by maneuver index.
    pub fn save_image_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(storage::MAGIC)?;
        storage::write_u32_le(w, storage::VERSION_CURRENT)?;

        let mut geom = Vec::with_capacity(20);
        storage::write_u32_le(&mut geom, self.geometry.rows() as u32)?;
        storage::write_u32_le(&mut geom, self.geometry.cols() as u32)?;
        storage::write_f64_le(&mut geom, self.geometry.unit_size())?;
        storage::write_u32_le(&mut geom, self.width.bits())?;
        storage::write_chunk(w, *b"GEOM", &geom)?;

        let mut manv = Vec::with_capacity(4 + self.maneuvers.len() * 16);
        storage::write_u32_le(&mut manv, self.maneuvers.len() as u32)?;
        for m in &self.maneuvers {
            storage::write_f64_le(&mut manv, m.forward)?;
            storage::write_f64_le(&mut manv, m.right)?;
        }
        storage::write_chunk(w, *b"MANV", &manv)?;

        let units = self.geometry.unit_count();
        let mut norm = Vec::with_capacity(8 + self.normalized.len() * units * 8);
        storage::write_u32_le(&mut norm, self.normalized.len() as u32)?;
        storage::write_u32_le(&mut norm, units as u32)?;
        for p in &self.normalized {
            for &v in p {
                storage::write_f64_le(&mut norm, v)?;
            }
        }
        storage::write_chunk_lz4(w, *b"NORM", &norm)?;

        let length = self.pattern_length();
        let mut encd = Vec::with_capacity(8 + self.encoded.len() * length);
        storage::write_u32_le(&mut encd, self.encoded.len() as u32)?;
        storage::write_u32_le(&mut encd, length as u32)?;
        for p in &self.encoded {
            encd.extend(p.as_slice().iter().map(|&b| b as u8));
        }
        storage::write_chunk_lz4(w, *b"ENCD", &encd)?;

        Ok(())
    }

    /// Load a pattern image. Unknown chunks are skipped.
    ///
    /// Dimension disagreements surface as `PatternSizeMismatch`; malformed
    /// images as `Io` errors.
    pub fn load_image_from<R: Read>(r: &mut R) -> Result<Self> {
        let magic = storage::read_exact::<8, _>(r)?;
        if &magic != storage::MAGIC {
            return Err(invalid("bad pattern image magic").into());
        }
        let version = storage::read_u32_le(r)?;
        if version != storage::VERSION_CURRENT {
            return Err(invalid("unsupported pattern image version").into());
        }

        let mut geom: Option<(u32, u32, f64, u32)> = None;
        let mut maneuvers: Option<Vec<Maneuver>> = None;
        let mut normalized: Option<Vec<NormalizedPattern>> = None;
        let mut encoded: Option<Vec<Vec<i8>>> = None;

        loop {
            let (tag, len) = match storage::read_chunk_header(r) {
                Ok(v) => v,
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e.into()),
            };

            let mut take = r.take(len as u64);
            match &tag {
                b"GEOM" => {
                    geom = Some((
                        storage::read_u32_le(&mut take)?,
                        storage::read_u32_le(&mut take)?,
                        storage::read_f64_le(&mut take)?,
                        storage::read_u32_le(&mut take)?,
                    ));
                }
                b"MANV" => {
                    let n = storage::read_u32_le(&mut take)? as usize;
                    let mut v = Vec::with_capacity(n.min(1024));
                    for _ in 0..n {
                        let forward = storage::read_f64_le(&mut take)?;
                        let right = storage::read_f64_le(&mut take)?;
                        v.push(Maneuver::new(forward, right));
                    }
                    maneuvers = Some(v);
                }
                b"NORM" => {
                    let payload = storage::read_chunk_lz4_payload(&mut take, len)?;
                    let mut cur = payload.as_slice();
                    let count = storage::read_u32_le(&mut cur)? as usize;
                    let units = storage::read_u32_le(&mut cur)? as usize;
                    let mut sets = Vec::with_capacity(count.min(1024));
                    for _ in 0..count {
                        let mut p = Vec::with_capacity(units.min(1 << 20));
                        for _ in 0..units {
                            p.push(storage::read_f64_le(&mut cur)?);
                        }
                        sets.push(p);
                    }
                    normalized = Some(sets);
                }
                b"ENCD" => {
                    let payload = storage::read_chunk_lz4_payload(&mut take, len)?;
                    let mut cur = payload.as_slice();
                    let count = storage::read_u32_le(&mut cur)? as usize;
                    let length = storage::read_u32_le(&mut cur)? as usize;
                    if cur.len() != count.saturating_mul(length) {
                        return Err(invalid("ENCD payload length mismatch").into());
                    }
                    encoded = Some(
                        cur.chunks_exact(length.max(1))
                            .take(count)
                            .map(|c| c.iter().map(|&b| b as i8).collect())
                            .collect(),
                    );
                }
                _ => {
                    // Unknown chunk: skip.
                }
            }

            // Drain any remaining payload bytes for unknown or partially-read chunks.
            io::copy(&mut take, &mut io::sink())?;
        }

        let (rows, cols, unit_size, bits) = geom.ok_or_else(|| invalid("missing GEOM"))?;
        let maneuvers = maneuvers.ok_or_else(|| invalid("missing MANV"))?;
        let normalized = normalized.ok_or_else(|| invalid("missing NORM"))?;
        let encoded = encoded
            .ok_or_else(|| invalid("missing ENCD"))?
            .into_iter()
            .map(EncodedPattern::from_bits)
            .collect::<Result<Vec<_>>>()?;

        let geometry = GridGeometry::new(rows, cols, unit_size)?;
        let width = BitWidth::new(bits)?;
        Self::from_parts(geometry, width, maneuvers, normalized, encoded)
    }

    /// Exact serialized size in bytes of the pattern image.
    pub fn image_size_bytes(&self) -> io::Result<usize> {
        let mut cw = storage::CountingWriter::new();
        self.save_image_to(&mut cw)?;
        Ok(cw.written())
    }
}

/// Divide every value by the largest magnitude; all zeros stays all zeros.
pub fn normalize(raw: &[f64]) -> NormalizedPattern {
    let max = raw.iter().fold(0.0f64, |m, v| m.max(v.abs()));
    if max == 0.0 {
        return vec![0.0; raw.len()];
    }
    raw.iter().map(|v| v / max).collect()
}

fn invalid(msg: &'static str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg)
}
