//! Synthetic coordinate system for a dataset that has no voxel data.

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::mesh::Mesh;

/// How the single scale of the dataset is sized.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ExtentMode {
    /// Resolution and volume size are physical quantities given by the caller
    /// and written unchanged.
    Fixed {
        resolution: [f64; 3],
        volume_size: [u64; 3],
    },

    /// Resolution is the bounding maximum of every vertex in the build, so the
    /// whole dataset fits inside one voxel of size `(1, 1, 1)`.
    #[default]
    Derived,

    /// Resolution is `resolution * volume_size`: the configured volume is
    /// collapsed into one voxel of size `(1, 1, 1)`.
    Collapsed {
        resolution: [f64; 3],
        volume_size: [u64; 3],
    },
}

/// Physical size of one coordinate unit and the volume size in those units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub resolution: [f64; 3],
    pub volume_size: [u64; 3],
}

impl Extent {
    /// Physical size covered by the volume on each axis.
    pub fn physical_size(&self) -> [f64; 3] {
        [
            self.resolution[0] * self.volume_size[0] as f64,
            self.resolution[1] * self.volume_size[1] as f64,
            self.resolution[2] * self.volume_size[2] as f64,
        ]
    }

    /// A scale the viewer can use: every resolution component finite and positive.
    pub fn is_usable(&self) -> bool {
        self.resolution.iter().all(|r| r.is_finite() && *r > 0.0)
    }
}

/// Folds mesh bounds into a running maximum and produces the dataset [`Extent`].
#[derive(Debug, Clone)]
pub struct ExtentCalculator {
    mode: ExtentMode,
    max: [f64; 3],
    meshes: usize,
    finalized: bool,
}

impl ExtentCalculator {
    pub fn new(mode: ExtentMode) -> Self {
        Self {
            mode,
            max: [0.0; 3],
            meshes: 0,
            finalized: false,
        }
    }

    pub fn mode(&self) -> ExtentMode {
        self.mode
    }

    /// Number of meshes folded in so far.
    pub fn meshes_seen(&self) -> usize {
        self.meshes
    }

    /// Component-wise maximum of every vertex seen so far, starting from zero.
    pub fn running_max(&self) -> [f64; 3] {
        self.max
    }

    pub fn update(&mut self, mesh: &Mesh) -> Result<()> {
        if self.finalized {
            return Err(Error::CalculatorFinalized);
        }

        if let Some(corner) = mesh.max_corner() {
            for (axis, value) in corner.into_iter().enumerate() {
                // NaN never wins a comparison, so it cannot poison the maximum.
                if value > self.max[axis] {
                    self.max[axis] = value;
                }
            }
        }

        self.meshes += 1;
        Ok(())
    }

    /// Produce the extent. May only be called once.
    pub fn finalize(&mut self) -> Result<Extent> {
        if self.finalized {
            return Err(Error::CalculatorFinalized);
        }
        self.finalized = true;

        let extent = match self.mode {
            ExtentMode::Fixed {
                resolution,
                volume_size,
            } => Extent {
                resolution,
                volume_size,
            },
            ExtentMode::Derived => Extent {
                resolution: self.max,
                volume_size: [1, 1, 1],
            },
            ExtentMode::Collapsed {
                resolution,
                volume_size,
            } => Extent {
                resolution: [
                    resolution[0] * volume_size[0] as f64,
                    resolution[1] * volume_size[1] as f64,
                    resolution[2] * volume_size[2] as f64,
                ],
                volume_size: [1, 1, 1],
            },
        };

        if !matches!(self.mode, ExtentMode::Derived) {
            let physical = extent.physical_size();
            if (0..3).any(|axis| self.max[axis] > physical[axis]) {
                warn!(
                    "Meshes reach [{:.3}, {:.3}, {:.3}] but the configured volume only covers [{:.3}, {:.3}, {:.3}]",
                    self.max[0], self.max[1], self.max[2], physical[0], physical[1], physical[2]
                );
            }
        }

        debug!(
            "Extent from {} meshes ({:?}): resolution={:?} size={:?}",
            self.meshes, self.mode, extent.resolution, extent.volume_size
        );

        Ok(extent)
    }
}
