//! Immutable lattice terrain and its generators.

use std::collections::VecDeque;

use noise::{Fbm, MultiFractal, NoiseFn, Perlin};
use prey_lattice_core::{BoundaryPolicy, CellCoord, ConfigError, ZoneId};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

const NOISE_START_SPAN: f64 = 1.0e5;
const MAX_NOISE_OCTAVES: usize = 32;

/// Parameters of the square patch generator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchLayout {
    /// Total number of habitable cells the patches should roughly cover.
    pub habitable_area: u32,
    /// Requested number of patches; rounded up to the next square number.
    pub patch_count: u32,
    /// Uninhabitable cells inserted after every patch on both axes.
    pub gap: u32,
}

/// Origin of the noise sampling window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoiseOffset {
    /// Sample from the origin with the default permutation table.
    Origin,
    /// Derive the sampling start and permutation seed from the provided value.
    Seeded(u64),
}

/// Parameters of the fractal noise generator.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct NoiseLayout {
    /// Number of columns in the generated grid.
    pub columns: u32,
    /// Number of rows in the generated grid.
    pub rows: u32,
    /// Cells per unit of noise space; larger values give smoother terrain.
    pub period: f64,
    /// Number of fractal octaves.
    pub octaves: usize,
    /// Threshold subtracted from every sample; cells above it become habitable.
    pub water_level: f64,
    /// Sampling window origin.
    pub offset: NoiseOffset,
}

/// Fixed lattice of zone identifiers with an optional continuous habitat layer.
#[derive(Clone, Debug, PartialEq)]
pub struct TerrainGrid {
    columns: u32,
    rows: u32,
    zones: Vec<ZoneId>,
    habitat: Option<Vec<f64>>,
    boundary: BoundaryPolicy,
}

impl TerrainGrid {
    /// Builds a grid from explicit row-major zone identifiers.
    pub fn from_zones(
        columns: u32,
        rows: u32,
        zones: Vec<ZoneId>,
        boundary: BoundaryPolicy,
    ) -> Result<Self, ConfigError> {
        let expected = cell_total(columns, rows)?;
        if zones.len() != expected {
            return Err(ConfigError::ZoneCountMismatch {
                expected,
                actual: zones.len(),
            });
        }
        Ok(Self {
            columns,
            rows,
            zones,
            habitat: None,
            boundary,
        })
    }

    /// Builds a grid whose every cell belongs to zone 1.
    pub fn uniform(columns: u32, rows: u32, boundary: BoundaryPolicy) -> Result<Self, ConfigError> {
        let count = cell_total(columns, rows)?;
        Self::from_zones(columns, rows, vec![ZoneId::new(1); count], boundary)
    }

    /// Attaches a row-major continuous habitat layer to the grid.
    pub fn with_habitat_values(mut self, values: Vec<f64>) -> Result<Self, ConfigError> {
        if values.len() != self.zones.len() {
            return Err(ConfigError::ZoneCountMismatch {
                expected: self.zones.len(),
                actual: values.len(),
            });
        }
        self.habitat = Some(values);
        Ok(self)
    }

    /// Generates a square grid of equally sized square patches separated by gaps.
    pub fn from_patches(
        layout: PatchLayout,
        boundary: BoundaryPolicy,
    ) -> Result<Self, ConfigError> {
        let invalid = ConfigError::InvalidPatchLayout {
            habitable_area: layout.habitable_area,
            patch_count: layout.patch_count,
            gap: layout.gap,
        };
        if layout.patch_count == 0 || layout.habitable_area == 0 {
            return Err(invalid);
        }

        let side = ceil_sqrt(layout.patch_count);
        let per_patch = f64::from(layout.habitable_area) / f64::from(side).powi(2);
        let patch_size = per_patch.sqrt().ceil() as u32;
        let stride = patch_size.checked_add(layout.gap).ok_or(invalid.clone())?;
        let edge = stride.checked_mul(side).ok_or(invalid.clone())?;
        let count = cell_total(edge, edge).map_err(|_| invalid)?;

        let mut zones = vec![ZoneId::UNINHABITABLE; count];
        let width = edge as usize;
        for i in 0..side {
            for j in 0..side {
                let zone = ZoneId::new(i * side + j + 1);
                let row_start = (i * stride) as usize;
                let column_start = (j * stride) as usize;
                for row in row_start..row_start + patch_size as usize {
                    let start = row * width + column_start;
                    zones[start..start + patch_size as usize].fill(zone);
                }
            }
        }

        Self::from_zones(edge, edge, zones, boundary)
    }

    /// Generates terrain from thresholded fractal Perlin noise.
    ///
    /// Every 4-connected island of habitable cells becomes its own zone and the
    /// raw thresholded samples are kept as the habitat layer.
    pub fn from_noise(layout: &NoiseLayout, boundary: BoundaryPolicy) -> Result<Self, ConfigError> {
        if !(layout.period.is_finite() && layout.period > 0.0) {
            return Err(ConfigError::InvalidNoiseLayout("period must be positive"));
        }
        if !(1..=MAX_NOISE_OCTAVES).contains(&layout.octaves) {
            return Err(ConfigError::InvalidNoiseLayout(
                "octaves must lie within [1, 32]",
            ));
        }
        if !layout.water_level.is_finite() {
            return Err(ConfigError::InvalidNoiseLayout("water level must be finite"));
        }
        let count = cell_total(layout.columns, layout.rows)?;

        let (start, permutation_seed) = match layout.offset {
            NoiseOffset::Origin => (0.0, Perlin::DEFAULT_SEED),
            NoiseOffset::Seeded(seed) => {
                let mut rng = ChaCha8Rng::seed_from_u64(seed);
                let start = rng.gen::<f64>() * NOISE_START_SPAN;
                (start, rng.gen::<u32>())
            }
        };
        let fbm = Fbm::<Perlin>::new(permutation_seed).set_octaves(layout.octaves);

        let mut values = Vec::with_capacity(count);
        for row in 0..layout.rows {
            for column in 0..layout.columns {
                let x = start + f64::from(column) / layout.period;
                let y = start + f64::from(row) / layout.period;
                values.push(fbm.get([x, y]) - layout.water_level);
            }
        }

        let mask = Self {
            columns: layout.columns,
            rows: layout.rows,
            zones: values
                .iter()
                .map(|value| {
                    if *value > 0.0 {
                        ZoneId::new(1)
                    } else {
                        ZoneId::UNINHABITABLE
                    }
                })
                .collect(),
            habitat: None,
            boundary,
        };
        let zones = mask.label_islands();
        Self::from_zones(layout.columns, layout.rows, zones, boundary)?.with_habitat_values(values)
    }

    fn label_islands(&self) -> Vec<ZoneId> {
        let mut labels = vec![ZoneId::UNINHABITABLE; self.zones.len()];
        let mut next_zone = 1;
        let mut frontier = VecDeque::new();

        for seed in self.habitable_cells() {
            let Some(seed_index) = self.index(seed) else {
                continue;
            };
            if labels[seed_index].is_habitable() {
                continue;
            }
            let zone = ZoneId::new(next_zone);
            next_zone += 1;
            labels[seed_index] = zone;
            frontier.push_back(seed);

            while let Some(cell) = frontier.pop_front() {
                for neighbor in self.neighbors(cell).iter() {
                    let Some(index) = self.index(neighbor) else {
                        continue;
                    };
                    if self.zones[index].is_habitable() && !labels[index].is_habitable() {
                        labels[index] = zone;
                        frontier.push_back(neighbor);
                    }
                }
            }
        }

        labels
    }

    /// Zone of the provided cell; cells outside the lattice report zone 0.
    #[must_use]
    pub fn zone_at(&self, cell: CellCoord) -> ZoneId {
        self.index(cell)
            .and_then(|index| self.zones.get(index).copied())
            .unwrap_or(ZoneId::UNINHABITABLE)
    }

    /// Reports whether agents may occupy the provided cell.
    #[must_use]
    pub fn is_habitable(&self, cell: CellCoord) -> bool {
        self.zone_at(cell).is_habitable()
    }

    /// Reports whether the coordinate lies inside the lattice.
    #[must_use]
    pub const fn contains(&self, cell: CellCoord) -> bool {
        cell.column() < self.columns && cell.row() < self.rows
    }

    /// Von Neumann neighbourhood of the cell under the grid's boundary policy.
    ///
    /// Duplicates produced by wrapping on narrow axes are dropped, so a 1×1
    /// toroidal grid reports the cell itself as its only neighbour.
    #[must_use]
    pub fn neighbors(&self, cell: CellCoord) -> Neighbors {
        let mut neighbors = Neighbors::default();
        if !self.contains(cell) {
            return neighbors;
        }

        let (column, row) = (cell.column(), cell.row());
        let candidates = match self.boundary {
            BoundaryPolicy::Toroidal => [
                Some(CellCoord::new(column, wrap_decrement(row, self.rows))),
                Some(CellCoord::new(wrap_increment(column, self.columns), row)),
                Some(CellCoord::new(column, wrap_increment(row, self.rows))),
                Some(CellCoord::new(wrap_decrement(column, self.columns), row)),
            ],
            BoundaryPolicy::Clipped => [
                row.checked_sub(1).map(|north| CellCoord::new(column, north)),
                column
                    .checked_add(1)
                    .filter(|east| *east < self.columns)
                    .map(|east| CellCoord::new(east, row)),
                row.checked_add(1)
                    .filter(|south| *south < self.rows)
                    .map(|south| CellCoord::new(column, south)),
                column.checked_sub(1).map(|west| CellCoord::new(west, row)),
            ],
        };

        for candidate in candidates.into_iter().flatten() {
            neighbors.push_unique(candidate);
        }
        neighbors
    }

    /// Continuous habitat value of the cell, when the grid carries a habitat layer.
    #[must_use]
    pub fn habitat_value(&self, cell: CellCoord) -> Option<f64> {
        let index = self.index(cell)?;
        self.habitat.as_ref()?.get(index).copied()
    }

    /// Reports whether the grid carries a continuous habitat layer.
    #[must_use]
    pub fn has_habitat_layer(&self) -> bool {
        self.habitat.is_some()
    }

    /// Habitable cells in row-major order.
    #[must_use]
    pub fn habitable_cells(&self) -> Vec<CellCoord> {
        self.cells()
            .filter(|cell| self.is_habitable(*cell))
            .collect()
    }

    /// Iterates over every cell coordinate in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = CellCoord> + '_ {
        let columns = self.columns;
        (0..self.rows)
            .flat_map(move |row| (0..columns).map(move |column| CellCoord::new(column, row)))
    }

    /// Number of columns and rows in the grid.
    #[must_use]
    pub const fn dimensions(&self) -> (u32, u32) {
        (self.columns, self.rows)
    }

    /// Edge behaviour chosen at construction.
    #[must_use]
    pub const fn boundary(&self) -> BoundaryPolicy {
        self.boundary
    }

    /// Total number of cells in the grid.
    #[must_use]
    pub fn cell_count(&self) -> usize {
        self.zones.len()
    }

    /// Row-major zone identifiers.
    #[must_use]
    pub fn zones(&self) -> &[ZoneId] {
        &self.zones
    }

    pub(crate) fn index(&self, cell: CellCoord) -> Option<usize> {
        if self.contains(cell) {
            let row = usize::try_from(cell.row()).ok()?;
            let column = usize::try_from(cell.column()).ok()?;
            let width = usize::try_from(self.columns).ok()?;
            Some(row * width + column)
        } else {
            None
        }
    }
}

/// Up to four distinct neighbouring cells.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Neighbors {
    cells: [Option<CellCoord>; 4],
    len: usize,
}

impl Neighbors {
    fn push_unique(&mut self, cell: CellCoord) {
        if self.contains(cell) || self.len == self.cells.len() {
            return;
        }
        self.cells[self.len] = Some(cell);
        self.len += 1;
    }

    /// Iterates over the neighbouring cells in north, east, south, west order.
    pub fn iter(&self) -> impl Iterator<Item = CellCoord> + '_ {
        self.cells[..self.len].iter().flatten().copied()
    }

    /// Number of distinct neighbours.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Reports whether the cell has no neighbours.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Reports whether the provided cell is one of the neighbours.
    #[must_use]
    pub fn contains(&self, cell: CellCoord) -> bool {
        self.iter().any(|candidate| candidate == cell)
    }
}

fn cell_total(columns: u32, rows: u32) -> Result<usize, ConfigError> {
    if columns == 0 || rows == 0 {
        return Err(ConfigError::EmptyGrid);
    }
    usize::try_from(u64::from(columns) * u64::from(rows)).map_err(|_| ConfigError::EmptyGrid)
}

fn ceil_sqrt(value: u32) -> u32 {
    let mut root = f64::from(value).sqrt().ceil() as u32;
    while u64::from(root) * u64::from(root) < u64::from(value) {
        root += 1;
    }
    while root > 1 && u64::from(root - 1) * u64::from(root - 1) >= u64::from(value) {
        root -= 1;
    }
    root
}

fn wrap_increment(value: u32, bound: u32) -> u32 {
    if value + 1 >= bound {
        0
    } else {
        value + 1
    }
}

fn wrap_decrement(value: u32, bound: u32) -> u32 {
    if value == 0 {
        bound - 1
    } else {
        value - 1
    }
}
