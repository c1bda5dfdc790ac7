//! Cell lattice covering the viewport plus an overscan margin.

use rand::Rng;

use crate::blob::random_between;

/// Cells of overscan on each side of the visible area.
pub const MARGIN_CELLS: usize = 3;

/// Immutable per-viewport cell data, stored as parallel arrays in row-major order.
#[derive(Clone, Debug)]
pub struct Lattice {
    pub columns: usize,
    pub rows: usize,
    pub cell_count: usize,
    pub cell_size: f32,
    pub offset_x: f32,
    pub offset_y: f32,
    pub centers_x: Vec<f32>,
    pub centers_y: Vec<f32>,
    pub cell_columns: Vec<f32>,
    pub cell_rows: Vec<f32>,
    pub base_brightness: Vec<f32>,
    pub jitter: Vec<f32>,
    pub palette_bias: Vec<f32>,
}

impl Lattice {
    pub fn build<R: Rng + ?Sized>(width: f32, height: f32, cell_size: f32, rng: &mut R) -> Self {
        let cell_size = if cell_size.is_finite() { cell_size.max(1.0) } else { 1.0 };
        let span = |px: f32| -> usize {
            if px.is_finite() && px > 0.0 {
                (px / cell_size).ceil() as usize
            } else {
                0
            }
        };

        let columns = span(width) + MARGIN_CELLS * 2;
        let rows = span(height) + MARGIN_CELLS * 2;
        let offset = -cell_size * MARGIN_CELLS as f32;
        let half = cell_size / 2.0;
        let cell_count = columns * rows;

        let mut lattice = Self {
            columns,
            rows,
            cell_count,
            cell_size,
            offset_x: offset,
            offset_y: offset,
            centers_x: Vec::with_capacity(cell_count),
            centers_y: Vec::with_capacity(cell_count),
            cell_columns: Vec::with_capacity(cell_count),
            cell_rows: Vec::with_capacity(cell_count),
            base_brightness: Vec::with_capacity(cell_count),
            jitter: Vec::with_capacity(cell_count),
            palette_bias: Vec::with_capacity(cell_count),
        };

        for row in 0..rows {
            // top of the screen sits slightly brighter
            let gradient = 0.14 + (1.0 - row as f32 / rows as f32) * 0.06;
            let cy = offset + row as f32 * cell_size + half;
            for col in 0..columns {
                let jitter = random_between(rng, -0.05, 0.05);
                let bias = rng.gen::<f32>() - 0.5;

                lattice.centers_x.push(offset + col as f32 * cell_size + half);
                lattice.centers_y.push(cy);
                lattice.cell_columns.push(col as f32);
                lattice.cell_rows.push(row as f32);
                lattice.base_brightness.push(gradient + jitter * 0.12);
                lattice.jitter.push(jitter);
                lattice.palette_bias.push(bias);
            }
        }

        lattice
    }

    #[inline]
    pub fn index(&self, col: usize, row: usize) -> usize {
        row * self.columns + col
    }
}

/// Per-cell start delay for the staggered reveal, in milliseconds.
#[derive(Clone, Debug)]
pub struct RevealDelays {
    delays: Vec<f32>,
}

impl RevealDelays {
    pub fn build<R: Rng + ?Sized>(
        cell_count: usize,
        reveal_fade: f32,
        reveal_duration: f32,
        rng: &mut R,
    ) -> Self {
        let delays = (0..cell_count)
            .map(|_| random_between(rng, -reveal_fade * 0.65, reveal_duration).max(0.0))
            .collect();
        Self { delays }
    }

    /// Every cell starts revealing at the same moment.
    pub fn uniform(cell_count: usize, delay: f32) -> Self {
        Self {
            delays: vec![delay.max(0.0); cell_count],
        }
    }

    #[inline]
    pub fn get(&self, idx: usize) -> f32 {
        self.delays.get(idx).copied().unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.delays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.delays.is_empty()
    }
}
