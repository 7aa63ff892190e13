//! Traversal cost grid and the per-call risk overlay.
//!
//! Cells hold a cost in `0..=255`: `FREE_COST` is open road and
//! `LETHAL_COST` can never be entered. Greyscale rasters use the opposite
//! convention (bright = free), so they are inverted once on load.

use crate::error::{PlannerError, Result};
use image::GrayImage;
use std::path::Path;
use tracing::info;

pub const FREE_COST: u8 = 0;
pub const LETHAL_COST: u8 = u8::MAX;

/// Immutable row-major grid of cell costs, indexed `[z][x]`.
#[derive(Debug, Clone, PartialEq)]
pub struct CostMap {
    width: usize,
    height: usize,
    cells: Vec<u8>,
    out_of_bounds_cost: u8,
}

impl CostMap {
    pub fn new(width: usize, height: usize, cells: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(PlannerError::CostMap(format!(
                "map dimensions must be positive, got {}x{}",
                width, height
            )));
        }
        if cells.len() != width * height {
            return Err(PlannerError::CostMap(format!(
                "expected {} cells for a {}x{} map, got {}",
                width * height,
                width,
                height,
                cells.len()
            )));
        }
        Ok(CostMap {
            width,
            height,
            cells,
            out_of_bounds_cost: LETHAL_COST,
        })
    }

    /// Map with every cell set to `cost`.
    pub fn filled(width: usize, height: usize, cost: u8) -> Result<Self> {
        Self::new(width, height, vec![cost; width * height])
    }

    pub fn from_fn(width: usize, height: usize, f: impl Fn(usize, usize) -> u8) -> Result<Self> {
        let mut cells = Vec::with_capacity(width * height);
        for z in 0..height {
            for x in 0..width {
                cells.push(f(x, z));
            }
        }
        Self::new(width, height, cells)
    }

    /// Build from a greyscale image where bright pixels are free.
    pub fn from_luma(img: &GrayImage) -> Result<Self> {
        let (w, h) = img.dimensions();
        Self::from_fn(w as usize, h as usize, |x, z| {
            u8::MAX - img.get_pixel(x as u32, z as u32).0[0]
        })
    }

    /// Load a greyscale raster (PGM or any format `image` can decode).
    pub fn load(path: &Path) -> Result<Self> {
        let img = image::open(path)?.into_luma8();
        let map = Self::from_luma(&img)?;
        info!(
            "Loaded cost map {} ({}x{} cells)",
            path.display(),
            map.width,
            map.height
        );
        Ok(map)
    }

    pub fn with_out_of_bounds_cost(mut self, cost: u8) -> Self {
        self.out_of_bounds_cost = cost;
        self
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn out_of_bounds_cost(&self) -> u8 {
        self.out_of_bounds_cost
    }

    pub fn cells(&self) -> &[u8] {
        &self.cells
    }

    #[inline]
    pub fn contains(&self, x: f64, z: f64) -> bool {
        x >= 0.0 && z >= 0.0 && x < self.width as f64 && z < self.height as f64
    }

    /// Cost of cell `(x, z)`, `None` outside the map.
    #[inline]
    pub fn cell(&self, x: usize, z: usize) -> Option<u8> {
        if x < self.width && z < self.height {
            Some(self.cells[z * self.width + x])
        } else {
            None
        }
    }

    /// Cost of the cell containing the continuous point `(x, z)`.
    #[inline]
    pub fn cost_at(&self, x: f64, z: f64) -> u8 {
        if !self.contains(x, z) {
            return self.out_of_bounds_cost;
        }
        self.cells[z as usize * self.width + x as usize]
    }
}

/// Transient extra cost for a single planning call, e.g. predicted
/// positions of other road users. Effective cost is `max(base, overlay)`.
#[derive(Debug, Clone)]
pub struct RiskOverlay {
    width: usize,
    height: usize,
    cells: Vec<u8>,
}

impl RiskOverlay {
    pub fn from_fn(width: usize, height: usize, f: impl Fn(usize, usize) -> u8) -> Self {
        let mut cells = Vec::with_capacity(width * height);
        for z in 0..height {
            for x in 0..width {
                cells.push(f(x, z));
            }
        }
        RiskOverlay {
            width,
            height,
            cells,
        }
    }

    /// Build from a reward image where bright pixels are safe.
    pub fn from_luma(img: &GrayImage) -> Self {
        let (w, h) = img.dimensions();
        Self::from_fn(w as usize, h as usize, |x, z| {
            u8::MAX - img.get_pixel(x as u32, z as u32).0[0]
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    fn cell(&self, x: usize, z: usize) -> u8 {
        if x < self.width && z < self.height {
            self.cells[z * self.width + x]
        } else {
            FREE_COST
        }
    }
}

/// Cost map combined with an optional overlay for one search.
#[derive(Clone, Copy)]
pub struct CostView<'a> {
    pub map: &'a CostMap,
    pub overlay: Option<&'a RiskOverlay>,
}

impl<'a> CostView<'a> {
    pub fn new(map: &'a CostMap, overlay: Option<&'a RiskOverlay>) -> Self {
        CostView { map, overlay }
    }

    #[inline]
    pub fn contains(&self, x: f64, z: f64) -> bool {
        self.map.contains(x, z)
    }

    #[inline]
    pub fn cost_at(&self, x: f64, z: f64) -> u8 {
        let base = self.map.cost_at(x, z);
        match self.overlay {
            Some(overlay) if self.map.contains(x, z) => {
                base.max(overlay.cell(x as usize, z as usize))
            }
            _ => base,
        }
    }
}
