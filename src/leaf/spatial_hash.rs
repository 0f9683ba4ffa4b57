//! 2-D grid spatial hash for neighbor lookups in a bounded domain

use glam::Vec2;

#[derive(Clone, Copy, Debug)]
struct Entry {
    id: usize,
    position: Vec2,
}

/// Uniform grid over a fixed bounding box. Queries scan the covering cell
/// rectangle and filter by squared distance, so a radius query costs O(k)
/// in the number of returned neighbors.
pub struct SpatialHash2D {
    cell_size: f32,
    min_bound: Vec2,
    grid_width: usize,
    grid_height: usize,
    cells: Vec<Vec<Entry>>,
}

impl SpatialHash2D {
    pub fn new(cell_size: f32, min_bound: Vec2, max_bound: Vec2) -> Self {
        let cell_size = cell_size.max(1e-6);
        let range = max_bound - min_bound;
        let grid_width = ((range.x / cell_size).ceil() as usize).max(1) + 1;
        let grid_height = ((range.y / cell_size).ceil() as usize).max(1) + 1;
        Self {
            cell_size,
            min_bound,
            grid_width,
            grid_height,
            cells: vec![Vec::new(); grid_width * grid_height],
        }
    }

    fn to_cell(&self, pos: Vec2) -> (usize, usize) {
        let cx = ((pos.x - self.min_bound.x) / self.cell_size) as isize;
        let cy = ((pos.y - self.min_bound.y) / self.cell_size) as isize;
        (
            cx.clamp(0, self.grid_width as isize - 1) as usize,
            cy.clamp(0, self.grid_height as isize - 1) as usize,
        )
    }

    fn cell_index(&self, cx: usize, cy: usize) -> usize {
        cy * self.grid_width + cx
    }

    pub fn insert(&mut self, id: usize, pos: Vec2) {
        let (cx, cy) = self.to_cell(pos);
        let index = self.cell_index(cx, cy);
        self.cells[index].push(Entry { id, position: pos });
    }

    /// Ids of all inserted points within `radius` of `center`.
    pub fn query_radius(&self, center: Vec2, radius: f32) -> Vec<usize> {
        let mut result = Vec::new();
        let radius_sq = radius * radius;

        let (cx_min, cy_min) = self.to_cell(center - Vec2::splat(radius));
        let (cx_max, cy_max) = self.to_cell(center + Vec2::splat(radius));

        for cy in cy_min..=cy_max {
            for cx in cx_min..=cx_max {
                for entry in &self.cells[self.cell_index(cx, cy)] {
                    if (entry.position - center).length_squared() <= radius_sq {
                        result.push(entry.id);
                    }
                }
            }
        }

        result
    }

    pub fn clear(&mut self) {
        for cell in &mut self.cells {
            cell.clear();
        }
    }
}
