use ndarray::Array2;

/// Classification of one gate while its sweep is being unfolded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    /// Value trusted and used to unfold neighbors.
    Dealiased,
    /// Still waiting for a reference.
    Pending,
    /// Absent, filtered, removed, or written but not trusted by neighbors.
    Missing,
    /// Spatial continuity could not decide; left for the window fallback.
    Unsuccessful,
}

/// Up to eight neighbor cells as `(ray, gate)`.
#[derive(Debug, Clone, Copy)]
pub struct Neighborhood {
    cells: [(usize, usize); 8],
    len: usize,
}

impl Neighborhood {
    fn new() -> Self {
        Self {
            cells: [(0, 0); 8],
            len: 0,
        }
    }

    fn push(&mut self, cell: (usize, usize)) {
        if self.len < self.cells.len() && !self.cells[..self.len].contains(&cell) {
            self.cells[self.len] = cell;
            self.len += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.cells[..self.len].iter().copied()
    }
}

/// Per-sweep `[ray, gate]` classification grid, sized to the longest ray.
#[derive(Debug, Clone)]
pub struct StateGrid {
    states: Array2<GateState>,
}

impl StateGrid {
    pub fn new(num_rays: usize, max_gates: usize) -> Self {
        Self {
            states: Array2::from_elem((num_rays, max_gates), GateState::Missing),
        }
    }

    pub fn num_rays(&self) -> usize {
        self.states.nrows()
    }

    pub fn get(&self, ray: usize, gate: usize) -> GateState {
        self.states
            .get((ray, gate))
            .copied()
            .unwrap_or(GateState::Missing)
    }

    pub fn set(&mut self, ray: usize, gate: usize, state: GateState) {
        if let Some(cell) = self.states.get_mut((ray, gate)) {
            *cell = state;
        }
    }

    pub fn count(&self, state: GateState) -> usize {
        self.states.iter().filter(|s| **s == state).count()
    }

    /// Adjacent rays wrap around the 0/360 seam.
    pub fn ray_neighbors(&self, ray: usize) -> (usize, usize) {
        let n = self.num_rays();
        ((ray + n - 1) % n, (ray + 1) % n)
    }

    /// 3x3 neighborhood of `(ray, gate)` excluding itself.
    ///
    /// The previous gate is considered only above `first_gate` and the next
    /// gate only below `last_gate`; with fewer than three rays the wrapped
    /// neighbors collapse and are listed once.
    pub fn neighborhood(
        &self,
        ray: usize,
        gate: usize,
        first_gate: usize,
        last_gate: usize,
    ) -> Neighborhood {
        let mut cells = Neighborhood::new();
        let (left, right) = self.ray_neighbors(ray);
        let rows = [
            Some(gate),
            (gate > first_gate).then(|| gate - 1),
            (gate < last_gate).then_some(gate + 1),
        ];
        for row in rows.into_iter().flatten() {
            for column in [left, ray, right] {
                if (column, row) != (ray, gate) {
                    cells.push((column, row));
                }
            }
        }
        cells
    }
}
