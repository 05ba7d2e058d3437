use glam::DVec2;

/// Append-only polyline of a photon's path in its orbital plane
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Trajectory {
    points: Vec<DVec2>,
}

impl Trajectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(point: DVec2) -> Self {
        Self {
            points: vec![point],
        }
    }

    pub fn push(&mut self, point: DVec2) {
        self.points.push(point);
    }

    pub fn points(&self) -> &[DVec2] {
        &self.points
    }

    pub fn last(&self) -> Option<DVec2> {
        self.points.last().copied()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Points thinned so consecutive kept points are at least `min_spacing`
    /// apart. The final point is always kept.
    pub fn decimated(&self, min_spacing: f64) -> impl Iterator<Item = DVec2> + '_ {
        let mut last_kept: Option<DVec2> = None;
        let final_index = self.points.len().saturating_sub(1);
        self.points
            .iter()
            .enumerate()
            .filter_map(move |(i, &p)| {
                let keep = match last_kept {
                    None => true,
                    Some(prev) => i == final_index || prev.distance_squared(p) >= min_spacing * min_spacing,
                };
                if keep {
                    last_kept = Some(p);
                    Some(p)
                } else {
                    None
                }
            })
    }
}
