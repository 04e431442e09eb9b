/// Smallest absolute difference between two angles in degrees, in `[0, 180]`.
pub fn angular_distance(a: f32, b: f32) -> f32 {
    let diff = (a - b).rem_euclid(360.0);
    if diff > 180.0 {
        360.0 - diff
    } else {
        diff
    }
}

/// Azimuth-sorted lookup over the rays of one sweep.
///
/// Rays are stored in acquisition order, so the nearest ray to a given
/// azimuth is found by binary search over a sorted copy, checking both
/// neighbors of the insertion point with wraparound at 0/360 degrees.
#[derive(Debug, Clone, Default)]
pub struct AzimuthIndex {
    entries: Vec<(f32, usize)>,
}

impl AzimuthIndex {
    pub fn new<I>(azimuths: I) -> Self
    where
        I: IntoIterator<Item = f32>,
    {
        let mut entries: Vec<(f32, usize)> = azimuths
            .into_iter()
            .enumerate()
            .map(|(index, azimuth)| (azimuth.rem_euclid(360.0), index))
            .collect();
        entries.sort_by(|a, b| a.0.total_cmp(&b.0));
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ray index whose azimuth is angularly closest to `azimuth`.
    pub fn nearest(&self, azimuth: f32) -> Option<usize> {
        if self.entries.is_empty() {
            return None;
        }
        let target = azimuth.rem_euclid(360.0);
        let count = self.entries.len();
        let upper = self.entries.partition_point(|(az, _)| *az < target);
        let after = self.entries[upper % count];
        let before = self.entries[(upper + count - 1) % count];
        if angular_distance(before.0, target) <= angular_distance(after.0, target) {
            Some(before.1)
        } else {
            Some(after.1)
        }
    }
}
