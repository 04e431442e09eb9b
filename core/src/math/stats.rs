/// Mean and sample standard deviation of a window of gate values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowStats {
    pub count: usize,
    pub mean: f32,
    pub std_dev: f32,
}

pub struct StatsHelper;

impl StatsHelper {
    /// Accumulates in `f64`; a single sample has zero deviation.
    pub fn mean_std<I>(samples: I) -> Option<WindowStats>
    where
        I: IntoIterator<Item = f32>,
    {
        let mut count = 0usize;
        let mut sum = 0.0_f64;
        let mut sum_sq = 0.0_f64;
        for value in samples {
            count += 1;
            sum += value as f64;
            sum_sq += value as f64 * value as f64;
        }
        if count == 0 {
            return None;
        }
        let n = count as f64;
        let std_dev = if count > 1 {
            ((sum_sq - sum * sum / n) / (n - 1.0)).abs().sqrt()
        } else {
            0.0
        };
        Some(WindowStats {
            count,
            mean: (sum / n) as f32,
            std_dev: std_dev as f32,
        })
    }
}
