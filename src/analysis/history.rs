// Fixed-capacity ring buffer for flux and inter-beat-interval histories.
//
// The beat detector keeps several short histories (32 per band, 64 combined,
// 32 intervals) and recomputes mean/stddev/median over them on demand. With at
// most 64 elements a straight recompute beats any incremental bookkeeping.

/// Circular buffer with explicit head/len and O(1) push.
///
/// Pushing past capacity overwrites the oldest element.
#[derive(Debug, Clone)]
pub struct FluxRing {
    values: Vec<f32>,
    head: usize,
    len: usize,
}

impl FluxRing {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring capacity must be non-zero");
        Self {
            values: vec![0.0; capacity],
            head: 0,
            len: 0,
        }
    }

    pub fn push(&mut self, value: f32) {
        self.values[self.head] = value;
        self.head = (self.head + 1) % self.values.len();
        self.len = (self.len + 1).min(self.values.len());
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }

    /// Mean over the filled portion; 0 when empty.
    pub fn mean(&self) -> f32 {
        if self.len == 0 {
            return 0.0;
        }
        self.iter().sum::<f32>() / self.len as f32
    }

    /// Population standard deviation over the filled portion; 0 when empty.
    pub fn stddev(&self) -> f32 {
        if self.len == 0 {
            return 0.0;
        }
        let mean = self.mean();
        let variance = self
            .iter()
            .map(|v| {
                let d = v - mean;
                d * d
            })
            .sum::<f32>()
            / self.len as f32;
        variance.sqrt()
    }

    /// Median over the filled portion; 0 when empty.
    pub fn median(&self) -> f32 {
        self.median_of(self.len)
    }

    /// Median over the `n` most recently pushed values (the 3-tap prefilter).
    pub fn recent_median(&self, n: usize) -> f32 {
        self.median_of(n.min(self.len))
    }

    fn median_of(&self, n: usize) -> f32 {
        if n == 0 {
            return 0.0;
        }
        let mut window: Vec<f32> = self.iter_recent(n).collect();
        window.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        if window.len() % 2 == 0 {
            let mid = window.len() / 2;
            (window[mid - 1] + window[mid]) / 2.0
        } else {
            window[window.len() / 2]
        }
    }

    fn iter(&self) -> impl Iterator<Item = f32> + '_ {
        self.iter_recent(self.len)
    }

    // Iterate the last `n` pushed values, oldest of them first.
    fn iter_recent(&self, n: usize) -> impl Iterator<Item = f32> + '_ {
        let cap = self.values.len();
        let n = n.min(self.len);
        (0..n).map(move |i| {
            let idx = (self.head + cap - n + i) % cap;
            self.values[idx]
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_overwrites_oldest_first() {
        let mut ring = FluxRing::new(3);
        ring.push(1.0);
        ring.push(2.0);
        ring.push(3.0);
        ring.push(4.0);
        assert_eq!(ring.len(), 3);
        // Oldest (1.0) is gone; mean over [2, 3, 4]
        assert!((ring.mean() - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_statistics_on_partial_fill() {
        let mut ring = FluxRing::new(32);
        ring.push(2.0);
        ring.push(4.0);
        assert!((ring.mean() - 3.0).abs() < 1e-6);
        assert!((ring.stddev() - 1.0).abs() < 1e-6);
        assert!((ring.median() - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_recent_median_is_three_tap() {
        let mut ring = FluxRing::new(8);
        for v in [0.0, 0.0, 0.0, 9.0] {
            ring.push(v);
        }
        // Single spike among zeros: suppressed by the 3-tap median
        assert_eq!(ring.recent_median(3), 0.0);
        ring.push(7.0);
        // Two elevated samples out of three survive
        assert_eq!(ring.recent_median(3), 7.0);
    }

    #[test]
    fn test_clear_resets_len() {
        let mut ring = FluxRing::new(4);
        ring.push(5.0);
        ring.clear();
        assert!(ring.is_empty());
        assert_eq!(ring.mean(), 0.0);
    }

    #[test]
    fn test_median_after_wraparound() {
        let mut ring = FluxRing::new(4);
        for v in [10.0, 1.0, 2.0, 3.0, 4.0, 5.0] {
            ring.push(v);
        }
        // Window is [2, 3, 4, 5]
        assert!((ring.median() - 3.5).abs() < 1e-6);
        assert_eq!(ring.recent_median(3), 4.0);
    }
}
