//! Deterministic, order-preserving caps on response size.

use crate::config::SamplingConfig;
use crate::tiles::QueryMode;

/// Feature cap for a query. Full-mode requests at or above the high-zoom
/// threshold get the smaller cap, since their viewport is smaller.
pub fn max_features(mode: QueryMode, zoom: u8, config: &SamplingConfig) -> usize {
    match mode {
        QueryMode::Overview => config.max_features_overview,
        QueryMode::Full if zoom >= config.high_zoom_threshold => {
            config.max_features_full_high_zoom
        }
        QueryMode::Full => config.max_features_full,
    }
}

/// Indices kept when sampling `len` items down to at most `max`: every
/// `ceil(len / max)`-th index starting at zero.
///
/// ```
/// use gridline::sampling::sample_indices;
///
/// assert_eq!(sample_indices(10, 4).collect::<Vec<_>>(), vec![0, 3, 6, 9]);
/// assert_eq!(sample_indices(3, 5).count(), 3);
/// assert_eq!(sample_indices(3, 0).count(), 0);
/// ```
pub fn sample_indices(len: usize, max: usize) -> impl Iterator<Item = usize> {
    let (stride, take) = if max == 0 {
        (1, 0)
    } else {
        (len.div_ceil(max).max(1), max)
    };
    (0..len).step_by(stride).take(take)
}

/// Downsample `features` to at most `max` items, keeping original order.
pub fn sample_features<T>(features: Vec<T>, max: usize) -> Vec<T> {
    if features.len() <= max {
        return features;
    }
    let len = features.len();
    let stride = if max == 0 { 0 } else { len.div_ceil(max) };
    features
        .into_iter()
        .enumerate()
        .filter(|(idx, _)| stride != 0 && idx % stride == 0)
        .map(|(_, feature)| feature)
        .take(max)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_features_by_mode_and_zoom() {
        let config = SamplingConfig::default();
        assert_eq!(max_features(QueryMode::Overview, 12, &config), 5_000);
        assert_eq!(max_features(QueryMode::Full, 5, &config), 20_000);
        assert_eq!(max_features(QueryMode::Full, 8, &config), 10_000);
    }

    #[test]
    fn test_sampling_under_cap_is_identity() {
        let items: Vec<u32> = (0..10).collect();
        assert_eq!(sample_features(items.clone(), 10), items);
        assert_eq!(sample_features(items.clone(), 50), items);
    }

    #[test]
    fn test_sampling_stride() {
        let items: Vec<u32> = (0..25_000).collect();
        let sampled = sample_features(items, 10_000);
        // ceil(25000 / 10000) = 3
        assert_eq!(sampled.len(), 8_334);
        assert_eq!(&sampled[..4], &[0, 3, 6, 9]);
        assert!(sampled.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_sampling_is_idempotent() {
        let items: Vec<u32> = (0..1_234).map(|i| i * 7 % 1_000).collect();
        let once = sample_features(items.clone(), 100);
        let twice = sample_features(items, 100);
        assert_eq!(once, twice);
        assert!(once.len() <= 100);
    }

    #[test]
    fn test_zero_cap() {
        assert!(sample_features(vec![1, 2, 3], 0).is_empty());
    }

    #[test]
    fn test_indices_match_features() {
        let items: Vec<usize> = (0..997).collect();
        let by_index: Vec<usize> = sample_indices(items.len(), 40).collect();
        assert_eq!(sample_features(items, 40), by_index);
    }
}
