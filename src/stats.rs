//! Small numeric helpers for the Gold stage: quartiles, rolling means,
//! growth rates, and ranking. All of them operate on already materialized
//! slices; missing values are `None` and never contribute to a statistic.

/// Linearly interpolated percentile of a sorted slice, `q` in `[0, 1]`.
fn percentile(sorted: &[f64], q: f64) -> f64 {
    debug_assert!(!sorted.is_empty());
    let pos = q * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    if lower == upper {
        sorted[lower]
    } else {
        let weight = pos - lower as f64;
        sorted[lower] * (1.0 - weight) + sorted[upper] * weight
    }
}

/// Tukey fences `(Q1 - 1.5*IQR, Q3 + 1.5*IQR)` over the given values.
/// `None` when there is nothing to measure.
pub fn iqr_fences(values: &[f64]) -> Option<(f64, f64)> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let q1 = percentile(&sorted, 0.25);
    let q3 = percentile(&sorted, 0.75);
    let iqr = q3 - q1;
    Some((q1 - 1.5 * iqr, q3 + 1.5 * iqr))
}

/// Trailing-window mean with `min_periods = 1`. The window covers the last
/// `window` positions; only present values contribute, and a window with no
/// present values yields `None`.
pub fn rolling_mean(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    debug_assert!(window > 0);
    values
        .iter()
        .enumerate()
        .map(|(i, _)| {
            let start = (i + 1).saturating_sub(window);
            let present: Vec<f64> = values[start..=i].iter().filter_map(|v| *v).collect();
            if present.is_empty() {
                None
            } else {
                Some(present.iter().sum::<f64>() / present.len() as f64)
            }
        })
        .collect()
}

/// Percent change against the last present value (the forward-fill
/// reading of a gapped series). `None` where the current value is missing,
/// where no earlier value exists, or where the base is zero.
pub fn pct_change(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut last_present: Option<f64> = None;
    values
        .iter()
        .map(|value| {
            let change = match (last_present, value) {
                (Some(prev), Some(curr)) if prev != 0.0 => Some((curr - prev) / prev),
                _ => None,
            };
            if value.is_some() {
                last_present = *value;
            }
            change
        })
        .collect()
}

/// Descending rank with average ties (rank 1 = largest value).
pub fn rank_desc(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[b].total_cmp(&values[a]));

    let mut ranks = vec![0.0; values.len()];
    let mut i = 0;
    while i < order.len() {
        // Find the tie run [i, j).
        let mut j = i + 1;
        while j < order.len() && values[order[j]] == values[order[i]] {
            j += 1;
        }
        // Positions i..j share the average of ranks i+1..=j.
        let avg = (i + 1..=j).sum::<usize>() as f64 / (j - i) as f64;
        for &idx in &order[i..j] {
            ranks[idx] = avg;
        }
        i = j;
    }
    ranks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rolling_mean_matches_min_periods_one() {
        let values = vec![Some(10.0), Some(20.0), Some(30.0)];
        assert_eq!(
            rolling_mean(&values, 7),
            vec![Some(10.0), Some(15.0), Some(20.0)]
        );
    }

    #[test]
    fn rolling_mean_skips_missing_values() {
        let values = vec![Some(10.0), None, Some(30.0)];
        assert_eq!(
            rolling_mean(&values, 2),
            vec![Some(10.0), Some(10.0), Some(30.0)]
        );
        assert_eq!(rolling_mean(&[None, None], 2), vec![None, None]);
    }

    #[test]
    fn rolling_mean_respects_window() {
        let values = vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0)];
        assert_eq!(
            rolling_mean(&values, 2),
            vec![Some(1.0), Some(1.5), Some(2.5), Some(3.5)]
        );
    }

    #[test]
    fn pct_change_handles_gaps() {
        let values = vec![Some(100.0), Some(110.0), None, Some(121.0)];
        let changes = pct_change(&values);
        assert_eq!(changes[0], None);
        assert!((changes[1].unwrap() - 0.10).abs() < 1e-12);
        assert_eq!(changes[2], None);
        // The gap forward-fills; 121 is measured against 110.
        assert!((changes[3].unwrap() - 0.10).abs() < 1e-12);
    }

    #[test]
    fn rank_desc_without_ties() {
        assert_eq!(rank_desc(&[100.0, 50.0, 75.0]), vec![1.0, 3.0, 2.0]);
    }

    #[test]
    fn rank_desc_averages_ties() {
        // Two values tied for first share rank 1.5.
        assert_eq!(rank_desc(&[80.0, 80.0, 10.0]), vec![1.5, 1.5, 3.0]);
    }

    #[test]
    fn iqr_fences_flag_the_obvious_outlier() {
        let mut values = vec![100.0; 20];
        values.push(10_000.0);
        let (lower, upper) = iqr_fences(&values).unwrap();
        assert!(10_000.0 > upper);
        assert!(100.0 >= lower && 100.0 <= upper);
        assert!(iqr_fences(&[]).is_none());
    }
}
