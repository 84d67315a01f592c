//! Scalar evaluation metrics for probabilistic binary predictions.

/// Probability clamp for log-loss, matching the usual epsilon convention so a
/// confident wrong prediction stays finite.
const LOG_LOSS_EPSILON: f64 = 1e-15;

pub fn mean_absolute_error(probabilities: &[f64], outcomes: &[bool]) -> f64 {
    assert_eq!(probabilities.len(), outcomes.len());
    assert!(!outcomes.is_empty());

    let total: f64 = probabilities
        .iter()
        .zip(outcomes)
        .map(|(&p, &y)| (p - if y { 1.0 } else { 0.0 }).abs())
        .sum();
    total / outcomes.len() as f64
}

pub fn log_loss(probabilities: &[f64], outcomes: &[bool]) -> f64 {
    assert_eq!(probabilities.len(), outcomes.len());
    assert!(!outcomes.is_empty());

    let total: f64 = probabilities
        .iter()
        .zip(outcomes)
        .map(|(&p, &y)| {
            let p = p.clamp(LOG_LOSS_EPSILON, 1.0 - LOG_LOSS_EPSILON);
            if y { -p.ln() } else { -(1.0 - p).ln() }
        })
        .sum();
    total / outcomes.len() as f64
}

/// Fraction of outcomes matched by thresholding probabilities at 0.5.
pub fn accuracy(probabilities: &[f64], outcomes: &[bool]) -> f64 {
    assert_eq!(probabilities.len(), outcomes.len());
    assert!(!outcomes.is_empty());

    let correct = probabilities
        .iter()
        .zip(outcomes)
        .filter(|&(&p, &y)| (p >= 0.5) == y)
        .count();
    correct as f64 / outcomes.len() as f64
}

/// Area under the ROC curve via the rank-sum (Mann-Whitney) statistic, with
/// tied scores receiving their average rank. None when the outcomes are
/// single-class, where the AUC is undefined.
pub fn roc_auc(probabilities: &[f64], outcomes: &[bool]) -> Option<f64> {
    assert_eq!(probabilities.len(), outcomes.len());

    let positives = outcomes.iter().filter(|&&y| y).count();
    let negatives = outcomes.len() - positives;
    if positives == 0 || negatives == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..probabilities.len()).collect();
    order.sort_by(|&a, &b| {
        probabilities[a]
            .partial_cmp(&probabilities[b])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut ranks = vec![0.0f64; probabilities.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && probabilities[order[j + 1]] == probabilities[order[i]] {
            j += 1;
        }
        // Ranks are 1-based; tied scores share the average of their span.
        let average_rank = (i + j + 2) as f64 / 2.0;
        for &index in &order[i..=j] {
            ranks[index] = average_rank;
        }
        i = j + 1;
    }

    let positive_rank_sum: f64 = outcomes
        .iter()
        .zip(&ranks)
        .filter(|&(&y, _)| y)
        .map(|(_, &rank)| rank)
        .sum();

    let positives = positives as f64;
    let negatives = negatives as f64;
    Some((positive_rank_sum - positives * (positives + 1.0) / 2.0) / (positives * negatives))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mae_averages_absolute_deviations() {
        let probabilities = [0.8, 0.3, 0.5, 0.0];
        let outcomes = [true, false, true, false];

        let mae = mean_absolute_error(&probabilities, &outcomes);

        // (0.2 + 0.3 + 0.5 + 0.0) / 4
        assert!((mae - 0.25).abs() < 1e-12);
    }

    #[test]
    fn log_loss_is_zero_for_perfect_predictions() {
        let loss = log_loss(&[1.0, 0.0], &[true, false]);

        assert!(loss.abs() < 1e-9);
    }

    #[test]
    fn log_loss_stays_finite_for_confident_mistakes() {
        let loss = log_loss(&[0.0, 1.0], &[true, false]);

        assert!(loss.is_finite());
        assert!(loss > 10.0);
    }

    #[test]
    fn accuracy_thresholds_at_half() {
        let probabilities = [0.9, 0.4, 0.5, 0.1];
        let outcomes = [true, true, true, false];

        assert!((accuracy(&probabilities, &outcomes) - 0.75).abs() < 1e-12);
    }

    #[test]
    fn roc_auc_is_one_for_perfect_ranking() {
        let probabilities = [0.1, 0.2, 0.8, 0.9];
        let outcomes = [false, false, true, true];

        assert_eq!(roc_auc(&probabilities, &outcomes), Some(1.0));
    }

    #[test]
    fn roc_auc_is_half_for_constant_scores() {
        let probabilities = [0.5, 0.5, 0.5, 0.5];
        let outcomes = [true, false, true, false];

        let auc = roc_auc(&probabilities, &outcomes).expect("two classes present");
        assert!((auc - 0.5).abs() < 1e-12);
    }

    #[test]
    fn roc_auc_handles_partial_ranking() {
        let probabilities = [0.3, 0.7, 0.6, 0.2];
        let outcomes = [false, true, false, true];

        // Positive scores {0.7, 0.2}, negative {0.3, 0.6}:
        // pairs won = (0.7 beats both) + (0.2 beats none) = 2 of 4.
        let auc = roc_auc(&probabilities, &outcomes).expect("two classes present");
        assert!((auc - 0.5).abs() < 1e-12);
    }

    #[test]
    fn roc_auc_is_undefined_for_single_class() {
        assert_eq!(roc_auc(&[0.2, 0.9], &[true, true]), None);
        assert_eq!(roc_auc(&[0.2, 0.9], &[false, false]), None);
    }
}
