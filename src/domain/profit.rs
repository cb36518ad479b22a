use super::balance::round_cents;

pub fn profit(revenue: f64, total_expenses: f64) -> f64 {
  round_cents(revenue - total_expenses)
}

/// Relative change of `current` against `prior`; `None` when there is no prior profit to compare.
pub fn relative_change(current: f64, prior: f64) -> Option<f64> {
  if prior.abs() < f64::EPSILON {
    None
  } else {
    Some((current - prior) / prior)
  }
}

pub fn exceeds_swing(current: f64, prior: f64, threshold: f64) -> bool {
  relative_change(current, prior)
    .map(|change| change.abs() > threshold)
    .unwrap_or(false)
}

pub fn growth_percent(current: f64, previous: f64) -> f64 {
  relative_change(current, previous).map(|change| change * 100.0).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn swing_needs_nonzero_prior() {
    assert!(!exceeds_swing(500.0, 0.0, 0.1));
    assert!(exceeds_swing(111.0, 100.0, 0.1));
    assert!(!exceeds_swing(110.0, 100.0, 0.1));
    assert!(exceeds_swing(-50.0, 100.0, 0.1));
    assert!(exceeds_swing(-120.0, -100.0, 0.1));
  }

  #[test]
  fn growth_is_zero_without_baseline() {
    assert_eq!(growth_percent(250.0, 0.0), 0.0);
    assert_eq!(growth_percent(150.0, 100.0), 50.0);
    assert_eq!(profit(100.0, 30.25), 69.75);
  }
}
