/// Weight of raw demand in the combined score; rider density takes the rest.
pub const DEMAND_WEIGHT: f64 = 0.6;
pub const DENSITY_WEIGHT: f64 = 0.4;

fn sqrt_ratio(value: f64, max: f64) -> f64 {
    if max <= 0.0 {
        0.0
    } else {
        value.max(0.0).sqrt() / max.sqrt()
    }
}

/// Ranks a cell 0-100 against the busiest cell in its view.
///
/// Both signals go through a square root before weighting, which keeps a
/// handful of very hot cells from flattening everyone else to zero.
pub fn demand_score(demand: u64, rider_density: usize, max_demand: u64, max_density: usize) -> u8 {
    if max_demand == 0 && max_density == 0 {
        return 0;
    }
    let d = sqrt_ratio(demand as f64, max_demand as f64);
    let r = sqrt_ratio(rider_density as f64, max_density as f64);
    let combined = (DEMAND_WEIGHT * d + DENSITY_WEIGHT * r).clamp(0.0, 1.0);
    (combined * 100.0).round() as u8
}
