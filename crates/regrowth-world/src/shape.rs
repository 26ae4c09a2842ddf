//! Integer geometry for blast volumes.

use regrowth_types::CellPos;

/// Every cell within Euclidean distance `radius` of `center`, in
/// ascending `(x, y, z)` order.
pub fn sphere(center: CellPos, radius: u32) -> Vec<CellPos> {
    let r = i32::try_from(radius).unwrap_or(i32::MAX);
    let r_sq = i64::from(r).saturating_mul(i64::from(r));
    let mut cells = Vec::new();
    for dx in r.saturating_neg()..=r {
        for dy in r.saturating_neg()..=r {
            for dz in r.saturating_neg()..=r {
                let dist_sq = square(dx).saturating_add(square(dy)).saturating_add(square(dz));
                if dist_sq <= r_sq {
                    cells.push(center.offset(dx, dy, dz));
                }
            }
        }
    }
    cells
}

fn square(v: i32) -> i64 {
    i64::from(v).saturating_mul(i64::from(v))
}
