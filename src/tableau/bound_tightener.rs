//! Row and constraint bound tighteners (C3): infer tighter variable
//! bounds from equation rows and from fixed/tightened PL constraints.

use crate::smt::{BoundKind, Tightening};
use crate::tableau::Tableau;
use crate::{E, I};

/// Reads each equation row and, for every participating variable,
/// tries to narrow its bounds from the bounds of the other addends.
/// Runs to saturation (repeats until nothing improves or
/// `max_iterations` fires).
pub struct RowBoundTightener {
    max_iterations: u32,
}

impl RowBoundTightener {
    pub fn new(max_iterations: u32) -> Self {
        Self { max_iterations }
    }

    /// `y = Σ cᵢxᵢ + s`: for each row, compute `[lb(y), ub(y)]` from the
    /// bounds of all addends, then solve for each `xⱼ` in turn to get a
    /// tighter `[lb(xⱼ), ub(xⱼ)]`. Returns every tightening discovered
    /// across a saturation pass (the caller applies them and may choose
    /// to re-run for a deeper pass).
    pub fn tighten(&self, tableau: &Tableau) -> Vec<Tightening> {
        let mut out = Vec::new();
        let mut pass = 0;
        loop {
            let mut improved = false;
            for row in 0..tableau.num_rows() {
                let coeffs = tableau.row_coefficients(row);
                let rhs = tableau.row_rhs(row);
                for &(target, target_coeff) in &coeffs {
                    if target_coeff.abs() < 1e-12 {
                        continue;
                    }
                    // Σ_{j != target} c_j x_j has bounds [lo, hi]; solving
                    // target_coeff * x_target = rhs - Σ_{j!=target} c_j x_j
                    // gives bounds on x_target from [rhs-hi, rhs-lo] / target_coeff.
                    let mut lo = 0.0;
                    let mut hi = 0.0;
                    let mut unbounded_lo = false;
                    let mut unbounded_hi = false;
                    for &(j, cj) in &coeffs {
                        if j == target {
                            continue;
                        }
                        let (jl, ju) = (tableau.lower_bound(j), tableau.upper_bound(j));
                        let (term_lo, term_hi) = if cj >= 0.0 { (cj * jl, cj * ju) } else { (cj * ju, cj * jl) };
                        if term_lo.is_finite() {
                            lo += term_lo;
                        } else {
                            unbounded_lo = true;
                        }
                        if term_hi.is_finite() {
                            hi += term_hi;
                        } else {
                            unbounded_hi = true;
                        }
                    }
                    let (raw_lo, raw_hi) = if target_coeff > 0.0 {
                        (
                            if unbounded_hi { E::NEG_INFINITY } else { (rhs - hi) / target_coeff },
                            if unbounded_lo { E::INFINITY } else { (rhs - lo) / target_coeff },
                        )
                    } else {
                        (
                            if unbounded_lo { E::NEG_INFINITY } else { (rhs - lo) / target_coeff },
                            if unbounded_hi { E::INFINITY } else { (rhs - hi) / target_coeff },
                        )
                    };
                    if raw_lo.is_finite() && raw_lo > tableau.lower_bound(target) + 1e-9 {
                        out.push(Tightening { variable: target, value: raw_lo, kind: BoundKind::Lower });
                        improved = true;
                    }
                    if raw_hi.is_finite() && raw_hi < tableau.upper_bound(target) - 1e-9 {
                        out.push(Tightening { variable: target, value: raw_hi, kind: BoundKind::Upper });
                        improved = true;
                    }
                }
            }
            pass += 1;
            if !improved || pass >= self.max_iterations {
                break;
            }
        }
        out
    }
}

/// The subset of `getEntailedTightenings` shared by every PL constraint:
/// the engine collects these after a phase becomes fixed or a
/// constraint's participants tighten, and applies them the same way it
/// applies row-tightener output.
pub struct ConstraintBoundTightener;

impl ConstraintBoundTightener {
    pub fn new() -> Self {
        Self
    }

    pub fn collect(&self, entailed: impl IntoIterator<Item = Tightening>) -> Vec<Tightening> {
        entailed.into_iter().collect()
    }
}

impl Default for ConstraintBoundTightener {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tightens_y_from_linear_equation() {
        // y = 2x + 1, x in [0,5], y in [-10,20] => y in [1,11].
        let mut t = Tableau::new(1e-3);
        t.set_dimensions(1, 2);
        t.set_constraint_matrix_entry(0, 0, 2.0);
        t.set_constraint_matrix_entry(0, 1, -1.0);
        t.set_right_hand_side(0, -1.0);
        t.set_lower_bound(0, 0.0);
        t.set_upper_bound(0, 5.0);
        t.set_lower_bound(1, -10.0);
        t.set_upper_bound(1, 20.0);

        let tightener = RowBoundTightener::new(5);
        let tightenings = tightener.tighten(&t);

        let lo = tightenings
            .iter()
            .filter(|ti| ti.variable == 1 && ti.kind == BoundKind::Lower)
            .map(|ti| ti.value)
            .fold(E::NEG_INFINITY, E::max);
        let hi = tightenings
            .iter()
            .filter(|ti| ti.variable == 1 && ti.kind == BoundKind::Upper)
            .map(|ti| ti.value)
            .fold(E::INFINITY, E::min);
        assert!((lo - 1.0).abs() < 1e-9, "lo={lo}");
        assert!((hi - 11.0).abs() < 1e-9, "hi={hi}");
    }
}
