//! Derived quantities used for pick quality review: ray geometry,
//! apparent velocities and air-shot time-zero drift correction.

use log::warn;

use crate::error::{PickError, Result};
use crate::geometry;
use crate::survey::{AirShot, Mog, PickCounts, TraceSet, UNPICKED};

/// Propagation velocity of a radar wave through air, in m/ns. Used to
/// strip the known air path out of calibration picks when estimating
/// the system time zero.
pub const AIR_VELOCITY: f64 = 0.2998;

/// Straight-ray Tx→Rx distance for each requested trace.
pub fn straight_ray_length(traces: &TraceSet, indices: &[usize]) -> Vec<f64> {
    indices
        .iter()
        .map(|&i| geometry::distance(traces.tx[i], traces.rx[i]))
        .collect()
}

/// Ray incidence angle for each requested trace, in degrees. Positive
/// when the receiver sits above the transmitter; a coincident pair
/// reports 0.
pub fn incidence_angle(traces: &TraceSet, indices: &[usize]) -> Vec<f64> {
    indices
        .iter()
        .map(|&i| {
            let dz = traces.rx[i].z - traces.tx[i].z;
            let run = geometry::horizontal_distance(traces.tx[i], traces.rx[i]);
            dz.atan2(run).to_degrees()
        })
        .collect()
}

/// Indices eligible for velocity and statistics aggregation.
///
/// Three conditions are kept as separate masks and a trace qualifies
/// only when all three match: the review flag says reviewed, the travel
/// time is committed, and the trace is inside the inclusion mask.
pub fn qualifying_indices(traces: &TraceSet) -> Vec<usize> {
    let reviewed: Vec<bool> = traces.tt_done.iter().map(|s| !s.is_pending()).collect();
    let picked: Vec<bool> = traces.tt.iter().map(|&t| t != UNPICKED).collect();
    let included: Vec<bool> = traces.in_vect.clone();

    (0..traces.ntrace())
        .filter(|&i| {
            let matches = [reviewed[i], picked[i], included[i]]
                .iter()
                .filter(|&&m| m)
                .count();
            matches == 3
        })
        .collect()
}

/// Apparent-velocity estimate over the qualifying traces of a mog.
#[derive(Debug, Clone, PartialEq)]
pub struct VelocityEstimate {
    /// Qualifying trace indices, ascending.
    pub indices: Vec<usize>,
    /// Straight-ray distance over travel time, per qualifying trace.
    pub velocities: Vec<f64>,
    /// Aggregate velocity, 0 when nothing qualifies.
    pub mean: f64,
    /// Whether inverse-uncertainty weighting was applied.
    pub weighted: bool,
}

impl VelocityEstimate {
    fn empty() -> Self {
        Self {
            indices: Vec::new(),
            velocities: Vec::new(),
            mean: 0.0,
            weighted: false,
        }
    }
}

/// Computes straight-ray apparent velocities for the qualifying traces
/// and their aggregate.
///
/// When every qualifying uncertainty is unset or zero the aggregate is
/// the arithmetic mean. Otherwise picks are weighted by the inverse of
/// their uncertainty, with non-positive uncertainties floored to the
/// smallest positive one in the set so a single "exact" pick cannot
/// divide by zero or swallow the whole average.
pub fn apparent_velocity(mog: &Mog) -> VelocityEstimate {
    let traces = &mog.traces;
    let indices = qualifying_indices(traces);
    if indices.is_empty() {
        return VelocityEstimate::empty();
    }

    let rays = straight_ray_length(traces, &indices);
    let velocities: Vec<f64> = indices
        .iter()
        .zip(&rays)
        .map(|(&i, &ray)| ray / traces.tt[i])
        .collect();

    let uncertainties: Vec<f64> = indices.iter().map(|&i| traces.et[i]).collect();
    let floor = uncertainties
        .iter()
        .copied()
        .filter(|&e| e > 0.0)
        .fold(f64::INFINITY, f64::min);

    if !floor.is_finite() {
        // No usable uncertainty anywhere: plain mean.
        let mean = velocities.iter().sum::<f64>() / velocities.len() as f64;
        return VelocityEstimate {
            indices,
            velocities,
            mean,
            weighted: false,
        };
    }

    let mut num = 0.0;
    let mut den = 0.0;
    for (v, e) in velocities.iter().zip(&uncertainties) {
        let e = if *e > 0.0 { *e } else { floor };
        num += v / e;
        den += 1.0 / e;
    }
    VelocityEstimate {
        indices,
        velocities,
        mean: num / den,
        weighted: true,
    }
}

/// Time-zero estimates taken from a mog's paired air shots. A side is
/// `None` while the mog has no shot paired there.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeZero {
    pub before: Option<f64>,
    pub after: Option<f64>,
}

impl TimeZero {
    /// Drift-interpolated time zero at fractional position `frac` in
    /// [0, 1] along the survey. A single-sided pairing is constant and
    /// an unpaired mog corrects by zero.
    pub fn at(&self, frac: f64) -> f64 {
        match (self.before, self.after) {
            (Some(b), Some(a)) => b + (a - b) * frac,
            (Some(b), None) => b,
            (None, Some(a)) => a,
            (None, None) => 0.0,
        }
    }
}

/// Corrects a mog's travel times for system time-zero drift.
///
/// Each paired air shot yields one t0 estimate from its own picks; the
/// drift between the before and after estimates is apportioned linearly
/// by trace index across the survey. Returns the corrected times (the
/// unpicked sentinel passes through untouched) together with the
/// per-shot estimates. A dangling `av`/`ap` index fails.
pub fn corrected_travel_times(mog: &Mog, air_shots: &[AirShot]) -> Result<(Vec<f64>, TimeZero)> {
    let t0 = TimeZero {
        before: resolve_shot(mog.av, air_shots)?.map(shot_time_zero),
        after: resolve_shot(mog.ap, air_shots)?.map(shot_time_zero),
    };

    let ntrace = mog.traces.ntrace();
    let span = (ntrace.saturating_sub(1)).max(1) as f64;
    let corrected = mog
        .traces
        .tt
        .iter()
        .enumerate()
        .map(|(i, &tt)| {
            if tt == UNPICKED {
                UNPICKED
            } else {
                tt - t0.at(i as f64 / span)
            }
        })
        .collect();
    Ok((corrected, t0))
}

/// Estimates one air shot's time zero from its own picks: the mean of
/// `tt - ray / AIR_VELOCITY` over the qualifying traces. A shot without
/// a single qualifying pick contributes no correction.
pub fn shot_time_zero(shot: &AirShot) -> f64 {
    let traces = &shot.traces;
    let indices = qualifying_indices(traces);
    if indices.is_empty() {
        warn!(
            "air shot {} has no usable picks, assuming zero time offset",
            traces.name
        );
        return 0.0;
    }
    let rays = straight_ray_length(traces, &indices);
    let sum: f64 = indices
        .iter()
        .zip(&rays)
        .map(|(&i, &ray)| traces.tt[i] - ray / AIR_VELOCITY)
        .sum();
    sum / indices.len() as f64
}

fn resolve_shot<'a>(
    index: Option<usize>,
    air_shots: &'a [AirShot],
) -> Result<Option<&'a AirShot>> {
    match index {
        None => Ok(None),
        Some(idx) => air_shots.get(idx).map(Some).ok_or_else(|| {
            PickError::Reference(format!(
                "air-shot index {idx} out of range for {} air shots",
                air_shots.len()
            ))
        }),
    }
}

/// Quality-review summary of one mog: annotation progress plus spread
/// figures over the qualifying traces.
#[derive(Debug, Clone, PartialEq)]
pub struct PickStatistics {
    pub counts: PickCounts,
    pub tt_mean: f64,
    pub tt_std: f64,
    pub velocity_mean: f64,
    pub velocity_std: f64,
    /// Incidence-angle range of the qualifying rays, degrees.
    pub angle_min: f64,
    pub angle_max: f64,
}

/// Computes the review statistics for a mog. With nothing qualifying
/// every figure is zero rather than an error, mirroring the velocity
/// aggregation.
pub fn pick_statistics(mog: &Mog) -> PickStatistics {
    let counts = mog.traces.pick_counts();
    let indices = qualifying_indices(&mog.traces);
    if indices.is_empty() {
        return PickStatistics {
            counts,
            tt_mean: 0.0,
            tt_std: 0.0,
            velocity_mean: 0.0,
            velocity_std: 0.0,
            angle_min: 0.0,
            angle_max: 0.0,
        };
    }

    let times: Vec<f64> = indices.iter().map(|&i| mog.traces.tt[i]).collect();
    let estimate = apparent_velocity(mog);
    let angles = incidence_angle(&mog.traces, &indices);

    PickStatistics {
        counts,
        tt_mean: mean(&times),
        tt_std: std_dev(&times),
        velocity_mean: mean(&estimate.velocities),
        velocity_std: std_dev(&estimate.velocities),
        angle_min: angles.iter().copied().fold(f64::INFINITY, f64::min),
        angle_max: angles.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point3;
    use ndarray::Array2;

    fn traces_with_geometry(pairs: &[(Point3, Point3)]) -> TraceSet {
        let tx = pairs.iter().map(|p| p.0).collect();
        let rx = pairs.iter().map(|p| p.1).collect();
        TraceSet::new(
            "M01",
            tx,
            rx,
            Array2::zeros((4, pairs.len())),
            vec![0.0, 0.5, 1.0, 1.5],
            "ns",
            "m",
        )
    }

    fn horizontal_mog(ntrace: usize, spacing: f64) -> Mog {
        let pairs: Vec<(Point3, Point3)> = (0..ntrace)
            .map(|i| {
                let z = -(i as f64);
                (Point3::new(0.0, 0.0, z), Point3::new(spacing, 0.0, z))
            })
            .collect();
        Mog::new(traces_with_geometry(&pairs))
    }

    /// xorshift-style generator so the randomized checks are repeatable.
    struct TestRng(u64);

    impl TestRng {
        fn next_f64(&mut self) -> f64 {
            self.0 ^= self.0 << 13;
            self.0 ^= self.0 >> 7;
            self.0 ^= self.0 << 17;
            (self.0 >> 11) as f64 / (1u64 << 53) as f64
        }
    }

    #[test]
    fn ray_length_and_angle() {
        let ts = traces_with_geometry(&[
            (Point3::new(0.0, 0.0, 0.0), Point3::new(3.0, 0.0, 4.0)),
            (Point3::new(0.0, 0.0, 0.0), Point3::new(5.0, 0.0, 0.0)),
        ]);
        let rays = straight_ray_length(&ts, &[0, 1]);
        assert!((rays[0] - 5.0).abs() < 1e-12);
        assert!((rays[1] - 5.0).abs() < 1e-12);

        let angles = incidence_angle(&ts, &[0, 1]);
        assert!((angles[0] - (4.0f64 / 5.0).asin().to_degrees()).abs() < 1e-9);
        assert!(angles[1].abs() < 1e-12);
    }

    #[test]
    fn coincident_pair_has_zero_angle() {
        let ts = traces_with_geometry(&[(
            Point3::new(1.0, 1.0, 1.0),
            Point3::new(1.0, 1.0, 1.0),
        )]);
        assert_eq!(incidence_angle(&ts, &[0]), vec![0.0]);
    }

    #[test]
    fn qualifying_needs_all_three_conditions() {
        let mut mog = horizontal_mog(4, 10.0);
        mog.traces.set_pick(0, 50.0).unwrap();
        mog.traces.set_pick(1, 50.0).unwrap();
        mog.traces.set_pick(2, 50.0).unwrap();
        mog.traces.in_vect[1] = false; // excluded
        mog.traces.tt[3] = 50.0; // imported value, never reviewed
        assert_eq!(qualifying_indices(&mog.traces), vec![0, 2]);
    }

    #[test]
    fn velocity_mean_unweighted_when_uncertainty_absent() {
        let mut mog = horizontal_mog(3, 10.0);
        mog.traces.set_pick(0, 50.0).unwrap();
        mog.traces.set_pick(1, 100.0).unwrap();
        mog.traces.set_pick(2, 200.0).unwrap();
        let est = apparent_velocity(&mog);
        assert!(!est.weighted);
        let expected = (0.2 + 0.1 + 0.05) / 3.0;
        assert!((est.mean - expected).abs() < 1e-12);
    }

    #[test]
    fn velocity_mean_matches_uniform_zero_uncertainty() {
        let mut mog = horizontal_mog(3, 10.0);
        for (i, tt) in [(0, 50.0), (1, 100.0), (2, 200.0)] {
            mog.traces.set_pick(i, tt).unwrap();
            mog.traces.set_uncertainty(i, 0.0).unwrap();
        }
        let est = apparent_velocity(&mog);
        assert!(!est.weighted);
        let expected = (0.2 + 0.1 + 0.05) / 3.0;
        assert!((est.mean - expected).abs() < 1e-12);
    }

    #[test]
    fn weighted_velocity_formula() {
        let mut mog = horizontal_mog(2, 10.0);
        mog.traces.set_pick(0, 50.0).unwrap();
        mog.traces.set_uncertainty(0, 1.0).unwrap();
        mog.traces.set_pick(1, 100.0).unwrap();
        mog.traces.set_uncertainty(1, 4.0).unwrap();
        let est = apparent_velocity(&mog);
        assert!(est.weighted);
        let expected = (0.2 / 1.0 + 0.1 / 4.0) / (1.0 / 1.0 + 1.0 / 4.0);
        assert!((est.mean - expected).abs() < 1e-12);
    }

    #[test]
    fn zero_uncertainty_in_mixed_set_uses_floor() {
        let mut mog = horizontal_mog(2, 10.0);
        mog.traces.set_pick(0, 50.0).unwrap();
        mog.traces.set_uncertainty(0, 0.0).unwrap();
        mog.traces.set_pick(1, 100.0).unwrap();
        mog.traces.set_uncertainty(1, 2.0).unwrap();
        let est = apparent_velocity(&mog);
        assert!(est.weighted);
        // The zero is floored to 2.0, the smallest positive uncertainty.
        let expected = (0.2 / 2.0 + 0.1 / 2.0) / (1.0 / 2.0 + 1.0 / 2.0);
        assert!((est.mean - expected).abs() < 1e-12);
        assert!(est.mean.is_finite());
    }

    #[test]
    fn weighted_mean_invariant_under_uncertainty_scaling() {
        let mut rng = TestRng(0x9e3779b97f4a7c15);
        for round in 0..20 {
            let ntrace = 3 + (round % 5);
            let mut mog = horizontal_mog(ntrace, 10.0);
            for i in 0..ntrace {
                mog.traces
                    .set_pick(i, 20.0 + 180.0 * rng.next_f64())
                    .unwrap();
                // Keep an occasional zero in the mix.
                let e = if rng.next_f64() < 0.25 {
                    0.0
                } else {
                    0.1 + rng.next_f64()
                };
                mog.traces.set_uncertainty(i, e).unwrap();
            }
            let base = apparent_velocity(&mog);

            let scale = 0.5 + 4.0 * rng.next_f64();
            for i in 0..ntrace {
                let scaled = mog.traces.et[i] * scale;
                mog.traces.set_uncertainty(i, scaled).unwrap();
            }
            let scaled = apparent_velocity(&mog);
            assert!(
                (base.mean - scaled.mean).abs() < 1e-9,
                "round {round}: {} vs {}",
                base.mean,
                scaled.mean
            );
        }
    }

    #[test]
    fn empty_qualifying_set_is_zero_not_error() {
        let mog = horizontal_mog(3, 10.0);
        let est = apparent_velocity(&mog);
        assert!(est.indices.is_empty());
        assert_eq!(est.mean, 0.0);
    }

    fn air_shot_with_t0(name: &str, t0: f64, distances: &[f64]) -> AirShot {
        let pairs: Vec<(Point3, Point3)> = distances
            .iter()
            .map(|&d| (Point3::new(0.0, 0.0, 0.0), Point3::new(d, 0.0, 0.0)))
            .collect();
        let mut shot = AirShot::new(traces_with_geometry(&pairs));
        shot.traces.name = name.to_string();
        for (i, &d) in distances.iter().enumerate() {
            shot.traces.set_pick(i, d / AIR_VELOCITY + t0).unwrap();
        }
        shot
    }

    #[test]
    fn shot_time_zero_recovers_offset() {
        let shot = air_shot_with_t0("A01", 3.5, &[1.0, 2.0, 4.0]);
        assert!((shot_time_zero(&shot) - 3.5).abs() < 1e-9);
    }

    #[test]
    fn pickless_shot_contributes_zero() {
        let shot = AirShot::new(traces_with_geometry(&[(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
        )]));
        assert_eq!(shot_time_zero(&shot), 0.0);
    }

    #[test]
    fn drift_correction_interpolates_by_trace_index() {
        let mut mog = horizontal_mog(5, 10.0);
        for i in 0..5 {
            mog.traces.set_pick(i, 60.0).unwrap();
        }
        mog.traces.reset_pick(2).unwrap();
        mog.av = Some(0);
        mog.ap = Some(1);
        let shots = vec![
            air_shot_with_t0("A01", 2.0, &[1.0, 2.0]),
            air_shot_with_t0("A02", 4.0, &[1.0, 2.0]),
        ];

        let (corrected, t0) = corrected_travel_times(&mog, &shots).unwrap();
        assert!((t0.before.unwrap() - 2.0).abs() < 1e-9);
        assert!((t0.after.unwrap() - 4.0).abs() < 1e-9);
        let expected = [58.0, 57.5, UNPICKED, 56.5, 56.0];
        for (got, want) in corrected.iter().zip(expected) {
            assert!((got - want).abs() < 1e-9, "{got} vs {want}");
        }
    }

    #[test]
    fn single_sided_pairing_is_constant() {
        let mut mog = horizontal_mog(3, 10.0);
        for i in 0..3 {
            mog.traces.set_pick(i, 60.0).unwrap();
        }
        mog.av = Some(0);
        let shots = vec![air_shot_with_t0("A01", 1.5, &[1.0])];
        let (corrected, t0) = corrected_travel_times(&mog, &shots).unwrap();
        assert_eq!(t0.after, None);
        for got in corrected {
            assert!((got - 58.5).abs() < 1e-9);
        }
    }

    #[test]
    fn unpaired_mog_corrects_by_zero() {
        let mut mog = horizontal_mog(2, 10.0);
        mog.traces.set_pick(0, 60.0).unwrap();
        let (corrected, t0) = corrected_travel_times(&mog, &[]).unwrap();
        assert_eq!(t0.before, None);
        assert_eq!(t0.after, None);
        assert_eq!(corrected, vec![60.0, UNPICKED]);
    }

    #[test]
    fn dangling_reference_fails() {
        let mut mog = horizontal_mog(2, 10.0);
        mog.av = Some(7);
        assert!(matches!(
            corrected_travel_times(&mog, &[]),
            Err(PickError::Reference(_))
        ));
    }

    #[test]
    fn statistics_over_qualifying_set() {
        let mut mog = horizontal_mog(3, 10.0);
        mog.traces.set_pick(0, 50.0).unwrap();
        mog.traces.set_pick(1, 100.0).unwrap();
        let stats = pick_statistics(&mog);
        assert_eq!(stats.counts.picked, 2);
        assert!((stats.tt_mean - 75.0).abs() < 1e-12);
        assert!((stats.tt_std - 25.0).abs() < 1e-12);
        assert!((stats.velocity_mean - 0.15).abs() < 1e-12);
        assert!(stats.angle_min.abs() < 1e-12 && stats.angle_max.abs() < 1e-12);
    }

    #[test]
    fn statistics_empty_set_is_all_zero() {
        let mog = horizontal_mog(2, 10.0);
        let stats = pick_statistics(&mog);
        assert_eq!(stats.tt_mean, 0.0);
        assert_eq!(stats.velocity_std, 0.0);
        assert_eq!(stats.angle_min, 0.0);
    }
}
