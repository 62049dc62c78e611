/*!
 * Descriptive statistics for one work lot.
 *
 * All pairwise distances inside a lot are examined, which is O(k²) in the lot size - fine,
 * because lots are capacity-bounded. With the road-network oracle every pair goes through the
 * memo, so a lot of k points costs at most k(k-1)/2 route lookups per run.
 */

use crate::{
    clusterer::ClusteredRecord,
    distance::{DistanceOracle, RoadDistance},
};

/** The aggregate properties of one work lot. Recomputed from members, never stored. */
#[derive(Debug, Clone)]
pub struct ClusterMetrics {
    /// The number of structures in the lot.
    pub points: usize,
    /// Sum of the final costs, R$.
    pub total_cost: f64,
    /// Mean final cost, R$.
    pub avg_cost: f64,
    /// Mean latitude of the members.
    pub centroid_lat: f64,
    /// Mean longitude of the members.
    pub centroid_lon: f64,
    /// Largest pairwise distance. Unreachable as soon as any pair has no route.
    pub max_distance: RoadDistance,
    /// Mean pairwise distance over the reachable pairs; Unreachable when no pair has a route.
    pub avg_distance: RoadDistance,
    /// True when at least one pair had no route, so the average is computed on a subset.
    pub degraded: bool,
}

impl ClusterMetrics {
    /**
     * Compute the metrics for the members of one lot.
     *
     * Lots of one member (or none) have both distance metrics defined as zero.
     */
    pub fn compute(members: &[&ClusteredRecord], oracle: &mut DistanceOracle) -> Self {
        let points = members.len();

        let total_cost: f64 = members.iter().map(|m| m.record.final_cost).sum();
        let avg_cost = if points > 0 {
            total_cost / points as f64
        } else {
            0.0
        };

        let (centroid_lat, centroid_lon) = if points > 0 {
            (
                members.iter().map(|m| m.record.latitude).sum::<f64>() / points as f64,
                members.iter().map(|m| m.record.longitude).sum::<f64>() / points as f64,
            )
        } else {
            (f64::NAN, f64::NAN)
        };

        if points <= 1 {
            return ClusterMetrics {
                points,
                total_cost,
                avg_cost,
                centroid_lat,
                centroid_lon,
                max_distance: RoadDistance::Km(0.0),
                avg_distance: RoadDistance::Km(0.0),
                degraded: false,
            };
        }

        let mut max_distance = RoadDistance::Km(0.0);
        let mut reachable_sum = 0.0;
        let mut reachable_pairs = 0_usize;
        let mut unreachable_pairs = 0_usize;

        for i in 0..points {
            for j in (i + 1)..points {
                let a = &members[i].record;
                let b = &members[j].record;
                let dist = oracle.distance(a.latitude, a.longitude, b.latitude, b.longitude);

                max_distance = max_distance.max(dist);
                match dist.km() {
                    Some(km) => {
                        reachable_sum += km;
                        reachable_pairs += 1;
                    }
                    None => unreachable_pairs += 1,
                }
            }
        }

        let avg_distance = if reachable_pairs > 0 {
            RoadDistance::Km(reachable_sum / reachable_pairs as f64)
        } else {
            RoadDistance::Unreachable
        };

        ClusterMetrics {
            points,
            total_cost,
            avg_cost,
            centroid_lat,
            centroid_lon,
            max_distance,
            avg_distance,
            degraded: unreachable_pairs > 0,
        }
    }
}
