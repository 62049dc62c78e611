/*!
 * Partition the eligible records of each local unit into capacity-bounded work lots.
 *
 * Every local unit is clustered independently. The cluster count for a unit of n records under a
 * lot size of c is max(1, ceil(n / c)); k-means then splits the unit into that many lots over
 * joint location+cost features. Note the count is a target, not a hard cap: k-means balances
 * geometry, so an individual lot can end up holding more than c records when the points bunch
 * up. That is the intended contract (minimize lot count, group cheap-near work together) and
 * there is deliberately no rebalancing pass.
 *
 * Cost participates in the feature space on purpose: a lot of similarly priced structures close
 * to each other is worth more than a tight lot with one outlier that dwarfs the budget.
 *
 * Global ids: unit names are processed in lexicographic order and each unit's local ids are
 * offset by a running counter, so the same input always produces the same globally unique ids.
 */

use crate::{error::PipelineError, records::FilteredRecord, OaeLotsResult};
use rand::{rngs::StdRng, Rng, SeedableRng};
use rustc_hash::FxHashMap;

/// Fixed seed so repeated runs over identical input produce identical lots.
pub const KMEANS_SEED: u64 = 42;

const MAX_KMEANS_ITERATIONS: usize = 300;
const CONVERGENCE_THRESHOLD: f64 = 1.0e-6;

/** A record with its assigned lot. */
#[derive(Debug, Clone)]
pub struct ClusteredRecord {
    pub record: FilteredRecord,
    /// Globally unique across all local units of the run.
    pub cluster_id: i64,
    /// Human readable lot name, `{local unit}-C{cluster id}`.
    pub cluster_label: String,
}

/**
 * Assign every eligible record to a work lot.
 *
 * Records are grouped by local unit; units are processed in lexicographic name order. Output
 * order is unit order, input order within a unit. A unit with no records simply produces no
 * lots. An internal failure in any unit aborts the whole run - no partial assignment escapes.
 */
pub fn assign_clusters(
    records: Vec<FilteredRecord>,
    max_cluster_size: usize,
) -> OaeLotsResult<Vec<ClusteredRecord>> {
    if max_cluster_size == 0 {
        return Err(PipelineError::new("lot size must be at least 1").into());
    }

    let mut by_unit: FxHashMap<String, Vec<FilteredRecord>> = FxHashMap::default();
    for record in records {
        by_unit
            .entry(record.local_unit.clone())
            .or_insert_with(Vec::new)
            .push(record);
    }

    let mut unit_names: Vec<String> = by_unit.keys().cloned().collect();
    unit_names.sort();

    let mut next_cluster_id: i64 = 0;
    let mut clustered = Vec::new();

    for unit in &unit_names {
        let unit_records = by_unit.remove(unit).unwrap_or_default();
        if unit_records.is_empty() {
            continue;
        }

        let n = unit_records.len();
        let k = ((n + max_cluster_size - 1) / max_cluster_size).max(1);
        log::info!(
            "local unit {}: {} point(s) into {} lot(s) (target {} per lot)",
            unit,
            n,
            k,
            max_cluster_size
        );

        let local_ids = cluster_unit(&unit_records, k)?;

        let max_assigned = local_ids.iter().copied().max().unwrap_or(0) as i64;
        for (record, local_id) in unit_records.into_iter().zip(local_ids) {
            let cluster_id = next_cluster_id + local_id as i64;
            let cluster_label = format!("{}-C{}", unit, cluster_id);
            clustered.push(ClusteredRecord {
                record,
                cluster_id,
                cluster_label,
            });
        }

        next_cluster_id += max_assigned + 1;
    }

    Ok(clustered)
}

/// Cluster one local unit into k lots, returning a local id in 0..k for each record.
fn cluster_unit(records: &[FilteredRecord], k: usize) -> OaeLotsResult<Vec<usize>> {
    if k == 1 {
        return Ok(vec![0; records.len()]);
    }

    if k > records.len() {
        // Can't happen with k = ceil(n / c), but a violated invariant here would silently
        // produce empty lots downstream.
        return Err(PipelineError::new(format!(
            "requested {} lots for {} records",
            k,
            records.len()
        ))
        .into());
    }

    // Features are [lat, lon, cost / max cost in the unit]. Normalizing the cost puts it on a
    // scale comparable to degrees of latitude and longitude.
    let max_cost = records
        .iter()
        .map(|r| r.final_cost)
        .fold(0.0_f64, f64::max);

    let features: Vec<[f64; 3]> = records
        .iter()
        .map(|r| {
            let cost_norm = if max_cost > 0.0 {
                r.final_cost / max_cost
            } else {
                0.0
            };
            [r.latitude, r.longitude, cost_norm]
        })
        .collect();

    Ok(kmeans(&features, k))
}

/*-------------------------------------------------------------------------------------------------
 *                                      Seeded k-means
 *-----------------------------------------------------------------------------------------------*/

fn squared_distance(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let diff = x - y;
            diff * diff
        })
        .sum()
}

fn nearest_centroid(point: &[f64; 3], centroids: &[[f64; 3]]) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (i, centroid) in centroids.iter().enumerate() {
        let dist = squared_distance(point, centroid);
        if dist < best_dist {
            best = i;
            best_dist = dist;
        }
    }
    best
}

/// Lloyd's algorithm over a fixed-seed RNG. Deterministic for a given input and k.
fn kmeans(data: &[[f64; 3]], k: usize) -> Vec<usize> {
    let mut rng = StdRng::seed_from_u64(KMEANS_SEED);

    let mut centroids = initialize_centroids(data, k, &mut rng);
    let mut assignments: Vec<usize> = vec![0; data.len()];
    let mut prev_inertia = f64::INFINITY;

    for _iter in 0..MAX_KMEANS_ITERATIONS {
        for (slot, point) in assignments.iter_mut().zip(data.iter()) {
            *slot = nearest_centroid(point, &centroids);
        }

        let mut new_centroids = vec![[0.0; 3]; k];
        let mut counts = vec![0_usize; k];

        for (point, &cluster) in data.iter().zip(assignments.iter()) {
            for (sum, val) in new_centroids[cluster].iter_mut().zip(point.iter()) {
                *sum += val;
            }
            counts[cluster] += 1;
        }

        for (centroid, &count) in new_centroids.iter_mut().zip(counts.iter()) {
            if count > 0 {
                for val in centroid.iter_mut() {
                    *val /= count as f64;
                }
            } else {
                // Empty cluster: reseed it on a random data point.
                *centroid = data[rng.gen_range(0..data.len())];
            }
        }

        let inertia: f64 = data
            .iter()
            .zip(assignments.iter())
            .map(|(point, &cluster)| squared_distance(point, &new_centroids[cluster]))
            .sum();

        centroids = new_centroids;

        if (prev_inertia - inertia).abs() < CONVERGENCE_THRESHOLD * prev_inertia.max(1.0) {
            break;
        }
        prev_inertia = inertia;
    }

    for (slot, point) in assignments.iter_mut().zip(data.iter()) {
        *slot = nearest_centroid(point, &centroids);
    }

    // Duplicate points can leave a centroid with no members at convergence. Every local id in
    // 0..k must be used, so hand each stranded id one record from the fullest cluster.
    fill_empty_clusters(k, &mut assignments);

    assignments
}

fn fill_empty_clusters(k: usize, assignments: &mut [usize]) {
    let mut counts = vec![0_usize; k];
    for &a in assignments.iter() {
        counts[a] += 1;
    }

    for empty in 0..k {
        if counts[empty] > 0 {
            continue;
        }

        let donor = counts
            .iter()
            .enumerate()
            .max_by_key(|&(_, &c)| c)
            .map(|(i, _)| i)
            .unwrap_or(0);
        if counts[donor] <= 1 {
            continue;
        }

        // Move the donor's last member, by index, so the fix is deterministic.
        if let Some(idx) = assignments.iter().rposition(|&a| a == donor) {
            assignments[idx] = empty;
            counts[donor] -= 1;
            counts[empty] += 1;
        }
    }
}

/// k-means++ style seeding: spread the initial centroids out proportionally to distance².
fn initialize_centroids(data: &[[f64; 3]], k: usize, rng: &mut StdRng) -> Vec<[f64; 3]> {
    let mut centroids = Vec::with_capacity(k);

    centroids.push(data[rng.gen_range(0..data.len())]);

    while centroids.len() < k {
        let distances: Vec<f64> = data
            .iter()
            .map(|point| {
                centroids
                    .iter()
                    .map(|c| squared_distance(point, c))
                    .fold(f64::INFINITY, f64::min)
            })
            .collect();

        let total: f64 = distances.iter().sum();
        if total == 0.0 {
            // Every point already sits on a centroid; any pick works.
            centroids.push(data[rng.gen_range(0..data.len())]);
            continue;
        }

        let threshold = rng.gen::<f64>() * total;
        let mut cumsum = 0.0;
        let mut picked = None;
        for (i, &dist) in distances.iter().enumerate() {
            cumsum += dist;
            if cumsum >= threshold {
                picked = Some(i);
                break;
            }
        }

        let idx = picked.unwrap_or(data.len() - 1);
        centroids.push(data[idx]);
    }

    centroids
}

#[cfg(test)]
mod test {
    use super::*;

    fn record(unit: &str, lat: f64, lon: f64, cost: f64) -> FilteredRecord {
        FilteredRecord {
            sge: Some(1),
            codpro: "P1".to_owned(),
            structure_id: String::new(),
            highway: String::new(),
            km: String::new(),
            municipality: String::new(),
            overall_status: String::new(),
            detailed_status: String::new(),
            latitude: lat,
            longitude: lon,
            length: None,
            width: None,
            grade: 3,
            final_cost: cost,
            local_unit: unit.to_owned(),
        }
    }

    fn spread_records(unit: &str, n: usize) -> Vec<FilteredRecord> {
        (0..n)
            .map(|i| {
                record(
                    unit,
                    -10.0 - (i as f64) * 0.13,
                    -37.0 - ((i * 7) % 13) as f64 * 0.21,
                    1.0e5 * (1.0 + (i % 5) as f64),
                )
            })
            .collect()
    }

    fn cluster_count(clustered: &[ClusteredRecord]) -> usize {
        let mut ids: Vec<i64> = clustered.iter().map(|c| c.cluster_id).collect();
        ids.sort_unstable();
        ids.dedup();
        ids.len()
    }

    #[test]
    fn test_cluster_count_is_ceil_n_over_c() {
        for (n, c, want) in [(25, 10, 3), (10, 10, 1), (11, 10, 2), (1, 10, 1), (30, 10, 3)] {
            let clustered = assign_clusters(spread_records("UL X", n), c).unwrap();
            assert_eq!(clustered.len(), n);
            assert_eq!(cluster_count(&clustered), want, "n={} c={}", n, c);
        }
    }

    #[test]
    fn test_single_cluster_short_circuit() {
        let clustered = assign_clusters(spread_records("UL X", 5), 10).unwrap();
        assert!(clustered.iter().all(|c| c.cluster_id == 0));
        assert!(clustered.iter().all(|c| c.cluster_label == "UL X-C0"));
    }

    #[test]
    fn test_global_ids_unique_across_units() {
        let mut records = spread_records("UL Bravo", 25);
        records.extend(spread_records("UL Alfa", 15));

        let clustered = assign_clusters(records, 10).unwrap();

        // Lexicographic unit order: Alfa's 2 lots come first (ids 0..=1), Bravo's 3 after.
        let alfa_ids: Vec<i64> = clustered
            .iter()
            .filter(|c| c.record.local_unit == "UL Alfa")
            .map(|c| c.cluster_id)
            .collect();
        let bravo_ids: Vec<i64> = clustered
            .iter()
            .filter(|c| c.record.local_unit == "UL Bravo")
            .map(|c| c.cluster_id)
            .collect();

        assert!(alfa_ids.iter().all(|&id| id <= 1));
        assert!(bravo_ids.iter().all(|&id| id >= 2 && id <= 4));

        // No id is shared between the units.
        assert!(alfa_ids.iter().all(|id| !bravo_ids.contains(id)));
    }

    #[test]
    fn test_labels_carry_unit_and_global_id() {
        let mut records = spread_records("UL Bravo", 12);
        records.extend(spread_records("UL Alfa", 3));

        let clustered = assign_clusters(records, 10).unwrap();

        for c in &clustered {
            assert_eq!(
                c.cluster_label,
                format!("{}-C{}", c.record.local_unit, c.cluster_id)
            );
        }
    }

    #[test]
    fn test_determinism() {
        let a = assign_clusters(spread_records("UL X", 40), 10).unwrap();
        let b = assign_clusters(spread_records("UL X", 40), 10).unwrap();

        let ids_a: Vec<i64> = a.iter().map(|c| c.cluster_id).collect();
        let ids_b: Vec<i64> = b.iter().map(|c| c.cluster_id).collect();
        assert_eq!(ids_a, ids_b);
    }

    #[test]
    fn test_every_record_keeps_its_unit() {
        let mut records = spread_records("UL Alfa", 25);
        records.extend(spread_records("UL Bravo", 25));

        let clustered = assign_clusters(records, 10).unwrap();

        // All members of any one cluster share the same local unit.
        let mut unit_of: std::collections::HashMap<i64, String> = Default::default();
        for c in &clustered {
            let unit = unit_of
                .entry(c.cluster_id)
                .or_insert_with(|| c.record.local_unit.clone());
            assert_eq!(*unit, c.record.local_unit);
        }
    }

    #[test]
    fn test_duplicate_points_still_fill_every_lot() {
        // 20 identical coordinates and costs, lot size 10: k-means alone would collapse to a
        // single lot, but both local ids must be used.
        let records: Vec<FilteredRecord> =
            (0..20).map(|_| record("UL X", -10.0, -37.0, 5.0e5)).collect();

        let clustered = assign_clusters(records, 10).unwrap();
        assert_eq!(cluster_count(&clustered), 2);
    }

    #[test]
    fn test_zero_lot_size_rejected() {
        assert!(assign_clusters(spread_records("UL X", 3), 0).is_err());
    }
}
