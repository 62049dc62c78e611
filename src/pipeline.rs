/*!
 * The one-shot analysis pipeline: read the three workbooks, reconcile, filter, cluster, measure,
 * and write the editor workbook.
 *
 * One run is one synchronous, single-threaded pass. All mutable working state (the distance
 * memo, the global cluster counter) is owned by the run and dropped with it. The policy is
 * fail-closed: anything unanticipated propagates out of [run] before the output file is written,
 * so a failed run leaves nothing behind. Anticipated data noise (bad grades, unmatched keys,
 * unreachable routes) is handled in place and never aborts.
 */

use crate::{
    clusterer::{assign_clusters, ClusteredRecord},
    distance::{DistanceOracle, DistancePolicy},
    merge::merge_records,
    metrics::ClusterMetrics,
    output::{project_all_points, project_cluster_summary},
    records::{FilteredRecord, MergedRecord},
    region::Uf,
    sheets,
    OaeLotsResult,
};
use std::path::PathBuf;

/** Everything one analysis run needs to know. */
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// The inspection mapping workbook.
    pub inspection_file: PathBuf,
    /// The parametric study workbook (sheet "Simulação").
    pub cost_file: PathBuf,
    /// The general control workbook (sheet "CONTROLE GERAL PROARTE").
    pub control_file: PathBuf,
    /// Where to write the editor workbook.
    pub output_file: PathBuf,
    /// The state the analysis is scoped to.
    pub uf: Uf,
    /// Reference lot size: the soft capacity bound per lot.
    pub max_cluster_size: usize,
    /// Inclusive grade range; structures outside it are not clustered.
    pub min_grade: i32,
    pub max_grade: i32,
    /// Which distance metric the lot statistics use.
    pub distance_policy: DistancePolicy,
    /// Base URL of the routing service, used only under the road-network policy.
    pub route_server: String,
}

/** What a finished run looks like, for reporting. */
#[derive(Debug)]
pub struct RunSummary {
    /// Rows in the inspection sheet (also the size of the merged set).
    pub input_rows: usize,
    /// Rows that survived the eligibility filter.
    pub eligible_rows: usize,
    /// Per-lot statistics, ordered by cluster id.
    pub clusters: Vec<(i64, String, ClusterMetrics)>,
    /// Routing calls that actually went over the wire.
    pub api_calls: u64,
}

/**
 * Keep the merged records that are eligible for clustering.
 *
 * A record must be in the configured state, carry a real grade inside the configured range, and
 * have coordinates, a local unit, and a cost. Anything else is excluded entirely - an ineligible
 * record is never orphaned into a lot of its own.
 */
pub fn filter_eligible(merged: Vec<MergedRecord>, config: &RunConfig) -> Vec<FilteredRecord> {
    merged
        .into_iter()
        .filter_map(|m| {
            if !config.uf.matches_field(&m.inspection.uf) {
                return None;
            }
            if !m.grade.in_range(config.min_grade, config.max_grade) {
                return None;
            }

            let latitude = m.inspection.latitude.filter(|l| l.is_finite())?;
            let longitude = m.inspection.longitude.filter(|l| l.is_finite())?;
            let final_cost = m.final_cost.filter(|c| c.is_finite())?;
            let local_unit = m.local_unit.clone()?;

            Some(FilteredRecord {
                sge: m.merge_key.parse::<i64>().ok(),
                codpro: m.codpro_key.clone(),
                structure_id: m.inspection.structure_id.display_or_empty(),
                highway: m.inspection.highway.display_or_empty(),
                km: m.inspection.km.display_or_empty(),
                municipality: m.inspection.municipality.display_or_empty(),
                overall_status: m.inspection.overall_status.display_or_empty(),
                detailed_status: m.inspection.detailed_status.display_or_empty(),
                latitude,
                longitude,
                length: m.length,
                width: m.width,
                grade: m.grade.consolidated(),
                final_cost,
                local_unit,
            })
        })
        .collect()
}

/// Run the whole pipeline described by the configuration.
pub fn run(config: &RunConfig) -> OaeLotsResult<RunSummary> {
    log::info!("reading input workbooks");
    let inspections = sheets::read_inspections(&config.inspection_file)?;
    let costs = sheets::read_costs(&config.cost_file)?;
    let groups = sheets::read_groups(&config.control_file)?;

    log::info!("merging {} inspection rows", inspections.len());
    let input_rows = inspections.len();
    let merged = merge_records(inspections, &costs, &groups);
    debug_assert_eq!(merged.len(), input_rows);

    let filtered = filter_eligible(merged, config);
    let eligible_rows = filtered.len();
    log::info!(
        "{} of {} rows eligible for {} (grades {}..={})",
        eligible_rows,
        input_rows,
        config.uf,
        config.min_grade,
        config.max_grade
    );

    let clustered = assign_clusters(filtered, config.max_cluster_size)?;

    let mut oracle = DistanceOracle::new(config.distance_policy, &config.route_server)?;
    let clusters = measure_clusters(&clustered, &mut oracle);

    let all_points = project_all_points(&clustered);
    let summary = project_cluster_summary(&clustered);
    sheets::write_output(&config.output_file, &all_points, &summary)?;

    Ok(RunSummary {
        input_rows,
        eligible_rows,
        clusters,
        api_calls: oracle.api_call_count(),
    })
}

fn measure_clusters(
    clustered: &[ClusteredRecord],
    oracle: &mut DistanceOracle,
) -> Vec<(i64, String, ClusterMetrics)> {
    let mut ids: Vec<i64> = clustered.iter().map(|c| c.cluster_id).collect();
    ids.sort_unstable();
    ids.dedup();

    ids.into_iter()
        .map(|id| {
            let members: Vec<&ClusteredRecord> =
                clustered.iter().filter(|c| c.cluster_id == id).collect();
            let label = members[0].cluster_label.clone();
            let metrics = ClusterMetrics::compute(&members, oracle);

            if metrics.degraded {
                log::warn!(
                    "lot {}: some routes unreachable, distance stats cover reachable pairs only",
                    label
                );
            }

            (id, label, metrics)
        })
        .collect()
}
