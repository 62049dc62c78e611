/*!
 * Projection of clustered records into the two fixed schemas the map editor consumes.
 *
 * Every column is always present: text fields that were missing upstream become empty strings,
 * and the SGE column stays a genuinely missing integer (a blank cell) rather than a fake zero.
 */

use crate::clusterer::ClusteredRecord;

/// Tag attached to every point row, reserved for future multi-dataset merging in the editor.
pub const DATASET_TAG: &str = "Principal";

/** One row of the "All Points" output sheet. */
#[derive(Debug, Clone)]
pub struct AllPointsRow {
    /// 0-based sequential id in final record order.
    pub point_id: usize,
    pub cluster_id: i64,
    pub cluster_label: String,
    pub local_unit: String,
    pub structure_id: String,
    pub length: Option<f64>,
    pub width: Option<f64>,
    /// Nullable integer; never substituted with zero.
    pub sge: Option<i64>,
    pub codpro: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Consolidated grade; the -99 sentinel is allowed here.
    pub grade: i32,
    pub final_cost: f64,
    pub highway: String,
    pub km: String,
    pub municipality: String,
    pub overall_status: String,
    pub detailed_status: String,
    pub dataset: &'static str,
}

/** One row of the "Cluster Summary" output sheet. */
#[derive(Debug, Clone)]
pub struct ClusterSummaryRow {
    pub cluster_id: i64,
    pub cluster_label: String,
    pub local_unit: String,
    pub points: usize,
    pub total_cost: f64,
    pub avg_cost: f64,
}

/// Project every clustered record into the "All Points" schema, in final record order.
pub fn project_all_points(clustered: &[ClusteredRecord]) -> Vec<AllPointsRow> {
    clustered
        .iter()
        .enumerate()
        .map(|(point_id, c)| AllPointsRow {
            point_id,
            cluster_id: c.cluster_id,
            cluster_label: c.cluster_label.clone(),
            local_unit: c.record.local_unit.clone(),
            structure_id: c.record.structure_id.clone(),
            length: c.record.length,
            width: c.record.width,
            sge: c.record.sge,
            codpro: c.record.codpro.clone(),
            latitude: c.record.latitude,
            longitude: c.record.longitude,
            grade: c.record.grade,
            final_cost: c.record.final_cost,
            highway: c.record.highway.clone(),
            km: c.record.km.clone(),
            municipality: c.record.municipality.clone(),
            overall_status: c.record.overall_status.clone(),
            detailed_status: c.record.detailed_status.clone(),
            dataset: DATASET_TAG,
        })
        .collect()
}

/// One summary row per lot, ordered by cluster id.
pub fn project_cluster_summary(clustered: &[ClusteredRecord]) -> Vec<ClusterSummaryRow> {
    let mut ids: Vec<i64> = clustered.iter().map(|c| c.cluster_id).collect();
    ids.sort_unstable();
    ids.dedup();

    ids.into_iter()
        .map(|cluster_id| {
            let members: Vec<&ClusteredRecord> = clustered
                .iter()
                .filter(|c| c.cluster_id == cluster_id)
                .collect();

            let total_cost: f64 = members.iter().map(|m| m.record.final_cost).sum();

            ClusterSummaryRow {
                cluster_id,
                cluster_label: members[0].cluster_label.clone(),
                local_unit: members[0].record.local_unit.clone(),
                points: members.len(),
                total_cost,
                avg_cost: total_cost / members.len() as f64,
            }
        })
        .collect()
}
