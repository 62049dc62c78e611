pub use clusterer::{assign_clusters, ClusteredRecord, KMEANS_SEED};
pub use distance::{DistanceOracle, DistancePolicy, RoadDistance};
pub use error::{InputError, OaeLotsResult, PipelineError};
pub use geo::great_circle_distance;
pub use merge::merge_records;
pub use metrics::ClusterMetrics;
pub use output::{
    project_all_points, project_cluster_summary, AllPointsRow, ClusterSummaryRow, DATASET_TAG,
};
pub use pipeline::{filter_eligible, run, RunConfig, RunSummary};
pub use records::{
    normalize_key, CostRecord, Field, FilteredRecord, Grade, GroupRecord, InspectionRecord,
    MergedRecord,
};
pub use region::Uf;
pub use sheets::{read_costs, read_groups, read_inspections, write_output};

/**************************************************************************************************
 * Private Implementation
 *************************************************************************************************/
mod clusterer;
mod distance;
mod error;
mod geo;
mod merge;
mod metrics;
mod output;
mod pipeline;
mod records;
mod region;
mod sheets;
