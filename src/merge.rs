/*!
 * The three-way merge that reconciles the input sheets into one record set.
 *
 * The inspection sheet is the anchor: every inspection row survives the merge, and cost and
 * local-unit attachments that find no match are left as `None` rather than dropping the row.
 */

use crate::records::{normalize_key, CostRecord, Grade, GroupRecord, InspectionRecord, MergedRecord};
use rustc_hash::FxHashMap;

/**
 * Left-join the inspection records against the cost and control sheets.
 *
 * Merge keys (Código SGE / SGE_AJUSTE) and project codes (CodPro) are normalized on both sides
 * before matching. The control sheet is deduplicated by project code, first occurrence wins.
 * The output always has exactly one record per inspection row.
 */
pub fn merge_records(
    inspections: Vec<InspectionRecord>,
    costs: &[CostRecord],
    groups: &[GroupRecord],
) -> Vec<MergedRecord> {
    // Index the right sides by their normalized keys. First occurrence wins in both maps, which
    // doubles as the dedup rule for the control sheet. Empty keys never match anything.
    let mut cost_index: FxHashMap<String, &CostRecord> = FxHashMap::default();
    for cost in costs {
        let key = normalize_key(&cost.sge_adjusted);
        if !key.is_empty() {
            cost_index.entry(key).or_insert(cost);
        }
    }

    let mut group_index: FxHashMap<String, &GroupRecord> = FxHashMap::default();
    for group in groups {
        let key = normalize_key(&group.codpro);
        if !key.is_empty() {
            group_index.entry(key).or_insert(group);
        }
    }

    let mut merged = Vec::with_capacity(inspections.len());
    for inspection in inspections {
        let merge_key = normalize_key(&inspection.sge);
        let codpro_key = normalize_key(&inspection.codpro);

        let cost = if merge_key.is_empty() {
            None
        } else {
            cost_index.get(&merge_key).copied()
        };

        let local_unit = if codpro_key.is_empty() {
            None
        } else {
            group_index
                .get(&codpro_key)
                .and_then(|group| group.local_unit.clone())
        };

        let grade = Grade::coerce(&inspection.raw_grade);

        merged.push(MergedRecord {
            merge_key,
            codpro_key,
            final_cost: cost.and_then(|c| c.final_cost),
            length: cost.and_then(|c| c.length),
            width: cost.and_then(|c| c.width),
            local_unit,
            grade,
            inspection,
        });
    }

    merged
}
