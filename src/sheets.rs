/*!
 * The spreadsheet boundary: parse the three input workbooks into records and serialize the two
 * output sheets.
 *
 * Header rows are not assumed to sit at a fixed offset. Each sheet is scanned for a row
 * containing its anchor column name, and every column is then resolved by header text. A missing
 * file, sheet, or required column is an [InputError](crate::InputError) raised before any
 * processing starts.
 */

use crate::{
    error::InputError,
    output::{AllPointsRow, ClusterSummaryRow},
    records::{CostRecord, Field, GroupRecord, InspectionRecord},
    OaeLotsResult,
};
use calamine::{open_workbook, Data, Range, Reader, Xlsx};
use rust_xlsxwriter::Workbook;
use rustc_hash::FxHashMap;
use std::path::Path;

/// Sub-sheet of the parametric study workbook holding the simulated costs.
const COST_SHEET: &str = "Simulação";
/// Sub-sheet of the general control workbook mapping projects to local units.
const CONTROL_SHEET: &str = "CONTROLE GERAL PROARTE";

/// How many leading rows to scan when looking for the header row.
const HEADER_SCAN_ROWS: usize = 16;

/*-------------------------------------------------------------------------------------------------
 *                                          Reading
 *-----------------------------------------------------------------------------------------------*/

struct Sheet {
    range: Range<Data>,
    header_row: usize,
    columns: FxHashMap<String, usize>,
    name: String,
}

impl Sheet {
    /// Load a named sheet and locate its header row by the anchor column name.
    fn load(path: &Path, sheet_name: &str, anchor: &str) -> OaeLotsResult<Self> {
        let mut workbook: Xlsx<_> = open_workbook(path).map_err(|err| {
            InputError::new(format!("cannot open {}: {}", path.display(), err))
        })?;

        let range = workbook.worksheet_range(sheet_name).map_err(|_| {
            InputError::new(format!(
                "{} has no sheet named \"{}\"",
                path.display(),
                sheet_name
            ))
        })?;

        Self::from_range(range, sheet_name, anchor)
    }

    /// Like [Sheet::load] but takes the first sheet in the workbook, whatever its name.
    fn load_first(path: &Path, anchor: &str) -> OaeLotsResult<Self> {
        let mut workbook: Xlsx<_> = open_workbook(path).map_err(|err| {
            InputError::new(format!("cannot open {}: {}", path.display(), err))
        })?;

        let sheet_name = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| InputError::new(format!("{} has no sheets", path.display())))?;

        let range = workbook
            .worksheet_range(&sheet_name)
            .map_err(|err| InputError::new(format!("{}: {}", path.display(), err)))?;

        Self::from_range(range, &sheet_name, anchor)
    }

    fn from_range(range: Range<Data>, sheet_name: &str, anchor: &str) -> OaeLotsResult<Self> {
        let mut header_row = None;

        'rows: for (row_idx, row) in range.rows().take(HEADER_SCAN_ROWS).enumerate() {
            for cell in row {
                if let Data::String(s) = cell {
                    if s.trim() == anchor {
                        header_row = Some(row_idx);
                        break 'rows;
                    }
                }
            }
        }

        let header_row = header_row.ok_or_else(|| {
            InputError::new(format!(
                "sheet \"{}\" has no \"{}\" header column",
                sheet_name, anchor
            ))
        })?;

        let mut columns = FxHashMap::default();
        if let Some(row) = range.rows().nth(header_row) {
            for (col_idx, cell) in row.iter().enumerate() {
                if let Data::String(s) = cell {
                    columns.entry(s.trim().to_owned()).or_insert(col_idx);
                }
            }
        }

        Ok(Sheet {
            range,
            header_row,
            columns,
            name: sheet_name.to_owned(),
        })
    }

    /// The column index for a header, or an input error naming sheet and column.
    fn column(&self, header: &str) -> OaeLotsResult<usize> {
        self.columns.get(header).copied().ok_or_else(|| {
            InputError::new(format!(
                "sheet \"{}\" is missing the \"{}\" column",
                self.name, header
            ))
            .into()
        })
    }

    /// Iterate the data rows below the header.
    fn data_rows(&self) -> impl Iterator<Item = &[Data]> {
        self.range.rows().skip(self.header_row + 1)
    }
}

fn cell_to_field(row: &[Data], col: usize) -> Field {
    match row.get(col) {
        Some(Data::String(s)) if !s.trim().is_empty() => Field::Text(s.clone()),
        Some(Data::Float(f)) => Field::Number(*f),
        Some(Data::Int(i)) => Field::Number(*i as f64),
        Some(Data::Bool(b)) => Field::Text(b.to_string()),
        Some(Data::DateTime(dt)) => Field::Number(dt.as_f64()),
        _ => Field::Absent,
    }
}

fn cell_to_number(row: &[Data], col: usize) -> Option<f64> {
    cell_to_field(row, col).as_number()
}

fn row_is_empty(row: &[Data], cols: &[usize]) -> bool {
    cols.iter().all(|&c| cell_to_field(row, c).is_absent())
}

/// Parse the inspection mapping workbook (the anchor side of the merge).
pub fn read_inspections(path: &Path) -> OaeLotsResult<Vec<InspectionRecord>> {
    let sheet = Sheet::load_first(path, "Código (SGE)")?;

    let sge = sheet.column("Código (SGE)")?;
    let codpro = sheet.column("CodPro")?;
    let latitude = sheet.column("Latitude")?;
    let longitude = sheet.column("Longitude")?;
    let grade = sheet.column("Nota Final")?;
    let uf = sheet.column("UF")?;
    let structure_id = sheet.column("Identificação da OAE")?;
    let highway = sheet.column("Rodovia")?;
    let km = sheet.column("km")?;
    let municipality = sheet.column("Município")?;
    let overall_status = sheet.column("Status Geral")?;
    let detailed_status = sheet.column("Status Detalhado")?;

    let mut records = Vec::new();
    for row in sheet.data_rows() {
        if row_is_empty(row, &[sge, codpro]) {
            continue;
        }

        records.push(InspectionRecord {
            sge: cell_to_field(row, sge),
            codpro: cell_to_field(row, codpro),
            latitude: cell_to_number(row, latitude),
            longitude: cell_to_number(row, longitude),
            raw_grade: cell_to_field(row, grade),
            uf: cell_to_field(row, uf),
            structure_id: cell_to_field(row, structure_id),
            highway: cell_to_field(row, highway),
            km: cell_to_field(row, km),
            municipality: cell_to_field(row, municipality),
            overall_status: cell_to_field(row, overall_status),
            detailed_status: cell_to_field(row, detailed_status),
        });
    }

    log::info!("{}: {} inspection rows", path.display(), records.len());
    Ok(records)
}

/// Parse the "Simulação" sheet of the parametric study workbook.
pub fn read_costs(path: &Path) -> OaeLotsResult<Vec<CostRecord>> {
    let sheet = Sheet::load(path, COST_SHEET, "SGE_AJUSTE")?;

    let sge_adjusted = sheet.column("SGE_AJUSTE")?;
    let final_cost = sheet.column("Custo final")?;
    let length = sheet.column("Extensão")?;
    let width = sheet.column("Largura")?;

    let mut records = Vec::new();
    for row in sheet.data_rows() {
        if row_is_empty(row, &[sge_adjusted]) {
            continue;
        }

        records.push(CostRecord {
            sge_adjusted: cell_to_field(row, sge_adjusted),
            final_cost: cell_to_number(row, final_cost),
            length: cell_to_number(row, length),
            width: cell_to_number(row, width),
        });
    }

    log::info!("{}: {} cost rows", path.display(), records.len());
    Ok(records)
}

/// Parse the "CONTROLE GERAL PROARTE" sheet of the general control workbook.
pub fn read_groups(path: &Path) -> OaeLotsResult<Vec<GroupRecord>> {
    let sheet = Sheet::load(path, CONTROL_SHEET, "CodPro")?;

    let codpro = sheet.column("CodPro")?;
    let local_unit = sheet.column("Unidade Local")?;

    let mut records = Vec::new();
    for row in sheet.data_rows() {
        if row_is_empty(row, &[codpro]) {
            continue;
        }

        let unit = match cell_to_field(row, local_unit) {
            Field::Absent => None,
            field => {
                let s = field.display_or_empty();
                if s.is_empty() {
                    None
                } else {
                    Some(s)
                }
            }
        };

        records.push(GroupRecord {
            codpro: cell_to_field(row, codpro),
            local_unit: unit,
        });
    }

    log::info!("{}: {} control rows", path.display(), records.len());
    Ok(records)
}

/*-------------------------------------------------------------------------------------------------
 *                                          Writing
 *-----------------------------------------------------------------------------------------------*/

const ALL_POINTS_HEADERS: [&str; 19] = [
    "Point ID",
    "Cluster ID",
    "Cluster Label",
    "Unidade Local",
    "Identificação da OAE",
    "Extensão",
    "Largura",
    "SGE",
    "CodPro",
    "Latitude",
    "Longitude",
    "Nota Consolidada",
    "Custo Final (R$)",
    "Rodovia",
    "km",
    "Município",
    "Status Geral",
    "Status Detalhado",
    "Dataset",
];

const SUMMARY_HEADERS: [&str; 6] = [
    "Cluster ID",
    "Cluster Label",
    "Unidade Local",
    "Number of Points",
    "Total Cost (R$)",
    "Avg Cost (R$)",
];

/// Write the output workbook with its "All Points" and "Cluster Summary" sheets.
pub fn write_output(
    path: &Path,
    all_points: &[AllPointsRow],
    summary: &[ClusterSummaryRow],
) -> OaeLotsResult<()> {
    let mut workbook = Workbook::new();

    let sheet = workbook.add_worksheet();
    sheet.set_name("All Points")?;

    for (col, header) in ALL_POINTS_HEADERS.iter().enumerate() {
        sheet.write_string(0, col as u16, *header)?;
    }

    for (i, row) in all_points.iter().enumerate() {
        let r = (i + 1) as u32;
        sheet.write_number(r, 0, row.point_id as f64)?;
        sheet.write_number(r, 1, row.cluster_id as f64)?;
        sheet.write_string(r, 2, &row.cluster_label)?;
        sheet.write_string(r, 3, &row.local_unit)?;
        sheet.write_string(r, 4, &row.structure_id)?;
        if let Some(length) = row.length {
            sheet.write_number(r, 5, length)?;
        }
        if let Some(width) = row.width {
            sheet.write_number(r, 6, width)?;
        }
        // SGE is a nullable integer: a missing one stays a blank cell, never a zero.
        if let Some(sge) = row.sge {
            sheet.write_number(r, 7, sge as f64)?;
        }
        sheet.write_string(r, 8, &row.codpro)?;
        sheet.write_number(r, 9, row.latitude)?;
        sheet.write_number(r, 10, row.longitude)?;
        sheet.write_number(r, 11, row.grade as f64)?;
        sheet.write_number(r, 12, row.final_cost)?;
        sheet.write_string(r, 13, &row.highway)?;
        sheet.write_string(r, 14, &row.km)?;
        sheet.write_string(r, 15, &row.municipality)?;
        sheet.write_string(r, 16, &row.overall_status)?;
        sheet.write_string(r, 17, &row.detailed_status)?;
        sheet.write_string(r, 18, row.dataset)?;
    }

    let sheet = workbook.add_worksheet();
    sheet.set_name("Cluster Summary")?;

    for (col, header) in SUMMARY_HEADERS.iter().enumerate() {
        sheet.write_string(0, col as u16, *header)?;
    }

    for (i, row) in summary.iter().enumerate() {
        let r = (i + 1) as u32;
        sheet.write_number(r, 0, row.cluster_id as f64)?;
        sheet.write_string(r, 1, &row.cluster_label)?;
        sheet.write_string(r, 2, &row.local_unit)?;
        sheet.write_number(r, 3, row.points as f64)?;
        sheet.write_number(r, 4, row.total_cost)?;
        sheet.write_number(r, 5, row.avg_cost)?;
    }

    workbook.save(path)?;
    log::info!(
        "{}: wrote {} point(s) in {} lot(s)",
        path.display(),
        all_points.len(),
        summary.len()
    );

    Ok(())
}
