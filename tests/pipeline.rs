/*!
 * End to end scenarios for the reconcile-filter-cluster-project pipeline, on synthetic records
 * and through real workbook files.
 */

use calamine::{open_workbook, Data, Reader, Xlsx};
use oaelots::{
    assign_clusters, filter_eligible, merge_records, project_all_points, project_cluster_summary,
    run, CostRecord, DistancePolicy, Field, GroupRecord, InspectionRecord, RunConfig, Uf,
};
use rust_xlsxwriter::Workbook;
use std::path::PathBuf;

fn config(uf: Uf, lot_size: usize, min_grade: i32, max_grade: i32) -> RunConfig {
    RunConfig {
        inspection_file: PathBuf::new(),
        cost_file: PathBuf::new(),
        control_file: PathBuf::new(),
        output_file: PathBuf::new(),
        uf,
        max_cluster_size: lot_size,
        min_grade,
        max_grade,
        distance_policy: DistancePolicy::GreatCircle,
        route_server: String::new(),
    }
}

fn inspection(sge: i64, codpro: &str, lat: f64, lon: f64, grade: Field) -> InspectionRecord {
    InspectionRecord {
        sge: Field::Number(sge as f64),
        codpro: Field::Text(codpro.to_owned()),
        latitude: Some(lat),
        longitude: Some(lon),
        raw_grade: grade,
        uf: Field::Text("SE".to_owned()),
        structure_id: Field::Text(format!("OAE {}", sge)),
        highway: Field::Text("BR-101".to_owned()),
        km: Field::Number(10.0 + sge as f64),
        municipality: Field::Text("Aracaju".to_owned()),
        overall_status: Field::Absent,
        detailed_status: Field::Absent,
    }
}

fn cost(sge: i64, value: f64) -> CostRecord {
    CostRecord {
        // The cost sheet stores the key as text with a stray ".0".
        sge_adjusted: Field::Text(format!("{}.0", sge)),
        final_cost: Some(value),
        length: Some(120.0),
        width: Some(11.5),
    }
}

fn group(codpro: &str, unit: &str) -> GroupRecord {
    GroupRecord {
        codpro: Field::Text(codpro.to_owned()),
        local_unit: Some(unit.to_owned()),
    }
}

#[test]
fn three_rows_one_excluded_by_sn_grade() {
    let inspections = vec![
        inspection(1, "P1", -10.90, -37.10, Field::Number(5.0)),
        inspection(2, "P2", -10.95, -37.05, Field::Text("S/N".to_owned())),
        inspection(3, "P3", -10.92, -37.07, Field::Number(3.0)),
    ];
    let costs = vec![cost(1, 1.0e6), cost(2, 2.0e6), cost(3, 3.0e6)];
    let groups = vec![
        group("P1", "UL Aracaju"),
        group("P2", "UL Aracaju"),
        group("P3", "UL Aracaju"),
    ];

    let merged = merge_records(inspections, &costs, &groups);
    assert_eq!(merged.len(), 3);

    let cfg = config(Uf::SE, 10, 0, 5);
    let filtered = filter_eligible(merged, &cfg);

    // The "S/N" row coerces to the sentinel, which can never be inside 0..=5.
    assert_eq!(filtered.len(), 2);

    let clustered = assign_clusters(filtered, cfg.max_cluster_size).unwrap();
    assert_eq!(clustered.len(), 2);
    assert!(clustered.iter().all(|c| c.cluster_id == 0));
    assert!(clustered.iter().all(|c| c.cluster_label == "UL Aracaju-C0"));

    let summary = project_cluster_summary(&clustered);
    assert_eq!(summary.len(), 1);
    assert_eq!(summary[0].points, 2);
    assert_eq!(summary[0].total_cost, 4.0e6);
    assert_eq!(summary[0].avg_cost, 2.0e6);
}

#[test]
fn twenty_five_points_make_three_lots() {
    let inspections: Vec<InspectionRecord> = (0..25)
        .map(|i| {
            inspection(
                100 + i,
                &format!("P{}", i),
                -10.0 - (i as f64) * 0.07,
                -37.0 - ((i * 3) % 11) as f64 * 0.11,
                Field::Number(4.0),
            )
        })
        .collect();
    let costs: Vec<CostRecord> = (0..25)
        .map(|i| cost(100 + i, 1.0e5 * (1.0 + (i % 4) as f64)))
        .collect();
    let groups: Vec<GroupRecord> = (0..25)
        .map(|i| group(&format!("P{}", i), "UL Lagarto"))
        .collect();

    let merged = merge_records(inspections, &costs, &groups);
    let cfg = config(Uf::SE, 10, 0, 5);
    let filtered = filter_eligible(merged, &cfg);
    assert_eq!(filtered.len(), 25);

    let clustered = assign_clusters(filtered, cfg.max_cluster_size).unwrap();

    let summary = project_cluster_summary(&clustered);
    // ceil(25 / 10) = 3 lots; lot sizes may individually exceed 10 (soft cap), but they must
    // account for every record.
    assert_eq!(summary.len(), 3);
    assert_eq!(summary.iter().map(|s| s.points).sum::<usize>(), 25);
}

#[test]
fn ineligible_records_are_dropped_not_orphaned() {
    let mut no_coords = inspection(1, "P1", 0.0, 0.0, Field::Number(4.0));
    no_coords.latitude = None;

    let mut wrong_state = inspection(2, "P2", -20.0, -45.0, Field::Number(4.0));
    wrong_state.uf = Field::Text("MG".to_owned());

    let inspections = vec![
        no_coords,
        wrong_state,
        inspection(3, "P3", -10.9, -37.1, Field::Number(4.0)),
        // No cost row for this one.
        inspection(4, "P4", -10.8, -37.2, Field::Number(4.0)),
        // No local unit for this one.
        inspection(5, "P5", -10.7, -37.3, Field::Number(4.0)),
    ];
    let costs = vec![cost(1, 1.0), cost(2, 1.0), cost(3, 1.0), cost(5, 1.0)];
    let groups = vec![group("P1", "UL A"), group("P2", "UL A"), group("P3", "UL A"), group("P4", "UL A")];

    let merged = merge_records(inspections, &costs, &groups);
    let filtered = filter_eligible(merged, &config(Uf::SE, 10, 0, 5));

    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].sge, Some(3));
}

#[test]
fn all_points_rows_carry_every_column() {
    let inspections = vec![inspection(7, "P7", -10.9, -37.1, Field::Number(2.0))];
    let costs = vec![cost(7, 5.0e5)];
    let groups = vec![group("P7", "UL Estância")];

    let merged = merge_records(inspections, &costs, &groups);
    let filtered = filter_eligible(merged, &config(Uf::SE, 10, 0, 5));
    let clustered = assign_clusters(filtered, 10).unwrap();
    let rows = project_all_points(&clustered);

    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row.point_id, 0);
    assert_eq!(row.cluster_label, "UL Estância-C0");
    assert_eq!(row.sge, Some(7));
    assert_eq!(row.codpro, "P7");
    assert_eq!(row.grade, 2);
    assert_eq!(row.final_cost, 5.0e5);
    assert_eq!(row.length, Some(120.0));
    assert_eq!(row.width, Some(11.5));
    assert_eq!(row.structure_id, "OAE 7");
    assert_eq!(row.dataset, "Principal");
}

/*-------------------------------------------------------------------------------------------------
 *                              File-Level Run, Workbooks In To Workbook Out
 *-----------------------------------------------------------------------------------------------*/

fn temp_xlsx(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("oaelots_run_{}_{}.xlsx", name, std::process::id()))
}

fn write_inspection_workbook(path: &PathBuf, rows: &[(i64, &str, f64, f64, &str, &str)]) {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();

    let headers = [
        "Código (SGE)",
        "CodPro",
        "Latitude",
        "Longitude",
        "Nota Final",
        "UF",
        "Identificação da OAE",
        "Rodovia",
        "km",
        "Município",
        "Status Geral",
        "Status Detalhado",
    ];
    for (col, header) in headers.iter().enumerate() {
        sheet.write_string(0, col as u16, *header).unwrap();
    }

    for (i, (sge, codpro, lat, lon, grade, uf)) in rows.iter().enumerate() {
        let row = (i + 1) as u32;
        sheet.write_number(row, 0, *sge as f64).unwrap();
        sheet.write_string(row, 1, *codpro).unwrap();
        sheet.write_number(row, 2, *lat).unwrap();
        sheet.write_number(row, 3, *lon).unwrap();
        // Grades arrive as text as often as numbers; the coercer has to sort it out either way.
        sheet.write_string(row, 4, *grade).unwrap();
        sheet.write_string(row, 5, *uf).unwrap();
        sheet.write_string(row, 6, format!("OAE {}", sge)).unwrap();
        sheet.write_string(row, 7, "BR-101").unwrap();
        sheet.write_number(row, 8, 10.0 + *sge as f64).unwrap();
        sheet.write_string(row, 9, "Aracaju").unwrap();
        sheet.write_string(row, 10, "Concluída").unwrap();
        sheet.write_string(row, 11, "Inspeção rotineira").unwrap();
    }

    workbook.save(path).unwrap();
}

fn write_cost_workbook(path: &PathBuf, rows: &[(i64, f64)]) {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name("Simulação").unwrap();

    for (col, header) in ["SGE_AJUSTE", "Custo final", "Extensão", "Largura"]
        .iter()
        .enumerate()
    {
        sheet.write_string(0, col as u16, *header).unwrap();
    }
    for (i, (sge, value)) in rows.iter().enumerate() {
        let row = (i + 1) as u32;
        // Keys stored as text with a stray ".0", as the study workbook does.
        sheet.write_string(row, 0, format!("{}.0", sge)).unwrap();
        sheet.write_number(row, 1, *value).unwrap();
        sheet.write_number(row, 2, 120.0).unwrap();
        sheet.write_number(row, 3, 11.5).unwrap();
    }

    workbook.save(path).unwrap();
}

fn write_control_workbook(path: &PathBuf, rows: &[(&str, &str)]) {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name("CONTROLE GERAL PROARTE").unwrap();

    sheet.write_string(0, 0, "CodPro").unwrap();
    sheet.write_string(0, 1, "Unidade Local").unwrap();
    for (i, (codpro, unit)) in rows.iter().enumerate() {
        let row = (i + 1) as u32;
        sheet.write_string(row, 0, *codpro).unwrap();
        sheet.write_string(row, 1, *unit).unwrap();
    }

    workbook.save(path).unwrap();
}

#[test]
fn run_reads_three_workbooks_and_writes_the_output_workbook() {
    let inspection_file = temp_xlsx("inspections");
    let cost_file = temp_xlsx("costs");
    let control_file = temp_xlsx("control");
    let output_file = temp_xlsx("out");

    // Five structures: three eligible in SE, one ungraded, one in the wrong state.
    write_inspection_workbook(
        &inspection_file,
        &[
            (1, "P1", -10.90, -37.10, "5", "SE"),
            (2, "P2", -10.95, -37.05, "3", "SE"),
            (3, "P3", -10.92, -37.07, "4", "SE"),
            (4, "P4", -10.91, -37.08, "S/N", "SE"),
            (5, "P5", -12.97, -38.50, "4", "BA"),
        ],
    );
    write_cost_workbook(
        &cost_file,
        &[(1, 1.0e6), (2, 2.0e6), (3, 3.0e6), (4, 4.0e6), (5, 5.0e6)],
    );
    write_control_workbook(
        &control_file,
        &[
            ("P1", "UL Aracaju"),
            ("P2", "UL Aracaju"),
            ("P3", "UL Aracaju"),
            ("P4", "UL Aracaju"),
            ("P5", "UL Salvador"),
        ],
    );

    let cfg = RunConfig {
        inspection_file: inspection_file.clone(),
        cost_file: cost_file.clone(),
        control_file: control_file.clone(),
        output_file: output_file.clone(),
        uf: Uf::SE,
        max_cluster_size: 2,
        min_grade: 0,
        max_grade: 5,
        distance_policy: DistancePolicy::GreatCircle,
        route_server: String::new(),
    };

    let summary = run(&cfg).unwrap();

    assert_eq!(summary.input_rows, 5);
    assert_eq!(summary.eligible_rows, 3);
    // ceil(3 / 2) = 2 lots, all in the one surviving local unit.
    assert_eq!(summary.clusters.len(), 2);
    assert_eq!(summary.api_calls, 0);
    assert!(summary
        .clusters
        .iter()
        .all(|(_, label, _)| label.starts_with("UL Aracaju-C")));
    assert_eq!(
        summary.clusters.iter().map(|(_, _, m)| m.points).sum::<usize>(),
        3
    );
    let total: f64 = summary.clusters.iter().map(|(_, _, m)| m.total_cost).sum();
    assert_eq!(total, 6.0e6);

    let mut workbook: Xlsx<_> = open_workbook(&output_file).unwrap();

    let points = workbook.worksheet_range("All Points").unwrap();
    assert_eq!(points.height(), 4); // header + the three eligible rows
    for row in 1..4 {
        assert_eq!(
            points.get((row, 18)),
            Some(&Data::String("Principal".to_owned()))
        );
    }

    let lots = workbook.worksheet_range("Cluster Summary").unwrap();
    assert_eq!(lots.height(), 3); // header + two lots

    for path in [inspection_file, cost_file, control_file, output_file] {
        std::fs::remove_file(&path).ok();
    }
}
