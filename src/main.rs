use clap::Parser;
use log::LevelFilter;
use oaelots::{DistancePolicy, OaeLotsResult, RoadDistance, RunConfig, Uf};
use simple_logger::SimpleLogger;
use std::{
    fmt::{self, Display},
    path::PathBuf,
    str::FromStr,
};

/*-------------------------------------------------------------------------------------------------
 *                                     Command Line Options
 *-----------------------------------------------------------------------------------------------*/

///
/// Reconcile the OAE inspection workbooks and cluster the structures of one state into bounded
/// work lots.
///
/// The three input workbooks are merged into one record set, filtered to the requested state and
/// grade range, and split per local unit into lots of roughly the requested size. The result is
/// written as a workbook the interactive map editor can load.
///
#[derive(Debug, Parser)]
#[clap(bin_name = "oaelots")]
#[clap(author, version, about)]
struct LotOptionsInit {
    /// The inspection mapping workbook.
    #[clap(short, long)]
    #[clap(env = "OAE_INSPECTION_FILE")]
    inspection_file: PathBuf,

    /// The parametric study workbook, which must contain the "Simulação" sheet.
    #[clap(short, long)]
    #[clap(env = "OAE_COST_FILE")]
    cost_file: PathBuf,

    /// The general control workbook, which must contain the "CONTROLE GERAL PROARTE" sheet.
    #[clap(short = 'g', long)]
    #[clap(env = "OAE_CONTROL_FILE")]
    control_file: PathBuf,

    /// The workbook to write.
    ///
    /// If this is not specified the output lands next to the current directory as
    /// "{uf}_clusters_output.xlsx".
    #[clap(short, long)]
    output_file: Option<PathBuf>,

    /// The state (UF) to analyze, e.g. SE or SP.
    #[clap(parse(try_from_str=parse_uf))]
    uf: Uf,

    /// Reference lot size: the soft maximum number of structures per lot.
    #[clap(short = 'n', long, default_value_t = 10)]
    lot_size: usize,

    /// The minimum grade (0-5) a structure must have to be clustered.
    #[clap(long, default_value_t = 0)]
    min_grade: i32,

    /// The maximum grade (0-5) a structure may have to be clustered.
    #[clap(long, default_value_t = 5)]
    max_grade: i32,

    /// The distance metric used for lot statistics.
    ///
    /// Allowed values are great-circle and road-network. Road-network asks the routing service
    /// for actual driving distances, one HTTP round trip per unordered coordinate pair.
    #[clap(short, long)]
    #[clap(default_value = "great-circle")]
    distance: DistancePolicy,

    /// Base URL of the OSRM-style routing service used under --distance road-network.
    #[clap(long)]
    #[clap(env = "OAE_ROUTE_SERVER")]
    #[clap(default_value = "http://router.project-osrm.org")]
    route_server: String,

    /// Verbose output
    #[clap(short, long)]
    verbose: bool,
}

fn parse_uf(uf: &str) -> OaeLotsResult<Uf> {
    let uf = Uf::from_str(uf.trim())
        .map_err(|_| format!("Argument is not a valid UF abbreviation: {}", uf))?;
    Ok(uf)
}

#[derive(Debug)]
struct LotOptionsChecked {
    config: RunConfig,
    verbose: bool,
}

impl Display for LotOptionsChecked {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        let c = &self.config;
        writeln!(f, "\n")?; // yes, two blank lines.
        writeln!(f, "    Inspections: {}", c.inspection_file.display())?;
        writeln!(f, "          Costs: {}", c.cost_file.display())?;
        writeln!(f, "        Control: {}", c.control_file.display())?;
        writeln!(f, "         Output: {}", c.output_file.display())?;
        writeln!(f, "             UF: {}", c.uf)?;
        writeln!(f, "       Lot size: {}", c.max_cluster_size)?;
        writeln!(f, "         Grades: {}..={}", c.min_grade, c.max_grade)?;
        writeln!(f, "       Distance: {}", c.distance_policy)?;
        writeln!(f, "\n")?; // yes, two blank lines.

        Ok(())
    }
}

/// Get the command line arguments and check them.
fn parse_args() -> OaeLotsResult<LotOptionsChecked> {
    let LotOptionsInit {
        inspection_file,
        cost_file,
        control_file,
        output_file,
        uf,
        lot_size,
        min_grade,
        max_grade,
        distance,
        route_server,
        verbose,
    } = LotOptionsInit::parse();

    if lot_size == 0 {
        return Err("lot size must be at least 1".into());
    }

    for (name, grade) in [("min-grade", min_grade), ("max-grade", max_grade)] {
        if !(0..=5).contains(&grade) {
            return Err(format!("{} must be between 0 and 5, got {}", name, grade).into());
        }
    }

    if min_grade > max_grade {
        return Err(format!(
            "min-grade ({}) must not exceed max-grade ({})",
            min_grade, max_grade
        )
        .into());
    }

    let output_file = output_file.unwrap_or_else(|| {
        PathBuf::from(format!("{}_clusters_output.xlsx", uf.to_string().to_lowercase()))
    });

    Ok(LotOptionsChecked {
        config: RunConfig {
            inspection_file,
            cost_file,
            control_file,
            output_file,
            uf,
            max_cluster_size: lot_size,
            min_grade,
            max_grade,
            distance_policy: distance,
            route_server,
        },
        verbose,
    })
}

/*-------------------------------------------------------------------------------------------------
 *                                            Main
 *-----------------------------------------------------------------------------------------------*/

fn main() {
    // One consolidated message for anything that went wrong; a failed run writes no output.
    if let Err(err) = run_main() {
        eprintln!("analysis aborted: {}", err);
        std::process::exit(1);
    }
}

fn run_main() -> OaeLotsResult<()> {
    let opts = parse_args()?;

    let level = if opts.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    SimpleLogger::new().with_level(level).init()?;

    log::info!("{}", opts);

    let summary = oaelots::run(&opts.config)?;

    log::info!("");
    log::info!(
        "{} of {} rows clustered into {} lot(s)",
        summary.eligible_rows,
        summary.input_rows,
        summary.clusters.len()
    );

    for (id, label, metrics) in &summary.clusters {
        let avg = match metrics.avg_distance {
            RoadDistance::Km(km) => format!("{:.2} km", km),
            RoadDistance::Unreachable => "unreachable".to_owned(),
        };
        log::info!(
            "  lot {:>4} {:<32} {:>4} point(s)  R$ {:>14.2}  max {:>12}  avg {:>12}",
            id,
            label,
            metrics.points,
            metrics.total_cost,
            metrics.max_distance.to_string(),
            avg
        );
    }

    if summary.api_calls > 0 {
        log::info!("routing service calls: {}", summary.api_calls);
    }
    log::info!("");

    Ok(())
}
