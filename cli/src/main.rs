//! Command-line front-end for the converter: reads roads as JSON, fits
//! OpenDRIVE-style geometry, and writes the network (and optionally a
//! conversion report) back out as JSON.

#[macro_use]
extern crate log;

use anyhow::Result;
use serde::Serialize;
use structopt::StructOpt;

use convert_shp::{ConversionStats, Diagnostics, Options, RoadInput};

#[derive(StructOpt)]
#[structopt(
    name = "convert_roads",
    about = "Fits parametric road geometry and lane widths to boundary polylines"
)]
struct Command {
    /// A JSON file with the input roads
    #[structopt(long)]
    input: String,
    /// Where to write the converted network as JSON
    #[structopt(long)]
    output: String,
    /// Also write the stats and per-road diagnostics as JSON here
    #[structopt(long)]
    report: Option<String>,
    #[structopt(flatten)]
    opts: Options,
}

#[derive(Serialize)]
struct Report<'a> {
    stats: &'a ConversionStats,
    diagnostics: &'a Diagnostics,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cmd = Command::from_args();

    let roads: Vec<RoadInput> = serde_json::from_str(&fs_err::read_to_string(&cmd.input)?)?;
    info!("read {} roads from {}", roads.len(), cmd.input);

    let conversion = convert_shp::convert(roads, cmd.opts)?;
    fs_err::write(
        &cmd.output,
        serde_json::to_string_pretty(&conversion.roads)?,
    )?;
    println!("{}", conversion.stats);
    if !conversion.diagnostics.is_empty() {
        warn!(
            "{} roads hit fallbacks; rerun with --report for details",
            conversion.diagnostics.events.len()
        );
    }

    if let Some(path) = cmd.report {
        fs_err::write(
            &path,
            serde_json::to_string_pretty(&Report {
                stats: &conversion.stats,
                diagnostics: &conversion.diagnostics,
            })?,
        )?;
        info!("wrote report to {}", path);
    }
    Ok(())
}
