mod catalog;
mod select;

#[cfg(test)]
mod test;

pub use catalog::*;
pub use select::*;

use anyhow::Context;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("bad catalog: {reason}")]
    BadCatalog { reason: String },

    #[error("unknown objective mode `{0}`")]
    BadObjective(String),

    #[error("model error: {0}")]
    Model(String),

    #[error("cut enumeration failed: {0}")]
    ExternalTool(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

const USAGE: &str = "\
usage: cut-select --cuts <path> --out <path> [--objective og|inv|area|depth|overall]
                  [--cut-enum-bin <path>] [--cut-size <k>]";

struct Args {
    cuts: PathBuf,
    out: PathBuf,
    objective: Objective,
    cut_enum_bin: Option<String>,
    cut_size: Option<u32>,
}

fn main() {
    env_logger::init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(err) => {
            eprintln!("error: {err:#}");
            eprintln!("{USAGE}");
            std::process::exit(2);
        }
    };

    match run(&args) {
        Ok(report) if report.status.is_success() => {}
        Ok(report) => {
            println!("{}", report.status);
            std::process::exit(1);
        }
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(2);
        }
    }
}

fn parse_args() -> anyhow::Result<Args> {
    let mut args = pico_args::Arguments::from_env();

    let parsed = Args {
        cuts: args
            .value_from_str("--cuts")
            .context("--cuts <path> is required")?,
        out: args
            .value_from_str("--out")
            .context("--out <path> is required")?,
        objective: args
            .opt_value_from_str("--objective")?
            .unwrap_or(Objective::Original),
        cut_enum_bin: args.opt_value_from_str("--cut-enum-bin")?,
        cut_size: args.opt_value_from_str("--cut-size")?,
    };

    let rest = args.finish();
    if !rest.is_empty() {
        anyhow::bail!("unexpected arguments: {rest:?}");
    }
    Ok(parsed)
}

fn run(args: &Args) -> Result<Report, Error> {
    let catalog = Catalog::load(&args.cuts, args.cut_enum_bin.as_deref(), args.cut_size)?;
    let report = select::solve(&catalog, args.objective, &args.out)?;
    log::debug!("{report:?}");
    Ok(report)
}
