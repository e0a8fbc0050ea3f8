use clap::Parser;
use ocinv::{error::*, inventory, summary};
use std::{fs, io, path::PathBuf};

/// Aggregate a registry inventory table into base-image groups and emit them
/// as a YAML document
#[derive(Debug, Parser)]
#[command(version)]
struct Opt {
    /// Inventory table produced by ocinv-scan
    #[arg(short = 't')]
    tsv_file: PathBuf,

    /// Output YAML file, stdout when not given
    #[arg(short = 'o')]
    output_file: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let opt = Opt::parse();
    let rows = inventory::read_table(&opt.tsv_file)?;
    let groups = summary::summarize(&rows)?;

    match opt.output_file {
        Some(path) => {
            let file = fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)?;
            summary::write_yaml(file, summary::DEFAULT_ROOT, &groups)?;
        }
        None => summary::write_yaml(io::stdout().lock(), summary::DEFAULT_ROOT, &groups)?,
    }
    Ok(())
}
