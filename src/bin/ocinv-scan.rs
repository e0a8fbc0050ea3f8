use clap::Parser;
use ocinv::{distribution::Credentials, error::*, inventory};
use std::{fs, io, path::PathBuf};

/// Walk an OCI registry and record repositories, tags, platforms and digests
/// as a tab-separated table
#[derive(Debug, Parser)]
#[command(version)]
struct Opt {
    /// Registry to walk, as `host[:port]`
    #[arg(short = 'r')]
    registry: String,

    /// Username for authentication
    #[arg(short = 'u')]
    username: Option<String>,

    /// Password for authentication
    #[arg(short = 'p')]
    password: Option<String>,

    /// Data directory; output goes to `<DATA_PATH>/<REGISTRY>/index.tsv`,
    /// stdout when not given
    #[arg(short = 'o')]
    data_path: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let opt = Opt::parse();
    let credentials = match (opt.username.as_deref(), opt.password.as_deref()) {
        (Some(username), Some(password)) => Credentials::basic(username, password),
        (Some(username), None) => Credentials::basic(username, ""),
        _ => Credentials::anonymous(),
    };

    log::info!("Starting registry walk");
    let rows = inventory::scan_registry(&opt.registry, credentials)?;
    log::info!("Registry walk completed with {} rows", rows.len());

    match opt.data_path {
        Some(data_path) => {
            let registry_path = data_path.join(&opt.registry);
            fs::create_dir_all(&registry_path)?;
            let mut file = fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(registry_path.join("index.tsv"))?;
            inventory::write_table(&mut file, &rows)?;
        }
        None => inventory::write_table(&mut io::stdout().lock(), &rows)?,
    }
    Ok(())
}
