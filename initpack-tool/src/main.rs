use clap::Parser;
use clap::error::ErrorKind;
use initpack_lib::{Config, HeaderEncoding};
use std::{collections::HashMap, env, fs, path::Path};
use tracing::warn;
use tracing_subscriber::EnvFilter;

mod fs_utils;
mod process;

const USAGE: &str = "Usage: initpack-tool <input_dir> <output_file>";

#[derive(Parser, Debug)]
#[command(author, version, about = "Pack a directory into a cpio initramfs archive", long_about = None)]
pub struct Cli {
    /// Directory whose contents become the archive root
    #[arg()]
    pub input: Option<String>,

    /// Archive to create (overwritten if it exists)
    #[arg()]
    pub output: Option<String>,

    /// Configuration file (YAML or JSON)
    #[arg(short, long)]
    pub config: Option<String>,

    /// Header encoding [binary|newc]
    #[arg(short, long)]
    pub encoding: Option<HeaderEncoding>,

    /// Dry run (list entries and sizes, write nothing)
    #[arg(short, long, action = clap::ArgAction::SetTrue)]
    pub dry: bool,

    /// Read the archive back after writing and check every record
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub verify: bool,

    /// Log every record written
    #[arg(short, long, action = clap::ArgAction::SetTrue)]
    pub verbose: bool,

    /// Generate YAML config to stdout
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub generate_yaml_config: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
        Err(e) => {
            eprintln!("{e}");
            eprintln!("{USAGE}");
            std::process::exit(1);
        }
    };

    // Step 1: Read environment
    let (env_config, env_problems) = read_env();

    // Step 2: Read config file (if exists)
    let mut file_config = Config::default();
    if let Some(path) = cli.config.clone().or(env_config.config.clone()) {
        file_config = read_config_file(&path)?;
    }

    // Step 3: Merge configs: env < file < CLI
    let mut merged = merge_configs(env_config, file_config, cli_to_config(&cli));

    if merged.encoding.is_none() {
        merged.encoding = Some(HeaderEncoding::default());
    }

    init_logging(merged.verbose.unwrap_or(false));
    for problem in &env_problems {
        warn!("{problem}");
    }

    if cli.generate_yaml_config {
        let yaml = serde_yaml::to_string(&merged)?;
        println!("{yaml}");
        return Ok(());
    }

    let (input, output) = match (merged.input.as_deref(), merged.output.as_deref()) {
        (Some(i), Some(o)) if !i.is_empty() && !o.is_empty() => (i.to_string(), o.to_string()),
        _ => {
            eprintln!("{USAGE}");
            std::process::exit(1);
        }
    };

    if !Path::new(&input).is_dir() {
        eprintln!("Error: {input} is not a directory");
        std::process::exit(1);
    }

    process::run(&merged, Path::new(&input), Path::new(&output))
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Reads environment variables prefixed with INITPACK_
///
/// Values that cannot be parsed are left unset and reported back, to be
/// logged once logging is up.
fn read_env() -> (Config, Vec<String>) {
    let vars: HashMap<String, String> = env::vars().collect();
    config_from_vars(&vars)
}

fn config_from_vars(vars: &HashMap<String, String>) -> (Config, Vec<String>) {
    let mut cfg = Config::default();
    let mut problems = Vec::new();

    macro_rules! get_env {
        ($key:expr) => {
            vars.get(&format!("INITPACK_{}", $key)).cloned()
        };
    }

    fn truthy(v: String) -> bool {
        v == "true" || v == "1" || v.eq_ignore_ascii_case("yes")
    }

    cfg.input = get_env!("INPUT");
    cfg.output = get_env!("OUTPUT");
    cfg.config = get_env!("CONFIG");
    cfg.encoding = get_env!("ENCODING").and_then(|v| match v.parse() {
        Ok(encoding) => Some(encoding),
        Err(e) => {
            problems.push(format!("ignoring INITPACK_ENCODING: {e}"));
            None
        }
    });
    cfg.dry = get_env!("DRY").map(truthy);
    cfg.verify = get_env!("VERIFY").map(truthy);
    cfg.verbose = get_env!("VERBOSE").map(truthy);
    (cfg, problems)
}

/// Reads YAML or JSON config from file
fn read_config_file(path: &str) -> anyhow::Result<Config> {
    let content = fs::read_to_string(path)?;
    let lower = path.to_lowercase();
    let cfg = if lower.ends_with(".json") {
        serde_json::from_str(&content)?
    } else {
        serde_yaml::from_str(&content)?
    };
    Ok(cfg)
}

/// Converts CLI struct into Config. Flags left unset stay `None` so they do
/// not mask lower-priority sources.
fn cli_to_config(cli: &Cli) -> Config {
    Config {
        input: cli.input.clone(),
        output: cli.output.clone(),
        config: cli.config.clone(),
        encoding: cli.encoding,
        dry: cli.dry.then_some(true),
        verify: cli.verify.then_some(true),
        verbose: cli.verbose.then_some(true),
    }
}

/// Merge configs by priority: env < file < cli
fn merge_configs(env: Config, file: Config, cli: Config) -> Config {
    fn pick<T: Clone>(env: Option<T>, file: Option<T>, cli: Option<T>) -> Option<T> {
        cli.or(file).or(env)
    }

    Config {
        input: pick(env.input, file.input, cli.input),
        output: pick(env.output, file.output, cli.output),
        config: pick(env.config, file.config, cli.config),
        encoding: pick(env.encoding, file.encoding, cli.encoding),
        dry: pick(env.dry, file.dry, cli.dry),
        verify: pick(env.verify, file.verify, cli.verify),
        verbose: pick(env.verbose, file.verbose, cli.verbose),
    }
}
