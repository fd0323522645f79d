use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use tracing::{info, warn};

use hopswarm::observer::NetworkAdapter;
use hopswarm::prelude::*;

#[derive(Debug, PartialEq)]
enum Command {
    Help,
    Run(Options),
}

#[derive(Debug, PartialEq)]
struct Options {
    config_path: Option<PathBuf>,
    patterns_path: Option<PathBuf>,
    cycles: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            config_path: None,
            patterns_path: None,
            cycles: 12,
        }
    }
}

fn parse_args<I: IntoIterator<Item = String>>(args: I) -> std::result::Result<Command, String> {
    let mut args = args.into_iter();
    let mut opts = Options::default();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--help" | "-h" | "help" => return Ok(Command::Help),
            "--config" => {
                opts.config_path = Some(args.next().ok_or("--config expects a path")?.into())
            }
            "--patterns" => {
                opts.patterns_path = Some(args.next().ok_or("--patterns expects a path")?.into())
            }
            "--cycles" => {
                opts.cycles = args
                    .next()
                    .and_then(|v| v.parse().ok())
                    .ok_or("--cycles expects a number")?;
            }
            other => return Err(format!("Unknown argument: {other}")),
        }
    }
    Ok(Command::Run(opts))
}

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let opts = match parse_args(std::env::args().skip(1)) {
        Ok(Command::Help) => {
            print_help();
            return Ok(());
        }
        Ok(Command::Run(opts)) => opts,
        Err(msg) => {
            eprintln!("{msg}");
            print_help();
            std::process::exit(2);
        }
    };

    let cfg = match &opts.config_path {
        Some(path) => {
            info!("Loading config from {:?}", path);
            NetworkConfig::from_json_str(&std::fs::read_to_string(path)?)?
        }
        None => NetworkConfig::default(),
    };

    let mut net = match &opts.patterns_path {
        Some(path) if path.exists() => {
            info!("Loading patterns from {:?}", path);
            let mut reader = BufReader::new(File::open(path)?);
            SwarmNetwork::load_or_regenerate(cfg, &mut reader)?
        }
        _ => SwarmNetwork::new(cfg)?,
    };
    info!(
        patterns = net.library().pattern_count(),
        neurons = net.neuron_count(),
        "network ready"
    );

    // Write the file only when it was missing or did not fit the config.
    if let Some(path) = &opts.patterns_path {
        if !net.patterns_from_image() {
            let mut file = File::create(path)?;
            net.save_patterns_to(&mut file)?;
            info!("Patterns saved to {:?}", path);
        }
    }

    // Start from the first stored maneuver with one unit knocked off course.
    let (rows, cols) = (net.geometry().rows(), net.geometry().cols());
    let mut swarm = match net.pattern_speeds(0) {
        Some(mut speeds) => {
            speeds[0][0] = -speeds[0][0];
            SpeedTable::from_matrix(&speeds)?
        }
        None => {
            warn!("no stored maneuvers; driving an idle swarm");
            SpeedTable::new(rows, cols)
        }
    };

    for tick in 0..opts.cycles {
        match net.control_cycle(&mut swarm) {
            Ok(speeds) => info!(tick, ?speeds, best = ?net.best_match(), "control cycle"),
            Err(HopfieldError::EmptyLibrary) => {
                warn!("nothing to recall; stopping");
                break;
            }
            Err(e) => return Err(e.into()),
        }
    }

    if let Some((idx, score)) = net.assess_recall() {
        info!(pattern = idx, similarity = score, "final recall");
    }

    let snapshot = NetworkAdapter::new(&net).snapshot();
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

fn print_help() {
    println!("hopswarm (Hopfield swarm controller demo)");
    println!("usage:");
    println!("  cargo run");
    println!("  cargo run -- --config net.json");
    println!("  cargo run -- --patterns patterns.bin");
    println!("  cargo run -- --cycles 50");
    println!("  cargo run -- --help");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn defaults_without_arguments() {
        assert_eq!(parse_args(args(&[])), Ok(Command::Run(Options::default())));
        assert_eq!(parse_args(args(&["-h"])), Ok(Command::Help));
    }

    #[test]
    fn parses_all_options() {
        let cmd = parse_args(args(&[
            "--config",
            "net.json",
            "--patterns",
            "p.bin",
            "--cycles",
            "50",
        ]))
        .unwrap();
        assert_eq!(
            cmd,
            Command::Run(Options {
                config_path: Some("net.json".into()),
                patterns_path: Some("p.bin".into()),
                cycles: 50,
            })
        );
    }

    #[test]
    fn rejects_bad_arguments() {
        assert!(parse_args(args(&["--cycles", "many"])).is_err());
        assert!(parse_args(args(&["--config"])).is_err());
        assert!(parse_args(args(&["--frobnicate"])).is_err());
    }
}
