use std::{
    io::IsTerminal,
    path::PathBuf,
    process::ExitCode,
};

use clap::Parser;
use num_complex::Complex64;
use rectflow::{
    config::{PowerFlowConfig, RunConfig, ShortCircuitConfig},
    error::{FlowError, Result},
    io::writer::DEFAULT_PREFIX,
    runner,
};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// AC power flow and three-phase short-circuit calculator.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Node file: V, G, P, Q, [x_d], type per row
    #[arg(short, long, value_name = "FILE")]
    nodes: PathBuf,

    /// Edge file: from, to, R, X, B, k per row
    #[arg(short, long, value_name = "FILE")]
    edges: PathBuf,

    /// Skip the first line of both input files
    #[arg(short, long)]
    remove_first_line: bool,

    /// Newton-Raphson iteration budget
    #[arg(
        short = 'i',
        long,
        value_name = "N",
        default_value_t = PowerFlowConfig::DEFAULT_MAX_IT as i64,
        allow_negative_numbers = true
    )]
    max_iterations: i64,

    /// Convergence tolerance, within [0, 1]
    #[arg(
        short,
        long,
        value_name = "EPS",
        default_value_t = PowerFlowConfig::DEFAULT_TOL,
        allow_negative_numbers = true
    )]
    accuracy: f64,

    /// Prefix of every output file
    #[arg(short, long, value_name = "PREFIX")]
    output: Option<String>,

    /// Print matrices and result tables
    #[arg(short, long)]
    verbose: bool,

    /// 1-based ID of the node to short-circuit
    #[arg(short, long, value_name = "ID")]
    short_circuit: Option<usize>,

    /// Transition resistance at the fault point
    #[arg(long, value_name = "R", default_value_t = 0.0, allow_negative_numbers = true)]
    transition_real: f64,

    /// Transition reactance at the fault point
    #[arg(long, value_name = "X", default_value_t = 0.0, allow_negative_numbers = true)]
    transition_imag: f64,

    /// Ignore loads in the short-circuit calculation
    #[arg(long)]
    ignore_load: bool,
}

impl Args {
    fn into_config(self) -> Result<RunConfig> {
        let max_it = usize::try_from(self.max_iterations).map_err(|_| FlowError::InvalidIterations)?;
        let output_prefix = self.output.unwrap_or_else(|| {
            warn!("no output prefix given, using {DEFAULT_PREFIX}");
            DEFAULT_PREFIX.to_string()
        });
        let short_circuit = self.short_circuit.map(|node| ShortCircuitConfig {
            node,
            transition_impedance: Complex64::new(self.transition_real, self.transition_imag),
            ignore_load: self.ignore_load,
        });
        let config = RunConfig {
            nodes: self.nodes,
            edges: self.edges,
            remove_first_line: self.remove_first_line,
            verbose: self.verbose,
            output_prefix,
            power_flow: PowerFlowConfig {
                max_it: Some(max_it),
                tol: Some(self.accuracy),
            },
            short_circuit,
        };
        config.validate()?;
        Ok(config)
    }
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            // --help and --version land here too
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("failed to install the log subscriber");
    }

    match args.into_config().and_then(|config| runner::run(&config)) {
        Ok(report) => {
            info!(iterations = report.flow.iterations, "done");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e}");
            // printed even when RUST_LOG filters the log line out
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
