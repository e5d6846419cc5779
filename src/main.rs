use std::{io::Write, process::ExitCode};

use async_sweep::{
    report::{EXIT_FAILURE, EXIT_INTERRUPTED, EXIT_PROBE_ERRORS},
    LogReporter, ProbeMethod, SweepConfigBuilder, Sweeper,
};
use clap::Parser;
use log::{error, info, warn, LevelFilter};
use tokio_util::sync::CancellationToken;

/// Sweep an IPv4 network and report which hosts answer
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Network in CIDR form, e.g. 192.168.1.0/24 (a bare address sweeps just that host)
    network: String,

    /// Per-probe timeout in seconds
    #[arg(short, long, default_value_t = 1.0)]
    timeout: f64,

    /// Maximum number of probes in flight
    #[arg(short, long, visible_alias = "threads", default_value_t = 50)]
    concurrency: usize,

    /// Only log errors and the final summary
    #[arg(short, long)]
    quiet: bool,

    /// How each host is probed
    #[arg(short, long, value_enum, default_value_t = ProbeMethod::Icmp)]
    method: ProbeMethod,

    /// Ports tried by the tcp method
    #[arg(short, long, value_delimiter = ',')]
    ports: Vec<u16>,
}

fn init_logging() {
    env_logger::Builder::new()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .format(|buf, record| {
            writeln!(
                buf,
                "{} {}: {}",
                buf.timestamp_seconds(),
                record.level(),
                record.args()
            )
        })
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    init_logging();
    let args = Args::parse();

    let config = match SweepConfigBuilder::new(&args.network)
        .with_concurrency(args.concurrency)
        .with_quiet(args.quiet)
        .with_timeout_secs(args.timeout)
        .and_then(|builder| builder.build())
    {
        Ok(config) => config,
        Err(err) => {
            error!("{}", err);
            return ExitCode::from(EXIT_FAILURE);
        }
    };
    let prober = match args.method.prober(&args.ports) {
        Ok(prober) => prober,
        Err(err) => {
            error!("{}", err);
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });

    let reporter = LogReporter::new(config.quiet);
    let report = Sweeper::new(prober, config).sweep(&reporter, cancel).await;
    let summary = report.summary();
    info!("{}", summary);

    let code = report.exit_code();
    match code {
        EXIT_INTERRUPTED => warn!(
            "sweep incomplete: {} probes abandoned, remaining hosts not probed",
            report.abandoned()
        ),
        EXIT_FAILURE => error!(
            "every probe failed; the {:?} probe mechanism appears unavailable",
            args.method
        ),
        EXIT_PROBE_ERRORS => warn!("{} hosts could not be probed", summary.error),
        _ => {}
    }
    ExitCode::from(code)
}
