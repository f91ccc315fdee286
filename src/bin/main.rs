use std::process;

use tracing_subscriber::EnvFilter;

use serviced::{
    cli::{Cli, Commands, parse_args},
    config::SupervisorConfig,
    error::ServicedError,
    supervisor::Supervisor,
};

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const RESET: &str = "\x1b[0m";

fn main() {
    let args = parse_args();
    init_logging(&args);

    let mut config = SupervisorConfig::from_env();
    config.dry_run = args.dry_run;
    config.aggressive_clean = args.aggressive_clean;
    let mut supervisor = Supervisor::new(config);

    match args.command {
        Commands::Start { service } => match service {
            Some(service) => {
                let result = supervisor.start(&service);
                report_outcome("Started", "start", &service, &result, args.verbose);
                if result.is_err() {
                    process::exit(1);
                }
            }
            None => supervisor.start_all_enabled(),
        },
        Commands::Stop { service } => {
            let result = supervisor.stop(&service);
            report_outcome("Stopped", "stop", &service, &result, args.verbose);
            if result.is_err() {
                process::exit(1);
            }
        }
        Commands::Restart { service } => {
            let result = supervisor.restart(&service);
            report_outcome("Restarted", "restart", &service, &result, args.verbose);
            if result.is_err() {
                process::exit(1);
            }
        }
        Commands::Enable { service } => {
            if let Err(err) = supervisor.enable(&service) {
                eprintln!("{err}");
                process::exit(1);
            }
        }
        Commands::Disable { service } => {
            if let Err(err) = supervisor.disable(&service) {
                eprintln!("{err}");
                process::exit(1);
            }
        }
        Commands::Status { service } => {
            process::exit(supervisor.status(&service));
        }
        Commands::Log { service, lines } => {
            supervisor.show_log(&service, lines);
        }
        Commands::List => supervisor.list_services(false),
        Commands::ListRunning => supervisor.list_services(true),
        Commands::Version => {
            println!(
                "serviced v{} - lightweight service manager",
                env!("CARGO_PKG_VERSION")
            );
        }
    }
}

/// Prints the boot-style one-line outcome for a lifecycle command.
///
/// The terse banner only appears in the default output mode; under
/// `--verbose` the error alone is surfaced.
fn report_outcome(
    past_tense: &str,
    verb: &str,
    service: &str,
    result: &Result<(), ServicedError>,
    verbose: bool,
) {
    match result {
        Ok(()) => {
            if !verbose {
                println!("[{GREEN}  OK  {RESET}] {past_tense} {service}.");
            }
        }
        Err(err) => {
            eprintln!("{err}");
            if !verbose {
                println!("[{RED}FAILED{RESET}] Failed to {verb} {service}.");
            }
        }
    }
}

fn init_logging(args: &Cli) {
    let filter = if args.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
