//! stride-db - run a query against the Stride database and print the results.

mod cli;

use cli::Cli;
use std::io;
use stride_db::db::{PostgresDriver, QueryResult};
use stride_db::{logging, output, QueryRunner, Result};
use tracing::{error, info};

fn main() {
    let cli = Cli::parse_args();
    logging::init_stderr_logging(cli.verbose);

    let outcome = run(&cli);
    if let Err(e) = &outcome {
        error!("{}: {}", e.category(), e);
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match output::report(&mut out, &outcome, cli.format) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("Failed to write output: {e}");
            std::process::exit(1);
        }
    }
}

fn run(cli: &Cli) -> Result<QueryResult> {
    let config = cli.resolve_config()?;
    info!("Connection: {}", config.display_string());

    let runner = QueryRunner::new(PostgresDriver::new(), config);
    runner.run_blocking(&cli.query(), &cli.projection())
}
