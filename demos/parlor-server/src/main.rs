//! The parlor game server: a hub with fool and sudoku tables.
//!
//! Run with a single argument, the TCP port to listen on. Accounts live
//! in `parlor-passwd` next to the binary's working directory; finished
//! games are appended to `parlor-results.log`.

use std::process::ExitCode;
use std::sync::Arc;

use parlor::prelude::*;
use tracing_subscriber::EnvFilter;

mod cards;
mod fool;
mod sudoku;

const PASSWD_PATH: &str = "parlor-passwd";
const RESULTS_PATH: &str = "parlor-results.log";

fn parse_port() -> Result<u16, ()> {
    let mut args = std::env::args().skip(1);
    match (args.next(), args.next()) {
        (Some(port), None) => port.parse().map_err(|_| ()),
        _ => Err(()),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let Ok(port) = parse_port() else {
        eprintln!("Usage: parlor-server <port>");
        return ExitCode::from(2);
    };

    match serve(port).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("parlor-server: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn serve(port: u16) -> Result<(), ParlorError> {
    let log = ResultsLog::to_file(RESULTS_PATH)?;
    let names = NameDirectory::new();

    let payload = HubPayload {
        passwd_path: PASSWD_PATH.into(),
        games: vec![Arc::new(fool::FoolModule), Arc::new(sudoku::SudokuModule)],
        names: names.clone(),
    };

    let server = ParlorServerBuilder::new()
        .bind(format!("0.0.0.0:{port}"))
        .names(names)
        .results_log(log)
        .build(Arc::new(HubModule), Box::new(payload))
        .await?;

    tracing::info!(port, "parlor is open");
    server.run().await
}
