use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use gopro_livestream::{discover, run_livestream, BluetoothCamera, Cli, StationMode};
use tokio::sync::watch;
use tracing::{error, info, info_span, Instrument};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .finish();
    // Scoped to this thread; the current-thread runtime keeps every task on it.
    let _logging = tracing::subscriber::set_default(subscriber);

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            error!(%err, "failed to start runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = cli.session_config();
    let span = info_span!(
        "session",
        identifier = cli.identifier.as_deref().unwrap_or("any")
    );

    async move {
        let ctrl_c = listen_for_ctrl_c();

        let peripheral = tokio::select! {
            found = discover(cli.identifier.as_deref(), config.scan_timeout) => {
                found.context("discovering camera")?
            }
            () = interrupted(ctrl_c.clone()) => anyhow::bail!("interrupted while scanning"),
        };
        let camera = BluetoothCamera::connect(peripheral)
            .await
            .context("connecting to camera")?;

        info!(server = %cli.serveraddr, "press Ctrl-C to stop streaming");
        run_livestream(
            camera,
            config,
            &StationMode,
            &cli.credentials(),
            &cli.live_stream_request(),
            interrupted(ctrl_c),
        )
        .await
        .context("livestream failed")
    }
    .instrument(span)
    .await
}

/// Latches the first Ctrl-C for every later phase of the run.
fn listen_for_ctrl_c() -> watch::Receiver<bool> {
    let (sender, receiver) = watch::channel(false);
    tokio::spawn(
        async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                error!(%err, "cannot listen for Ctrl-C, stopping now");
            }
            let _ = sender.send(true);
        }
        .in_current_span(),
    );
    receiver
}

async fn interrupted(mut ctrl_c: watch::Receiver<bool>) {
    // A closed channel means the listener is gone; treat it like the signal.
    let _ = ctrl_c.wait_for(|interrupted| *interrupted).await;
}
