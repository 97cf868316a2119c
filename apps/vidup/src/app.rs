//! Command handlers.

use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use vidup_upload::{
    Credential, HttpPublisher, HttpTransport, UploadPipeline, UploadRequest, UploadResult,
};

use crate::cli::{Commands, SessionArgs, UploadArgs};
use crate::config::Config;
use crate::progress::{ProgressMode, stderr_is_terminal};

pub async fn run(config: Config, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Upload(args) => {
            let config = config.with_overrides(args.overrides());
            config.validate()?;
            upload(config, args).await
        }
        Commands::Whoami { session } => {
            let config = config.with_overrides(session.overrides());
            let (transport, _) = connect(&config)?;
            let user = transport.verify_login().await?;
            println!("{user}");
            Ok(())
        }
        Commands::Config { session } => show_config(config, &session),
    }
}

fn connect(config: &Config) -> anyhow::Result<(HttpTransport, Credential)> {
    let credential = Credential::load(Path::new(&config.cookie_path))?;
    let transport = HttpTransport::new(&credential, config.endpoints(), config.request_timeout())?;
    Ok((transport, credential))
}

async fn upload(config: Config, args: UploadArgs) -> anyhow::Result<()> {
    let (transport, credential) = connect(&config)?;
    transport.verify_login().await?;

    let publisher = HttpPublisher::new(&transport, &credential);
    let cancel = CancellationToken::new();

    let pipeline = UploadPipeline::new(Arc::new(transport))
        .with_publisher(Arc::new(publisher))
        .with_workers(config.workers)
        .with_retry(config.retry_policy())
        .with_scheme(config.endpoints.upload_scheme.clone())
        .with_observer(ProgressMode::select(args.no_progress, stderr_is_terminal()).observer())
        .with_cancel(cancel.clone())
        .with_callback(Box::new(print_result));

    let request = UploadRequest {
        path: args.path.clone(),
        profile: config.profile.clone(),
        metadata: args.metadata(),
    };

    tracing::info!(
        path = %request.path.display(),
        workers = config.workers,
        max_attempts = config.max_attempts,
        "starting upload"
    );

    let signal = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("SIGINT received, cancelling upload");
                cancel.cancel();
            }
        })
    };

    let result = pipeline.run(&request).await;
    signal.abort();
    let outcome = result?;

    tracing::info!(
        upload_id = %outcome.session_id,
        remote = %outcome.remote_file_name,
        parts = outcome.parts,
        published = outcome.publish.is_some(),
        "upload complete"
    );
    Ok(())
}

fn print_result(result: &UploadResult) {
    if result.success {
        println!(
            "{}: {} ({} bytes)",
            result.message, result.video_title, result.video_size
        );
        if !result.data.is_null() {
            println!("{}", result.data);
        }
    } else {
        eprintln!("{}", result.message);
    }
}

fn show_config(config: Config, session: &SessionArgs) -> anyhow::Result<()> {
    let config = config.with_overrides(session.overrides());
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}
