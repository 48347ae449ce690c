//! Command implementations.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, bail};
use tokio::sync::mpsc;
use tracing::{info, warn};

use roost_protocol::UploadProgress;
use roost_transfer::{ChunkSource, FileSource, SessionStore, UploadSession};
use roost_upload_client::HttpTransport;
use roost_uploader::{UploadEvent, Uploader};

use crate::Command;
use crate::config::Config;

/// Runs one command to completion.
pub async fn run(config: Config, command: Command) -> anyhow::Result<()> {
    let store = SessionStore::new(config.state_dir()?);

    match command {
        Command::Upload { file } => {
            let source = FileSource::open(&file)
                .with_context(|| format!("opening {}", file.display()))?;
            let transport = HttpTransport::new(config.transport_config())?;
            let uploader =
                Uploader::new(&transport, config.upload.clone()).with_store(store.clone());

            let session = uploader
                .create_session(source.len())?
                .with_source(file.display().to_string());
            store.save(&session)?;

            upload(uploader, session, source, &file).await
        }
        Command::Resume { session_id, file } => {
            let session = store.load(&session_id)?;
            let source = FileSource::open(&file)
                .with_context(|| format!("opening {}", file.display()))?;
            if source.len() != session.file_size() {
                bail!(
                    "{} is {} bytes but session {} was created for {} bytes",
                    file.display(),
                    source.len(),
                    session_id,
                    session.file_size()
                );
            }

            // The chunk size is fixed at creation; only the rest may change.
            let mut upload_config = config.upload.clone();
            upload_config.chunk_size = session.chunk_size();

            let transport = HttpTransport::new(config.transport_config())?;
            let uploader = Uploader::new(&transport, upload_config).with_store(store.clone());
            upload(uploader, session, source, &file).await
        }
        Command::Status { session_id } => {
            let output = match session_id {
                Some(id) => serde_json::to_string_pretty(&store.load(&id)?.progress())?,
                None => {
                    let all: Vec<UploadProgress> =
                        store.list()?.iter().map(UploadSession::progress).collect();
                    serde_json::to_string_pretty(&all)?
                }
            };
            println!("{output}");
            Ok(())
        }
        Command::Discard { session_id } => {
            if store.remove(&session_id)? {
                info!(session = %session_id, "session discarded");
            } else {
                warn!(session = %session_id, "no such session");
            }
            Ok(())
        }
    }
}

/// Runs `session` with Ctrl-C wired to cancellation and events logged.
async fn upload(
    mut uploader: Uploader<'_>,
    mut session: UploadSession,
    source: FileSource,
    file: &Path,
) -> anyhow::Result<()> {
    let events = uploader.take_events().context("event stream already taken")?;
    let logger = tokio::spawn(log_events(events));

    let cancel = uploader.cancel_token();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping after the current request");
            cancel.cancel();
        }
    });

    let result = uploader.run(&mut session, Arc::new(source)).await;

    interrupt.abort();
    // Dropping the uploader closes the event channel.
    drop(uploader);
    let _ = logger.await;

    match result {
        Ok(artifact) => {
            println!("{artifact}");
            Ok(())
        }
        Err(e) if e.is_resumable() => Err(anyhow::Error::new(e).context(format!(
            "resume with: roost-upload resume {} {}",
            session.id(),
            file.display()
        ))),
        Err(e) => Err(e.into()),
    }
}

async fn log_events(mut events: mpsc::Receiver<UploadEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            UploadEvent::StatusChanged { session_id, status } => {
                info!(session = %session_id, %status, "status changed");
            }
            UploadEvent::ChunkAcknowledged {
                session_id,
                index,
                acknowledged,
                total_chunks,
            } => {
                info!(
                    session = %session_id,
                    index,
                    "chunk {acknowledged}/{total_chunks} uploaded"
                );
            }
            UploadEvent::Retrying {
                session_id,
                index,
                attempt,
                delay,
                error,
            } => {
                warn!(
                    session = %session_id,
                    ?index,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    %error,
                    "retrying"
                );
            }
            UploadEvent::Completed {
                session_id,
                artifact,
            } => {
                info!(session = %session_id, %artifact, "upload complete");
            }
            UploadEvent::Failed { session_id, error } => {
                warn!(session = %session_id, %error, "upload failed");
            }
        }
    }
}
