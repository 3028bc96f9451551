//! Service wiring: config, store backend, API server and the command
//! loop that owns the live recording session.

use crate::api::{ApiCommand, ApiServer};
use crate::config::Config;
use crate::global;
use crate::recorder::{
    spool, MicInputDevice, SessionController, SessionError, SessionOptions, SessionStatusHandle,
    StopOutcome,
};
use crate::store::{
    MeetingStatus, MeetingStore, RemoteMeetingStore, SqliteMeetingStore, StatusSync,
};
use anyhow::{bail, Context, Result};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// The one live recording session, if any. Sessions are single-use, so
/// a new start always builds a new controller.
struct ActiveSession {
    controller: Arc<SessionController>,
    task: JoinHandle<()>,
}

pub async fn run_service() -> Result<()> {
    info!("Starting Synca service");

    let config = Config::load()?;
    let (store, sync_store) = build_store(&config)?;

    let (tx, mut rx) = mpsc::channel::<ApiCommand>(10);
    let status = SessionStatusHandle::default();

    let api_server = ApiServer::new(tx, status.clone(), Arc::clone(&store), &config);
    tokio::spawn(async move {
        if let Err(e) = api_server.start().await {
            error!("API server failed: {}", e);
        }
    });

    info!("Synca is ready");

    let mut active: Option<ActiveSession> = None;

    while let Some(command) = rx.recv().await {
        match command {
            ApiCommand::StartRecording { meeting_id } => {
                if let Some(session) = &active {
                    let phase = session.controller.status().get().await.phase;
                    if !phase.is_terminal() {
                        warn!(
                            meeting = session.controller.meeting_id(),
                            phase = phase.as_str(),
                            "recording already in progress, ignoring start"
                        );
                        continue;
                    }
                }
                active = None;

                match start_session(meeting_id, &config, &store, &sync_store, &status).await {
                    Ok(session) => active = Some(session),
                    Err(e) => error!(meeting = meeting_id, "Failed to start recording: {:#}", e),
                }
            }
            ApiCommand::StopRecording => {
                let Some(session) = active.take() else {
                    warn!("No live recording session to stop");
                    continue;
                };

                match session.controller.stop().await {
                    Ok(StopOutcome::Stopped(report)) => {
                        if let Some(err) = &report.release_error {
                            warn!(error = %err, "device release failed");
                        }
                        if let Some(err) = &report.sync_error {
                            error!(
                                meeting = report.meeting_id,
                                error = %err,
                                "meeting status sync failed"
                            );
                        }
                        if report.is_clean() {
                            info!(
                                meeting = report.meeting_id,
                                chunks = report.chunks_delivered,
                                "recording completed"
                            );
                        }
                        // the chunk channel is closed now; let the spool drain
                        let _ = session.task.await;
                    }
                    Ok(StopOutcome::CancelRequested) => {
                        info!("pending recording request abandoned");
                        let _ = session.task.await;
                    }
                    Err(e) => warn!("Failed to stop recording: {}", e),
                }
            }
        }
    }

    Ok(())
}

fn build_store(config: &Config) -> Result<(Arc<dyn MeetingStore>, Arc<dyn StatusSync>)> {
    match config.store.backend.as_str() {
        "sqlite" => {
            let store = Arc::new(SqliteMeetingStore::new(global::db_file()?));
            Ok((store.clone(), store))
        }
        "remote" => {
            let url = config
                .store
                .remote_url
                .as_deref()
                .context("store.remote_url is required for the remote backend")?;
            let store = Arc::new(RemoteMeetingStore::new(url, config.store.api_key.clone()));
            Ok((store.clone(), store))
        }
        other => bail!("Unknown store backend: {}", other),
    }
}

async fn start_session(
    meeting_id: i64,
    config: &Config,
    store: &Arc<dyn MeetingStore>,
    sync_store: &Arc<dyn StatusSync>,
    status: &SessionStatusHandle,
) -> Result<ActiveSession> {
    let meeting = store
        .meeting(meeting_id)
        .await?
        .with_context(|| format!("Meeting {} not found", meeting_id))?;

    if meeting.status != MeetingStatus::InProgress.as_str() {
        bail!(
            "Meeting {} is not in progress (status: {})",
            meeting_id,
            meeting.status
        );
    }

    // Single-use sessions share one observable status handle; a fresh
    // session may only adopt it once the previous one is terminal.
    status.reset().await;

    let options = SessionOptions {
        chunk_interval: config.recording.chunk_interval(),
        sync: config.sync.policy(),
    };
    let device = MicInputDevice::new(config.recording.sample_rate);
    let controller = Arc::new(SessionController::new(
        meeting_id,
        Box::new(device),
        Arc::clone(sync_store),
        options,
        status.clone(),
    ));

    let spool_path = global::recordings_dir()?.join(format!(
        "meeting-{}-{}.wav",
        meeting_id,
        chrono::Local::now().format("%Y%m%d-%H%M%S")
    ));
    let sample_rate = config.recording.sample_rate;

    let task = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move {
            match controller.start().await {
                Ok(chunks) => {
                    if let Err(e) = spool::spool_to_wav(chunks, &spool_path, sample_rate).await {
                        error!("Failed to spool recording: {:#}", e);
                    }
                }
                Err(SessionError::Cancelled) => {
                    info!("recording session cancelled before capture began");
                }
                Err(e) => error!("Failed to start recording session: {}", e),
            }
        })
    };

    info!(meeting = meeting_id, "recording session launched");
    Ok(ActiveSession { controller, task })
}
