use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use crate::{
    collection::CollectionSnapshot,
    config::ExportConfig,
    engine::EngineSession,
    error::{EngineError, ExportError, Result},
    export::{
        build_concat_args, build_manifest, staged_input_name, Artifact, ConcatPolicy,
        DeliveredArtifact, DownloadSink, MANIFEST_FILE_NAME, OUTPUT_MEDIA_TYPE,
    },
};

/// State of the export job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportState {
    Idle,
    Running,
    Succeeded,
    Failed(String),
}

impl ExportState {
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

type StateObserver = Box<dyn Fn(&ExportState) + Send + Sync>;
type LoadingObserver = Box<dyn Fn(bool) + Send + Sync>;

/// Drives the engine through one export per call
///
/// Owns the job state and the loading indicator. A second export is refused
/// while one is running, and every run that enters `Running` leaves it again,
/// including runs whose future is dropped mid-way.
pub struct ExportOrchestrator {
    policy: ConcatPolicy,
    output_file_name: String,
    sink: Arc<dyn DownloadSink>,
    state: Mutex<ExportState>,
    state_observers: Mutex<Vec<StateObserver>>,
    loading_observers: Mutex<Vec<LoadingObserver>>,
}

/// Leaves `Running` when dropped unless the run finished normally
struct RunGuard<'a> {
    orchestrator: &'a ExportOrchestrator,
    finished: bool,
}

impl RunGuard<'_> {
    fn finish(mut self, state: ExportState) {
        self.finished = true;
        self.orchestrator.leave_running(state);
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            warn!("Export abandoned before completion");
            self.orchestrator
                .leave_running(ExportState::Failed("export was cancelled".to_string()));
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ExportOrchestrator {
    pub fn new(config: &ExportConfig, sink: Arc<dyn DownloadSink>) -> Self {
        Self {
            policy: config.policy.clone(),
            output_file_name: config.output_file_name.clone(),
            sink,
            state: Mutex::new(ExportState::Idle),
            state_observers: Mutex::new(Vec::new()),
            loading_observers: Mutex::new(Vec::new()),
        }
    }

    pub fn state(&self) -> ExportState {
        lock(&self.state).clone()
    }

    pub fn policy(&self) -> &ConcatPolicy {
        &self.policy
    }

    /// Observe every job state transition
    pub fn on_state_change<F>(&self, observer: F)
    where
        F: Fn(&ExportState) + Send + Sync + 'static,
    {
        lock(&self.state_observers).push(Box::new(observer));
    }

    /// Observe the loading indicator: `true` when a run starts, `false` once it ends
    pub fn on_loading<F>(&self, observer: F)
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        lock(&self.loading_observers).push(Box::new(observer));
    }

    fn publish(&self, state: &ExportState) {
        for observer in lock(&self.state_observers).iter() {
            observer(state);
        }
    }

    fn set_loading(&self, loading: bool) {
        for observer in lock(&self.loading_observers).iter() {
            observer(loading);
        }
    }

    fn enter_running(&self) -> Result<RunGuard<'_>> {
        {
            let mut state = lock(&self.state);
            if state.is_running() {
                return Err(ExportError::AlreadyRunning.into());
            }
            *state = ExportState::Running;
        }
        self.publish(&ExportState::Running);
        self.set_loading(true);
        Ok(RunGuard { orchestrator: self, finished: false })
    }

    fn leave_running(&self, next: ExportState) {
        *lock(&self.state) = next.clone();
        self.publish(&next);
        self.set_loading(false);
    }

    /// Export the clips in `snapshot` order as a single file
    ///
    /// Fails fast, without touching the engine, when the session is not
    /// ready or the snapshot is empty.
    pub async fn export(
        &self,
        snapshot: &CollectionSnapshot,
        engine: &EngineSession,
    ) -> Result<DeliveredArtifact> {
        if !engine.is_ready() {
            return Err(EngineError::NotReady { state: engine.state().to_string() }.into());
        }
        if snapshot.is_empty() {
            return Err(ExportError::EmptyCollection.into());
        }
        info!("🎬 Exporting {} clips", snapshot.len());
        info!("   Step 1: engine ready, collection non-empty");

        let guard = self.enter_running()?;
        info!("   Step 2: job running");

        match self.run(snapshot, engine).await {
            Ok(delivered) => {
                guard.finish(ExportState::Succeeded);
                info!("   Step 8: job succeeded");
                info!("🎉 Export complete: {} ({} bytes)", delivered.file_name, delivered.size);
                Ok(delivered)
            }
            Err(e) => {
                warn!("Export failed: {}", e);
                guard.finish(ExportState::Failed(e.to_string()));
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        snapshot: &CollectionSnapshot,
        engine: &EngineSession,
    ) -> Result<DeliveredArtifact> {
        // Stale inputs or outputs from an earlier run must never be picked up.
        info!("   Step 3: clearing namespace");
        engine.clear_namespace().await?;

        info!("   Step 3: staging {} inputs", snapshot.len());
        let mut staged = Vec::with_capacity(snapshot.len());
        for (index, item) in snapshot.iter().enumerate() {
            let name = staged_input_name(index);
            debug!("      {} <- {}", name, item.name());
            engine.stage_file(&name, item.source.bytes()).await?;
            staged.push(name);
        }

        info!("   Step 4: staging manifest");
        let manifest = build_manifest(&staged);
        engine.stage_file(MANIFEST_FILE_NAME, manifest.as_bytes()).await?;

        info!("   Step 5: concatenating ({})", PolicyLabel(&self.policy));
        let args = build_concat_args(MANIFEST_FILE_NAME, &self.output_file_name, &self.policy);
        engine.invoke(&args).await?;

        info!("   Step 6: retrieving {}", self.output_file_name);
        let bytes = engine.retrieve_file(&self.output_file_name).await?;

        info!("   Step 7: delivering");
        let artifact = Artifact {
            bytes,
            media_type: OUTPUT_MEDIA_TYPE.to_string(),
            file_name: self.output_file_name.clone(),
        };
        self.sink.deliver(artifact).await
    }
}

impl fmt::Debug for ExportOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportOrchestrator")
            .field("policy", &self.policy)
            .field("output_file_name", &self.output_file_name)
            .field("state", &self.state())
            .finish()
    }
}

struct PolicyLabel<'a>(&'a ConcatPolicy);

impl fmt::Display for PolicyLabel<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            ConcatPolicy::StreamCopy => write!(f, "stream copy"),
            ConcatPolicy::Reencode { codec, crf, preset } => {
                write!(f, "re-encode {} crf {} preset {}", codec, crf, preset)
            }
        }
    }
}
