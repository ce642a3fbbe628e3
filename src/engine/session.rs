use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tempfile::TempDir;
use tracing::{debug, info, warn};

use crate::{
    engine::{Engine, EngineInfo, EngineState, LogSink},
    error::{EngineError, Result},
};

/// Moves an unfinished load to `LoadFailed` when the initialize future is dropped
struct LoadGuard<'a> {
    session: &'a EngineSession,
    armed: bool,
}

impl LoadGuard<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for LoadGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut inner = self.session.lock();
        if inner.state == EngineState::Loading {
            warn!("Engine initialization was cancelled");
            inner.state = EngineState::LoadFailed("initialization was cancelled".to_string());
        }
    }
}

struct SessionInner {
    state: EngineState,
    namespace: Option<Arc<TempDir>>,
    info: Option<EngineInfo>,
}

/// One engine instance and its namespace, shared by everything in an editing session
///
/// Hold it in an `Arc` and pass it explicitly to whoever needs the engine.
pub struct EngineSession {
    engine: Arc<dyn Engine>,
    inner: Mutex<SessionInner>,
    logs: LogSink,
    timeout: Option<Duration>,
}

impl EngineSession {
    pub fn new(engine: Arc<dyn Engine>) -> Self {
        Self {
            engine,
            inner: Mutex::new(SessionInner {
                state: EngineState::Uninitialized,
                namespace: None,
                info: None,
            }),
            logs: LogSink::new(),
            timeout: None,
        }
    }

    /// Bound every `invoke` by `timeout`
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> EngineState {
        self.lock().state.clone()
    }

    pub fn is_ready(&self) -> bool {
        self.lock().state == EngineState::Ready
    }

    pub fn info(&self) -> Option<EngineInfo> {
        self.lock().info.clone()
    }

    /// Register an observer for load progress and engine diagnostics
    pub fn on_log<F>(&self, callback: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.logs.subscribe(callback);
    }

    /// Load the engine runtime
    ///
    /// A no-op while loading or ready. After a failed load, calling this
    /// again retries from scratch.
    pub async fn initialize(&self) -> Result<()> {
        {
            let mut inner = self.lock();
            if matches!(inner.state, EngineState::Loading | EngineState::Ready) {
                debug!("Engine initialize skipped ({})", inner.state);
                return Ok(());
            }
            inner.state = EngineState::Loading;
        }
        let guard = LoadGuard { session: self, armed: true };

        let loaded = match self.engine.load(&self.logs).await {
            Ok(info) => tempfile::Builder::new()
                .prefix("clip-engine-")
                .tempdir()
                .map(|dir| (info, dir))
                .map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        guard.disarm();

        let mut inner = self.lock();
        match loaded {
            Ok((info, namespace)) => {
                info!("Engine ready, namespace at {}", namespace.path().display());
                inner.state = EngineState::Ready;
                inner.namespace = Some(Arc::new(namespace));
                inner.info = Some(info);
                drop(inner);
                self.logs.emit("Engine ready");
                Ok(())
            }
            Err(reason) => {
                warn!("Engine failed to load: {}", reason);
                inner.state = EngineState::LoadFailed(reason.clone());
                drop(inner);
                self.logs.emit(&format!("Engine failed to load: {}", reason));
                Err(EngineError::LoadFailed { reason }.into())
            }
        }
    }

    /// Release the namespace and return to `Uninitialized`
    pub fn dispose(&self) {
        let mut inner = self.lock();
        inner.state = EngineState::Uninitialized;
        inner.namespace = None;
        inner.info = None;
        debug!("Engine session disposed");
    }

    fn namespace(&self) -> Result<Arc<TempDir>> {
        let inner = self.lock();
        match (&inner.state, &inner.namespace) {
            (EngineState::Ready, Some(namespace)) => Ok(namespace.clone()),
            (state, _) => Err(EngineError::NotReady { state: state.to_string() }.into()),
        }
    }

    fn resolve(namespace: &TempDir, name: &str) -> Result<PathBuf> {
        let plain = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains(['/', '\\']);
        if !plain {
            return Err(EngineError::InvalidName { name: name.to_string() }.into());
        }
        Ok(namespace.path().join(name))
    }

    /// Write a named blob into the namespace
    pub async fn stage_file(&self, name: &str, bytes: &[u8]) -> Result<()> {
        let namespace = self.namespace()?;
        let path = Self::resolve(&namespace, name)?;
        tokio::fs::write(&path, bytes).await?;
        debug!("Staged {} ({} bytes)", name, bytes.len());
        Ok(())
    }

    /// Run one engine command against the namespace
    pub async fn invoke(&self, args: &[String]) -> Result<()> {
        let namespace = self.namespace()?;
        let run = self.engine.execute(namespace.path(), args, &self.logs);

        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, run)
                .await
                .map_err(|_| EngineError::Timeout { limit })?,
            None => run.await,
        }
    }

    /// Read a named output back out of the namespace
    pub async fn retrieve_file(&self, name: &str) -> Result<Vec<u8>> {
        let namespace = self.namespace()?;
        let path = Self::resolve(&namespace, name)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(EngineError::NotFound { name: name.to_string() }.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Names of everything currently in the namespace, sorted
    pub async fn list_files(&self) -> Result<Vec<String>> {
        let namespace = self.namespace()?;
        let mut entries = tokio::fs::read_dir(namespace.path()).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Delete every file from the namespace
    pub async fn clear_namespace(&self) -> Result<()> {
        let namespace = self.namespace()?;
        let mut entries = tokio::fs::read_dir(namespace.path()).await?;
        let mut removed = 0usize;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                tokio::fs::remove_dir_all(entry.path()).await?;
            } else {
                tokio::fs::remove_file(entry.path()).await?;
            }
            removed += 1;
        }
        if removed > 0 {
            debug!("Cleared {} files from engine namespace", removed);
        }
        Ok(())
    }
}
