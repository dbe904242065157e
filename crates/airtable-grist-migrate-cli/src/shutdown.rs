//! Signal handling scoped to migration runs.
//!
//! A signal while a run is in flight cancels that run's token; the run stops
//! at the next step boundary. A signal while idle (at a prompt, say) exits
//! the process straight away.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio_util::sync::CancellationToken;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

/// Exit status for a process stopped by SIGINT while idle.
const EXIT_INTERRUPTED: i32 = 130;

#[derive(Clone, Default)]
pub struct Shutdown {
    current: Arc<Mutex<Option<CancellationToken>>>,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a run with a fresh token. Signals received earlier have no
    /// effect on it.
    pub fn begin_run(&self) -> CancellationToken {
        let token = CancellationToken::new();
        *self.slot() = Some(token.clone());
        token
    }

    pub fn end_run(&self) {
        self.slot().take();
    }

    /// Cancel the in-flight run. Returns false when nothing is running.
    pub fn interrupt(&self) -> bool {
        match self.slot().as_ref() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<CancellationToken>> {
        self.current.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn on_signal(&self, name: &str) {
        if self.interrupt() {
            eprintln!("\nReceived {}. Stopping after the current request...", name);
        } else {
            eprintln!("\nReceived {}. Exiting.", name);
            std::process::exit(EXIT_INTERRUPTED);
        }
    }

    /// Install SIGINT and SIGTERM handlers for the life of the process.
    #[cfg(unix)]
    pub fn listen(&self) -> std::io::Result<()> {
        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;

        let shutdown = self.clone();
        tokio::spawn(async move {
            loop {
                let name = tokio::select! {
                    _ = sigint.recv() => "SIGINT",
                    _ = sigterm.recv() => "SIGTERM",
                };
                shutdown.on_signal(name);
            }
        });

        Ok(())
    }

    /// Install a Ctrl-C handler for the life of the process.
    #[cfg(not(unix))]
    pub fn listen(&self) -> std::io::Result<()> {
        let shutdown = self.clone();
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                shutdown.on_signal("Ctrl-C");
            }
        });

        Ok(())
    }
}
