//! The state machine underlying every stream mover:
//! `ReadyToRun -> Running -> (Paused <-> Running) -> Stopped`.

use std::io;

use async_trait::async_trait;
use log::{debug, warn};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceStatus {
    ReadyToRun,
    Running,
    Paused,
    Stopped,
}

/// The pump a [`PausableService`] drives.
///
/// `execute` runs on its own task and must return promptly once the token
/// fires; returning `Ok` after a token fire is the normal outcome of a pause
/// or stop request. The hooks run on the caller's task after the pump task
/// has been joined, so they have exclusive access to the mover again.
#[async_trait]
pub trait StreamMover: Send + 'static {
    async fn execute(&mut self, token: CancellationToken) -> io::Result<()>;

    /// Flush obligations that must hold before a pause resolves.
    async fn on_paused(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// Teardown that must hold before a stop resolves.
    async fn on_stopped(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// A non-benign failure escaping `execute`. Returning `true` marks it
    /// handled and the service settles into its target state as if clean.
    async fn on_failed(&mut self, _error: &io::Error) -> bool {
        false
    }
}

/// Drives one mover through the pausable lifecycle.
///
/// Exactly one pump task is outstanding at any time. Leaving `Running`
/// always joins that task before the new state is reported to the caller,
/// while `start`/`resume` return as soon as the task has begun running.
pub struct PausableService<M: StreamMover> {
    name: &'static str,
    status: ServiceStatus,
    mover: Option<M>,
    task: Option<JoinHandle<(M, io::Result<()>)>>,
    stop_token: CancellationToken,
    pause_token: CancellationToken,
    connection_token: CancellationToken,
}

impl<M: StreamMover> PausableService<M> {
    pub fn new(name: &'static str, mover: M, connection_token: CancellationToken) -> Self {
        Self {
            name,
            status: ServiceStatus::ReadyToRun,
            mover: Some(mover),
            task: None,
            stop_token: CancellationToken::new(),
            pause_token: CancellationToken::new(),
            connection_token,
        }
    }

    pub fn status(&self) -> ServiceStatus {
        self.status
    }

    pub async fn start(&mut self) -> io::Result<()> {
        match self.status {
            ServiceStatus::ReadyToRun => self.spawn_run().await,
            other => Err(invalid_transition(self.name, "start", other)),
        }
    }

    /// Stops accepting work and joins the pump. Pending output is flushed by
    /// the mover's pause hook before this resolves.
    pub async fn pause(&mut self) -> io::Result<()> {
        match self.status {
            ServiceStatus::Paused => return Ok(()),
            ServiceStatus::Running => {}
            other => return Err(invalid_transition(self.name, "pause", other)),
        }
        self.pause_token.cancel();
        let result = self.join_task().await;
        if let Err(err) = self.settle(result).await {
            self.status = ServiceStatus::Stopped;
            return Err(err);
        }
        self.status = ServiceStatus::Paused;
        if let Some(mover) = self.mover.as_mut() {
            mover.on_paused().await?;
        }
        Ok(())
    }

    pub async fn resume(&mut self) -> io::Result<()> {
        match self.status {
            ServiceStatus::Stopped => Ok(()),
            ServiceStatus::Paused => self.spawn_run().await,
            other => Err(invalid_transition(self.name, "resume", other)),
        }
    }

    pub async fn stop(&mut self) -> io::Result<()> {
        match self.status {
            ServiceStatus::Stopped => return Ok(()),
            ServiceStatus::ReadyToRun => {
                self.status = ServiceStatus::Stopped;
                return Ok(());
            }
            ServiceStatus::Running | ServiceStatus::Paused => {}
        }
        self.stop_token.cancel();
        let result = self.join_task().await;
        // the caller always observes a terminal state, even on a crash
        self.status = ServiceStatus::Stopped;
        self.settle(result).await?;
        if let Some(mover) = self.mover.as_mut() {
            mover.on_stopped().await?;
        }
        Ok(())
    }

    async fn spawn_run(&mut self) -> io::Result<()> {
        let mut mover = match self.mover.take() {
            Some(mover) => mover,
            None => {
                return Err(io::Error::new(
                    io::ErrorKind::Other,
                    format!("{}: mover lost to an earlier crash", self.name),
                ))
            }
        };
        self.pause_token = CancellationToken::new();
        let run = CancellationToken::new();
        link_tokens(
            run.clone(),
            self.stop_token.clone(),
            self.pause_token.clone(),
            self.connection_token.clone(),
        );
        let (started_tx, started_rx) = oneshot::channel();
        let task_token = run.clone();
        self.task = Some(tokio::spawn(async move {
            let _ = started_tx.send(());
            let result = mover.execute(task_token.clone()).await;
            task_token.cancel();
            (mover, result)
        }));
        let _ = started_rx.await;
        self.status = ServiceStatus::Running;
        Ok(())
    }

    async fn join_task(&mut self) -> io::Result<()> {
        let task = match self.task.take() {
            Some(task) => task,
            None => return Ok(()),
        };
        match task.await {
            Ok((mover, result)) => {
                self.mover = Some(mover);
                result
            }
            Err(err) => Err(io::Error::new(
                io::ErrorKind::Other,
                format!("{} pump task failed: {}", self.name, err),
            )),
        }
    }

    /// Cancellation and transport-level errors are normal outcomes; anything
    /// else is offered to the mover before it is allowed to escape.
    async fn settle(&mut self, result: io::Result<()>) -> io::Result<()> {
        let err = match result {
            Ok(()) => return Ok(()),
            Err(err) => err,
        };
        if is_benign(&err) {
            debug!("{}: benign shutdown error: {}", self.name, err);
            return Ok(());
        }
        if let Some(mover) = self.mover.as_mut() {
            if mover.on_failed(&err).await {
                warn!("{}: failure handled by mover: {}", self.name, err);
                return Ok(());
            }
        }
        Err(err)
    }
}

/// The token handed to `execute` fires when a stop, a pause, or the
/// connection-closed token fires.
fn link_tokens(
    run: CancellationToken,
    stop: CancellationToken,
    pause: CancellationToken,
    connection: CancellationToken,
) {
    tokio::spawn(async move {
        tokio::select! {
            _ = run.cancelled() => {}
            _ = stop.cancelled() => run.cancel(),
            _ = pause.cancelled() => run.cancel(),
            _ = connection.cancelled() => run.cancel(),
        }
    });
}

fn is_benign(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::UnexpectedEof
            | io::ErrorKind::Interrupted
            | io::ErrorKind::TimedOut
    )
}

fn invalid_transition(name: &str, op: &str, status: ServiceStatus) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidInput,
        format!("{}: {} is not valid from {:?}", name, op, status),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Idles until cancelled, counting the runs and hook firings.
    struct CountingMover {
        runs: Arc<AtomicUsize>,
        pauses: Arc<AtomicUsize>,
        stops: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl StreamMover for CountingMover {
        async fn execute(&mut self, token: CancellationToken) -> io::Result<()> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            token.cancelled().await;
            Ok(())
        }

        async fn on_paused(&mut self) -> io::Result<()> {
            self.pauses.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn on_stopped(&mut self) -> io::Result<()> {
            self.stops.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn counting_service() -> (
        PausableService<CountingMover>,
        Arc<AtomicUsize>,
        Arc<AtomicUsize>,
        Arc<AtomicUsize>,
    ) {
        let runs = Arc::new(AtomicUsize::new(0));
        let pauses = Arc::new(AtomicUsize::new(0));
        let stops = Arc::new(AtomicUsize::new(0));
        let mover = CountingMover {
            runs: Arc::clone(&runs),
            pauses: Arc::clone(&pauses),
            stops: Arc::clone(&stops),
        };
        let service = PausableService::new("test", mover, CancellationToken::new());
        (service, runs, pauses, stops)
    }

    #[tokio::test]
    async fn pause_resume_stop_terminates() {
        let (mut service, runs, pauses, stops) = counting_service();
        service.start().await.unwrap();
        assert_eq!(service.status(), ServiceStatus::Running);
        service.pause().await.unwrap();
        assert_eq!(service.status(), ServiceStatus::Paused);
        service.resume().await.unwrap();
        assert_eq!(service.status(), ServiceStatus::Running);
        service.stop().await.unwrap();
        assert_eq!(service.status(), ServiceStatus::Stopped);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert_eq!(pauses.load(Ordering::SeqCst), 1);
        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn second_pause_is_a_no_op() {
        let (mut service, _, pauses, _) = counting_service();
        service.start().await.unwrap();
        service.pause().await.unwrap();
        service.pause().await.unwrap();
        assert_eq!(service.status(), ServiceStatus::Paused);
        assert_eq!(pauses.load(Ordering::SeqCst), 1);
        service.stop().await.unwrap();
    }

    #[tokio::test]
    async fn stop_from_stopped_is_a_no_op() {
        let (mut service, _, _, stops) = counting_service();
        service.start().await.unwrap();
        service.stop().await.unwrap();
        service.stop().await.unwrap();
        assert_eq!(service.status(), ServiceStatus::Stopped);
        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn resume_after_stop_is_a_no_op() {
        let (mut service, runs, _, _) = counting_service();
        service.start().await.unwrap();
        service.stop().await.unwrap();
        service.resume().await.unwrap();
        assert_eq!(service.status(), ServiceStatus::Stopped);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn start_twice_is_rejected() {
        let (mut service, _, _, _) = counting_service();
        service.start().await.unwrap();
        assert!(service.start().await.is_err());
        service.stop().await.unwrap();
    }

    #[tokio::test]
    async fn connection_token_ends_the_run() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mover = CountingMover {
            runs: Arc::clone(&runs),
            pauses: Arc::new(AtomicUsize::new(0)),
            stops: Arc::new(AtomicUsize::new(0)),
        };
        let connection = CancellationToken::new();
        let mut service = PausableService::new("test", mover, connection.clone());
        service.start().await.unwrap();
        connection.cancel();
        service.stop().await.unwrap();
        assert_eq!(service.status(), ServiceStatus::Stopped);
    }

    /// A mover whose failure is recoverable.
    struct FailingMover {
        handled: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl StreamMover for FailingMover {
        async fn execute(&mut self, _token: CancellationToken) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::InvalidData, "corrupt frame"))
        }

        async fn on_failed(&mut self, _error: &io::Error) -> bool {
            self.handled.fetch_add(1, Ordering::SeqCst);
            true
        }
    }

    #[tokio::test]
    async fn handled_failure_still_reaches_stopped() {
        let handled = Arc::new(AtomicUsize::new(0));
        let mover = FailingMover {
            handled: Arc::clone(&handled),
        };
        let mut service = PausableService::new("test", mover, CancellationToken::new());
        service.start().await.unwrap();
        service.stop().await.unwrap();
        assert_eq!(service.status(), ServiceStatus::Stopped);
        assert_eq!(handled.load(Ordering::SeqCst), 1);
    }
}
