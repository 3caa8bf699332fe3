// Forecast job lifecycle
// Owns the single push channel of a view and drives the session from it

use super::session::{Flow, ForecastSession, JobSnapshot, JOB_TIMEOUT_MESSAGE, TRANSPORT_FAILURE_MESSAGE};
use crate::channel::{ChannelGuard, ChannelMessage, ChannelOpener};
use crate::error::Result;
use crate::models::{ActualSales, JobState, JobTicket, PersistedModel, StartParams};
use log::{debug, warn};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// The running job: dropping it releases the channel and stops the pump
struct ActiveJob {
    generation: u64,
    pump: JoinHandle<()>,
    _guard: ChannelGuard,
}

impl Drop for ActiveJob {
    fn drop(&mut self) {
        debug!("Releasing channel of forecast job {}", self.generation);
        self.pump.abort();
    }
}

// Lock order: `active` before `session`
struct Shared {
    active: Mutex<Option<ActiveJob>>,
    session: Mutex<ForecastSession>,
    state_tx: watch::Sender<JobSnapshot>,
}

impl Shared {
    fn publish(&self, session: &ForecastSession) {
        self.state_tx.send_replace(session.snapshot());
    }

    /// Drop the active job if it still belongs to `generation`
    fn release(&self, generation: u64) {
        let finished = {
            let mut active = self.active.lock();
            match active.as_ref() {
                Some(job) if job.generation == generation => active.take(),
                _ => None,
            }
        };
        drop(finished);
    }
}

/// Drives forecast jobs for one view. At most one channel is open at a time;
/// starting a job while another runs cancels the running one first.
///
/// `start` spawns onto the current Tokio runtime and must be called from within one.
pub struct ForecastJobController {
    opener: Arc<dyn ChannelOpener>,
    shared: Arc<Shared>,
    job_timeout: Option<Duration>,
}

impl ForecastJobController {
    pub fn new(opener: Arc<dyn ChannelOpener>) -> Self {
        let session = ForecastSession::new();
        let (state_tx, _) = watch::channel(session.snapshot());

        Self {
            opener,
            shared: Arc::new(Shared {
                active: Mutex::new(None),
                session: Mutex::new(session),
                state_tx,
            }),
            job_timeout: None,
        }
    }

    /// Fail a job when no message arrives within `timeout`
    pub fn with_job_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.job_timeout = timeout;
        self
    }

    /// Seed the view with historical actuals
    pub fn set_actuals(&self, actuals: Vec<ActualSales>) {
        let mut session = self.shared.session.lock();
        session.set_actuals(actuals);
        self.shared.publish(&session);
    }

    /// Models the server has stored, used to identify a loaded model
    pub fn set_persisted_models(&self, models: Vec<PersistedModel>) {
        let mut session = self.shared.session.lock();
        session.set_persisted_models(models);
        self.shared.publish(&session);
    }

    pub fn start(&self, params: StartParams) -> Result<JobTicket> {
        params.validate()?;

        let mut active = self.shared.active.lock();

        let mut superseded = None;
        if let Some(previous) = active.take() {
            let mut session = self.shared.session.lock();
            if session.cancel() {
                debug!("Forecast job {} superseded by a new start", previous.generation);
                self.shared.publish(&session);
                superseded = Some(previous.generation);
            }
            drop(session);
            drop(previous);
        }

        let channel = match self.opener.open(&params) {
            Ok(channel) => channel,
            Err(e) => {
                warn!("Failed to open forecast channel: {}", e);
                let mut session = self.shared.session.lock();
                session.begin(&params);
                session.fail(TRANSPORT_FAILURE_MESSAGE);
                self.shared.publish(&session);
                return Err(e);
            }
        };
        let (receiver, guard) = channel.into_parts();

        let generation = {
            let mut session = self.shared.session.lock();
            let generation = session.begin(&params);
            self.shared.publish(&session);
            generation
        };

        let pump = tokio::spawn(pump_messages(
            self.shared.clone(),
            generation,
            receiver,
            self.job_timeout,
        ));

        *active = Some(ActiveJob {
            generation,
            pump,
            _guard: guard,
        });

        Ok(JobTicket::new(generation).superseding(superseded))
    }

    /// Cancel the running job. Returns false when nothing was running.
    pub fn cancel(&self) -> bool {
        let mut active = self.shared.active.lock();
        let job = active.take();

        let cancelled = {
            let mut session = self.shared.session.lock();
            let cancelled = session.cancel();
            if cancelled {
                self.shared.publish(&session);
            }
            cancelled
        };

        drop(job);
        cancelled
    }

    pub fn subscribe(&self) -> watch::Receiver<JobSnapshot> {
        self.shared.state_tx.subscribe()
    }

    pub fn snapshot(&self) -> JobSnapshot {
        self.shared.state_tx.borrow().clone()
    }

    pub fn state(&self) -> JobState {
        self.shared.state_tx.borrow().state.clone()
    }

    pub fn has_open_channel(&self) -> bool {
        self.shared.active.lock().is_some()
    }

    /// Resolves once no job is running
    pub async fn wait_for_terminal(&self) -> JobSnapshot {
        let mut rx = self.subscribe();
        let settled = rx.wait_for(|snapshot| !snapshot.state.is_active()).await;
        match settled {
            Ok(snapshot) => snapshot.clone(),
            Err(_) => self.snapshot(),
        }
    }
}

impl Drop for ForecastJobController {
    fn drop(&mut self) {
        let job = self.shared.active.lock().take();
        drop(job);
    }
}

async fn pump_messages(
    shared: Arc<Shared>,
    generation: u64,
    mut receiver: mpsc::Receiver<ChannelMessage>,
    job_timeout: Option<Duration>,
) {
    loop {
        let next = match job_timeout {
            Some(limit) => match tokio::time::timeout(limit, receiver.recv()).await {
                Ok(next) => next,
                Err(_) => {
                    warn!("Forecast job {} received nothing for {:?}", generation, limit);
                    let mut session = shared.session.lock();
                    if session.generation() == generation && session.state().is_active() {
                        session.fail(JOB_TIMEOUT_MESSAGE);
                        shared.publish(&session);
                    }
                    break;
                }
            },
            None => receiver.recv().await,
        };

        // A dropped sender means the transport went away without saying so
        let message = next.unwrap_or(ChannelMessage::Closed);

        let flow = {
            let mut session = shared.session.lock();
            let flow = session.handle(generation, message);
            if session.generation() == generation {
                shared.publish(&session);
            }
            flow
        };

        if flow == Flow::Finished {
            break;
        }
    }

    shared.release(generation);
}
