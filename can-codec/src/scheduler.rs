//! Periodic transmission scheduler
//!
//! Drives one tokio task per message with a nonzero cycle time. Each timer asks
//! the application's [`ValueSource`] for current physical values, encodes a frame
//! and hands it to a single dispatcher task, which owns the [`BusSink`] and
//! performs every write. The bus therefore never sees more than one write in
//! flight, and a slow bus can never stall a timer: when the dispatch queue is
//! full the tick is dropped and reported as [`SchedulerEvent::Overrun`].
//!
//! Deadlines are absolute (`next += cycle`), so timers do not drift. A timer that
//! wakes up late skips the periods it missed instead of bursting to catch up.
//!
//! ```no_run
//! use can_codec::{MessageCatalog, SchedulerConfig, StaticValues, TransmissionScheduler};
//! use std::sync::Arc;
//!
//! # async fn run(catalog: MessageCatalog, sink: impl can_codec::BusSink + 'static) {
//! let values = Arc::new(StaticValues::new());
//! values.set(0x310, "Max_Charge_Power", 150.0);
//!
//! let mut scheduler =
//!     TransmissionScheduler::new(Arc::new(catalog), values.clone(), SchedulerConfig::new());
//! scheduler.start(sink).unwrap();
//! // ... frames flow at their declared cadence ...
//! scheduler.stop().await;
//! # }
//! ```

use crate::codec::SignalCodec;
use crate::config::{RangePolicy, SchedulerConfig};
use crate::signals::{MessageCatalog, MessageDefinition, SignalValues};
use crate::types::{BusError, EncodeError, Frame, SchedulerError, Timestamp};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Duration, Instant};

/// Capacity of the event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// External bus transport that accepts encoded frames
///
/// The scheduler calls `send` from one task only and never issues a second
/// write before the first completes.
#[async_trait]
pub trait BusSink: Send {
    /// Write one frame to the bus
    async fn send(&mut self, frame: &Frame) -> Result<(), BusError>;

    /// Push out anything the sink still holds, such as the rest of a write
    /// that was cancelled
    async fn flush(&mut self) -> Result<(), BusError> {
        Ok(())
    }
}

/// Application-supplied provider of current physical signal values
///
/// Called on every timer tick, so implementations must not block.
pub trait ValueSource: Send + Sync {
    /// Current values for the given message's signals
    fn values(&self, message: &MessageDefinition) -> SignalValues;
}

impl<F> ValueSource for F
where
    F: Fn(&MessageDefinition) -> SignalValues + Send + Sync,
{
    fn values(&self, message: &MessageDefinition) -> SignalValues {
        self(message)
    }
}

/// A shared table of values the application updates as its state changes
#[derive(Debug, Default)]
pub struct StaticValues {
    values: RwLock<HashMap<u32, SignalValues>>,
}

impl StaticValues {
    /// Create an empty value table
    pub fn new() -> Self {
        Self::default()
    }

    /// Set one signal's physical value
    pub fn set(&self, message_id: u32, signal: impl Into<String>, value: f64) {
        self.values
            .write()
            .entry(message_id)
            .or_default()
            .insert(signal.into(), value);
    }

    /// Replace all values for a message
    pub fn set_message(&self, message_id: u32, values: SignalValues) {
        self.values.write().insert(message_id, values);
    }
}

impl ValueSource for StaticValues {
    fn values(&self, message: &MessageDefinition) -> SignalValues {
        self.values
            .read()
            .get(&message.id)
            .cloned()
            .unwrap_or_default()
    }
}

/// Per-message timer state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    /// Eligible but not started
    Idle,
    /// Waiting for the given deadline
    Armed(Instant),
    /// Halted; terminal for this scheduler instance
    Stopped,
}

/// Something the scheduler wants the application to know about
#[derive(Debug, Clone, PartialEq)]
pub enum SchedulerEvent {
    /// A frame was written to the bus
    Dispatched { id: u32, at: Timestamp },
    /// Ticks were dropped (queue full or timer late); scheduling continues
    Overrun { id: u32, missed: u64 },
    /// The value source produced values that could not be encoded
    EncodeFailed { id: u32, error: EncodeError },
    /// The bus sink rejected a frame
    SinkFailed { id: u32, error: BusError },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Running,
    Stopped,
}

/// Handles to the tasks of a running scheduler
struct Running {
    shutdown: watch::Sender<bool>,
    dispatch_tx: mpsc::Sender<Frame>,
    timers: Vec<JoinHandle<()>>,
    dispatcher: JoinHandle<Box<dyn BusSink>>,
}

/// Periodic transmission scheduler
pub struct TransmissionScheduler {
    catalog: Arc<MessageCatalog>,
    source: Arc<dyn ValueSource>,
    config: SchedulerConfig,
    states: Arc<RwLock<HashMap<u32, TimerState>>>,
    events: broadcast::Sender<SchedulerEvent>,
    phase: Phase,
    running: Option<Running>,
}

impl TransmissionScheduler {
    /// Create a scheduler for every periodic message in the catalog that the
    /// configuration's filter admits
    pub fn new(
        catalog: Arc<MessageCatalog>,
        source: Arc<dyn ValueSource>,
        config: SchedulerConfig,
    ) -> Self {
        let states = catalog
            .periodic_messages()
            .into_iter()
            .filter(|m| config.should_schedule(m.id))
            .map(|m| (m.id, TimerState::Idle))
            .collect();

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            catalog,
            source,
            config,
            states: Arc::new(RwLock::new(states)),
            events,
            phase: Phase::Idle,
            running: None,
        }
    }

    /// Receive scheduler events from now on
    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.events.subscribe()
    }

    /// State of a message's timer; `None` for messages that are not scheduled
    pub fn state(&self, id: u32) -> Option<TimerState> {
        self.states.read().get(&id).copied()
    }

    /// IDs of all scheduled messages, ascending
    pub fn scheduled_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.states.read().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// True between `start` and `stop`
    pub fn is_running(&self) -> bool {
        self.phase == Phase::Running
    }

    /// Arm every scheduled timer and start dispatching to `sink`
    ///
    /// Each timer fires immediately and then every `cycle_time_ms`. Must be
    /// called from within a tokio runtime.
    pub fn start<S>(&mut self, sink: S) -> Result<(), SchedulerError>
    where
        S: BusSink + 'static,
    {
        match self.phase {
            Phase::Running => return Err(SchedulerError::AlreadyRunning),
            Phase::Stopped => return Err(SchedulerError::Stopped),
            Phase::Idle => {}
        }

        let (shutdown, shutdown_rx) = watch::channel(false);
        let (dispatch_tx, dispatch_rx) = mpsc::channel(self.config.dispatch_queue_depth.max(1));

        let dispatcher = tokio::spawn(run_dispatcher(
            Box::new(sink),
            dispatch_rx,
            shutdown_rx.clone(),
            self.events.clone(),
        ));

        let start = Instant::now();
        let mut timers = Vec::new();

        for id in self.scheduled_ids() {
            let Some(message) = self.catalog.lookup(id) else {
                continue;
            };

            let timer = Timer {
                id,
                period: Duration::from_millis(message.cycle_time_ms),
                catalog: Arc::clone(&self.catalog),
                source: Arc::clone(&self.source),
                policy: self.config.range_policy,
                states: Arc::clone(&self.states),
                dispatch_tx: dispatch_tx.clone(),
                events: self.events.clone(),
            };

            self.states.write().insert(id, TimerState::Armed(start));
            timers.push(tokio::spawn(timer.run(start, shutdown_rx.clone())));
        }

        log::info!(
            "Transmission scheduler started: {} periodic messages, queue depth {}",
            timers.len(),
            self.config.dispatch_queue_depth
        );

        self.running = Some(Running {
            shutdown,
            dispatch_tx,
            timers,
            dispatcher,
        });
        self.phase = Phase::Running;
        Ok(())
    }

    /// Encode and queue one frame on request
    ///
    /// Works for any message in the catalog, including aperiodic ones. Waits for
    /// room in the dispatch queue rather than dropping the frame.
    pub async fn transmit(&self, id: u32, values: &SignalValues) -> Result<(), SchedulerError> {
        let running = match (&self.running, self.phase) {
            (Some(running), Phase::Running) => running,
            (_, Phase::Stopped) => return Err(SchedulerError::Stopped),
            _ => return Err(SchedulerError::NotRunning),
        };

        let message = self
            .catalog
            .lookup(id)
            .ok_or(SchedulerError::UnknownMessage(id))?;
        let frame = SignalCodec::encode_message(message, values, self.config.range_policy)?;

        running
            .dispatch_tx
            .send(frame)
            .await
            .map_err(|_| SchedulerError::NotRunning)
    }

    /// Halt every timer and the dispatcher
    ///
    /// When this returns no task of this scheduler is left running and nothing
    /// more will be written to the bus; a write in progress is cancelled and
    /// queued frames are discarded. Returns the sink if the scheduler had been
    /// started; call [`BusSink::flush`] on it to complete a cancelled write.
    /// Stopping is final: `start` fails afterwards.
    pub async fn stop(&mut self) -> Option<Box<dyn BusSink>> {
        self.phase = Phase::Stopped;

        let sink = match self.running.take() {
            Some(running) => {
                let _ = running.shutdown.send(true);
                drop(running.dispatch_tx);

                for timer in running.timers {
                    if let Err(e) = timer.await {
                        log::error!("Timer task failed: {}", e);
                    }
                }

                match running.dispatcher.await {
                    Ok(sink) => Some(sink),
                    Err(e) => {
                        log::error!("Dispatcher task failed: {}", e);
                        None
                    }
                }
            }
            None => None,
        };

        for state in self.states.write().values_mut() {
            *state = TimerState::Stopped;
        }

        log::info!("Transmission scheduler stopped");
        sink
    }
}

/// One periodic message's timer task
struct Timer {
    id: u32,
    period: Duration,
    catalog: Arc<MessageCatalog>,
    source: Arc<dyn ValueSource>,
    policy: RangePolicy,
    states: Arc<RwLock<HashMap<u32, TimerState>>>,
    dispatch_tx: mpsc::Sender<Frame>,
    events: broadcast::Sender<SchedulerEvent>,
}

impl Timer {
    async fn run(self, first_fire: Instant, mut shutdown: watch::Receiver<bool>) {
        let Some(message) = self.catalog.lookup(self.id) else {
            return;
        };

        let mut next_fire = first_fire;

        loop {
            self.states.write().insert(self.id, TimerState::Armed(next_fire));

            tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                _ = sleep_until(next_fire) => {}
            }

            if !self.fire(message) {
                break;
            }

            next_fire += self.period;

            let now = Instant::now();
            if next_fire < now {
                let behind = now.duration_since(next_fire);
                let missed = (behind.as_nanos() / self.period.as_nanos()) as u64 + 1;
                next_fire += self.period * missed as u32;

                log::warn!(
                    "Timer for 0x{:X} fell behind, skipping {} period(s)",
                    self.id,
                    missed
                );
                let _ = self.events.send(SchedulerEvent::Overrun {
                    id: self.id,
                    missed,
                });
            }
        }

        self.states.write().insert(self.id, TimerState::Stopped);
        log::debug!("Timer for 0x{:X} stopped", self.id);
    }

    /// Encode and queue one frame; false once the dispatcher is gone
    fn fire(&self, message: &MessageDefinition) -> bool {
        let values = self.source.values(message);

        let frame = match SignalCodec::encode_message(message, &values, self.policy) {
            Ok(frame) => frame,
            Err(error) => {
                log::warn!("Failed to encode {} (0x{:X}): {}", message.name, self.id, error);
                let _ = self.events.send(SchedulerEvent::EncodeFailed { id: self.id, error });
                return true;
            }
        };

        match self.dispatch_tx.try_send(frame) {
            Ok(()) => {
                log::trace!("Queued {} (0x{:X})", message.name, self.id);
                true
            }
            Err(TrySendError::Full(_)) => {
                log::warn!("Bus not ready, dropping tick for {} (0x{:X})", message.name, self.id);
                let _ = self.events.send(SchedulerEvent::Overrun {
                    id: self.id,
                    missed: 1,
                });
                true
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }
}

/// Sole writer to the bus sink; returns the sink on shutdown
async fn run_dispatcher(
    mut sink: Box<dyn BusSink>,
    mut queue: mpsc::Receiver<Frame>,
    mut shutdown: watch::Receiver<bool>,
    events: broadcast::Sender<SchedulerEvent>,
) -> Box<dyn BusSink> {
    loop {
        let frame = tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            frame = queue.recv() => match frame {
                Some(frame) => frame,
                None => break,
            },
        };

        let result = tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            result = sink.send(&frame) => result,
        };

        match result {
            Ok(()) => {
                log::debug!("Dispatched {}", frame);
                let _ = events.send(SchedulerEvent::Dispatched {
                    id: frame.id,
                    at: chrono::Utc::now(),
                });
            }
            Err(error) => {
                log::warn!("Failed to dispatch 0x{:X}: {}", frame.id, error);
                let _ = events.send(SchedulerEvent::SinkFailed { id: frame.id, error });
            }
        }
    }

    log::debug!("Dispatcher stopped");
    sink
}
