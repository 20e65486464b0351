//! Single-consumer event serialization.
//!
//! Multiple producer threads (transport readers, the timer producer, the
//! lifecycle bridge, the server transport callback) funnel into exactly one
//! consumer thread. Events are dispatched one at a time in FIFO arrival
//! order across all sources, so the consumer never needs synchronization to
//! touch its state.

use std::{
    panic::{self, AssertUnwindSafe},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded, unbounded};
use tracing::{debug, error, warn};
use vestlink_proto::messages::{EventMessage, ServerMessage};

use crate::link::WirelessHandler;

/// Interval of the periodic countdown producer.
const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// UI/OS lifecycle signals funneled through the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleSignal {
    Activated,
    Deactivated,
}

/// A unit of work scheduled onto the consumer context via
/// [`EventLoopHandle::run_on_loop`].
pub type LoopTask<C> = Box<dyn FnOnce(&mut C) + Send + 'static>;

/// The serialized consumer. All handler methods run on the loop thread,
/// strictly one at a time.
pub trait EventConsumer: Send + 'static {
    fn on_device_event(&mut self, message: EventMessage);
    fn on_server_event(&mut self, message: ServerMessage);
    fn on_timer_tick(&mut self);
    fn on_lifecycle(&mut self, signal: LifecycleSignal);
}

enum LoopEvent<C> {
    Device(EventMessage),
    Server(ServerMessage),
    TimerTick,
    Lifecycle(LifecycleSignal),
    Task(LoopTask<C>),
    Shutdown,
}

/// Submission gate. Events enqueued before `start()` or after `stop()` are
/// silently dropped, not queued and not errored.
struct Gate {
    started: AtomicBool,
    stopped: AtomicBool,
}

impl Gate {
    fn is_open(&self) -> bool {
        self.started.load(Ordering::Acquire) && !self.stopped.load(Ordering::Acquire)
    }
}

/// Cloneable producer half of the loop; safe to use from any thread.
pub struct EventLoopHandle<C> {
    tx: Sender<LoopEvent<C>>,
    gate: Arc<Gate>,
}

impl<C> Clone for EventLoopHandle<C> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            gate: Arc::clone(&self.gate),
        }
    }
}

impl<C: EventConsumer> EventLoopHandle<C> {
    pub fn submit_device_event(&self, message: EventMessage) {
        self.submit(LoopEvent::Device(message));
    }

    pub fn submit_server_event(&self, message: ServerMessage) {
        self.submit(LoopEvent::Server(message));
    }

    pub fn submit_timer_tick(&self) {
        self.submit(LoopEvent::TimerTick);
    }

    pub fn submit_lifecycle_signal(&self, signal: LifecycleSignal) {
        self.submit(LoopEvent::Lifecycle(signal));
    }

    /// Schedule an arbitrary unit of work to execute in the serialized
    /// consumer context.
    pub fn run_on_loop(&self, task: impl FnOnce(&mut C) + Send + 'static) {
        self.submit(LoopEvent::Task(Box::new(task)));
    }

    fn submit(&self, event: LoopEvent<C>) {
        if !self.gate.is_open() {
            return;
        }
        let _ = self.tx.send(event);
    }
}

impl<C: EventConsumer> WirelessHandler for EventLoopHandle<C> {
    fn handle_wireless_event(&self, message: EventMessage) {
        self.submit_device_event(message);
    }
}

/// The loop itself: one unbounded queue, one consumer thread, one 1 Hz timer
/// producer.
pub struct EventLoop<C: EventConsumer> {
    handle: EventLoopHandle<C>,
    rx: Option<Receiver<LoopEvent<C>>>,
    timer_shutdown: Option<Sender<()>>,
}

impl<C: EventConsumer> Default for EventLoop<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: EventConsumer> EventLoop<C> {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self {
            handle: EventLoopHandle {
                tx,
                gate: Arc::new(Gate {
                    started: AtomicBool::new(false),
                    stopped: AtomicBool::new(false),
                }),
            },
            rx: Some(rx),
            timer_shutdown: None,
        }
    }

    pub fn handle(&self) -> EventLoopHandle<C> {
        self.handle.clone()
    }

    /// Move the consumer onto its thread and begin accepting events.
    pub fn start(&mut self, consumer: C) {
        let Some(rx) = self.rx.take() else {
            warn!("event loop already started");
            return;
        };
        thread::spawn(move || consume(rx, consumer));

        let (shutdown_tx, shutdown_rx) = bounded(0);
        let handle = self.handle.clone();
        thread::spawn(move || run_ticker(&shutdown_rx, &handle));
        self.timer_shutdown = Some(shutdown_tx);

        self.handle.gate.started.store(true, Ordering::Release);
    }

    /// Halt the timer producer and discard the consumer. Anything already
    /// enqueued but not yet dispatched is discarded.
    pub fn stop(&mut self) {
        if self.handle.gate.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        // Dropping the sender wakes the ticker thread.
        self.timer_shutdown = None;
        let _ = self.handle.tx.send(LoopEvent::Shutdown);
    }
}

impl<C: EventConsumer> Drop for EventLoop<C> {
    fn drop(&mut self) {
        self.stop();
    }
}

fn consume<C: EventConsumer>(rx: Receiver<LoopEvent<C>>, mut consumer: C) {
    while let Ok(event) = rx.recv() {
        if matches!(event, LoopEvent::Shutdown) {
            break;
        }
        // One bad event must not take the consumer context down with it.
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| dispatch(&mut consumer, event)));
        if outcome.is_err() {
            error!("event handler panicked; continuing with the next event");
        }
    }
    debug!("event loop consumer stopped");
}

fn dispatch<C: EventConsumer>(consumer: &mut C, event: LoopEvent<C>) {
    match event {
        LoopEvent::Device(message) => consumer.on_device_event(message),
        LoopEvent::Server(message) => consumer.on_server_event(message),
        LoopEvent::TimerTick => consumer.on_timer_tick(),
        LoopEvent::Lifecycle(signal) => consumer.on_lifecycle(signal),
        LoopEvent::Task(task) => task(consumer),
        LoopEvent::Shutdown => {}
    }
}

fn run_ticker<C: EventConsumer>(shutdown: &Receiver<()>, handle: &EventLoopHandle<C>) {
    loop {
        match shutdown.recv_timeout(TICK_INTERVAL) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => handle.submit_timer_tick(),
        }
    }
    debug!("timer producer stopped");
}
