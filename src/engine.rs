// src/engine.rs
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::dsp::{DType, InputPorts, PlotError, SampleSource};

const IDLE: Duration = Duration::from_millis(5);

/// A dataflow block driven by a worker thread.
///
/// `work` is called once per cycle with every port holding at least its
/// reserve. Commands are applied between cycles, never during one.
pub trait Block: Send + 'static {
    type Command: Send + 'static;

    fn activate(&mut self, ports: &mut InputPorts) -> Result<(), PlotError>;

    fn deactivate(&mut self) {}

    fn apply(&mut self, ports: &mut InputPorts, command: Self::Command) -> Result<(), PlotError>;

    fn work(&mut self, ports: &mut InputPorts, now: Instant) -> Result<(), PlotError>;
}

pub enum Control<C> {
    Activate,
    Deactivate,
    // New input connections; the block is re-activated if it was running.
    Reconfigure {
        dtypes: Vec<DType>,
        source: Box<dyn SampleSource>,
    },
    Block(C),
    Shutdown,
}

struct Envelope<C> {
    control: Control<C>,
    reply: Sender<Result<(), PlotError>>,
}

/// Completion of a queued command.
pub struct Receipt {
    rx: Receiver<Result<(), PlotError>>,
}

impl Receipt {
    /// Blocks until the worker has applied the command.
    pub fn wait(self) -> Result<(), PlotError> {
        self.rx.recv().unwrap_or(Err(PlotError::WorkerStopped))
    }
}

struct Worker<B: Block> {
    name: String,
    block: B,
    ports: InputPorts,
    source: Box<dyn SampleSource>,
    active: bool,
}

impl<B: Block> Worker<B> {
    fn activate(&mut self) -> Result<(), PlotError> {
        let result = self.block.activate(&mut self.ports);
        self.active = result.is_ok();
        match &result {
            Ok(()) => info!("{}: activated with {} input(s)", self.name, self.ports.len()),
            Err(err) => warn!("{}: activation failed: {err}", self.name),
        }
        result
    }

    fn deactivate(&mut self) {
        if self.active {
            self.block.deactivate();
            self.active = false;
            info!("{}: deactivated", self.name);
        }
    }

    /// Returns false once the worker should exit.
    fn handle(&mut self, envelope: Envelope<B::Command>) -> bool {
        let Envelope { control, reply } = envelope;
        let (result, keep_running) = match control {
            Control::Activate => (self.activate(), true),
            Control::Deactivate => {
                self.deactivate();
                (Ok(()), true)
            }
            Control::Reconfigure { dtypes, source } => {
                let was_active = self.active;
                self.deactivate();
                self.ports = InputPorts::from_dtypes(&dtypes);
                self.source = source;
                debug!("{}: reconfigured for {:?}", self.name, dtypes);
                let result = if was_active { self.activate() } else { Ok(()) };
                (result, true)
            }
            Control::Block(command) => (self.block.apply(&mut self.ports, command), true),
            Control::Shutdown => {
                self.deactivate();
                (Ok(()), false)
            }
        };
        reply.send(result).ok();
        keep_running
    }

    /// Moves one batch from the source into the ports. True if one arrived.
    fn pull(&mut self) -> bool {
        match self.source.next_batch() {
            Ok(Some(batch)) => {
                if let Err(err) = batch.deliver(&mut self.ports) {
                    warn!("{}: dropped batch: {err}", self.name);
                }
                true
            }
            Ok(None) => false,
            Err(err) => {
                warn!("{}: source error: {err}", self.name);
                false
            }
        }
    }

    fn run(mut self, rx: Receiver<Envelope<B::Command>>) {
        info!("{}: worker started", self.name);
        'outer: loop {
            loop {
                match rx.try_recv() {
                    Ok(envelope) => {
                        if !self.handle(envelope) {
                            break 'outer;
                        }
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => break 'outer,
                }
            }

            let mut progressed = false;
            if self.active {
                progressed = self.pull();
                if self.ports.ready() {
                    self.ports.begin_cycle();
                    if let Err(err) = self.block.work(&mut self.ports, Instant::now()) {
                        warn!("{}: work failed: {err}", self.name);
                    }
                    progressed = true;
                }
            }

            if !progressed {
                match rx.recv_timeout(IDLE) {
                    Ok(envelope) => {
                        if !self.handle(envelope) {
                            break;
                        }
                    }
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
        }
        self.deactivate();
        info!("{}: worker stopped", self.name);
    }
}

/// Owner side of a block's worker thread. Dropping it stops the worker.
pub struct WorkerHandle<C: Send + 'static> {
    name: String,
    tx: Sender<Envelope<C>>,
    thread: Option<JoinHandle<()>>,
}

pub fn spawn_worker<B: Block>(
    name: impl Into<String>,
    block: B,
    dtypes: &[DType],
    source: Box<dyn SampleSource>,
) -> WorkerHandle<B::Command> {
    let name = name.into();
    let (tx, rx) = channel();
    let worker = Worker {
        name: name.clone(),
        block,
        ports: InputPorts::from_dtypes(dtypes),
        source,
        active: false,
    };
    let thread = thread::spawn(move || worker.run(rx));
    WorkerHandle {
        name,
        tx,
        thread: Some(thread),
    }
}

impl<C: Send + 'static> WorkerHandle<C> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queues `control` without waiting for it.
    pub fn post(&self, control: Control<C>) -> Receipt {
        let (reply, rx) = channel();
        // A stopped worker drops the envelope, so the receipt reports it.
        self.tx.send(Envelope { control, reply }).ok();
        Receipt { rx }
    }

    pub fn send(&self, command: C) -> Receipt {
        self.post(Control::Block(command))
    }

    /// Applies `command` and waits for the outcome.
    pub fn call(&self, command: C) -> Result<(), PlotError> {
        self.send(command).wait()
    }

    pub fn activate(&self) -> Result<(), PlotError> {
        self.post(Control::Activate).wait()
    }

    pub fn deactivate(&self) -> Result<(), PlotError> {
        self.post(Control::Deactivate).wait()
    }

    pub fn reconfigure(
        &self,
        dtypes: Vec<DType>,
        source: Box<dyn SampleSource>,
    ) -> Result<(), PlotError> {
        self.post(Control::Reconfigure { dtypes, source }).wait()
    }

    pub fn shutdown(mut self) -> Result<(), PlotError> {
        self.stop()
    }

    fn stop(&mut self) -> Result<(), PlotError> {
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };
        self.post(Control::Shutdown);
        thread.join().map_err(|_| {
            warn!("{}: worker panicked", self.name);
            PlotError::WorkerStopped
        })
    }
}

impl<C: Send + 'static> Drop for WorkerHandle<C> {
    fn drop(&mut self) {
        self.stop().ok();
    }
}
