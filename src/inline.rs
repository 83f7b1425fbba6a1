//! Reconstruction while the acquisition is still running.
//!
//! The acquisition side publishes one projection record at a time through a
//! [`Feeder`]; a reconstruction thread picks each record up, extends its own
//! copy of the geometry and back-projects every projection as soon as both
//! of its angular neighbours are known. The two sides meet in a queue of
//! published records guarded by a single mutex. The producer holds the lock
//! only to append a record and never waits for the reconstruction to catch
//! up. The consumer holds it only long enough to take the oldest record, and
//! sleeps on a condition variable while the queue is empty. All filtering and
//! back-projection happen outside the lock.
//!
//! The pipeline stays in `WaitingForProjections` until three records have
//! been received, which is when the first projection can be reconstructed.
//!
//! Projection `i` is reconstructed when record `i + 1` arrives. Projections 0
//! and `n - 1` wrap around the orbit, so they are processed once more when the
//! last record arrives, with the complete geometry. The result is the same as
//! that of a batch reconstruction of the whole acquisition.
//!
//! Parker short-scan weighting needs the complete orbit, so it is not
//! available here. Displaced-detector weighting uses the lateral offsets of
//! the whole acquisition, which the producer publishes with every record.

/// Where the reconstruction thread has got to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    WaitingForProjections,
    Reconstructing,
    Finalizing,
    Done,
    Failed,
}

/// Gives the projection which a record refers to
pub trait ProjectionReader: Send + 'static {
    type Reference: Clone + Send + std::fmt::Debug + 'static;
    fn read(&mut self, reference: &Self::Reference) -> Result<Projection>;
}

/// One projection per MetaImage file
#[derive(Clone, Copy, Debug, Default)]
pub struct MetaImageFiles;

impl ProjectionReader for MetaImageFiles {
    type Reference = PathBuf;
    fn read(&mut self, path: &PathBuf) -> Result<Projection> { read_projection(path) }
}

/// Slices of a stack which is already in memory
impl ProjectionReader for Arc<ProjectionStack> {
    type Reference = usize;
    fn read(&mut self, &index: &usize) -> Result<Projection> {
        if index >= self.len() {
            return Err(ReconError::Shape(format!("no projection {index} in a stack of {}", self.len())));
        }
        Ok(self.slice(index))
    }
}

/// Everything the acquisition side publishes about one projection
#[derive(Clone, Debug)]
pub struct AcquiredProjection<Ref> {
    /// Position of this record in the acquisition, counting from 0
    pub index: usize,
    pub params: ProjectionParams,
    /// Where the reader finds the projection image
    pub reference: Ref,
    /// Set on the final record of the acquisition
    pub last: bool,
    /// Smallest and largest lateral detector offset of the whole acquisition
    pub offset_range: (Lengthf64, Lengthf64),
}

struct Slot<Ref> {
    /// Published and not yet taken, oldest first
    pending: VecDeque<AcquiredProjection<Ref>>,
    state: State,
    /// No more records will be fed
    closed: bool,
    /// The reconstruction thread has exited
    stopped: bool,
}

struct Shared<Ref> {
    slot: Mutex<Slot<Ref>>,
    changed: Condvar,
}

impl<Ref> Shared<Ref> {
    fn lock(&self) -> MutexGuard<'_, Slot<Ref>> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, state: State) {
        self.lock().state = state;
        self.changed.notify_all();
    }

    /// Record that the consumer has gone, taking no more records
    fn stop(&self, state: State) {
        let mut slot = self.lock();
        slot.stopped = true;
        slot.pending.clear();
        slot.state = state;
        self.changed.notify_all();
    }
}

/// Acquisition side of a streaming reconstruction. Dropping it without
/// feeding a record flagged `last` aborts the reconstruction.
pub struct Feeder<Ref> {
    shared: Arc<Shared<Ref>>,
}

impl<Ref> Feeder<Ref> {

    /// Publish `record`. Returns at once, however far behind the
    /// reconstruction is. Fails with `PipelineAborted` once the reconstruction
    /// has stopped, or after the last record has been fed.
    pub fn feed(&self, record: AcquiredProjection<Ref>) -> Result<()> {
        let mut slot = self.shared.lock();
        if slot.stopped || slot.closed {
            return Err(ReconError::PipelineAborted);
        }
        slot.closed = record.last;
        slot.pending.push_back(record);
        self.shared.changed.notify_all();
        Ok(())
    }

    pub fn state(&self) -> State { self.shared.lock().state }
}

impl<Ref> Drop for Feeder<Ref> {
    fn drop(&mut self) {
        self.shared.lock().closed = true;
        self.shared.changed.notify_all();
    }
}

/// Reconstruction side of a streaming reconstruction
pub struct Finished<Ref> {
    shared: Arc<Shared<Ref>>,
    thread: JoinHandle<Result<Volume>>,
}

impl<Ref> Finished<Ref> {

    /// Block until the reconstruction is complete (or has failed)
    pub fn wait(self) -> Result<Volume> {
        self.thread.join().unwrap_or_else(|payload| {
            self.shared.stop(State::Failed);
            let message = payload.downcast_ref::<&str>().map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown cause".into());
            Err(ReconError::ReconstructionPanicked(message))
        })
    }

    pub fn state(&self) -> State { self.shared.lock().state }

    pub fn is_finished(&self) -> bool { self.thread.is_finished() }
}

/// Projections which have been received but not yet read, or which have been
/// read recently. Only the two most recent images are kept, older ones are
/// read again when they are needed.
struct Projections<R: ProjectionReader> {
    reader: R,
    references: Vec<R::Reference>,
    cache: [Option<(usize, Projection)>; 2],
}

impl<R: ProjectionReader> Projections<R> {

    fn new(reader: R) -> Self {
        Self { reader, references: vec![], cache: [None, None] }
    }

    fn push(&mut self, reference: R::Reference) { self.references.push(reference) }

    fn get(&mut self, index: usize) -> Result<Projection> {
        if let Some((_, p)) = self.cache.iter().flatten().find(|(i, _)| *i == index) {
            return Ok(p.clone());
        }
        let reference = self.references.get(index)
            .ok_or_else(|| ReconError::Shape(format!("no reference to projection {index}")))?;
        let projection = self.reader.read(reference)?;
        tracing::trace!(index, ?reference, "Read projection");
        self.cache.swap(0, 1);
        self.cache[1] = Some((index, projection.clone()));
        Ok(projection)
    }
}

/// Entry point of streaming reconstruction
pub struct StreamingReconstruction;

impl StreamingReconstruction {

    /// Spawn the reconstruction thread. The configuration is checked, and the
    /// backend set up, before anything is spawned. If `output` is given, the
    /// volume is written there as a MetaImage when the reconstruction is
    /// complete.
    pub fn start<R: ProjectionReader>(
        config: FdkConfig,
        reader: R,
        output: Option<PathBuf>,
    ) -> Result<(Feeder<R::Reference>, Finished<R::Reference>)> {
        let mut config = config;
        if config.short_scan {
            tracing::warn!("Short-scan weighting needs the complete geometry: disabled in streaming mode");
            config.short_scan = false;
        }
        let fdk = Fdk::new(config)?;
        let shared = Arc::new(Shared {
            slot: Mutex::new(Slot {
                pending: VecDeque::new(),
                state: State::WaitingForProjections,
                closed: false,
                stopped: false,
            }),
            changed: Condvar::new(),
        });
        let consumer = Consumer {
            shared: Arc::clone(&shared),
            fdk: Some(fdk),
            geometry: Geometry::new(),
            projections: Projections::new(reader),
            volume: Some(Volume::zeros(config.grid)),
            output,
        };
        let thread = std::thread::Builder::new()
            .name("inline-fdk".into())
            .spawn(move || consumer.run())?;
        Ok((Feeder { shared: Arc::clone(&shared) }, Finished { shared, thread }))
    }
}

struct Consumer<R: ProjectionReader> {
    shared: Arc<Shared<R::Reference>>,
    fdk: Option<Fdk>,
    geometry: Geometry,
    projections: Projections<R>,
    /// Taken out for the duration of each step
    volume: Option<Volume>,
    output: Option<PathBuf>,
}

impl<R: ProjectionReader> Consumer<R> {

    fn run(mut self) -> Result<Volume> {
        let result = self.consume();
        self.shared.stop(if result.is_ok() { State::Done } else { State::Failed });
        if let Err(e) = &result { tracing::error!("Streaming reconstruction failed: {e}") }
        result
    }

    fn consume(&mut self) -> Result<Volume> {
        tracing::info!("Reconstruction thread waiting for projections");
        loop {
            let Some(record) = self.next_record() else {
                return Err(ReconError::PipelineAborted);
            };
            let last = record.last;
            self.receive(record)?;
            if last { return self.finish() }
        }
    }

    /// Wait for the next record, or for the feeder to go away
    fn next_record(&self) -> Option<AcquiredProjection<R::Reference>> {
        let mut slot = self.shared.lock();
        loop {
            if let Some(record) = slot.pending.pop_front() {
                return Some(record);
            }
            if slot.closed { return None }
            slot = self.shared.changed.wait(slot).unwrap_or_else(|e| e.into_inner());
        }
    }

    fn receive(&mut self, record: AcquiredProjection<R::Reference>) -> Result<()> {
        let AcquiredProjection { index, params, reference, offset_range, .. } = record;
        self.geometry.add_projection(params)?;
        self.projections.push(reference);
        let n = self.geometry.len();
        tracing::debug!(index, received = n, "Received projection");
        if n != index + 1 {
            return Err(ReconError::MissedProjection { expected: n - 1, received: index });
        }
        self.fdk = self.fdk.take().map(|fdk| fdk.with_offset_range(offset_range));
        if n >= 3 {
            if n == 3 { self.shared.set_state(State::Reconstructing) }
            self.reconstruct(n - 2)?;
        }
        Ok(())
    }

    fn reconstruct(&mut self, index: usize) -> Result<()> {
        let projection = self.projections.get(index)?;
        let (Some(fdk), Some(volume)) = (&self.fdk, self.volume.take()) else {
            return Err(ReconError::PipelineAborted);
        };
        self.volume = Some(fdk.reconstruct_projection(volume, &projection, &self.geometry, index)?);
        tracing::debug!(index, "Projection reconstructed");
        Ok(())
    }

    fn finish(&mut self) -> Result<Volume> {
        let n = self.geometry.len();
        if n < 3 {
            // Nothing has been reconstructed yet
            self.shared.set_state(State::Reconstructing);
            for index in 0..n { self.reconstruct(index)?; }
        } else {
            self.reconstruct(0)?;
            self.reconstruct(n - 1)?;
        }
        self.shared.set_state(State::Finalizing);
        let volume = self.volume.take().ok_or(ReconError::PipelineAborted)?;
        tracing::info!(projections = n, "Streaming reconstruction complete");
        if let Some(path) = &self.output {
            write_volume(&volume, path)?;
            tracing::info!(path = %path.display(), "Wrote volume");
        }
        Ok(volume)
    }
}

/// Feed every record of `geometry` in turn, as an acquisition would, pausing
/// for `delay` after each one. `reference(i)` says where projection `i` is.
pub fn replay<Ref>(
    feeder: &Feeder<Ref>,
    geometry: &Geometry,
    mut reference: impl FnMut(usize) -> Ref,
    delay: Duration,
) -> Result<()> {
    let offset_range = geometry.offset_x_range().unwrap_or((0.0, 0.0));
    let n = geometry.len();
    for (index, params) in geometry.records().enumerate() {
        feeder.feed(AcquiredProjection { index, params, reference: reference(index), last: index + 1 == n, offset_range })?;
        tracing::debug!(index, "Acquisition published projection");
        if !delay.is_zero() { std::thread::sleep(delay) }
    }
    Ok(())
}

// ----- Imports ------------------------------------------------------------------------------------------
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;

use geometry::{Geometry, ProjectionParams};

use crate::{
    error::{ReconError, Result},
    fdk::{Fdk, FdkConfig},
    image::{Projection, ProjectionStack, Volume},
    io::metaimage::{read_projection, write_volume},
    types::Lengthf64,
};
