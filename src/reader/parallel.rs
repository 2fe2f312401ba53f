// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! The background decode pipeline shared by all format readers.
//!
//! The pipeline has five stages:
//!
//! 1. **Source** - the only owner of the instance reader chain; reads
//!    batches sequentially and tags them with their batch index.
//! 2. **Limiter** - a permit channel bounding the number of batches in
//!    flight to the decoder concurrency.
//! 3. **Decoders** - a worker pool converting batches to examples, out
//!    of order.
//! 4. **Sequencer** - reorders decoded examples by batch index so the
//!    consumer sees strictly increasing order per epoch.
//! 5. **Fill queue** - a bounded queue; when it is full the sequencer
//!    blocks, which stalls permit recycling and therefore the source.
//!
//! The consumer swaps its private read queue with the fill queue under a
//! single mutex and two condvars. Control flows the other way: reset and
//! drop raise a cancellation flag, wake every blocked stage, and join the
//! pipeline thread.

use std::cmp::Ordering as CmpOrdering;
use std::collections::{BinaryHeap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, warn};

use crate::data_stores::DataStore;
use crate::error::{DataReaderError, Result, StreamError};
use crate::example::Example;
use crate::instances::{
    make_instance_reader, Instance, InstanceBatch, InstanceBatchReader, InstanceReader,
};
use crate::reader::{BadExampleHandling, DataReader, ReaderOptions};
use crate::records::RecordReader;
use crate::schema::Schema;

/// The format-specific half of a reader.
///
/// A format knows how to frame records out of a store, how to infer the
/// dataset schema from the first instance, and how to decode an instance
/// batch into an example. Decoding runs on worker threads and must be
/// reentrant.
pub trait DataFormat: Send + Sync {
    /// Open a record reader over `store`.
    fn make_record_reader(&self, store: &dyn DataStore) -> Result<Box<dyn RecordReader>>;

    /// Infer the dataset schema from the first instance, if any.
    fn infer_schema(&self, instance: Option<&Instance>) -> Result<Schema>;

    /// Decode `batch` into an example conforming to `schema`.
    fn decode(&self, batch: &InstanceBatch, schema: &Arc<Schema>) -> Result<Example>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    NotStarted,
    Running,
    Stopped,
    Faulted,
}

struct QueueState {
    fill: VecDeque<Example>,
    state: RunState,
    error: Option<DataReaderError>,
}

struct PipelineShared {
    queue: Mutex<QueueState>,
    /// Signalled when the fill queue gains an example or the pipeline
    /// terminates.
    read_available: Condvar,
    /// Signalled when the fill queue loses examples.
    space_available: Condvar,
    cancelled: AtomicBool,
}

impl PipelineShared {
    fn lock_queue(&self) -> MutexGuard<'_, QueueState> {
        self.queue.lock().unwrap_or_else(|e| e.into_inner())
    }
}

struct DecodeMessage {
    index: u64,
    result: Result<Example>,
}

/// Heap entry ordered so the smallest batch index pops first.
struct Sequenced(DecodeMessage);

impl PartialEq for Sequenced {
    fn eq(&self, other: &Self) -> bool {
        self.0.index == other.0.index
    }
}

impl Eq for Sequenced {}

impl PartialOrd for Sequenced {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for Sequenced {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        other.0.index.cmp(&self.0.index)
    }
}

/// The shared reader pipeline: composes an instance reader chain, a
/// batcher, and a cancellable background decode graph behind the
/// [`DataReader`] surface.
pub struct ParallelDataReader {
    options: Arc<ReaderOptions>,
    format: Arc<dyn DataFormat>,
    batcher: Arc<Mutex<InstanceBatchReader>>,
    shared: Arc<PipelineShared>,
    num_bytes_read: Arc<AtomicU64>,
    read_queue: VecDeque<Example>,
    schema: Option<Arc<Schema>>,
    peeked: Option<Example>,
    thread: Option<JoinHandle<()>>,
}

impl ParallelDataReader {
    /// Create a reader over `options` decoding with `format`.
    pub fn new(options: ReaderOptions, format: Arc<dyn DataFormat>) -> Result<Self> {
        options.validate()?;

        let options = Arc::new(options);

        let factory = {
            let format = Arc::clone(&format);

            Box::new(move |store: &dyn DataStore| format.make_record_reader(store))
        };

        let chain = make_instance_reader(&options, factory)?;
        let batcher = InstanceBatchReader::new(Arc::clone(&options), chain);

        Ok(ParallelDataReader {
            options,
            format,
            batcher: Arc::new(Mutex::new(batcher)),
            shared: Arc::new(PipelineShared {
                queue: Mutex::new(QueueState {
                    fill: VecDeque::new(),
                    state: RunState::NotStarted,
                    error: None,
                }),
                read_available: Condvar::new(),
                space_available: Condvar::new(),
                cancelled: AtomicBool::new(false),
            }),
            num_bytes_read: Arc::new(AtomicU64::new(0)),
            read_queue: VecDeque::new(),
            schema: None,
            peeked: None,
            thread: None,
        })
    }

    fn lock_batcher(&self) -> MutexGuard<'_, InstanceBatchReader> {
        self.batcher.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn ensure_schema_inferred(&mut self) -> Result<Arc<Schema>> {
        if let Some(schema) = &self.schema {
            return Ok(Arc::clone(schema));
        }

        let instance = self.lock_batcher().reader_mut().peek_instance()?;
        let schema = Arc::new(self.format.infer_schema(instance.as_ref())?);

        debug!(%schema, "inferred the dataset schema");

        self.schema = Some(Arc::clone(&schema));

        Ok(schema)
    }

    fn ensure_pipeline_running(&mut self, schema: Arc<Schema>) -> Result<()> {
        if self.thread.is_some() {
            return Ok(());
        }

        self.shared.lock_queue().state = RunState::Running;

        let context = PipelineContext {
            shared: Arc::clone(&self.shared),
            batcher: Arc::clone(&self.batcher),
            format: Arc::clone(&self.format),
            schema,
            num_bytes_read: Arc::clone(&self.num_bytes_read),
            num_prefetched_examples: self.options.effective_num_prefetched_examples(),
            num_parallel_reads: self.options.effective_num_parallel_reads(),
            bad_example_handling: self.options.bad_example_handling,
        };

        let thread = std::thread::Builder::new()
            .name("mlfeed-pipeline".to_string())
            .spawn(move || context.run_pipeline())
            .map_err(StreamError::from)?;

        self.thread = Some(thread);

        Ok(())
    }

    fn read_example_core(&mut self) -> Result<Option<Example>> {
        let schema = self.ensure_schema_inferred()?;

        // The consumer pops from its private read queue and, once that is
        // empty, swaps it with the fill queue the background thread keeps
        // topped up.
        if self.read_queue.is_empty() {
            self.ensure_pipeline_running(schema)?;

            {
                let mut queue = self.shared.lock_queue();

                while queue.state == RunState::Running && queue.fill.is_empty() {
                    queue = self
                        .shared
                        .read_available
                        .wait(queue)
                        .unwrap_or_else(|e| e.into_inner());
                }

                if let Some(error) = &queue.error {
                    return Err(error.clone());
                }

                std::mem::swap(&mut self.read_queue, &mut queue.fill);
            }

            self.shared.space_available.notify_one();
        }

        Ok(self.read_queue.pop_front())
    }

    fn stop(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };

        self.shared.cancelled.store(true, Ordering::Release);

        // Clear the fill queue so a sequencer blocked on a full queue can
        // make progress, then wake every blocked stage.
        self.shared.lock_queue().fill.clear();
        self.shared.space_available.notify_all();
        self.shared.read_available.notify_all();

        let _ = thread.join();

        self.shared.cancelled.store(false, Ordering::Release);
    }
}

impl DataReader for ParallelDataReader {
    fn read_schema(&mut self) -> Result<Arc<Schema>> {
        self.ensure_schema_inferred()
    }

    fn read_example(&mut self) -> Result<Option<Example>> {
        if let Some(example) = self.peeked.take() {
            return Ok(Some(example));
        }

        self.read_example_core()
    }

    fn peek_example(&mut self) -> Result<Option<Example>> {
        if self.peeked.is_none() {
            self.peeked = self.read_example_core()?;
        }

        Ok(self.peeked.clone())
    }

    fn reset(&mut self) {
        self.stop();

        {
            let mut queue = self.shared.lock_queue();
            queue.state = RunState::NotStarted;
            queue.error = None;
            queue.fill.clear();
        }

        self.read_queue.clear();
        self.peeked = None;

        self.lock_batcher().reset();
        self.num_bytes_read.store(0, Ordering::Relaxed);
    }

    fn num_bytes_read(&self) -> u64 {
        self.num_bytes_read.load(Ordering::Relaxed)
    }
}

impl Drop for ParallelDataReader {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Everything the background thread owns for one pipeline run.
struct PipelineContext {
    shared: Arc<PipelineShared>,
    batcher: Arc<Mutex<InstanceBatchReader>>,
    format: Arc<dyn DataFormat>,
    schema: Arc<Schema>,
    num_bytes_read: Arc<AtomicU64>,
    num_prefetched_examples: usize,
    num_parallel_reads: usize,
    bad_example_handling: BadExampleHandling,
}

impl PipelineContext {
    fn run_pipeline(self) {
        let result = self.run_graph();

        let mut queue = self.shared.lock_queue();
        match result {
            Ok(()) => queue.state = RunState::Stopped,
            Err(error) => {
                queue.state = RunState::Faulted;
                queue.error = Some(error);
            }
        }
        drop(queue);

        self.shared.read_available.notify_all();
    }

    fn run_graph(&self) -> Result<()> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.num_parallel_reads)
            .thread_name(|index| format!("mlfeed-decode-{index}"))
            .build()
            .map_err(|e| {
                DataReaderError::invalid_argument(format!("cannot build the decode pool: {e}"))
            })?;

        let (result_tx, result_rx) = crossbeam_channel::unbounded::<DecodeMessage>();

        // The limiter: one permit per concurrent decode. The sequencer
        // recycles a permit only once the decoded example left the
        // reorder stage, which is what propagates backpressure from the
        // fill queue all the way to the source.
        let (permit_tx, permit_rx) = crossbeam_channel::bounded::<()>(self.num_parallel_reads);
        for _ in 0..self.num_parallel_reads {
            let _ = permit_tx.send(());
        }

        let sequencer = {
            let shared = Arc::clone(&self.shared);
            let num_prefetched_examples = self.num_prefetched_examples;
            let bad_example_handling = self.bad_example_handling;

            std::thread::Builder::new()
                .name("mlfeed-sequencer".to_string())
                .spawn(move || {
                    sequence_examples(
                        result_rx,
                        permit_tx,
                        shared,
                        num_prefetched_examples,
                        bad_example_handling,
                    )
                })
                .map_err(StreamError::from)?
        };

        let mut source_error = None;

        {
            // The source is the only stage touching the instance reader
            // chain; the stages below it need not be thread-safe.
            let mut batcher = self.batcher.lock().unwrap_or_else(|e| e.into_inner());

            loop {
                if self.shared.cancelled.load(Ordering::Acquire) {
                    break;
                }

                // Blocks while the full decode window is in flight.
                if permit_rx.recv().is_err() {
                    break;
                }

                if self.shared.cancelled.load(Ordering::Acquire) {
                    break;
                }

                match batcher.read_batch() {
                    Ok(Some(batch)) => self.spawn_decode(&pool, &result_tx, batch),
                    Ok(None) => break,
                    Err(error) => {
                        source_error = Some(error);

                        break;
                    }
                }
            }
        }

        // Closing our sender leaves the workers' clones as the only ones;
        // the sequencer returns once every in-flight decode has reported.
        drop(result_tx);

        let latched = match sequencer.join() {
            Ok(latched) => latched,
            Err(_) => {
                return Err(DataReaderError::invalid_argument(
                    "the sequencer thread panicked",
                ))
            }
        };

        drop(pool);

        if let Some(error) = source_error {
            return Err(error);
        }

        if let Some(error) = latched {
            return Err(error);
        }

        Ok(())
    }

    fn spawn_decode(
        &self,
        pool: &rayon::ThreadPool,
        result_tx: &Sender<DecodeMessage>,
        batch: InstanceBatch,
    ) {
        let index = batch.index();
        let size_bytes = batch.size_bytes();
        let format = Arc::clone(&self.format);
        let schema = Arc::clone(&self.schema);
        let num_bytes_read = Arc::clone(&self.num_bytes_read);
        let result_tx = result_tx.clone();

        pool.spawn(move || {
            let result = format.decode(&batch, &schema);

            if result.is_ok() {
                num_bytes_read.fetch_add(size_bytes, Ordering::Relaxed);
            }

            // A message is sent even when decoding fails, so the
            // sequencer keeps its ordering contiguous.
            let _ = result_tx.send(DecodeMessage { index, result });
        });
    }
}

fn sequence_examples(
    results: Receiver<DecodeMessage>,
    permits: Sender<()>,
    shared: Arc<PipelineShared>,
    num_prefetched_examples: usize,
    bad_example_handling: BadExampleHandling,
) -> Option<DataReaderError> {
    let mut pending = BinaryHeap::new();
    let mut next_index = 0u64;
    let mut latched: Option<DataReaderError> = None;

    for message in results.iter() {
        pending.push(Sequenced(message));

        while pending
            .peek()
            .is_some_and(|entry: &Sequenced| entry.0.index == next_index)
        {
            let Some(Sequenced(message)) = pending.pop() else {
                break;
            };

            next_index += 1;

            let discarding = latched.is_some() || shared.cancelled.load(Ordering::Acquire);

            match message.result {
                Ok(example) => {
                    if !discarding {
                        enqueue_example(&shared, num_prefetched_examples, example);
                    }
                }
                Err(error) => {
                    if !discarding {
                        match bad_example_handling {
                            BadExampleHandling::Skip => {}
                            BadExampleHandling::SkipWarn => {
                                warn!(batch_index = message.index, %error,
                                    "skipping an example that failed to decode");
                            }
                            BadExampleHandling::Error
                            | BadExampleHandling::Pad
                            | BadExampleHandling::PadWarn => {
                                // Pad policies handle bad instances inside
                                // the decoders; a whole-batch failure has
                                // no partial result to pad.
                                latched = Some(error);
                                shared.cancelled.store(true, Ordering::Release);
                            }
                        }
                    }
                }
            }

            // The slot left the reorder stage; recycle its permit.
            let _ = permits.send(());
        }
    }

    latched
}

/// Push an example into the fill queue, blocking while it is full.
/// Returns false when cancellation interrupted the wait.
fn enqueue_example(shared: &PipelineShared, capacity: usize, example: Example) -> bool {
    let mut queue = shared.lock_queue();

    loop {
        if shared.cancelled.load(Ordering::Acquire) {
            return false;
        }

        if queue.fill.len() < capacity {
            break;
        }

        queue = shared
            .space_available
            .wait(queue)
            .unwrap_or_else(|e| e.into_inner());
    }

    queue.fill.push_back(example);
    drop(queue);

    shared.read_available.notify_one();

    true
}
