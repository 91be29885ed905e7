//! Frame render dispatch.
//!
//! Each dispatch hands an immutable snapshot to the serialization backend on
//! a device-owned rayon pool and returns immediately. Completion of every
//! job is signalled through its own single-slot channel, so waiting on one
//! frame never consumes another frame's result.

use std::collections::HashMap;
use std::sync::Arc;

use crossbeam_channel::{Receiver, TryRecvError};

use crate::backend::SerializationBackend;
use crate::handle::ObjectHandle;
use crate::snapshot::SceneSnapshot;

/// How [`crate::Device::frame_ready`] waits for in-flight renders.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaitMode {
    /// Block until every dispatched render of the frame finished.
    Wait,
    /// Report completion without blocking.
    NoWait,
}

type RenderOutcome = Result<(), String>;

struct PendingRender {
    receiver: Receiver<RenderOutcome>,
}

impl PendingRender {
    /// `Some` once the job finished.
    fn poll(&self, mode: WaitMode) -> Option<RenderOutcome> {
        match mode {
            WaitMode::Wait => Some(
                self.receiver
                    .recv()
                    .unwrap_or_else(|_| Err("render job terminated without a result".to_string())),
            ),
            WaitMode::NoWait => match self.receiver.try_recv() {
                Ok(outcome) => Some(outcome),
                Err(TryRecvError::Empty) => None,
                Err(TryRecvError::Disconnected) => Some(Err("render job terminated without a result".to_string())),
            },
        }
    }
}

#[derive(Default)]
struct FrameRenders {
    pending: Vec<PendingRender>,
}

/// Why a frame is not ready.
#[derive(Debug, PartialEq)]
pub(crate) enum ReadyError {
    NeverDispatched,
    Failed(String),
}

/// Owns the render pool and the in-flight renders of every frame.
pub(crate) struct FrameRenderer {
    pool: rayon::ThreadPool,
    frames: HashMap<ObjectHandle, FrameRenders>,
}

impl FrameRenderer {
    /// Build the pool; `threads == 0` uses one thread per core.
    pub fn new(threads: usize) -> Result<Self, rayon::ThreadPoolBuildError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|index| format!("strata-render-{}", index))
            .build()?;
        log::debug!("Render pool started with {} threads", pool.current_num_threads());
        Ok(Self {
            pool,
            frames: HashMap::new(),
        })
    }

    pub fn thread_count(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Queue `snapshot` for `backend` and return immediately.
    pub fn dispatch(&mut self, frame: ObjectHandle, snapshot: SceneSnapshot, backend: Arc<dyn SerializationBackend>) {
        let (sender, receiver) = crossbeam_channel::bounded(1);
        self.pool.spawn(move || {
            let outcome = backend.write_snapshot(&snapshot).map_err(|e| e.to_string());
            // The receiver is gone if the frame was destroyed meanwhile
            let _ = sender.send(outcome);
        });
        self.frames
            .entry(frame)
            .or_default()
            .pending
            .push(PendingRender { receiver });
    }

    /// Collect finished renders of `frame`. Returns whether none are left.
    ///
    /// A failed render is reported once; the remaining renders of the
    /// frame are still collected first.
    pub fn ready(&mut self, frame: ObjectHandle, mode: WaitMode) -> Result<bool, ReadyError> {
        let renders = self.frames.get_mut(&frame).ok_or(ReadyError::NeverDispatched)?;

        let mut failure = None;
        renders.pending.retain(|render| match render.poll(mode) {
            Some(Ok(())) => false,
            Some(Err(message)) => {
                failure.get_or_insert(message);
                false
            }
            None => true,
        });

        match failure {
            Some(message) => Err(ReadyError::Failed(message)),
            None => Ok(renders.pending.is_empty()),
        }
    }

    /// Forget `frame`. Its in-flight jobs still run to completion.
    pub fn forget(&mut self, frame: ObjectHandle) {
        self.frames.remove(&frame);
    }

    /// Block until every in-flight render finished.
    pub fn wait_all(&mut self) {
        for renders in self.frames.values_mut() {
            for render in renders.pending.drain(..) {
                if let Some(Err(message)) = render.poll(WaitMode::Wait) {
                    log::warn!("Render failed during shutdown: {}", message);
                }
            }
        }
    }
}
