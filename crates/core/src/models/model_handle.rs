use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::detection::domain::detected_face::DetectedFace;
use crate::detection::domain::embedding::Embedding;
use crate::models::domain::model_loader::{LoadedModels, ModelLoader};
use crate::models::domain::model_status::ModelStatus;
use crate::settings::domain::settings::Quality;
use crate::shared::constants::LOADER_WAIT_SLICE;
use crate::shared::error::FaceSwapError;
use crate::shared::frame::Frame;
use crate::swapping::domain::compositor::composite;
use crate::swapping::domain::face_selection::FaceSelection;

/// A frame with swapped faces composited in.
#[derive(Clone, Debug)]
pub struct SwappedFrame {
    pub frame: Frame,
    /// Number of swapped regions composited into `frame`.
    pub regions: usize,
}

/// Shared handle to the detection, embedding and swap models.
///
/// Loading happens once, on a dedicated thread started by
/// [`ModelHandle::begin_load`]. Until the loader publishes `Ready`, every
/// inference entry point fails with [`FaceSwapError::ModelNotReady`] before
/// doing any work. Clones share the same underlying state.
#[derive(Clone)]
pub struct ModelHandle {
    inner: Arc<Inner>,
}

struct Inner {
    /// Mirrors the slot state so `status()` never takes the lock.
    status: AtomicU8,
    slot: Mutex<Slot>,
    settled: Condvar,
}

struct Slot {
    loader: Option<Box<dyn ModelLoader>>,
    models: Option<Arc<LoadedModels>>,
    failure: Option<String>,
    thread: Option<JoinHandle<()>>,
}

impl ModelHandle {
    pub fn new(loader: impl ModelLoader + 'static) -> Self {
        Self::with_slot(
            ModelStatus::Unloaded,
            Slot {
                loader: Some(Box::new(loader)),
                models: None,
                failure: None,
                thread: None,
            },
        )
    }

    /// Handle that is `Ready` from the start with the given models.
    pub fn preloaded(models: LoadedModels) -> Self {
        Self::with_slot(
            ModelStatus::Ready,
            Slot {
                loader: None,
                models: Some(Arc::new(models)),
                failure: None,
                thread: None,
            },
        )
    }

    fn with_slot(status: ModelStatus, slot: Slot) -> Self {
        Self {
            inner: Arc::new(Inner {
                status: AtomicU8::new(status.as_u8()),
                slot: Mutex::new(slot),
                settled: Condvar::new(),
            }),
        }
    }

    /// Starts loading on a background thread. Only the first call from
    /// `Unloaded` does anything; returns whether this call started the load.
    pub fn begin_load(&self) -> bool {
        let mut slot = self.inner.lock();
        if self.status() != ModelStatus::Unloaded {
            return false;
        }
        let Some(loader) = slot.loader.take() else {
            return false;
        };
        self.inner
            .status
            .store(ModelStatus::Loading.as_u8(), Ordering::Release);
        log::info!("Loading models");

        let inner = self.inner.clone();
        let spawned = thread::Builder::new()
            .name("model-loader".into())
            .spawn(move || {
                let started = Instant::now();
                let result = loader.load().map_err(|e| e.to_string());
                inner.publish(result, started.elapsed());
            });
        match spawned {
            Ok(handle) => slot.thread = Some(handle),
            Err(e) => {
                drop(slot);
                self.inner
                    .publish(Err(format!("could not start loader thread: {e}")), Duration::ZERO);
            }
        }
        true
    }

    /// Current lifecycle state. Never blocks.
    pub fn status(&self) -> ModelStatus {
        ModelStatus::from_u8(self.inner.status.load(Ordering::Acquire))
    }

    /// `ModelLoadFailed` with the loader's message once the load has failed.
    pub fn load_error(&self) -> Option<FaceSwapError> {
        if self.status() != ModelStatus::Failed {
            return None;
        }
        self.inner
            .lock()
            .failure
            .clone()
            .map(FaceSwapError::ModelLoadFailed)
    }

    /// Waits until the load settles, `timeout` elapses, or `cancelled` is
    /// set, and returns the status at that point.
    pub fn wait_until_settled(&self, timeout: Duration, cancelled: &AtomicBool) -> ModelStatus {
        let deadline = Instant::now() + timeout;
        let mut guard = self.inner.lock();
        loop {
            let status = self.status();
            if status.is_settled() || cancelled.load(Ordering::Relaxed) {
                return status;
            }
            let now = Instant::now();
            if now >= deadline {
                return status;
            }
            let slice = LOADER_WAIT_SLICE.min(deadline - now);
            guard = self
                .inner
                .settled
                .wait_timeout(guard, slice)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// The loaded models, or `ModelNotReady`.
    pub fn models(&self) -> Result<Arc<LoadedModels>, FaceSwapError> {
        if self.status() != ModelStatus::Ready {
            return Err(FaceSwapError::ModelNotReady);
        }
        self.inner
            .lock()
            .models
            .clone()
            .ok_or(FaceSwapError::ModelNotReady)
    }

    pub fn detect(&self, frame: &Frame) -> Result<Vec<DetectedFace>, FaceSwapError> {
        let models = self.models()?;
        models
            .detector
            .detect(frame)
            .map_err(|e| FaceSwapError::DetectionFailed(e.to_string()))
    }

    /// Swaps the faces chosen by `selection` to the `source` identity and
    /// composites them over a copy of `frame`.
    pub fn infer(
        &self,
        frame: &Frame,
        faces: &[DetectedFace],
        source: &Embedding,
        quality: Quality,
        selection: FaceSelection,
    ) -> Result<SwappedFrame, FaceSwapError> {
        let models = self.models()?;
        let regions = selection
            .select(faces)
            .into_iter()
            .map(|face| models.swapper.swap(frame, face, source, quality))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| FaceSwapError::SwapFailed(e.to_string()))?;
        Ok(SwappedFrame {
            frame: composite(frame, &regions),
            regions: regions.len(),
        })
    }

    /// Joins the loader thread if it has finished. A load still in
    /// progress is left to run out in the background.
    pub fn join_loader(&self) {
        let handle = {
            let mut slot = self.inner.lock();
            match slot.thread.as_ref() {
                Some(h) if h.is_finished() => slot.thread.take(),
                Some(_) => {
                    log::debug!("Model loader still running, detaching");
                    None
                }
                None => None,
            }
        };
        if let Some(handle) = handle {
            if handle.join().is_err() {
                log::error!("Model loader thread panicked");
            }
        }
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, result: Result<LoadedModels, String>, elapsed: Duration) {
        let mut slot = self.lock();
        match result {
            Ok(models) => {
                slot.models = Some(Arc::new(models));
                self.status
                    .store(ModelStatus::Ready.as_u8(), Ordering::Release);
                log::info!("Models ready in {:.1}s", elapsed.as_secs_f64());
            }
            Err(message) => {
                log::error!("Model load failed: {message}");
                slot.failure = Some(message);
                self.status
                    .store(ModelStatus::Failed.as_u8(), Ordering::Release);
            }
        }
        drop(slot);
        self.settled.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::detected_face::BoundingBox;
    use crate::shared::frame::PixelFormat;
    use crate::test_support::{stub_models, StubSwapper};
    use rstest::rstest;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Barrier;

    const LONG: Duration = Duration::from_secs(5);

    struct CountingLoader {
        loads: Arc<AtomicUsize>,
        gate: Option<crossbeam_channel::Receiver<()>>,
        fail: bool,
    }

    impl ModelLoader for CountingLoader {
        fn load(&self) -> Result<LoadedModels, Box<dyn std::error::Error>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                let _ = gate.recv();
            }
            if self.fail {
                return Err("weights missing".into());
            }
            Ok(stub_models(vec![]))
        }
    }

    fn counting(fail: bool) -> (CountingLoader, Arc<AtomicUsize>) {
        let loads = Arc::new(AtomicUsize::new(0));
        (
            CountingLoader {
                loads: loads.clone(),
                gate: None,
                fail,
            },
            loads,
        )
    }

    fn frame() -> Frame {
        Frame::new(vec![0u8; 8 * 8 * 3], 8, 8, PixelFormat::Rgb24, 1)
    }

    fn face() -> DetectedFace {
        DetectedFace {
            bbox: BoundingBox::new(1.0, 1.0, 5.0, 5.0),
            landmarks: None,
            confidence: 0.9,
        }
    }

    #[test]
    fn test_starts_unloaded_and_loads_to_ready() {
        let (loader, loads) = counting(false);
        let handle = ModelHandle::new(loader);
        assert_eq!(handle.status(), ModelStatus::Unloaded);

        assert!(handle.begin_load());
        let status = handle.wait_until_settled(LONG, &AtomicBool::new(false));

        assert_eq!(status, ModelStatus::Ready);
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert!(handle.models().is_ok());
        assert!(handle.load_error().is_none());
        handle.join_loader();
    }

    #[test]
    fn test_begin_load_is_idempotent() {
        let (loader, loads) = counting(false);
        let handle = ModelHandle::new(loader);
        assert!(handle.begin_load());
        assert!(!handle.begin_load());
        handle.wait_until_settled(LONG, &AtomicBool::new(false));
        assert!(!handle.begin_load());
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert_eq!(handle.status(), ModelStatus::Ready);
    }

    fn race_begin_load(handle: &ModelHandle) -> Vec<(bool, ModelStatus)> {
        let barrier = Arc::new(Barrier::new(2));
        let callers: Vec<_> = (0..2)
            .map(|_| {
                let handle = handle.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    let started = handle.begin_load();
                    let status = handle.wait_until_settled(LONG, &AtomicBool::new(false));
                    (started, status)
                })
            })
            .collect();
        callers.into_iter().map(|t| t.join().unwrap()).collect()
    }

    #[rstest]
    #[case(false, ModelStatus::Ready)]
    #[case(true, ModelStatus::Failed)]
    fn test_concurrent_begin_load_runs_exactly_one_load(
        #[case] fail: bool,
        #[case] expected: ModelStatus,
    ) {
        let (loader, loads) = counting(fail);
        let handle = ModelHandle::new(loader);

        let results = race_begin_load(&handle);

        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert_eq!(results.iter().filter(|(started, _)| *started).count(), 1);
        assert!(results.iter().all(|(_, s)| *s == expected));
        assert_eq!(handle.status(), expected);
    }

    #[test]
    fn test_failed_load_is_terminal() {
        let (loader, loads) = counting(true);
        let handle = ModelHandle::new(loader);
        handle.begin_load();

        let status = handle.wait_until_settled(LONG, &AtomicBool::new(false));

        assert_eq!(status, ModelStatus::Failed);
        assert_eq!(
            handle.load_error(),
            Some(FaceSwapError::ModelLoadFailed("weights missing".into()))
        );
        assert!(!handle.begin_load());
        assert_eq!(handle.status(), ModelStatus::Failed);
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert_eq!(handle.models().err(), Some(FaceSwapError::ModelNotReady));
    }

    #[test]
    fn test_not_ready_inference_fails_without_running() {
        let (tx, rx) = crossbeam_channel::bounded(0);
        let loads = Arc::new(AtomicUsize::new(0));
        let handle = ModelHandle::new(CountingLoader {
            loads: loads.clone(),
            gate: Some(rx),
            fail: false,
        });
        let source = Embedding::new(vec![1.0; 4]);

        assert_eq!(
            handle.infer(&frame(), &[face()], &source, Quality::default(), FaceSelection::All).err(),
            Some(FaceSwapError::ModelNotReady)
        );

        handle.begin_load();
        assert_eq!(handle.status(), ModelStatus::Loading);
        assert_eq!(handle.detect(&frame()).err(), Some(FaceSwapError::ModelNotReady));
        assert_eq!(
            handle.infer(&frame(), &[face()], &source, Quality::default(), FaceSelection::All).err(),
            Some(FaceSwapError::ModelNotReady)
        );

        tx.send(()).unwrap();
        assert_eq!(
            handle.wait_until_settled(LONG, &AtomicBool::new(false)),
            ModelStatus::Ready
        );
    }

    #[test]
    fn test_wait_returns_on_cancel() {
        let (_tx, rx) = crossbeam_channel::bounded::<()>(0);
        let handle = ModelHandle::new(CountingLoader {
            loads: Arc::new(AtomicUsize::new(0)),
            gate: Some(rx),
            fail: false,
        });
        handle.begin_load();
        let status = handle.wait_until_settled(LONG, &AtomicBool::new(true));
        assert_eq!(status, ModelStatus::Loading);
    }

    #[test]
    fn test_infer_composites_one_region_per_selected_face() {
        let swapper = StubSwapper::new([255, 0, 0]);
        let calls = swapper.calls.clone();
        let mut models = stub_models(vec![]);
        models.swapper = Box::new(swapper);
        let handle = ModelHandle::preloaded(models);
        let source = Embedding::new(vec![1.0; 4]);
        let faces = vec![face(), face()];

        let best = handle
            .infer(&frame(), &faces, &source, Quality::default(), FaceSelection::HighestConfidence)
            .unwrap();
        let all = handle
            .infer(&frame(), &faces, &source, Quality::default(), FaceSelection::All)
            .unwrap();

        assert_eq!(best.regions, 1);
        assert_eq!(all.regions, 2);
        assert_eq!(calls.lock().unwrap().len(), 3);
        assert_eq!(best.frame.rgb_at(2, 2), [255, 0, 0]);
        assert_eq!(best.frame.sequence(), 1);
    }

    #[test]
    fn test_swap_error_maps_to_swap_failed() {
        let mut models = stub_models(vec![]);
        models.swapper = Box::new(StubSwapper::failing());
        let handle = ModelHandle::preloaded(models);

        let result = handle.infer(
            &frame(),
            &[face()],
            &Embedding::new(vec![1.0; 4]),
            Quality::default(),
            FaceSelection::HighestConfidence,
        );

        assert!(matches!(result, Err(FaceSwapError::SwapFailed(_))));
    }
}
