//! Background decoding for one window.
//!
//! A single worker thread takes decode requests over a crossbeam channel,
//! decodes through the shared [`ImageCache`] and hands results back to the
//! UI thread, which applies them guarded by each panel's load generation.
//! Requests that pile up for the same panel are coalesced so only the newest
//! one is decoded.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use tracing::{debug, trace};

use crate::error::{Result, ViewerError};
use crate::image_cache::ImageCache;
use crate::image_loader::{DecodedImage, SiblingFiles};
use crate::panel::PanelId;

/// Called from the worker after each finished decode, typically to wake the UI.
pub type Notify = Arc<dyn Fn() + Send + Sync>;

/// Upper bound on requests coalesced in one pass.
const MAX_BATCH: usize = 32;

#[derive(Debug, Clone)]
pub struct DecodeRequest {
    pub panel: PanelId,
    pub generation: u64,
    pub path: PathBuf,
}

#[derive(Debug)]
pub struct DecodeResult {
    pub panel: PanelId,
    pub generation: u64,
    pub path: PathBuf,
    pub outcome: Result<Arc<DecodedImage>>,
    pub siblings: SiblingFiles,
}

pub struct DecodeQueue {
    /// `None` once cancelled; dropping the sender also ends the worker loop
    request_tx: Option<Sender<DecodeRequest>>,
    result_rx: Receiver<DecodeResult>,
    shutdown: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl DecodeQueue {
    pub fn spawn(cache: Arc<ImageCache>, notify: Notify) -> Result<Self> {
        let (request_tx, request_rx) = crossbeam_channel::unbounded::<DecodeRequest>();
        let (result_tx, result_rx) = crossbeam_channel::unbounded::<DecodeResult>();
        let shutdown = Arc::new(AtomicBool::new(false));

        let shutdown_clone = Arc::clone(&shutdown);
        let worker = std::thread::Builder::new()
            .name("panel-decoder".into())
            .spawn(move || worker_loop(cache, request_rx, result_tx, shutdown_clone, notify))
            .map_err(|e| ViewerError::WindowConstruction(format!("decode worker: {e}")))?;

        Ok(Self {
            request_tx: Some(request_tx),
            result_rx,
            shutdown,
            worker: Some(worker),
        })
    }

    /// Queue a decode. Returns `false` once the queue has been cancelled.
    pub fn submit(&self, request: DecodeRequest) -> bool {
        match &self.request_tx {
            Some(tx) => tx.send(request).is_ok(),
            None => false,
        }
    }

    /// Results finished since the last call, in completion order.
    pub fn drain(&self) -> Vec<DecodeResult> {
        self.result_rx.try_iter().collect()
    }

    pub fn is_cancelled(&self) -> bool {
        self.request_tx.is_none()
    }

    /// Stop the worker. Pending requests are dropped; the decode in flight, if
    /// any, finishes but its result is discarded.
    pub fn cancel(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        self.request_tx = None;
        while self.result_rx.try_recv().is_ok() {}
        // Detach instead of joining so a slow decode never blocks the UI thread.
        self.worker.take();
    }
}

impl Drop for DecodeQueue {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn worker_loop(
    cache: Arc<ImageCache>,
    request_rx: Receiver<DecodeRequest>,
    result_tx: Sender<DecodeResult>,
    shutdown: Arc<AtomicBool>,
    notify: Notify,
) {
    let mut batch: Vec<DecodeRequest> = Vec::with_capacity(MAX_BATCH);

    loop {
        if shutdown.load(Ordering::Acquire) {
            break;
        }

        batch.clear();
        match request_rx.recv_timeout(Duration::from_millis(100)) {
            Ok(req) => batch.push(req),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
        while batch.len() < MAX_BATCH {
            match request_rx.try_recv() {
                Ok(req) => batch.push(req),
                Err(_) => break,
            }
        }

        for req in coalesce(&mut batch) {
            if shutdown.load(Ordering::Acquire) {
                debug!("decode worker cancelled");
                return;
            }

            trace!(panel = ?req.panel, generation = req.generation, path = %req.path.display(), "decoding");
            let outcome = cache.image(&req.path);
            let siblings = SiblingFiles::scan(&req.path);

            let result = DecodeResult {
                panel: req.panel,
                generation: req.generation,
                path: req.path,
                outcome,
                siblings,
            };
            if result_tx.send(result).is_err() {
                return;
            }
            notify();
        }
    }
}

/// Keep only the newest request per panel, preserving arrival order.
fn coalesce(batch: &mut Vec<DecodeRequest>) -> Vec<DecodeRequest> {
    let mut newest: HashMap<PanelId, usize> = HashMap::new();
    for (i, req) in batch.iter().enumerate() {
        newest.insert(req.panel, i);
    }
    batch
        .drain(..)
        .enumerate()
        .filter(|(i, req)| newest.get(&req.panel) == Some(i))
        .map(|(_, req)| req)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_cache::tests::CountingCodec;
    use image::imageops::FilterType;
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    fn cache() -> Arc<ImageCache> {
        let calls = Arc::new(AtomicUsize::new(0));
        Arc::new(ImageCache::new(Box::new(CountingCodec { calls }), 1 << 24, FilterType::Nearest))
    }

    fn wait_for(queue: &DecodeQueue, count: usize) -> Vec<DecodeResult> {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut out = Vec::new();
        while out.len() < count && Instant::now() < deadline {
            out.extend(queue.drain());
            std::thread::sleep(Duration::from_millis(5));
        }
        out
    }

    #[test]
    fn test_decodes_and_notifies() {
        let notified = Arc::new(AtomicUsize::new(0));
        let counter = notified.clone();
        let queue = DecodeQueue::spawn(
            cache(),
            Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .unwrap();

        assert!(queue.submit(DecodeRequest { panel: PanelId(1), generation: 7, path: "/x/16x8.png".into() }));
        let results = wait_for(&queue, 1);

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].panel, PanelId(1));
        assert_eq!(results[0].generation, 7);
        assert_eq!(results[0].outcome.as_ref().unwrap().dimensions(), (16, 8));
        assert!(notified.load(Ordering::SeqCst) >= 1);
    }

    #[test]
    fn test_failed_decode_is_reported() {
        let queue = DecodeQueue::spawn(cache(), Arc::new(|| {})).unwrap();
        queue.submit(DecodeRequest { panel: PanelId(2), generation: 1, path: "/x/garbage.png".into() });
        let results = wait_for(&queue, 1);
        assert!(results[0].outcome.is_err());
    }

    #[test]
    fn test_cancel_rejects_new_requests() {
        let mut queue = DecodeQueue::spawn(cache(), Arc::new(|| {})).unwrap();
        queue.cancel();
        assert!(queue.is_cancelled());
        assert!(!queue.submit(DecodeRequest { panel: PanelId(1), generation: 1, path: "/x/1x1.png".into() }));
        assert!(queue.drain().is_empty());
    }

    #[test]
    fn test_coalesce_keeps_newest_per_panel() {
        let req = |panel, generation| DecodeRequest { panel: PanelId(panel), generation, path: PathBuf::new() };
        let mut batch = vec![req(1, 1), req(2, 1), req(1, 2), req(1, 3)];
        let kept: Vec<_> = coalesce(&mut batch).iter().map(|r| (r.panel.0, r.generation)).collect();
        assert_eq!(kept, [(2, 1), (1, 3)]);
    }
}
