use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender, TrySendError};

use crate::shared::frame::Frame;
use crate::shared::stream_info::StreamInfo;
use crate::video::domain::frame_source::{FrameSource, SourceError};

/// Reads the wrapped source on a background thread and hands out only the
/// newest frame.
///
/// Keeps live sources real-time when detection is slower than capture:
/// a frame the consumer hasn't picked up yet is replaced by the next one.
/// Frame indices keep their source numbering, so gaps show what was dropped.
pub struct LatestFrameSource {
    inner: Option<Box<dyn FrameSource>>,
    reader: Option<ReaderThread>,
    dropped: Arc<AtomicUsize>,
}

struct ReaderThread {
    rx: Receiver<Frame>,
    stop: Arc<AtomicBool>,
    handle: JoinHandle<Box<dyn FrameSource>>,
}

impl LatestFrameSource {
    pub fn new(inner: Box<dyn FrameSource>) -> Self {
        Self {
            inner: Some(inner),
            reader: None,
            dropped: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Frames replaced before the consumer took them, since creation.
    pub fn dropped_frames(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl FrameSource for LatestFrameSource {
    fn open(&mut self) -> Result<StreamInfo, SourceError> {
        self.close();
        let Some(mut inner) = self.inner.take() else {
            return Err(SourceError::unavailable("latest-frame", "reader thread lost its source"));
        };
        let info = match inner.open() {
            Ok(info) => info,
            Err(e) => {
                self.inner = Some(inner);
                return Err(e);
            }
        };

        let (tx, rx) = crossbeam_channel::bounded::<Frame>(1);
        let stop = Arc::new(AtomicBool::new(false));
        let handle = spawn_reader(inner, tx, rx.clone(), stop.clone(), self.dropped.clone());
        self.reader = Some(ReaderThread { rx, stop, handle });
        Ok(info)
    }

    fn next_frame(&mut self) -> Option<Frame> {
        self.reader.as_ref()?.rx.recv().ok()
    }

    fn close(&mut self) {
        let Some(reader) = self.reader.take() else {
            if let Some(inner) = self.inner.as_mut() {
                inner.close();
            }
            return;
        };
        reader.stop.store(true, Ordering::Relaxed);
        drop(reader.rx);
        match reader.handle.join() {
            Ok(source) => self.inner = Some(source),
            Err(_) => log::error!("Frame reader thread panicked"),
        }
        let dropped = self.dropped_frames();
        if dropped > 0 {
            log::info!("Skipped {dropped} stale frames to keep up with the source");
        }
    }
}

impl Drop for LatestFrameSource {
    fn drop(&mut self) {
        self.close();
    }
}

fn spawn_reader(
    mut source: Box<dyn FrameSource>,
    tx: Sender<Frame>,
    stale: Receiver<Frame>,
    stop: Arc<AtomicBool>,
    dropped: Arc<AtomicUsize>,
) -> JoinHandle<Box<dyn FrameSource>> {
    std::thread::spawn(move || {
        while !stop.load(Ordering::Relaxed) {
            let Some(frame) = source.next_frame() else {
                break;
            };
            match tx.try_send(frame) {
                Ok(()) => {}
                Err(TrySendError::Full(frame)) => {
                    if let Ok(old) = stale.try_recv() {
                        dropped.fetch_add(1, Ordering::Relaxed);
                        log::debug!("Dropped stale frame {}", old.index());
                    }
                    if tx.try_send(frame).is_err() {
                        dropped.fetch_add(1, Ordering::Relaxed);
                    }
                }
                Err(TrySendError::Disconnected(_)) => break,
            }
        }
        source.close();
        source
    })
}
