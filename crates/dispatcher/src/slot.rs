//! Keep-latest mailbox between the dispatcher and one sink worker
//!
//! A display frame is a full snapshot, so a sink that falls behind only ever needs the newest
//! one. Offering a frame overwrites whatever the worker has not picked up yet.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

use contracts::DisplayFrame;

#[derive(Debug, Default)]
struct Slot {
    frame: Option<DisplayFrame>,
    closed: bool,
}

/// Single-frame mailbox
#[derive(Debug, Default)]
pub(crate) struct LatestFrame {
    slot: Mutex<Slot>,
    notify: Notify,
}

impl LatestFrame {
    fn lock(&self) -> MutexGuard<'_, Slot> {
        // 槽位里只有一个 Option，中毒后状态仍然一致
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store `frame`, returning the unrendered frame it replaced.
    ///
    /// Frames offered after [`LatestFrame::close`] are handed back untouched.
    pub(crate) fn offer(&self, frame: DisplayFrame) -> Result<Option<DisplayFrame>, DisplayFrame> {
        let replaced = {
            let mut slot = self.lock();
            if slot.closed {
                return Err(frame);
            }
            slot.frame.replace(frame)
        };
        self.notify.notify_one();
        Ok(replaced)
    }

    /// No more frames; the worker still gets the pending one
    pub(crate) fn close(&self) {
        self.lock().closed = true;
        self.notify.notify_one();
    }

    /// Wait for the next frame. `None` once closed and empty.
    pub(crate) async fn take(&self) -> Option<DisplayFrame> {
        loop {
            {
                let mut slot = self.lock();
                if let Some(frame) = slot.frame.take() {
                    return Some(frame);
                }
                if slot.closed {
                    return None;
                }
            }
            self.notify.notified().await;
        }
    }

    pub(crate) fn is_pending(&self) -> bool {
        self.lock().frame.is_some()
    }
}
