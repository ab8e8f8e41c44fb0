//! Observable presentation state and the queue that marshals work onto the UI
//! thread.
//!
//! Front-ends render [`ViewState`] and never mutate it directly; every change
//! arrives either from a command running on the UI thread or through
//! [`UiQueue::post`] from a worker.

use std::collections::VecDeque;
use std::fmt;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::readiness::Readiness;
use crate::runner::STEP_INITIALIZING;

pub type UiTask<T> = Box<dyn FnOnce(&mut T) + Send>;

type Waker = Arc<dyn Fn() + Send + Sync>;

/// Sending half: cloneable, usable from any thread.
pub struct UiQueue<T> {
    tx: Sender<UiTask<T>>,
    waker: Option<Waker>,
}

impl<T> Clone for UiQueue<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            waker: self.waker.clone(),
        }
    }
}

impl<T> fmt::Debug for UiQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UiQueue")
            .field("has_waker", &self.waker.is_some())
            .finish()
    }
}

impl<T> UiQueue<T> {
    /// Enqueues `task` to run on the UI thread at its next drain.
    pub fn post<F>(&self, task: F)
    where
        F: FnOnce(&mut T) + Send + 'static,
    {
        if self.tx.send(Box::new(task)).is_err() {
            debug!("UI thread is gone; dropping posted task");
            return;
        }
        if let Some(waker) = &self.waker {
            waker();
        }
    }
}

/// Receiving half, owned by the UI thread that created it.
pub struct UiReceiver<T> {
    rx: Receiver<UiTask<T>>,
    ui_thread: ThreadId,
}

impl<T> UiReceiver<T> {
    pub fn take_pending(&self) -> Vec<UiTask<T>> {
        self.assert_ui_thread();
        self.rx.try_iter().collect()
    }

    /// Waits up to `timeout` for at least one task, then takes everything queued.
    pub fn wait_pending(&self, timeout: Duration) -> Vec<UiTask<T>> {
        self.assert_ui_thread();
        match self.rx.recv_timeout(timeout) {
            Ok(first) => {
                let mut tasks = vec![first];
                tasks.extend(self.rx.try_iter());
                tasks
            }
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => Vec::new(),
        }
    }

    fn assert_ui_thread(&self) {
        debug_assert_eq!(
            thread::current().id(),
            self.ui_thread,
            "UI tasks must be drained on the thread that owns the UI"
        );
    }
}

/// Creates a queue bound to the calling thread. `waker` runs after each post,
/// e.g. to request a repaint.
pub fn ui_channel<T>(waker: Option<Waker>) -> (UiQueue<T>, UiReceiver<T>) {
    let (tx, rx) = mpsc::channel();
    (
        UiQueue { tx, waker },
        UiReceiver {
            rx,
            ui_thread: thread::current().id(),
        },
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastDuration {
    Short,
    Long,
}

impl ToastDuration {
    pub fn as_duration(self) -> Duration {
        match self {
            ToastDuration::Short => Duration::from_secs(2),
            ToastDuration::Long => Duration::from_millis(3500),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub message: String,
    pub duration: ToastDuration,
}

/// The pulsing torch shown while a conversion runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TorchAnimation {
    started_at: Option<Instant>,
}

impl TorchAnimation {
    const PERIOD: Duration = Duration::from_millis(1200);

    pub fn start(&mut self) {
        if self.started_at.is_none() {
            self.started_at = Some(Instant::now());
            info!("torch animation started");
        }
    }

    pub fn stop(&mut self) {
        if self.started_at.take().is_some() {
            info!("torch animation stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.started_at.is_some()
    }

    /// Brightness in `0.35..=1.0`, dimming and brightening once per period.
    pub fn intensity(&self, now: Instant) -> f32 {
        let Some(started_at) = self.started_at else {
            return 1.0;
        };
        let period = Self::PERIOD.as_secs_f32();
        let phase = (now.saturating_duration_since(started_at).as_secs_f32() % period) / period;
        let wave = 1.0 - (phase * 2.0 - 1.0).abs();
        1.0 - 0.65 * wave
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressSlot {
    pub visible: bool,
    pub text: String,
}

/// Everything a front-end needs to draw.
///
/// `rom_status` doubles as the main status line once a conversion ends.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    pub rom_status: String,
    pub config_status: String,
    pub output_status: String,
    pub progress: ProgressSlot,
    pub convert_enabled: bool,
    pub torch: TorchAnimation,
    toasts: VecDeque<Toast>,
}

pub const CONFIG_NOT_SELECTED: &str = "Config: Not selected";
pub const CONVERTING: &str = "Converting ROM to O2R...";

impl Default for ViewState {
    fn default() -> Self {
        Self {
            rom_status: "ROM: Not selected".to_string(),
            config_status: CONFIG_NOT_SELECTED.to_string(),
            output_status: "Output: App directory".to_string(),
            progress: ProgressSlot {
                visible: false,
                text: String::new(),
            },
            convert_enabled: false,
            torch: TorchAnimation::default(),
            toasts: VecDeque::new(),
        }
    }
}

impl ViewState {
    pub fn toasts(&self) -> impl Iterator<Item = &Toast> {
        self.toasts.iter()
    }

    pub fn take_toasts(&mut self) -> Vec<Toast> {
        self.toasts.drain(..).collect()
    }

    pub(crate) fn toast(&mut self, message: impl Into<String>, duration: ToastDuration) {
        let message = message.into();
        info!(toast = %message);
        self.toasts.push_back(Toast { message, duration });
    }

    pub(crate) fn sync_readiness(&mut self, readiness: &Readiness) {
        self.convert_enabled = readiness.can_convert();
    }

    pub(crate) fn job_started(&mut self) {
        self.convert_enabled = false;
        self.rom_status = CONVERTING.to_string();
        self.progress = ProgressSlot {
            visible: true,
            text: STEP_INITIALIZING.to_string(),
        };
        self.torch.start();
    }

    pub(crate) fn job_progress(&mut self, message: String) {
        info!(progress = %message);
        self.progress.text = message;
    }

    pub(crate) fn job_finished(&mut self, status: String, readiness: &Readiness) {
        self.progress.visible = false;
        self.progress.text.clear();
        self.torch.stop();
        self.rom_status = status;
        self.sync_readiness(readiness);
    }
}
