//! Global volume key listener using a Windows low-level keyboard hook
//!
//! The hook is installed on a dedicated thread that pumps its own message
//! queue. Volume key transitions are forwarded to the state machine over a
//! bounded channel; every other key passes through untouched.

use std::cell::Cell;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::keys::{KeyEvent, VolumeKey};
use crate::lifecycle::QuitHandle;

/// Attempts made to deliver the quit message to the hook thread
#[cfg_attr(not(windows), allow(dead_code))]
const QUIT_POST_ATTEMPTS: u32 = 3;
#[cfg_attr(not(windows), allow(dead_code))]
const QUIT_POST_DELAY: Duration = Duration::from_millis(20);

/// A source of volume key events that can be shut off
pub trait KeySource {
    /// Stop delivering events and release OS resources
    fn uninstall(&mut self) -> Result<(), HotkeyError>;
}

/// Global keyboard hook that reports volume key press/release events
pub struct KeyboardHook {
    event_tx: mpsc::Sender<KeyEvent>,
    passthrough: bool,
    running: Arc<AtomicBool>,
    quit: QuitHandle,
    worker: Option<platform::Worker>,
}

impl KeyboardHook {
    /// Create a new keyboard hook
    ///
    /// With `passthrough` set, volume keys also reach the OS after being
    /// forwarded; otherwise they are consumed. If the hook thread dies on
    /// its own, `quit` is raised so the main loop does not wait forever.
    pub fn new(event_tx: mpsc::Sender<KeyEvent>, passthrough: bool, quit: QuitHandle) -> Self {
        Self {
            event_tx,
            passthrough,
            running: Arc::new(AtomicBool::new(false)),
            quit,
            worker: None,
        }
    }

    /// Install the hook
    ///
    /// Spawns the hook thread and waits until it reports whether the hook
    /// was installed, so a failure here means no keys will be intercepted.
    pub fn start(&mut self) -> Result<(), HotkeyError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(HotkeyError::AlreadyRunning);
        }

        let sink = HookSink::new(self.event_tx.clone(), self.passthrough);

        match platform::spawn(sink, Arc::clone(&self.running), self.quit.clone()) {
            Ok(worker) => {
                self.worker = Some(worker);
                info!(passthrough = self.passthrough, "keyboard hook started");
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    /// Uninstall the hook and wait for its thread to exit
    ///
    /// Calling this on a hook that was never started does nothing.
    pub fn stop(&mut self) -> Result<(), HotkeyError> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };

        // Cleared first so the thread knows its exit was asked for
        self.running.store(false, Ordering::SeqCst);
        let result = worker.stop();
        if result.is_ok() {
            info!("keyboard hook stopped");
        }
        result
    }

    /// Check if the hook is currently installed
    #[cfg(test)]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl KeySource for KeyboardHook {
    fn uninstall(&mut self) -> Result<(), HotkeyError> {
        self.stop()
    }
}

impl Drop for KeyboardHook {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!(?e, "failed to uninstall keyboard hook");
        }
    }
}

/// Errors that can occur in the keyboard hook
#[derive(Debug, thiserror::Error)]
pub enum HotkeyError {
    #[error("keyboard hook is already running")]
    AlreadyRunning,

    #[error("failed to install keyboard hook: {0}")]
    Install(String),

    #[error("failed to spawn hook thread: {0}")]
    ThreadSpawn(String),

    #[error("failed to uninstall keyboard hook: {0}")]
    Uninstall(String),

    #[error("low-level keyboard hooks are only available on Windows")]
    Unsupported,
}

/// Receiving end of the hook callback
struct HookSink {
    event_tx: mpsc::Sender<KeyEvent>,
    passthrough: bool,
    lost_increase: Cell<bool>,
    lost_decrease: Cell<bool>,
}

impl HookSink {
    fn new(event_tx: mpsc::Sender<KeyEvent>, passthrough: bool) -> Self {
        Self {
            event_tx,
            passthrough,
            lost_increase: Cell::new(false),
            lost_decrease: Cell::new(false),
        }
    }

    /// Set while an event for `key` has been dropped and not yet followed
    /// by one that got through
    fn lost(&self, key: VolumeKey) -> &Cell<bool> {
        match key {
            VolumeKey::Increase => &self.lost_increase,
            VolumeKey::Decrease => &self.lost_decrease,
        }
    }

    /// Queue an event; returns true when the key should be consumed
    ///
    /// The callback must not block, so a full queue drops the event and
    /// lets the OS handle that key instead. The next event for that key
    /// that gets through is marked for resync.
    #[cfg_attr(not(windows), allow(dead_code))]
    fn forward(&self, event: KeyEvent) -> bool {
        let lost = self.lost(event.key);
        let event = if lost.get() { event.resynced() } else { event };

        match self.event_tx.try_send(event) {
            Ok(()) => {
                lost.set(false);
                debug!(
                    key = %event.key,
                    transition = ?event.transition,
                    resync = event.resync,
                    "volume key forwarded"
                );
                !self.passthrough
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                lost.set(true);
                warn!(
                    key = %event.key,
                    transition = ?event.transition,
                    "key queue full, event dropped and key passed to the system"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }
}

/// Run `op` up to `attempts` times, sleeping `delay` between failures
#[cfg_attr(not(windows), allow(dead_code))]
fn retry<T, E, F>(attempts: u32, delay: Duration, mut op: F) -> Result<T, E>
where
    E: fmt::Display,
    F: FnMut() -> Result<T, E>,
{
    let mut attempt = 1;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(e) if attempt < attempts => {
                warn!(attempt, error = %e, "retrying");
                thread::sleep(delay);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(windows)]
mod platform {
    use std::cell::RefCell;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread::{self, JoinHandle};

    use tracing::{error, info, warn};
    use windows::Win32::Foundation::{HINSTANCE, HWND, LPARAM, LRESULT, WPARAM};
    use windows::Win32::System::LibraryLoader::GetModuleHandleW;
    use windows::Win32::System::Threading::GetCurrentThreadId;
    use windows::Win32::UI::WindowsAndMessaging::{
        CallNextHookEx, GetMessageW, PeekMessageW, PostThreadMessageW, SetWindowsHookExW,
        UnhookWindowsHookEx, HHOOK, KBDLLHOOKSTRUCT, MSG, PM_NOREMOVE, WH_KEYBOARD_LL, WM_QUIT,
        WM_USER,
    };

    use super::{retry, HookSink, HotkeyError, QUIT_POST_ATTEMPTS, QUIT_POST_DELAY};
    use crate::hotkey::keys::KeyEvent;
    use crate::lifecycle::QuitHandle;

    thread_local! {
        static SINK: RefCell<Option<HookSink>> = const { RefCell::new(None) };
    }

    pub struct Worker {
        thread_id: u32,
        handle: JoinHandle<Result<(), HotkeyError>>,
    }

    impl Worker {
        pub fn stop(self) -> Result<(), HotkeyError> {
            let posted = retry(QUIT_POST_ATTEMPTS, QUIT_POST_DELAY, || unsafe {
                PostThreadMessageW(self.thread_id, WM_QUIT, WPARAM(0), LPARAM(0))
            });
            if let Err(e) = posted {
                // Dropping the JoinHandle detaches the thread
                return Err(HotkeyError::Uninstall(format!(
                    "could not signal hook thread ({e}); hook stays installed until the process exits"
                )));
            }

            self.handle
                .join()
                .map_err(|_| HotkeyError::Uninstall("hook thread panicked".to_string()))?
        }
    }

    pub fn spawn(
        sink: HookSink,
        running: Arc<AtomicBool>,
        quit: QuitHandle,
    ) -> Result<Worker, HotkeyError> {
        let (ready_tx, ready_rx) = std::sync::mpsc::channel::<Result<u32, String>>();

        let handle = thread::Builder::new()
            .name("keyboard-hook".to_string())
            .spawn(move || {
                let result = run_hook_thread(sink, ready_tx);
                let installed = !matches!(result, Err(HotkeyError::Install(_)));
                if installed {
                    if let Err(ref e) = result {
                        error!(?e, "keyboard hook thread error");
                    }
                }
                if running.swap(false, Ordering::SeqCst) && installed {
                    warn!("keyboard hook exited unexpectedly");
                    quit.request();
                }
                result
            })
            .map_err(|e| HotkeyError::ThreadSpawn(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(thread_id)) => Ok(Worker { thread_id, handle }),
            Ok(Err(reason)) => {
                let _ = handle.join();
                Err(HotkeyError::Install(reason))
            }
            Err(_) => Err(HotkeyError::Install(
                "hook thread exited before reporting".to_string(),
            )),
        }
    }

    fn run_hook_thread(
        sink: HookSink,
        ready_tx: std::sync::mpsc::Sender<Result<u32, String>>,
    ) -> Result<(), HotkeyError> {
        SINK.with(|slot| *slot.borrow_mut() = Some(sink));

        let installed = unsafe {
            GetModuleHandleW(None).and_then(|module| {
                SetWindowsHookExW(WH_KEYBOARD_LL, Some(keyboard_proc), HINSTANCE(module.0), 0)
            })
        };
        let hook = match installed {
            Ok(hook) => hook,
            Err(e) => {
                SINK.with(|slot| slot.borrow_mut().take());
                let reason = e.to_string();
                let _ = ready_tx.send(Err(reason.clone()));
                return Err(HotkeyError::Install(reason));
            }
        };

        let mut msg = MSG::default();
        unsafe {
            // Create the thread's message queue before anyone posts WM_QUIT to it
            let _ = PeekMessageW(&mut msg, HWND::default(), WM_USER, WM_USER, PM_NOREMOVE);
            let _ = ready_tx.send(Ok(GetCurrentThreadId()));
        }
        info!("low-level keyboard hook installed");

        // 0 means WM_QUIT, -1 means the queue is gone
        while unsafe { GetMessageW(&mut msg, HWND::default(), 0, 0) }.0 > 0 {}

        SINK.with(|slot| slot.borrow_mut().take());
        unsafe { UnhookWindowsHookEx(hook) }.map_err(|e| HotkeyError::Uninstall(e.to_string()))
    }

    unsafe extern "system" fn keyboard_proc(code: i32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
        if code >= 0 {
            let info = &*(lparam.0 as *const KBDLLHOOKSTRUCT);
            if let Some(event) = KeyEvent::from_raw(info.vkCode, wparam.0 as u32) {
                let consume = SINK.with(|slot| {
                    slot.borrow()
                        .as_ref()
                        .map(|sink| sink.forward(event))
                        .unwrap_or(false)
                });
                if consume {
                    return LRESULT(1);
                }
            }
        }
        CallNextHookEx(HHOOK::default(), code, wparam, lparam)
    }
}

#[cfg(not(windows))]
mod platform {
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    use super::{HookSink, HotkeyError};
    use crate::lifecycle::QuitHandle;

    pub enum Worker {}

    impl Worker {
        pub fn stop(self) -> Result<(), HotkeyError> {
            match self {}
        }
    }

    pub fn spawn(
        _sink: HookSink,
        _running: Arc<AtomicBool>,
        _quit: QuitHandle,
    ) -> Result<Worker, HotkeyError> {
        Err(HotkeyError::Unsupported)
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;
    use crate::hotkey::keys::KeyTransition;
    use crate::lifecycle::ShutdownSignal;

    fn press(key: VolumeKey) -> KeyEvent {
        KeyEvent::new(key, KeyTransition::Pressed)
    }

    fn release(key: VolumeKey) -> KeyEvent {
        KeyEvent::new(key, KeyTransition::Released)
    }

    fn hook(tx: mpsc::Sender<KeyEvent>) -> KeyboardHook {
        KeyboardHook::new(tx, false, ShutdownSignal::new().quit_handle())
    }

    #[test]
    fn test_hook_creation() {
        let (tx, _rx) = mpsc::channel(3);
        let mut hook = hook(tx);
        assert!(!hook.is_running());
        assert!(hook.stop().is_ok());
        assert!(hook.uninstall().is_ok());
    }

    #[cfg(not(windows))]
    #[test]
    fn test_start_unsupported_off_windows() {
        let (tx, _rx) = mpsc::channel(3);
        let mut hook = hook(tx);
        assert!(matches!(hook.start(), Err(HotkeyError::Unsupported)));
        assert!(!hook.is_running());
    }

    #[test]
    fn test_sink_consumes_forwarded_keys() {
        let (tx, mut rx) = mpsc::channel(3);
        let sink = HookSink::new(tx, false);

        assert!(sink.forward(press(VolumeKey::Increase)));
        assert_eq!(rx.try_recv().unwrap(), press(VolumeKey::Increase));
    }

    #[test]
    fn test_sink_passthrough_still_forwards() {
        let (tx, mut rx) = mpsc::channel(3);
        let sink = HookSink::new(tx, true);

        assert!(!sink.forward(press(VolumeKey::Decrease)));
        assert_eq!(rx.try_recv().unwrap(), press(VolumeKey::Decrease));
    }

    #[test]
    fn test_sink_full_queue_releases_key_to_system() {
        let (tx, mut rx) = mpsc::channel(1);
        let sink = HookSink::new(tx, false);

        assert!(sink.forward(press(VolumeKey::Increase)));
        assert!(!sink.forward(press(VolumeKey::Decrease)));
        assert_eq!(rx.try_recv().unwrap(), press(VolumeKey::Increase));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_sink_marks_next_event_after_drop_for_resync() {
        let (tx, mut rx) = mpsc::channel(1);
        let sink = HookSink::new(tx, false);

        // Key-up is lost behind a full queue
        assert!(sink.forward(press(VolumeKey::Increase)));
        assert!(!sink.forward(release(VolumeKey::Increase)));
        assert_eq!(rx.try_recv().unwrap(), press(VolumeKey::Increase));

        // Other key is unaffected
        assert!(sink.forward(press(VolumeKey::Decrease)));
        assert_eq!(rx.try_recv().unwrap(), press(VolumeKey::Decrease));

        assert!(sink.forward(press(VolumeKey::Increase)));
        assert_eq!(
            rx.try_recv().unwrap(),
            press(VolumeKey::Increase).resynced()
        );

        assert!(sink.forward(release(VolumeKey::Increase)));
        assert_eq!(rx.try_recv().unwrap(), release(VolumeKey::Increase));
    }

    #[test]
    fn test_sink_closed_queue_releases_key_to_system() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sink = HookSink::new(tx, false);
        assert!(!sink.forward(press(VolumeKey::Increase)));
    }

    #[test]
    fn test_retry_succeeds_after_transient_failures() {
        let mut calls = 0;
        let result = retry(3, Duration::ZERO, || {
            calls += 1;
            if calls < 3 {
                Err(io::Error::new(io::ErrorKind::WouldBlock, "queue not ready"))
            } else {
                Ok(calls)
            }
        });
        assert_eq!(result.unwrap(), 3);
    }

    #[test]
    fn test_retry_gives_up_after_attempts() {
        let mut calls = 0;
        let result: Result<(), io::Error> = retry(3, Duration::ZERO, || {
            calls += 1;
            Err(io::Error::new(io::ErrorKind::NotFound, "no thread"))
        });
        assert!(result.is_err());
        assert_eq!(calls, 3);
    }
}
