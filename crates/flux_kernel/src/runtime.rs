//! Live runtime: a single current-state cell driven by a timer thread
//!
//! The pure transitions in [`crate::rules`] need no locking. This wrapper is
//! for consumers that want the document to advance on its own; it owns the
//! only mutable state and serialises every update through one mutex.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use parking_lot::Mutex;

use flux_lang::FluxDocument;

use crate::rules::{handle_event, run_docstep_once};
use crate::state::{init_runtime_state, RuntimeState};
use crate::{KernelError, RuntimeEvent};

struct Timer {
    stop: Sender<()>,
    thread: JoinHandle<()>,
}

/// Document runtime with a mutable current state
pub struct Runtime {
    doc: Arc<FluxDocument>,
    state: Arc<Mutex<RuntimeState>>,
    last_error: Arc<Mutex<Option<KernelError>>>,
    timer: Mutex<Option<Timer>>,
}

/// Create a runtime positioned at the document's initial state
pub fn create_runtime(doc: FluxDocument) -> Runtime {
    Runtime::new(doc)
}

impl Runtime {
    pub fn new(doc: FluxDocument) -> Self {
        let state = init_runtime_state(&doc);
        Self {
            doc: Arc::new(doc),
            state: Arc::new(Mutex::new(state)),
            last_error: Arc::new(Mutex::new(None)),
            timer: Mutex::new(None),
        }
    }

    pub fn document(&self) -> &FluxDocument {
        &self.doc
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> RuntimeState {
        self.state.lock().clone()
    }

    /// Run one docstep and return the new state
    pub fn step(&self) -> Result<RuntimeState, KernelError> {
        step_shared(&self.doc, &self.state)
    }

    pub fn apply_event(&self, event: &RuntimeEvent) -> RuntimeState {
        let mut state = self.state.lock();
        let next = handle_event(&self.doc, state.clone(), event);
        *state = next.clone();
        next
    }

    /// Interval of the document's first clock-based `timer(...)` advance
    pub fn default_interval(&self) -> Option<Duration> {
        self.document_interval().ok()
    }

    fn document_interval(&self) -> Result<Duration, KernelError> {
        let seconds = self.doc.runtime.as_ref()
            .and_then(|runtime| runtime.timer())
            .and_then(|timer| timer.seconds())
            .ok_or(KernelError::MissingInterval)?;
        if seconds <= 0.0 {
            return Err(KernelError::MissingInterval);
        }
        Duration::try_from_secs_f64(seconds).map_err(|_| KernelError::InvalidInterval(seconds))
    }

    /// Start stepping on a background thread.
    ///
    /// Without an explicit interval the document's own timer is used. A
    /// second call while running is a no-op. The thread stops itself on the
    /// first kernel error, which is then available from [`Runtime::take_error`].
    pub fn start(&self, interval: Option<Duration>) -> Result<(), KernelError> {
        let mut timer = self.timer.lock();
        if timer.is_some() {
            log::debug!("Runtime already running");
            return Ok(());
        }

        let interval = match interval {
            Some(interval) => interval,
            None => self.document_interval()?,
        };

        let (stop, stop_rx) = bounded::<()>(1);
        let doc = Arc::clone(&self.doc);
        let state = Arc::clone(&self.state);
        let last_error = Arc::clone(&self.last_error);

        let thread = std::thread::spawn(move || loop {
            match stop_rx.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => {
                    if let Err(e) = step_shared(&doc, &state) {
                        log::error!("Runtime stopped: {}", e);
                        *last_error.lock() = Some(e);
                        break;
                    }
                }
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        });

        log::info!("Runtime started with interval {:?}", interval);
        *timer = Some(Timer { stop, thread });
        Ok(())
    }

    /// Stop the timer thread and wait for it to exit
    pub fn stop(&self) {
        let Some(timer) = self.timer.lock().take() else {
            return;
        };
        let _ = timer.stop.send(());
        if timer.thread.join().is_err() {
            log::error!("Runtime timer thread panicked");
        }
        log::info!("Runtime stopped");
    }

    pub fn is_running(&self) -> bool {
        self.timer.lock().as_ref().map_or(false, |t| !t.thread.is_finished())
    }

    /// Error that stopped the timer thread, if any
    pub fn take_error(&self) -> Option<KernelError> {
        self.last_error.lock().take()
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        self.stop();
    }
}

fn step_shared(doc: &FluxDocument, state: &Mutex<RuntimeState>) -> Result<RuntimeState, KernelError> {
    let mut current = state.lock();
    let next = run_docstep_once(doc, &current)?;
    *current = next.clone();
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flux_lang::{parse_document, Value};

    fn counter_doc(timer: &str) -> FluxDocument {
        parse_document(&format!(r#"document {{
            state {{ param n: int @ 0; }}
            rule count() {{ when true then n = n + 1; }}
            runtime {{ docstepAdvance = [ timer({}) ]; }}
        }}"#, timer)).unwrap()
    }

    #[test]
    fn test_step_and_snapshot() {
        let runtime = create_runtime(counter_doc("1s"));
        assert_eq!(runtime.snapshot().docstep_index, 0);
        let next = runtime.step().unwrap();
        assert_eq!(next.param("n"), Some(&Value::Int(1)));
        assert_eq!(runtime.snapshot(), next);
    }

    #[test]
    fn test_default_interval() {
        assert_eq!(create_runtime(counter_doc("250ms")).default_interval(), Some(Duration::from_millis(250)));
        assert_eq!(create_runtime(counter_doc("2beat")).default_interval(), None);
    }

    #[test]
    fn test_start_requires_interval() {
        let runtime = create_runtime(counter_doc("2beat"));
        assert!(matches!(runtime.start(None), Err(KernelError::MissingInterval)));
    }

    #[test]
    fn test_oversized_timer_is_an_error() {
        let runtime = create_runtime(counter_doc("9000000000000000000h"));
        assert_eq!(runtime.default_interval(), None);
        assert!(matches!(runtime.start(None), Err(KernelError::InvalidInterval(_))));
        assert!(!runtime.is_running());
    }

    #[test]
    fn test_timer_drives_docsteps() {
        let runtime = create_runtime(counter_doc("1s"));
        runtime.start(Some(Duration::from_millis(5))).unwrap();
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while runtime.snapshot().docstep_index < 3 && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        runtime.stop();
        assert!(!runtime.is_running());

        let stopped_at = runtime.snapshot().docstep_index;
        assert!(stopped_at >= 3);
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(runtime.snapshot().docstep_index, stopped_at);
    }

    #[test]
    fn test_timer_stops_on_kernel_error() {
        let doc = parse_document(r#"document {
            rule broken() { when 1 then docstep = 1; }
        }"#).unwrap();
        let runtime = create_runtime(doc);
        runtime.start(Some(Duration::from_millis(1))).unwrap();
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while runtime.is_running() && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(2));
        }
        assert!(matches!(runtime.take_error(), Some(KernelError::NonBooleanCondition { .. })));
        assert_eq!(runtime.snapshot().docstep_index, 0);
    }

    #[test]
    fn test_apply_event_keeps_state() {
        let runtime = create_runtime(counter_doc("1s"));
        runtime.step().unwrap();
        let before = runtime.snapshot();
        let after = runtime.apply_event(&RuntimeEvent::new("click"));
        assert_eq!(before, after);
    }
}
