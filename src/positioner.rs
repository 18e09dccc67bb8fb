//! Puts a freshly launched app's window where it was last saved.
//!
//! The window usually does not exist yet when we get here, so the lookup
//! retries on a fixed backoff and gives up silently once the budget is
//! spent; some apps never create a window at all.

use std::{thread, time::Duration};

use tracing::debug;

use crate::types::{WindowInfo, WindowPlacement};

pub const RETRY_DELAY: Duration = Duration::from_millis(500);
pub const MAX_ATTEMPTS: u32 = 10;

/// Seam between the retry policy and the OS, so the policy is testable.
pub trait WindowLookup {
    fn find_main_window(&self, process_name: &str) -> Option<isize>;
    fn apply_placement(&self, hwnd: isize, placement: &WindowPlacement);
}

/// The real desktop.
pub struct DesktopLookup;

impl WindowLookup for DesktopLookup {
    fn find_main_window(&self, process_name: &str) -> Option<isize> {
        crate::inspector::find_main_window(process_name)
    }

    fn apply_placement(&self, hwnd: isize, placement: &WindowPlacement) {
        #[cfg(windows)]
        crate::win_api::apply_placement(crate::hwnd!(hwnd), placement);
        #[cfg(not(windows))]
        let _ = (hwnd, placement);
    }
}

pub struct Positioner<L = DesktopLookup> {
    lookup: L,
    retry_delay: Duration,
    max_attempts: u32,
}

impl Positioner<DesktopLookup> {
    pub fn new() -> Self {
        Self {
            lookup: DesktopLookup,
            retry_delay: RETRY_DELAY,
            max_attempts: MAX_ATTEMPTS,
        }
    }
}

impl Default for Positioner<DesktopLookup> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: WindowLookup> Positioner<L> {
    pub fn with_lookup(lookup: L, retry_delay: Duration, max_attempts: u32) -> Self {
        Self {
            lookup,
            retry_delay,
            max_attempts,
        }
    }

    /// Fire-and-forget: locates the first process window matching
    /// `process_name` with a non-empty title and applies the recorded
    /// placement. Never raises; a window that never materializes is only
    /// logged.
    pub fn position_window(&self, process_name: &str, window: &WindowInfo) {
        let Some(placement) = window.position.as_ref() else {
            return;
        };
        for attempt in 0..=self.max_attempts {
            if let Some(hwnd) = self.lookup.find_main_window(process_name) {
                self.lookup.apply_placement(hwnd, placement);
                return;
            }
            if attempt < self.max_attempts {
                thread::sleep(self.retry_delay);
            }
        }
        debug!(
            "no window for {process_name} appeared after {} attempts, giving up",
            self.max_attempts + 1
        );
    }
}

impl<L: WindowLookup> crate::orchestrator::WindowPlacer for Positioner<L> {
    fn place(&self, process_name: &str, window: &WindowInfo) {
        self.position_window(process_name, window);
    }
}
