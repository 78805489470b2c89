//! Release handles.
//!
//! Every retain, registration and subscription hands back a [`Release`].
//! Calling [`Release::release`] or dropping the handle gives the resource
//! back. The release action runs at most once, so a handle can never
//! decrement a retain count twice.

use std::fmt;

type ReleaseFn = Box<dyn FnOnce() + Send>;

/// Handle to a retained resource.
///
/// Dropping this handle releases the resource.
#[must_use = "dropping a Release releases the resource immediately"]
pub struct Release {
    action: Option<ReleaseFn>,
}

impl Release {
    pub(crate) fn new<F>(action: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            action: Some(Box::new(action)),
        }
    }

    /// A handle that releases nothing.
    pub fn noop() -> Self {
        Self { action: None }
    }

    /// Combine several handles into one that releases all of them, in order.
    pub fn merge(releases: impl IntoIterator<Item = Release>) -> Self {
        let releases: Vec<Release> = releases.into_iter().collect();
        Self::new(move || {
            for release in releases {
                release.release();
            }
        })
    }

    /// Release the resource now.
    pub fn release(mut self) {
        self.run();
    }

    /// Keep the resource alive for as long as its owner exists.
    pub fn detach(mut self) {
        self.action = None;
    }

    /// Whether the release action is still pending.
    pub fn is_armed(&self) -> bool {
        self.action.is_some()
    }

    fn run(&mut self) {
        if let Some(action) = self.action.take() {
            action();
        }
    }
}

impl Drop for Release {
    fn drop(&mut self) {
        self.run();
    }
}

impl fmt::Debug for Release {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Release")
            .field("armed", &self.is_armed())
            .finish()
    }
}
