use std::fmt;
use std::sync::{Arc, OnceLock};

/// Observed state of a [`ResultCell`].
#[derive(Debug)]
pub enum Resolution<T> {
    Pending,
    /// Resolution finished without producing a value.
    Absent,
    Ready(Arc<T>),
}

impl<T> Resolution<T> {
    pub fn is_pending(&self) -> bool {
        matches!(self, Resolution::Pending)
    }

    pub fn ready(self) -> Option<Arc<T>> {
        match self {
            Resolution::Ready(value) => Some(value),
            Resolution::Pending | Resolution::Absent => None,
        }
    }
}

impl<T> Clone for Resolution<T> {
    fn clone(&self) -> Self {
        match self {
            Resolution::Pending => Resolution::Pending,
            Resolution::Absent => Resolution::Absent,
            Resolution::Ready(value) => Resolution::Ready(Arc::clone(value)),
        }
    }
}

/// Write-once result slot shared between a resolution job and its readers.
///
/// Reads never block and never consume the value.
pub struct ResultCell<T> {
    slot: OnceLock<Option<Arc<T>>>,
}

pub type Sink<T> = Arc<ResultCell<T>>;

impl<T> ResultCell<T> {
    pub fn pending() -> Self {
        Self {
            slot: OnceLock::new(),
        }
    }

    pub fn resolved(value: Option<T>) -> Self {
        let cell = Self::pending();
        cell.fulfill(value);
        cell
    }

    /// Publishes the result. Returns `false` if the cell was already fulfilled,
    /// in which case `value` is dropped and the first result stays visible.
    pub fn fulfill(&self, value: Option<T>) -> bool {
        self.slot.set(value.map(Arc::new)).is_ok()
    }

    pub fn state(&self) -> Resolution<T> {
        match self.slot.get() {
            None => Resolution::Pending,
            Some(None) => Resolution::Absent,
            Some(Some(value)) => Resolution::Ready(Arc::clone(value)),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.slot.get().is_some()
    }

    pub fn value(&self) -> Option<&T> {
        self.slot.get().and_then(|value| value.as_deref())
    }
}

impl<T> Default for ResultCell<T> {
    fn default() -> Self {
        Self::pending()
    }
}

impl<T> fmt::Debug for ResultCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.slot.get() {
            None => "pending",
            Some(None) => "absent",
            Some(Some(_)) => "ready",
        };
        f.debug_struct("ResultCell").field("state", &state).finish()
    }
}
