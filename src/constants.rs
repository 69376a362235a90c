// -
// Watch

/// Slots in each watch handle's event queue
pub(crate) const DEFAULT_WATCH_EVENT_BUFFER_SIZE: usize = 100;

// -
// Keys

pub(crate) const KEY_SEPARATOR: char = '/';
