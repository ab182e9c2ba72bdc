//! Console output handling.
//!
//! The simulator always buffers the text printed by syscalls (see [`Simulator::output`]).
//! Additional sinks can be attached to forward that text elsewhere as it is produced.
//! Their interface is defined with the [`ConsoleDevice`] trait.
//!
//! Besides the trait, this module also includes:
//! - [`BufferedConsole`]: A `ConsoleDevice` holding a shared buffer.
//! - [`ChannelConsole`]: A `ConsoleDevice` which sends text over a channel (e.g., to another thread).
//!
//! [`Simulator::output`]: super::Simulator::output

use std::sync::{Arc, RwLock, RwLockWriteGuard, TryLockError};

use crossbeam_channel as cbc;

/// A sink for console output.
pub trait ConsoleDevice: Send + Sync {
    /// Writes text produced by a syscall.
    ///
    /// This returns whether the write was successful or not.
    fn write_str(&self, text: &str) -> bool;
}
impl dyn ConsoleDevice {} // assert ConsoleDevice is dyn safe

/// Console output that is written into a shared buffer.
///
/// The buffer can be accessed in code via [`BufferedConsole::get_output`].
///
/// Note that while a write lock guard of the buffer is held,
/// the simulator cannot write to it and that output is dropped.
///
/// ```
/// use mips_ensemble::sim::console::{BufferedConsole, ConsoleDevice};
///
/// let console = BufferedConsole::new();
/// assert!(console.write_str("Hi"));
/// assert_eq!(*console.get_output().read().unwrap(), "Hi");
/// ```
#[derive(Clone, Default)]
pub struct BufferedConsole {
    output: Arc<RwLock<String>>
}
impl BufferedConsole {
    /// Creates a new BufferedConsole.
    pub fn new() -> Self {
        Self::default()
    }
    /// Creates a new BufferedConsole from an already defined buffer.
    pub fn with_buf(output: Arc<RwLock<String>>) -> Self {
        Self { output }
    }

    fn try_output(&self) -> Option<RwLockWriteGuard<'_, String>> {
        match self.output.try_write() {
            Ok(g) => Some(g),
            Err(TryLockError::Poisoned(e)) => Some(e.into_inner()),
            Err(TryLockError::WouldBlock) => None,
        }
    }

    /// Gets a reference to the output buffer.
    pub fn get_output(&self) -> &Arc<RwLock<String>> {
        &self.output
    }
}
impl ConsoleDevice for BufferedConsole {
    fn write_str(&self, text: &str) -> bool {
        match self.try_output() {
            Some(mut out) => {
                out.push_str(text);
                true
            },
            None => false
        }
    }
}

/// Console output that is sent through a channel, one message per syscall.
///
/// ```
/// use mips_ensemble::sim::console::{ChannelConsole, ConsoleDevice};
///
/// let (console, rx) = ChannelConsole::unbounded();
/// console.write_str("1");
/// console.write_str("2");
/// assert_eq!(rx.try_iter().collect::<String>(), "12");
/// ```
#[derive(Clone)]
pub struct ChannelConsole {
    tx: cbc::Sender<String>
}
impl ChannelConsole {
    /// Creates a console device which sends its output to the given sender.
    pub fn new(tx: cbc::Sender<String>) -> Self {
        Self { tx }
    }

    /// Creates a console device with an unbounded channel,
    /// returning the device and the receiving end of the channel.
    pub fn unbounded() -> (Self, cbc::Receiver<String>) {
        let (tx, rx) = cbc::unbounded();
        (Self::new(tx), rx)
    }
}
impl ConsoleDevice for ChannelConsole {
    fn write_str(&self, text: &str) -> bool {
        // This fails only if the receiver was dropped.
        self.tx.send(text.to_string()).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, RwLock};

    use super::{BufferedConsole, ChannelConsole, ConsoleDevice};

    #[test]
    fn test_buffered_shared() {
        let buf = Arc::new(RwLock::new(String::from(">")));
        let console = BufferedConsole::with_buf(Arc::clone(&buf));
        let clone = console.clone();

        assert!(console.write_str("a"));
        assert!(clone.write_str("b"));
        assert_eq!(*buf.read().unwrap(), ">ab");

        // held lock: write is dropped
        let guard = buf.write().unwrap();
        assert!(!console.write_str("c"));
        drop(guard);
        assert_eq!(*buf.read().unwrap(), ">ab");
    }

    #[test]
    fn test_channel_thread() {
        let (console, rx) = ChannelConsole::unbounded();

        let handle = std::thread::spawn(move || rx.iter().collect::<Vec<_>>());
        assert!(console.write_str("Hi\n"));
        assert!(console.write_str("42"));
        drop(console);

        let received = handle.join().unwrap();
        assert_eq!(received, ["Hi\n", "42"]);
    }

    #[test]
    fn test_channel_closed() {
        let (console, rx) = ChannelConsole::unbounded();
        drop(rx);
        assert!(!console.write_str("lost"));
    }
}
