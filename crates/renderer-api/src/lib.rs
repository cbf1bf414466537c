// Audio output abstraction layer

use keyclack_core::{PcmSpec, Result};

/// One open playback stream.
/// Streams are used and dropped on the thread that opened them.
pub trait OutputStream {
    /// Write interleaved sample bytes laid out as described by the stream's
    /// [`PcmSpec`], blocking until the device has consumed all of them
    fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Stop the stream and release its device resources
    fn close(self: Box<Self>) -> Result<()>;
}

/// Audio output device trait
/// Shared by every playback thread; each playback opens its own stream
pub trait OutputDevice: Send + Sync {
    /// Open a stream for buffers with the given layout
    fn open_stream(&self, spec: &PcmSpec) -> Result<Box<dyn OutputStream>>;

    /// Release the underlying device handle.
    /// Safe to call more than once; a later `open_stream` may reacquire it.
    fn release(&self) -> Result<()>;
}
