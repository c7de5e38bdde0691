use std::{
    io::{self, Write},
    mem,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Verbose,
    #[default]
    Buffered,
}

/// Output of the running spec.
///
/// Buffered output is truncated before every spec and reaches the sink only
/// when the spec fails. Writers on detached threads share the same lock.
pub struct OutputBuffer {
    inner: Mutex<Inner>,
}

struct Inner {
    mode: OutputMode,
    buffer: Vec<u8>,
    sink: Box<dyn Write + Send>,
}

impl std::fmt::Debug for OutputBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("OutputBuffer")
            .field("mode", &inner.mode)
            .field("buffered", &inner.buffer.len())
            .finish_non_exhaustive()
    }
}

impl OutputBuffer {
    pub fn new(mode: OutputMode, sink: impl Write + Send + 'static) -> Self {
        Self {
            inner: Mutex::new(Inner {
                mode,
                buffer: Vec::new(),
                sink: Box::new(sink),
            }),
        }
    }

    pub fn stdout(mode: OutputMode) -> Self {
        Self::new(mode, io::stdout())
    }

    // The buffer holds plain bytes, a panicking writer cannot leave it inconsistent.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn mode(&self) -> OutputMode {
        self.lock().mode
    }

    pub fn set_mode(&self, mode: OutputMode) {
        self.lock().mode = mode;
    }

    /// Replace the real sink; buffered bytes are kept.
    pub fn set_sink(&self, sink: impl Write + Send + 'static) {
        self.lock().sink = Box::new(sink);
    }

    pub fn write(&self, bytes: &[u8]) -> io::Result<()> {
        let mut inner = self.lock();
        match inner.mode {
            OutputMode::Verbose => inner.sink.write_all(bytes),
            OutputMode::Buffered => {
                inner.buffer.extend_from_slice(bytes);
                Ok(())
            }
        }
    }

    pub fn truncate(&self) {
        self.lock().buffer.clear();
    }

    pub fn contents(&self) -> Vec<u8> {
        self.lock().buffer.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().buffer.is_empty()
    }

    /// Move everything buffered so far to the sink.
    pub fn flush(&self) -> io::Result<()> {
        let mut inner = self.lock();
        let buffered = mem::take(&mut inner.buffer);
        if !buffered.is_empty() {
            inner.sink.write_all(&buffered)?;
        }
        inner.sink.flush()
    }

    pub fn writer(self: &Arc<Self>) -> SpecWriter {
        SpecWriter(Arc::clone(self))
    }
}

/// An [`io::Write`] handle into the shared [`OutputBuffer`].
#[derive(Debug, Clone)]
pub struct SpecWriter(Arc<OutputBuffer>);

impl Write for SpecWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
