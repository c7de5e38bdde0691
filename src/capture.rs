use std::{
    panic::{self, PanicHookInfo},
    sync::Arc,
    thread,
};

use crate::output::OutputBuffer;

type PanicHook = Box<dyn Fn(&PanicHookInfo<'_>) + Sync + Send + 'static>;

/// Routes panic messages into an [`OutputBuffer`] while alive.
///
/// The process-wide panic hook is replaced on install and the previous hook
/// is restored on drop.
pub(crate) struct CapturePanicHookGuard(Option<PanicHook>);

impl CapturePanicHookGuard {
    pub(crate) fn install(output: Arc<OutputBuffer>) -> Self {
        let old_hook = panic::take_hook();

        panic::set_hook(Box::new(move |panic_hook_info| {
            let payload = panic_hook_info.payload();
            let message = payload
                .downcast_ref::<&str>()
                .copied()
                .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
                .unwrap_or("non-string panic payload");
            let thread = thread::current();
            let name = thread.name().unwrap_or("<unnamed>");
            let location = panic_hook_info
                .location()
                .map(|location| format!(" at {}:{}", location.file(), location.line()))
                .unwrap_or_default();

            // Nothing sensible to do if the output itself fails.
            let _ = output.write(format!("thread '{name}' panicked{location}:\n{message}\n").as_bytes());
        }));

        Self(Some(old_hook))
    }
}

impl Drop for CapturePanicHookGuard {
    fn drop(&mut self) {
        if let Some(old_hook) = self.0.take() {
            panic::set_hook(old_hook);
        }
    }
}
