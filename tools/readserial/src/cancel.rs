//! Cancellation of the blocking read loop
//!
//! The reader polls a [`CancelToken`] between port read timeouts. Ctrl+C is
//! routed into a token by [`install_interrupt_handler`].

use once_cell::sync::OnceCell;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared flag that asks the read loop to stop
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Flag flipped by the SIGINT handler; set once per process
static INTERRUPT_FLAG: OnceCell<Arc<AtomicBool>> = OnceCell::new();

/// Cancel `token` when the process receives SIGINT (Ctrl+C)
///
/// Only one token can be registered per process. On non-Unix platforms this
/// does nothing and Ctrl+C keeps its default behavior.
pub fn install_interrupt_handler(token: &CancelToken) -> io::Result<()> {
    INTERRUPT_FLAG
        .set(Arc::clone(&token.flag))
        .map_err(|_| io::Error::new(io::ErrorKind::AlreadyExists, "interrupt handler already installed"))?;

    #[cfg(unix)]
    {
        // No SA_RESTART, so a read blocked in the driver returns EINTR
        let mut action: libc::sigaction = unsafe { std::mem::zeroed() };
        action.sa_sigaction = handle_sigint as *const () as libc::sighandler_t;
        action.sa_flags = 0;

        let rc = unsafe {
            libc::sigemptyset(&mut action.sa_mask);
            libc::sigaction(libc::SIGINT, &action, std::ptr::null_mut())
        };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }
    }

    Ok(())
}

#[cfg(unix)]
extern "C" fn handle_sigint(_: libc::c_int) {
    if let Some(flag) = INTERRUPT_FLAG.get() {
        flag.store(true, Ordering::SeqCst);
    }
}
