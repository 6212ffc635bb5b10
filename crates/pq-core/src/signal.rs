//! Critical-section signal masking and consumer wakeup.
//!
//! Every mutating API call blocks all but the fatal signal set for its
//! duration, so a signal handler can never interrupt an in-progress
//! index update; every successful insert then wakes waiting consumers
//! with `SIGCONT` to the process group.

use std::mem::MaybeUninit;

/// RAII guard: blocks all but the fatal signals on construction,
/// restores the prior mask on drop. Follows the usual scoped-guard
/// convention for "do X on enter, always undo on exit, even on an early
/// return."
pub struct CriticalSection {
    saved_mask: libc::sigset_t,
}

impl CriticalSection {
    /// Enters the critical section, blocking all signals except
    /// `SIGABRT`, `SIGFPE`, `SIGILL`, `SIGSEGV`, and `SIGBUS`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::System`] if the underlying `sigprocmask`
    /// call fails.
    pub fn enter() -> crate::Result<Self> {
        // SAFETY: `sigset_t` is valid when zero/fully-initialized by the
        // `sigfillset`/`sigdelset` calls below before any use.
        let mut block_mask: libc::sigset_t = unsafe { MaybeUninit::zeroed().assume_init() };
        let mut saved_mask: libc::sigset_t = unsafe { MaybeUninit::zeroed().assume_init() };

        unsafe {
            libc::sigfillset(&mut block_mask);
            for fatal in [libc::SIGABRT, libc::SIGFPE, libc::SIGILL, libc::SIGSEGV, libc::SIGBUS] {
                libc::sigdelset(&mut block_mask, fatal);
            }
            if libc::pthread_sigmask(libc::SIG_SETMASK, &block_mask, &mut saved_mask) != 0 {
                return Err(crate::Error::System("pthread_sigmask (block) failed".into()));
            }
        }
        Ok(Self { saved_mask })
    }
}

impl Drop for CriticalSection {
    fn drop(&mut self) {
        // SAFETY: `saved_mask` was populated by a prior successful
        // `pthread_sigmask` call in `enter`.
        unsafe {
            libc::pthread_sigmask(libc::SIG_SETMASK, &self.saved_mask, std::ptr::null_mut());
        }
    }
}

/// Sends `SIGCONT` to this process's own process group, waking any
/// consumer blocked in [`suspend`].
///
/// # Errors
///
/// Returns [`crate::Error::System`] if `kill` fails.
pub fn wake_consumers() -> crate::Result<()> {
    // SAFETY: `kill(0, SIGCONT)` targets the caller's own process group
    // and takes no pointer arguments.
    let rc = unsafe { libc::kill(0, libc::SIGCONT) };
    if rc == -1 {
        Err(crate::Error::System("kill(SIGCONT) failed".into()))
    } else {
        Ok(())
    }
}

extern "C" fn noop_handler(_: libc::c_int) {}

/// Blocks on `SIGCONT` or, if `timeout_secs` is set, `SIGALRM`, with
/// no-op handlers installed for the duration; restores prior handlers
/// before returning. Returns the number of seconds remaining if
/// interrupted by `alarm`, or `0` on a full-duration sleep / `SIGCONT`.
///
/// # Errors
///
/// Returns [`crate::Error::System`] if installing or restoring a signal
/// handler fails.
pub fn suspend(timeout_secs: Option<u32>) -> crate::Result<u32> {
    // SAFETY: `sigaction` with a plain no-op handler and no special
    // flags/mask is the documented minimal-footprint usage.
    unsafe {
        let mut action: libc::sigaction = MaybeUninit::zeroed().assume_init();
        action.sa_sigaction = noop_handler as usize;
        let mut prev_cont: libc::sigaction = MaybeUninit::zeroed().assume_init();
        if libc::sigaction(libc::SIGCONT, &action, &mut prev_cont) != 0 {
            return Err(crate::Error::System("sigaction(SIGCONT) failed".into()));
        }
        let mut prev_alrm: libc::sigaction = MaybeUninit::zeroed().assume_init();
        if timeout_secs.is_some() {
            if libc::sigaction(libc::SIGALRM, &action, &mut prev_alrm) != 0 {
                libc::sigaction(libc::SIGCONT, &prev_cont, std::ptr::null_mut());
                return Err(crate::Error::System("sigaction(SIGALRM) failed".into()));
            }
        }

        let remaining = if let Some(secs) = timeout_secs {
            libc::alarm(secs);
            libc::pause();
            libc::alarm(0)
        } else {
            libc::pause();
            0
        };

        libc::sigaction(libc::SIGCONT, &prev_cont, std::ptr::null_mut());
        if timeout_secs.is_some() {
            libc::sigaction(libc::SIGALRM, &prev_alrm, std::ptr::null_mut());
        }
        Ok(remaining)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn critical_section_enters_and_restores_mask_without_error() {
        let guard = CriticalSection::enter().unwrap();
        drop(guard);
    }
}
