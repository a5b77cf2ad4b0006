//! A `pthread`-shaped C ABI over this crate's native task and
//! synchronization primitives, for ported C benchmarks that call
//! `sl_pthread_*` instead of linking against glibc's pthreads (spec §4.12).
//!
//! Grounded in `original_source/libos/shim/pthread.c`'s join-handle shape
//! (a heap-allocated struct carrying the entry fn, its argument, and the
//! return value, reference-counted between the spawning and spawned sides)
//! and in `examples/hermit-os-kernel/src/syscalls/semaphore.rs`'s
//! opaque-handle convention: an inner safe function wrapped by a
//! `#[no_mangle] extern "C"` one, objects passed across the boundary as
//! `Box`/`Arc`-owned raw pointers rather than by value.

use std::ffi::c_void;
use std::os::raw::c_int;
use std::sync::Arc;

use crate::error::SkyloftError;
use crate::runtime;
use crate::synch::condvar::Condvar;
use crate::synch::mutex::Mutex;

/// Signature of a pthread-style entry point.
pub type PthreadEntry = unsafe extern "C" fn(*mut c_void) -> *mut c_void;

/// Opaque thread handle, handed to the caller as a `sl_pthread_t`.
pub type SlPthreadT = *const JoinHandle;
/// Opaque mutex handle, handed to the caller as a `sl_pthread_mutex_t`.
pub type SlPthreadMutexT = *mut Mutex<()>;
/// Opaque condvar handle, handed to the caller as a `sl_pthread_cond_t`.
pub type SlPthreadCondT = *mut Condvar;

struct JoinState {
    finished: bool,
    detached: bool,
    retval: *mut c_void,
}

// SAFETY: `retval` is an opaque payload handed back verbatim to the caller,
// never dereferenced by this module.
unsafe impl Send for JoinState {}

pub struct JoinHandle {
    state: Mutex<JoinState>,
    done: Condvar,
}

struct TrampolineArgs {
    handle: Arc<JoinHandle>,
    entry: PthreadEntry,
    arg: *mut c_void,
}

unsafe impl Send for TrampolineArgs {}

unsafe extern "C" fn trampoline(raw_args: usize) {
    let args = *unsafe { Box::from_raw(raw_args as *mut TrampolineArgs) };
    let retval = unsafe { (args.entry)(args.arg) };
    let mut state = args.handle.state.lock();
    state.retval = retval;
    state.finished = true;
    drop(state);
    args.handle.done.notify_all();
}

fn errno_for(err: SkyloftError) -> c_int {
    match err {
        SkyloftError::OutOfMemory(_) => libc::ENOMEM,
        SkyloftError::QueueFull(_) | SkyloftError::TryAgain | SkyloftError::Busy => libc::EAGAIN,
        SkyloftError::InvalidArgument(_) | SkyloftError::NoSuchTask(_) => libc::EINVAL,
        SkyloftError::ChannelEmpty => libc::ENOMSG,
        SkyloftError::Unrecoverable(_) => libc::EIO,
    }
}

/// Spawns a task running `entry(arg)`, writing its handle to `*thread`.
///
/// # Safety
/// `thread` must be a valid pointer to write a `SlPthreadT` into, or null.
#[no_mangle]
pub unsafe extern "C" fn sl_pthread_create(
    thread: *mut SlPthreadT,
    _attr: *const c_void,
    entry: PthreadEntry,
    arg: *mut c_void,
) -> c_int {
    let handle = Arc::new(JoinHandle {
        state: Mutex::new(JoinState { finished: false, detached: false, retval: std::ptr::null_mut() }),
        done: Condvar::new(),
    });
    let trampoline_args = Box::new(TrampolineArgs { handle: handle.clone(), entry, arg });
    let raw = Box::into_raw(trampoline_args) as usize;
    match runtime::task_spawn(trampoline, raw) {
        Ok(_) => {
            if !thread.is_null() {
                unsafe { *thread = Arc::into_raw(handle) };
            }
            0
        }
        Err(err) => {
            // SAFETY: `raw` was produced by the `Box::into_raw` above and
            // `task_spawn` never took ownership of it on this path.
            drop(unsafe { Box::from_raw(raw as *mut TrampolineArgs) });
            errno_for(err)
        }
    }
}

/// Blocks until `thread` finishes, writing its return value to `*retval`
/// unless `retval` is null.
///
/// # Safety
/// `thread` must be a handle previously returned via `sl_pthread_create`,
/// not already joined or detached.
#[no_mangle]
pub unsafe extern "C" fn sl_pthread_join(thread: SlPthreadT, retval: *mut *mut c_void) -> c_int {
    let handle = unsafe { Arc::from_raw(thread) };
    let mut state = handle.state.lock();
    if state.detached {
        return libc::EINVAL;
    }
    while !state.finished {
        state = handle.done.wait(state);
    }
    if !retval.is_null() {
        unsafe { *retval = state.retval };
    }
    0
}

/// Marks `thread` as detached: its resources are reclaimed automatically
/// once it finishes, and it is no longer valid to `sl_pthread_join`.
///
/// # Safety
/// `thread` must be a handle previously returned via `sl_pthread_create`.
#[no_mangle]
pub unsafe extern "C" fn sl_pthread_detach(thread: SlPthreadT) -> c_int {
    let handle = unsafe { Arc::from_raw(thread) };
    let mut state = handle.state.lock();
    if state.detached {
        return libc::EINVAL;
    }
    state.detached = true;
    0
}

#[no_mangle]
pub extern "C" fn sl_pthread_yield() -> c_int {
    runtime::task_yield();
    0
}

#[no_mangle]
pub extern "C" fn sl_pthread_exit(retval: *mut c_void) -> ! {
    // There is no handle to stash `retval` into from here (unlike the
    // original source's buffer-embedded join handle): a task that wants to
    // report a value must return it from its entry function instead, which
    // `trampoline` already forwards. Plain `sl_pthread_exit` mirrors POSIX's
    // "terminate now" contract without a value.
    let _ = retval;
    runtime::task_exit(0);
}

/// Initializes a mutex at `*mutex`.
///
/// # Safety
/// `mutex` must be a valid pointer to write a `SlPthreadMutexT` into.
#[no_mangle]
pub unsafe extern "C" fn sl_pthread_mutex_init(
    mutex: *mut SlPthreadMutexT,
    _attr: *const c_void,
) -> c_int {
    if mutex.is_null() {
        return libc::EINVAL;
    }
    unsafe { *mutex = Box::into_raw(Box::new(Mutex::new(()))) };
    0
}

/// # Safety
/// `mutex` must be a live handle from `sl_pthread_mutex_init`.
#[no_mangle]
pub unsafe extern "C" fn sl_pthread_mutex_lock(mutex: SlPthreadMutexT) -> c_int {
    let mutex = unsafe { &*mutex };
    mutex.lock_raw();
    0
}

/// # Safety
/// `mutex` must be a live handle from `sl_pthread_mutex_init`.
#[no_mangle]
pub unsafe extern "C" fn sl_pthread_mutex_trylock(mutex: SlPthreadMutexT) -> c_int {
    let mutex = unsafe { &*mutex };
    match mutex.try_lock() {
        Some(guard) => {
            std::mem::forget(guard);
            0
        }
        None => libc::EBUSY,
    }
}

/// # Safety
/// `mutex` must currently be held by the calling task (via `lock`/`trylock`
/// on this same handle).
#[no_mangle]
pub unsafe extern "C" fn sl_pthread_mutex_unlock(mutex: SlPthreadMutexT) -> c_int {
    let mutex = unsafe { &*mutex };
    mutex.unlock_raw();
    0
}

/// # Safety
/// `mutex` must not be locked and must not be used again after this call.
#[no_mangle]
pub unsafe extern "C" fn sl_pthread_mutex_destroy(mutex: SlPthreadMutexT) -> c_int {
    drop(unsafe { Box::from_raw(mutex) });
    0
}

/// Initializes a condvar at `*cond`.
///
/// # Safety
/// `cond` must be a valid pointer to write a `SlPthreadCondT` into.
#[no_mangle]
pub unsafe extern "C" fn sl_pthread_cond_init(
    cond: *mut SlPthreadCondT,
    _attr: *const c_void,
) -> c_int {
    if cond.is_null() {
        return libc::EINVAL;
    }
    unsafe { *cond = Box::into_raw(Box::new(Condvar::new())) };
    0
}

/// # Safety
/// `cond` must be a live handle from `sl_pthread_cond_init`.
#[no_mangle]
pub unsafe extern "C" fn sl_pthread_cond_signal(cond: SlPthreadCondT) -> c_int {
    let cond = unsafe { &*cond };
    cond.notify_one();
    0
}

/// # Safety
/// `cond` must be a live handle from `sl_pthread_cond_init`.
#[no_mangle]
pub unsafe extern "C" fn sl_pthread_cond_broadcast(cond: SlPthreadCondT) -> c_int {
    let cond = unsafe { &*cond };
    cond.notify_all();
    0
}

/// # Safety
/// `cond` must be a live handle from `sl_pthread_cond_init`; `mutex` must be
/// held by the calling task, locked via `sl_pthread_mutex_lock` on this same
/// handle.
#[no_mangle]
pub unsafe extern "C" fn sl_pthread_cond_wait(cond: SlPthreadCondT, mutex: SlPthreadMutexT) -> c_int {
    let cond = unsafe { &*cond };
    let mutex_ref = unsafe { &*mutex };
    cond.wait_raw(mutex_ref);
    0
}

/// # Safety
/// `cond` must not be waited on and must not be used again after this call.
#[no_mangle]
pub unsafe extern "C" fn sl_pthread_cond_destroy(cond: SlPthreadCondT) -> c_int {
    drop(unsafe { Box::from_raw(cond) });
    0
}
