use alvr_common::anyhow::{bail, Result};
use std::{ffi::CString, io, ptr::NonNull, slice, time::Duration};

// POSIX shared object names live in a flat namespace rooted at "/"
fn object_name(name: &str) -> Result<CString> {
    Ok(CString::new(format!("/{name}"))?)
}

/// A mapping of the named shared region into this process.
pub struct SharedRegion {
    ptr: NonNull<u8>,
    len: usize,
    unlink_name: Option<CString>,
}

// The mapping pointer is only dereferenced through `view()`; cross-process
// aliasing is mediated by the gate.
unsafe impl Send for SharedRegion {}

impl SharedRegion {
    /// Attaches to an existing region. `Ok(None)` when the host has not
    /// created it yet; the caller retries later.
    pub fn open(name: &str, len: usize) -> Result<Option<Self>> {
        let c_name = object_name(name)?;

        let fd = unsafe { libc::shm_open(c_name.as_ptr(), libc::O_RDWR, 0o600 as libc::mode_t) };
        if fd < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::NotFound {
                return Ok(None);
            }

            bail!("Failed to open shared region {name:?}: {err}");
        }

        Self::from_fd(fd, len, name, None).map(Some)
    }

    /// Creates (or re-opens and resizes) the region. The returned mapping
    /// owns the name and unlinks it on drop.
    pub fn create(name: &str, len: usize) -> Result<Self> {
        let c_name = object_name(name)?;

        let fd = unsafe {
            libc::shm_open(
                c_name.as_ptr(),
                libc::O_CREAT | libc::O_RDWR,
                0o600 as libc::mode_t,
            )
        };
        if fd < 0 {
            bail!(
                "Failed to create shared region {name:?}: {}",
                io::Error::last_os_error()
            );
        }

        if unsafe { libc::ftruncate(fd, len as libc::off_t) } != 0 {
            let err = io::Error::last_os_error();
            unsafe { libc::close(fd) };

            bail!("Failed to size shared region {name:?}: {err}");
        }

        Self::from_fd(fd, len, name, Some(c_name))
    }

    fn from_fd(
        fd: libc::c_int,
        len: usize,
        name: &str,
        unlink_name: Option<CString>,
    ) -> Result<Self> {
        let mut stat: libc::stat = unsafe { std::mem::zeroed() };
        if unsafe { libc::fstat(fd, &mut stat) } != 0 {
            let err = io::Error::last_os_error();
            unsafe { libc::close(fd) };

            bail!("Failed to stat shared region {name:?}: {err}");
        }
        if (stat.st_size as usize) < len {
            unsafe { libc::close(fd) };

            bail!(
                "Shared region {name:?} holds {} bytes, expected at least {len}",
                stat.st_size
            );
        }

        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd,
                0,
            )
        };
        unsafe { libc::close(fd) };

        if ptr == libc::MAP_FAILED {
            bail!(
                "Failed to map shared region {name:?}: {}",
                io::Error::last_os_error()
            );
        }

        match NonNull::new(ptr.cast()) {
            Some(ptr) => Ok(Self {
                ptr,
                len,
                unlink_name,
            }),
            None => bail!("Shared region {name:?} mapped at null"),
        }
    }

    pub fn view(&mut self) -> &mut [u8] {
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl Drop for SharedRegion {
    fn drop(&mut self) {
        unsafe { libc::munmap(self.ptr.as_ptr().cast(), self.len) };

        if let Some(name) = &self.unlink_name {
            unsafe { libc::shm_unlink(name.as_ptr()) };
        }
    }
}

/// Named cross-process mutual exclusion, backed by a POSIX named semaphore.
/// Whichever process opens first creates the kernel object.
///
/// Unlike a Windows mutex, a semaphore is not released when its holder dies;
/// a crashed peer can leave the gate closed until the name is unlinked.
pub struct RegionGate {
    sem: *mut libc::sem_t,
}

unsafe impl Send for RegionGate {}
unsafe impl Sync for RegionGate {}

impl RegionGate {
    pub fn open(name: &str) -> Result<Self> {
        let c_name = object_name(name)?;

        let sem = unsafe {
            libc::sem_open(
                c_name.as_ptr(),
                libc::O_CREAT,
                0o600 as libc::c_uint,
                1 as libc::c_uint,
            )
        };
        if sem == libc::SEM_FAILED {
            bail!(
                "Failed to open gate {name:?}: {}",
                io::Error::last_os_error()
            );
        }

        Ok(Self { sem })
    }

    pub fn acquire(&self) -> Result<GateLease> {
        loop {
            if unsafe { libc::sem_wait(self.sem) } == 0 {
                return Ok(GateLease { gate: self });
            }

            let err = io::Error::last_os_error();
            if err.raw_os_error() != Some(libc::EINTR) {
                bail!("Failed to acquire gate: {err}");
            }
        }
    }

    /// Bounded acquire; `Ok(None)` on expiry so the caller can skip the cycle.
    #[cfg(any(target_os = "linux", target_os = "android"))]
    pub fn acquire_timeout(&self, timeout: Duration) -> Result<Option<GateLease>> {
        let mut deadline = libc::timespec {
            tv_sec: 0,
            tv_nsec: 0,
        };
        if unsafe { libc::clock_gettime(libc::CLOCK_REALTIME, &mut deadline) } != 0 {
            bail!("clock_gettime failed: {}", io::Error::last_os_error());
        }
        deadline.tv_sec += timeout.as_secs() as libc::time_t;
        deadline.tv_nsec += timeout.subsec_nanos() as libc::c_long;
        if deadline.tv_nsec >= 1_000_000_000 {
            deadline.tv_sec += 1;
            deadline.tv_nsec -= 1_000_000_000;
        }

        loop {
            if unsafe { libc::sem_timedwait(self.sem, &deadline) } == 0 {
                return Ok(Some(GateLease { gate: self }));
            }

            let err = io::Error::last_os_error();
            match err.raw_os_error() {
                Some(libc::ETIMEDOUT) => return Ok(None),
                Some(libc::EINTR) => continue,
                _ => bail!("Failed to acquire gate: {err}"),
            }
        }
    }

    /// Bounded acquire for platforms without `sem_timedwait`.
    #[cfg(not(any(target_os = "linux", target_os = "android")))]
    pub fn acquire_timeout(&self, timeout: Duration) -> Result<Option<GateLease>> {
        let deadline = std::time::Instant::now() + timeout;

        loop {
            if unsafe { libc::sem_trywait(self.sem) } == 0 {
                return Ok(Some(GateLease { gate: self }));
            }

            let err = io::Error::last_os_error();
            match err.raw_os_error() {
                Some(libc::EAGAIN) | Some(libc::EINTR) => {
                    if std::time::Instant::now() >= deadline {
                        return Ok(None);
                    }
                    std::thread::sleep(Duration::from_micros(500));
                }
                _ => bail!("Failed to acquire gate: {err}"),
            }
        }
    }

    /// Reclaims the name; the kernel object survives until every holder
    /// closes it.
    pub fn unlink(name: &str) {
        if let Ok(c_name) = object_name(name) {
            unsafe { libc::sem_unlink(c_name.as_ptr()) };
        }
    }
}

impl Drop for RegionGate {
    fn drop(&mut self) {
        unsafe { libc::sem_close(self.sem) };
    }
}

/// Holds the gate; dropping releases it on every exit path, panics included.
pub struct GateLease<'a> {
    gate: &'a RegionGate,
}

impl Drop for GateLease<'_> {
    fn drop(&mut self) {
        unsafe { libc::sem_post(self.gate.sem) };
    }
}
