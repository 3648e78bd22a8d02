use alvr_common::anyhow::{bail, Result};
use std::{slice, time::Duration};
use widestring::U16CString;
use windows::{
    core::PCWSTR,
    Win32::{
        Foundation::{
            CloseHandle, ERROR_FILE_NOT_FOUND, HANDLE, INVALID_HANDLE_VALUE, WAIT_ABANDONED,
            WAIT_OBJECT_0, WAIT_TIMEOUT,
        },
        System::{
            Memory::{
                CreateFileMappingW, MapViewOfFile, OpenFileMappingW, UnmapViewOfFile,
                FILE_MAP_ALL_ACCESS, MEMORY_MAPPED_VIEW_ADDRESS, PAGE_READWRITE,
            },
            Threading::{CreateMutexW, ReleaseMutex, WaitForSingleObject, INFINITE},
        },
    },
};

fn wide_name(name: &str) -> Result<U16CString> {
    Ok(U16CString::from_str(name)?)
}

/// A view of the named file mapping in this process.
pub struct SharedRegion {
    mapping: HANDLE,
    view: MEMORY_MAPPED_VIEW_ADDRESS,
    len: usize,
}

// The view pointer is only dereferenced through `view()`; cross-process
// aliasing is mediated by the gate.
unsafe impl Send for SharedRegion {}

impl SharedRegion {
    /// Attaches to an existing mapping. `Ok(None)` when the host has not
    /// created it yet; the caller retries later.
    pub fn open(name: &str, len: usize) -> Result<Option<Self>> {
        let wide = wide_name(name)?;

        let mapping =
            match unsafe { OpenFileMappingW(FILE_MAP_ALL_ACCESS.0, false, PCWSTR(wide.as_ptr())) }
            {
                Ok(mapping) => mapping,
                Err(e) if e.code() == ERROR_FILE_NOT_FOUND.to_hresult() => return Ok(None),
                Err(e) => bail!("Failed to open shared region {name:?}: {e}"),
            };

        Self::map(mapping, len, name).map(Some)
    }

    /// Creates (or re-opens) the mapping. The object vanishes with its last
    /// handle; there is no name to reclaim.
    pub fn create(name: &str, len: usize) -> Result<Self> {
        let wide = wide_name(name)?;

        let mapping = match unsafe {
            CreateFileMappingW(
                INVALID_HANDLE_VALUE,
                None,
                PAGE_READWRITE,
                0,
                len as u32,
                PCWSTR(wide.as_ptr()),
            )
        } {
            Ok(mapping) => mapping,
            Err(e) => bail!("Failed to create shared region {name:?}: {e}"),
        };

        Self::map(mapping, len, name)
    }

    fn map(mapping: HANDLE, len: usize, name: &str) -> Result<Self> {
        let view = unsafe { MapViewOfFile(mapping, FILE_MAP_ALL_ACCESS, 0, 0, len) };
        if view.Value.is_null() {
            let err = windows::core::Error::from_win32();
            unsafe { CloseHandle(mapping).ok() };

            bail!("Failed to map shared region {name:?}: {err}");
        }

        Ok(Self { mapping, view, len })
    }

    pub fn view(&mut self) -> &mut [u8] {
        unsafe { slice::from_raw_parts_mut(self.view.Value.cast(), self.len) }
    }
}

impl Drop for SharedRegion {
    fn drop(&mut self) {
        unsafe {
            UnmapViewOfFile(self.view).ok();
            CloseHandle(self.mapping).ok();
        }
    }
}

/// Named cross-process mutual exclusion, backed by a Windows named mutex.
/// Whichever process opens first creates the kernel object.
pub struct RegionGate {
    mutex: HANDLE,
}

unsafe impl Send for RegionGate {}
unsafe impl Sync for RegionGate {}

impl RegionGate {
    pub fn open(name: &str) -> Result<Self> {
        let wide = wide_name(name)?;

        let mutex = match unsafe { CreateMutexW(None, false, PCWSTR(wide.as_ptr())) } {
            Ok(mutex) => mutex,
            Err(e) => bail!("Failed to open gate {name:?}: {e}"),
        };

        Ok(Self { mutex })
    }

    fn wait(&self, timeout_ms: u32) -> Result<Option<GateLease>> {
        let event = unsafe { WaitForSingleObject(self.mutex, timeout_ms) };

        // WAIT_ABANDONED means the previous holder died; ownership is still
        // granted and the region contents are at worst one generation stale
        if event == WAIT_OBJECT_0 || event == WAIT_ABANDONED {
            Ok(Some(GateLease { gate: self }))
        } else if event == WAIT_TIMEOUT {
            Ok(None)
        } else {
            bail!(
                "Failed to acquire gate: {}",
                windows::core::Error::from_win32()
            )
        }
    }

    pub fn acquire(&self) -> Result<GateLease> {
        match self.wait(INFINITE)? {
            Some(lease) => Ok(lease),
            None => bail!("Gate wait expired with no timeout set"),
        }
    }

    /// Bounded acquire; `Ok(None)` on expiry so the caller can skip the cycle.
    pub fn acquire_timeout(&self, timeout: Duration) -> Result<Option<GateLease>> {
        self.wait(timeout.as_millis().min(u128::from(INFINITE - 1)) as u32)
    }

    pub fn unlink(_name: &str) {
        // named mutexes vanish with their last handle, nothing to reclaim
    }
}

impl Drop for RegionGate {
    fn drop(&mut self) {
        unsafe { CloseHandle(self.mutex).ok() };
    }
}

/// Holds the gate; dropping releases it on every exit path, panics included.
pub struct GateLease<'a> {
    gate: &'a RegionGate,
}

impl Drop for GateLease<'_> {
    fn drop(&mut self) {
        unsafe { ReleaseMutex(self.gate.mutex).ok() };
    }
}
