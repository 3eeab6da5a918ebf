//! Allocation and reclamation of loopback block devices backed by sparse files.
//!
//! `LoopControl` talks to `/dev/loop-control` to find a free device slot and
//! binds it to a freshly created sparse backing file. The resulting
//! [`LoopDevice`] records both paths; the caller owns its lifecycle and must
//! eventually call [`LoopDevice::destroy`], which unbinds the device and then
//! removes the backing file. Nothing is cleaned up implicitly on drop.

pub mod error;
mod sys;

use std::{
    env,
    ffi::c_int,
    fs::{self, File, OpenOptions},
    io,
    os::unix::prelude::*,
    path::{Path, PathBuf},
};

use libc::ioctl;
use rand::{distributions::Alphanumeric, Rng};

use crate::error::{Error, Result};
use crate::sys::{
    IoctlRequest, LOOP_CLR_FD, LOOP_CONTROL, LOOP_CTL_GET_FREE, LOOP_PREFIX, LOOP_SET_FD,
};

const BACKING_NAME_ATTEMPTS: u32 = 16;
const BACKING_SUFFIX_LEN: usize = 10;

/// An active binding between a loop device node and its backing file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopDevice {
    pub device: PathBuf,
    pub backing_file: PathBuf,
}

/// Interface to the loop control device: `/dev/loop-control`.
pub struct LoopControl {
    control: File,
}

impl LoopControl {
    pub fn open() -> Result<Self> {
        let control = OpenOptions::new()
            .read(true)
            .write(true)
            .open(LOOP_CONTROL)
            .map_err(Error::ControlUnavailable)?;
        Ok(Self { control })
    }

    /// Binds a free loop device to a new sparse backing file of exactly
    /// `size` bytes, created in `dir` (the system temp directory when `None`)
    /// with `pattern` as the file name prefix.
    ///
    /// A lost race for the free index surfaces as [`Error::BindFailed`];
    /// retrying the whole allocation is the caller's decision.
    pub fn allocate(&self, dir: Option<&Path>, pattern: &str, size: u64) -> Result<LoopDevice> {
        let index = self.next_free_index()?;
        let device_path = PathBuf::from(format!("{}{}", LOOP_PREFIX, index));
        // The node must be opened read-write before LOOP_SET_FD: the kernel
        // does not let the access mode of a bound device change afterwards.
        let device = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&device_path)?;
        let (backing, backing_path) = create_backing_file(dir, pattern, size)?;
        if let Err(err) = bind(&device, &backing) {
            // Nothing was bound; only the backing file needs unwinding.
            let _ = fs::remove_file(&backing_path);
            return Err(Error::BindFailed(err));
        }
        Ok(LoopDevice {
            device: device_path,
            backing_file: backing_path,
        })
    }

    fn next_free_index(&self) -> Result<i32> {
        let ret = unsafe {
            ioctl(
                self.control.as_raw_fd() as c_int,
                LOOP_CTL_GET_FREE as IoctlRequest,
            )
        };
        if ret < 0 {
            return Err(Error::NoFreeDevice(io::Error::last_os_error()));
        }
        Ok(ret)
    }
}

impl AsRawFd for LoopControl {
    fn as_raw_fd(&self) -> RawFd {
        self.control.as_raw_fd()
    }
}

impl LoopDevice {
    pub fn new(device: impl Into<PathBuf>, backing_file: impl Into<PathBuf>) -> Self {
        LoopDevice {
            device: device.into(),
            backing_file: backing_file.into(),
        }
    }

    /// Unbinds the device from its backing file, then removes the file.
    ///
    /// Unbind always precedes removal: deleting the file while still bound
    /// would leave the device referencing a dead inode. On
    /// [`Error::UnbindFailed`] the backing file is untouched and destroy may
    /// be retried; on [`Error::CleanupFailed`] the device is already unbound
    /// and the unbind must not be reattempted.
    pub fn destroy(&self) -> Result<()> {
        // Read-only is sufficient for LOOP_CLR_FD.
        let device = File::open(&self.device)?;
        let ret = unsafe { ioctl(device.as_raw_fd() as c_int, LOOP_CLR_FD as IoctlRequest, 0) };
        if ret < 0 {
            return Err(Error::UnbindFailed(io::Error::last_os_error()));
        }
        fs::remove_file(&self.backing_file).map_err(Error::CleanupFailed)?;
        Ok(())
    }
}

fn bind(device: &File, backing: &File) -> io::Result<()> {
    let ret = unsafe {
        ioctl(
            device.as_raw_fd() as c_int,
            LOOP_SET_FD as IoctlRequest,
            backing.as_raw_fd() as c_int,
        )
    };
    if ret < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

fn create_backing_file(dir: Option<&Path>, pattern: &str, size: u64) -> Result<(File, PathBuf)> {
    let dir = dir.map(Path::to_path_buf).unwrap_or_else(env::temp_dir);
    for _ in 0..BACKING_NAME_ATTEMPTS {
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(BACKING_SUFFIX_LEN)
            .map(char::from)
            .collect();
        let path = dir.join(format!("{}{}", pattern, suffix));
        let file = match OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(err) => return Err(Error::Io(err)),
        };
        if let Err(err) = file.set_len(size) {
            let _ = fs::remove_file(&path);
            return Err(Error::Io(err));
        }
        return Ok((file, path));
    }
    Err(Error::Io(io::Error::new(
        io::ErrorKind::AlreadyExists,
        "unable to create a uniquely named backing file",
    )))
}
