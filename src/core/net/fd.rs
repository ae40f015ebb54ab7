use crate::common::error::{Result, ServerError};
use std::io;
use std::os::unix::io::{AsRawFd, RawFd};

pub struct FileDescriptor {
    fd: RawFd,
    owned: bool,
}

impl FileDescriptor {
    pub fn new(fd: RawFd) -> Self {
        Self { fd, owned: false }
    }

    pub fn from_raw(fd: RawFd) -> Self {
        Self { fd, owned: true }
    }

    /// Creates a pipe, returning `(read_end, write_end)`. Both ends are owned
    /// and close-on-exec.
    pub fn pipe() -> Result<(Self, Self)> {
        let mut fds = [-1 as RawFd; 2];
        if unsafe { libc::pipe(fds.as_mut_ptr()) } < 0 {
            return Err(ServerError::ChannelError(format!(
                "Failed to create pipe: {}",
                io::Error::last_os_error()
            )));
        }

        let read_end = Self::from_raw(fds[0]);
        let write_end = Self::from_raw(fds[1]);
        read_end.set_cloexec()?;
        write_end.set_cloexec()?;
        Ok((read_end, write_end))
    }

    pub fn as_raw_fd(&self) -> RawFd {
        self.fd
    }

    pub fn set_non_blocking(&self) -> Result<()> {
        unsafe {
            let flags = libc::fcntl(self.fd, libc::F_GETFL);
            if flags < 0 {
                return Err(ServerError::IoError(io::Error::last_os_error()));
            }

            if libc::fcntl(self.fd, libc::F_SETFL, flags | libc::O_NONBLOCK) < 0 {
                return Err(ServerError::IoError(io::Error::last_os_error()));
            }
        }
        Ok(())
    }

    pub fn set_cloexec(&self) -> Result<()> {
        unsafe {
            let flags = libc::fcntl(self.fd, libc::F_GETFD);
            if flags < 0 {
                return Err(ServerError::IoError(io::Error::last_os_error()));
            }

            if libc::fcntl(self.fd, libc::F_SETFD, flags | libc::FD_CLOEXEC) < 0 {
                return Err(ServerError::IoError(io::Error::last_os_error()));
            }
        }
        Ok(())
    }

    /// One `read(2)`, retried only on `EINTR`.
    pub fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            let n = unsafe { libc::read(self.fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len()) };
            if n >= 0 {
                return Ok(n as usize);
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        }
    }

    /// One `write(2)`, retried only on `EINTR` (nothing was written then).
    pub fn write(&self, buf: &[u8]) -> io::Result<usize> {
        loop {
            let n = unsafe { libc::write(self.fd, buf.as_ptr() as *const libc::c_void, buf.len()) };
            if n >= 0 {
                return Ok(n as usize);
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        }
    }
}

impl AsRawFd for FileDescriptor {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl Drop for FileDescriptor {
    fn drop(&mut self) {
        if self.owned && self.fd >= 0 {
            unsafe {
                libc::close(self.fd);
            }
        }
    }
}
