use std::io;
use std::os::fd::AsRawFd;

/// Number of bytes currently readable on a socket without blocking.
pub(crate) fn available(socket: &impl AsRawFd) -> io::Result<usize> {
    let mut count: libc::c_int = 0;
    // SAFETY: the fd is a valid open socket borrowed from the caller, and
    // FIONREAD writes exactly one c_int through the pointer.
    let rc = unsafe { libc::ioctl(socket.as_raw_fd(), libc::FIONREAD, &mut count) };
    if rc == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(count.max(0) as usize)
}
