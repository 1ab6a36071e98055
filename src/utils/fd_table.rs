/// Descriptor table helpers
///
/// A read-only probe of this process's descriptor table plus the one
/// mutation the fork backend needs in the child: clearing close-on-exec when
/// a dup2 source and target are the same descriptor.
use nix::fcntl::{fcntl, FcntlArg, FdFlag};
use std::os::unix::io::RawFd;

/// Whether `fd` is open in this process
pub fn is_open(fd: RawFd) -> bool {
    fcntl(fd, FcntlArg::F_GETFD).is_ok()
}

/// Clear FD_CLOEXEC so `fd` survives exec.
///
/// Safe to call between fork and exec: no allocation.
pub fn clear_cloexec(fd: RawFd) -> nix::Result<()> {
    let flags = FdFlag::from_bits_truncate(fcntl(fd, FcntlArg::F_GETFD)?);
    fcntl(fd, FcntlArg::F_SETFD(flags & !FdFlag::FD_CLOEXEC))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::io::AsRawFd;

    fn cloexec_set(fd: RawFd) -> bool {
        let flags = fcntl(fd, FcntlArg::F_GETFD).unwrap();
        FdFlag::from_bits_truncate(flags).contains(FdFlag::FD_CLOEXEC)
    }

    #[test]
    fn test_is_open() {
        assert!(is_open(1));
        assert!(!is_open(4000));
    }

    #[test]
    fn test_clear_cloexec() {
        let file = std::fs::File::open("/dev/null").unwrap();
        let fd = file.as_raw_fd();
        // std opens with O_CLOEXEC
        assert!(cloexec_set(fd));
        clear_cloexec(fd).unwrap();
        assert!(!cloexec_set(fd));
    }

    #[test]
    fn test_clear_cloexec_on_closed_fd() {
        assert_eq!(clear_cloexec(4000), Err(nix::errno::Errno::EBADF));
    }
}
