//! Anonymous shared-memory backing for the pixel buffer.
//!
//! Each allocation creates a uniquely named POSIX shared-memory object,
//! truncates it to the exact pixel-buffer size, maps it read/write, and
//! unlinks the name right away: the backing pages stay reachable through
//! the returned fd (for the compositor-side pool) and the mapping (for
//! the client-side fill), and nothing else.

use std::os::fd::OwnedFd;

use memmap2::{MmapMut, MmapOptions};
use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::sys::mman::{shm_open, shm_unlink};
use nix::sys::stat::Mode;
use nix::unistd::ftruncate;
use rand::{distributions::Alphanumeric, Rng};
use tracing::debug;

use crate::error::SessionError;

/// Attempts before a name collision is treated as fatal.
const NAME_ATTEMPTS: u32 = 8;
const SUFFIX_LEN: usize = 6;

fn random_name() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SUFFIX_LEN)
        .map(char::from)
        .collect();
    format!("/wayview-{suffix}")
}

fn create_shm_fd(len: usize) -> Result<OwnedFd, SessionError> {
    let mut last_collision = Errno::EEXIST;
    for _ in 0..NAME_ATTEMPTS {
        let name = random_name();
        match shm_open(
            name.as_str(),
            OFlag::O_RDWR | OFlag::O_CREAT | OFlag::O_EXCL,
            Mode::S_IRUSR | Mode::S_IWUSR,
        ) {
            Ok(fd) => {
                // The name is only needed for exclusive creation.
                let _ = shm_unlink(name.as_str());
                ftruncate(&fd, len as i64)?;
                return Ok(fd);
            }
            Err(Errno::EEXIST) => {
                debug!(%name, "shared memory name collision, retrying");
                last_collision = Errno::EEXIST;
            }
            Err(err) => return Err(SessionError::Shm(err)),
        }
    }
    Err(SessionError::ShmNameExhausted {
        attempts: NAME_ATTEMPTS,
        source: last_collision,
    })
}

/// Allocates `len` bytes of shared pixel memory.
///
/// Returns the writable mapping together with the fd the compositor-side
/// pool is created from. The caller closes the fd (by dropping it) once
/// the pool handoff is done; dropping the mapping unmaps the region.
pub(crate) fn allocate_pixels(len: usize) -> Result<(MmapMut, OwnedFd), SessionError> {
    let fd = create_shm_fd(len)?;
    let mapping = unsafe { MmapOptions::new().len(len).map_mut(&fd)? };
    debug!(len, "allocated shared pixel memory");
    Ok((mapping, fd))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(1, 1)]
    #[case(200, 200)]
    #[case(400, 300)]
    #[case(1, 1080)]
    fn mapping_covers_exactly_the_pixel_bytes(#[case] width: usize, #[case] height: usize) {
        let len = width * height * 4;
        let (mut mapping, _fd) = allocate_pixels(len).expect("allocation succeeds");

        assert_eq!(mapping.len(), len);
        mapping[0] = 0xAB;
        mapping[len - 1] = 0xCD;
        assert_eq!(mapping[0], 0xAB);
        assert_eq!(mapping[len - 1], 0xCD);
    }

    #[test]
    fn repeated_allocation_does_not_exhaust_the_namespace() {
        // Names are unlinked immediately, so this must never collide its
        // way to ShmNameExhausted.
        for _ in 0..32 {
            let (mapping, _fd) = allocate_pixels(4096).expect("allocation succeeds");
            assert_eq!(mapping.len(), 4096);
        }
    }

    #[test]
    fn names_are_namespaced_and_randomized() {
        let first = random_name();
        let second = random_name();

        assert!(first.starts_with("/wayview-"));
        assert_eq!(first.len(), "/wayview-".len() + SUFFIX_LEN);
        assert_ne!(first, second);
    }
}
