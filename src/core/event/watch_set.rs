// Dense set of watched handles laid out the way poll(2) wants them: two
// parallel arrays, slot 0 reserved for the submission channel, active slots
// packed below the high-water mark.
use crate::common::error::{Result, ServerError};
use crate::common::logger::Logger;
use crate::core::event::event::Waited;
use libc::pollfd;
use std::os::unix::io::RawFd;

const UNUSED: pollfd = pollfd {
    fd: -1,
    events: 0,
    revents: 0,
};

pub struct WatchSet<T> {
    pollfd: Vec<pollfd>,
    idx: Vec<Option<Box<Waited<T>>>>,
    hpoll: usize,
    increment: usize,
}

impl<T> WatchSet<T> {
    /// Allocates the first chunk and installs `channel_fd` at slot 0.
    pub fn new(channel_fd: RawFd, increment: usize) -> Self {
        let mut set = Self {
            pollfd: Vec::new(),
            idx: Vec::new(),
            hpoll: 0,
            increment: increment.max(1),
        };
        set.extend();
        set.pollfd[0] = pollfd {
            fd: channel_fd,
            events: libc::POLLIN,
            revents: 0,
        };
        set.hpoll = 1;
        set
    }

    pub fn capacity(&self) -> usize {
        self.pollfd.len()
    }

    /// Active slots including the channel slot.
    pub fn high_water(&self) -> usize {
        self.hpoll
    }

    /// Watched handles, not counting the channel.
    pub fn len(&self) -> usize {
        self.hpoll - 1
    }

    pub fn is_empty(&self) -> bool {
        self.hpoll == 1
    }

    fn extend(&mut self) {
        let inc = self.increment;
        let npoll = self.pollfd.len();
        Logger::debug(&format!(
            "Poll space increased by {} to {}",
            inc,
            npoll + inc
        ));
        self.pollfd.resize(npoll + inc, UNUSED);
        self.idx.resize_with(npoll + inc, || None);
    }

    /// Appends a handle at the high-water mark, growing storage if full.
    pub fn insert(&mut self, w: Box<Waited<T>>) -> Result<()> {
        if w.fd() <= 0 {
            return Err(ServerError::InvariantError(format!(
                "watched handle carries descriptor {}",
                w.fd()
            )));
        }
        if self.hpoll == self.capacity() {
            self.extend();
        }

        let slot = self.hpoll;
        debug_assert_eq!(self.pollfd[slot].fd, -1);
        debug_assert!(self.idx[slot].is_none());
        self.pollfd[slot] = pollfd {
            fd: w.fd(),
            events: libc::POLLIN,
            revents: 0,
        };
        self.idx[slot] = Some(w);
        self.hpoll += 1;
        Ok(())
    }

    /// Swap-deletes `slot`: the last active entry, `revents` included, moves
    /// into it. A caller scanning by index must look at `slot` again.
    pub fn remove(&mut self, slot: usize) -> Option<Box<Waited<T>>> {
        if slot == 0 || slot >= self.hpoll {
            return None;
        }

        self.hpoll -= 1;
        let last = self.hpoll;
        let removed = self.idx[slot].take();
        if slot != last {
            self.pollfd[slot] = self.pollfd[last];
            self.idx[slot] = self.idx[last].take();
        }
        self.pollfd[last] = UNUSED;
        removed
    }

    /// Drops trailing unused slots off the high-water mark.
    pub fn trim(&mut self) {
        while self.hpoll > 1 && self.pollfd[self.hpoll - 1].fd == -1 {
            self.hpoll -= 1;
        }
    }

    /// The slice handed to poll(2).
    pub fn active_mut(&mut self) -> &mut [pollfd] {
        &mut self.pollfd[..self.hpoll]
    }

    pub fn revents(&self, slot: usize) -> i16 {
        self.pollfd[slot].revents
    }

    pub fn channel_ready(&self) -> bool {
        self.pollfd[0].revents != 0
    }

    /// Returns the handle in `slot` after checking it still matches the
    /// descriptor poll(2) saw.
    pub fn get(&self, slot: usize) -> Result<&Waited<T>> {
        let w = self.idx[slot].as_deref().ok_or_else(|| {
            ServerError::InvariantError(format!("slot {} below high-water mark is empty", slot))
        })?;
        if w.fd() <= 0 || w.fd() != self.pollfd[slot].fd {
            return Err(ServerError::InvariantError(format!(
                "slot {} polls fd {} but holds fd {}",
                slot,
                self.pollfd[slot].fd,
                w.fd()
            )));
        }
        Ok(w)
    }

    /// Empties the set, keeping the channel slot and the storage.
    pub fn take_all(&mut self) -> Vec<Box<Waited<T>>> {
        let mut out = Vec::with_capacity(self.len());
        while self.hpoll > 1 {
            if let Some(w) = self.remove(self.hpoll - 1) {
                out.push(w);
            }
        }
        out
    }
}
