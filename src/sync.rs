//! # Serialized Access
//!
//! The model itself is single-threaded. When a front end wants to drive a
//! [`Kernel`] from more than one thread (say, an input thread creating
//! processes while a timer thread ticks), every access goes through one
//! lock so mutations of the process table and the memory map never
//! interleave. A whole tick runs under a single acquisition.

use std::sync::Arc;

use spin::Mutex;

use crate::error::SimResult;
use crate::kernel::Kernel;
use crate::scheduler::TickEvent;

/// Cloneable handle to one kernel shared between threads.
#[derive(Clone)]
pub struct SharedKernel {
    inner: Arc<Mutex<Kernel>>,
}

impl SharedKernel {
    pub fn new(kernel: Kernel) -> Self {
        Self {
            inner: Arc::new(Mutex::new(kernel)),
        }
    }

    /// Run `f` with exclusive access to the kernel.
    ///
    /// Keep the closure short: every other user spins until it returns.
    #[inline]
    pub fn with<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut Kernel) -> R,
    {
        let mut kernel = self.inner.lock();
        f(&mut kernel)
    }

    pub fn create_process(&self) -> u32 {
        self.with(|k| k.create_process())
    }

    pub fn set_process_blocked(&self, index: usize, blocked: bool) -> SimResult<()> {
        self.with(|k| k.set_process_blocked(index, blocked))
    }

    /// Both tick phases under one acquisition.
    pub fn tick(&self) -> TickEvent {
        self.with(|k| k.tick())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use std::thread;

    #[test]
    fn test_clones_share_one_kernel() {
        let kernel = Kernel::new(SimConfig::new().with_ram(1000).with_seed(3)).unwrap();
        let shared = SharedKernel::new(kernel);
        let other = shared.clone();
        let pid = other.create_process();
        assert_eq!(shared.with(|k| k.processes().last().map(|p| p.pid)), Some(pid));
    }

    #[test]
    fn test_concurrent_creators_and_ticker() {
        let kernel = Kernel::new(SimConfig::new().with_ram(4096).with_swap(8192).with_seed(11)).unwrap();
        let shared = SharedKernel::new(kernel);

        let creators: Vec<_> = (0..4)
            .map(|_| {
                let handle = shared.clone();
                thread::spawn(move || {
                    for _ in 0..50 {
                        handle.create_process();
                    }
                })
            })
            .collect();

        let ticker = {
            let handle = shared.clone();
            thread::spawn(move || {
                for _ in 0..500 {
                    handle.tick();
                }
            })
        };

        for creator in creators {
            creator.join().unwrap();
        }
        ticker.join().unwrap();

        shared.with(|k| {
            assert!(k.memory().verify().is_ok());
            assert_eq!(k.ticks(), 500);
            let mut pids: Vec<u32> = k.processes().iter().map(|p| p.pid).collect();
            let len = pids.len();
            pids.dedup();
            assert_eq!(pids.len(), len);
            assert!(pids.windows(2).all(|w| w[0] < w[1]));
        });
    }
}
