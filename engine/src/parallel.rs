// Copyright (c) 2020 White Leaf
//
// This software is released under the MIT License.
// https://opensource.org/licenses/MIT

use parking_lot::Mutex;
use scoped_pool::Pool;
use std::ops::Range;

/// Fixed-size worker pool splitting index ranges into contiguous chunks
pub struct WorkerPool {
    pool: Pool,
    threads: usize,
}

impl WorkerPool {
    pub fn new(threads: usize) -> Self {
        let threads = threads.max(1);
        Self {
            pool: Pool::new(threads),
            threads,
        }
    }

    /// One worker per logical CPU unless a count is given
    pub fn with_threads(threads: Option<usize>) -> Self {
        Self::new(threads.unwrap_or_else(num_cpus::get))
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    fn chunks(&self, len: usize) -> Vec<Range<usize>> {
        let chunk_size = ((len + self.threads - 1) / self.threads).max(1);
        (0..len)
            .step_by(chunk_size)
            .map(|start| start..(start + chunk_size).min(len))
            .collect()
    }

    /// Runs `f` once per chunk of `0..len`, returning when all chunks finished
    pub fn for_each_chunk<F>(&self, len: usize, f: F)
    where
        F: Fn(Range<usize>) + Sync,
    {
        let chunks = self.chunks(len);
        if chunks.len() <= 1 {
            chunks.into_iter().for_each(|chunk| f(chunk));
            return;
        }

        self.pool.scoped(|scope| {
            for chunk in chunks {
                let f = &f;
                scope.execute(move || f(chunk));
            }
        });
    }

    /// Maps `f` over `0..len` keeping the input order
    pub fn map<T, F>(&self, len: usize, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(usize) -> T + Sync,
    {
        let slots: Vec<Mutex<Option<T>>> = (0..len).map(|_| Mutex::new(None)).collect();

        self.for_each_chunk(len, |chunk| {
            for index in chunk {
                *slots[index].lock() = Some(f(index));
            }
        });

        slots.into_iter().filter_map(|slot| slot.into_inner()).collect()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.pool.shutdown();
    }
}
