//! A module for thread pool.
//!
//! Request handlers run here so a slow store never holds up the thread that
//! reads from the connection.
use std::{
    io,
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{Arc, Mutex, mpsc},
    thread::{self},
};

use log::error;

/// A trait for thread pools.
///
/// This trait defines the interface for thread pools.
///
pub trait ThreadPool: Send + Sync + Sized + 'static {
    /// Create a new thread pool.
    fn new(threads: usize) -> io::Result<Self>;
    /// Spawn a new job on the thread pool.
    fn spawn<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static;
}

/// A job is a function that can be executed by a thread.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

enum Message {
    NewJob(Job),
    Terminate,
}

/// A fixed set of worker threads sharing one job queue.
pub struct WorkerPool {
    workers: Vec<Worker>,
    sender: mpsc::Sender<Message>,
}

impl ThreadPool for WorkerPool {
    /// Create a new pool with `threads` workers (at least one).
    fn new(threads: usize) -> io::Result<Self> {
        let (sender, receiver) = mpsc::channel();
        let receiver = Arc::new(Mutex::new(receiver));
        let mut workers = Vec::new();
        for id in 0..threads.max(1) {
            workers.push(Worker::new(id, receiver.clone())?);
        }
        Ok(Self { workers, sender })
    }

    fn spawn<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.sender.send(Message::NewJob(Box::new(job))).is_err() {
            error!("worker pool has shut down, dropping job");
        }
    }
}

impl WorkerPool {
    /// Number of worker threads.
    pub fn size(&self) -> usize {
        self.workers.len()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        for _ in &self.workers {
            let _ = self.sender.send(Message::Terminate);
        }

        for worker in &mut self.workers {
            if let Some(thread) = worker.thread.take() {
                if let Err(e) = thread.join() {
                    error!("worker {} join failed: {:?}", worker.id, e);
                }
            }
        }
    }
}

struct Worker {
    id: usize,
    thread: Option<thread::JoinHandle<()>>,
}

impl Worker {
    fn new(id: usize, receiver: Arc<Mutex<mpsc::Receiver<Message>>>) -> io::Result<Self> {
        let thread = thread::Builder::new()
            .name(format!("linedb-worker-{id}"))
            .spawn(move || {
                loop {
                    let msg = match receiver.lock() {
                        Ok(receiver) => receiver.recv(),
                        Err(_) => break,
                    };
                    match msg {
                        Ok(Message::NewJob(job)) => {
                            if let Err(e) = catch_unwind(AssertUnwindSafe(job)) {
                                error!("worker {} job panicked: {:?}", id, e);
                            }
                        }
                        Ok(Message::Terminate) | Err(_) => break,
                    }
                }
            })?;
        Ok(Self {
            id,
            thread: Some(thread),
        })
    }
}
