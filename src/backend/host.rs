//! Host-side compute backend.
//!
//! Buffers are vectors of `AtomicU32`, so lanes can share them without
//! locks. Writes and dispatches are queued and applied in issue order when
//! the caller waits or reads back. With the `rayon` feature lanes run on a
//! dedicated thread pool; otherwise they run in lane order on the calling
//! thread.

use crate::backend::kernels::run_lane;
use crate::backend::{BufferHandle, BufferUsage, ComputeBackend, DispatchLimits, KernelId};
use crate::trace::trace_event;
use crate::util::{BackendError, BackendResult};
use std::ops::Range;
use std::sync::atomic::{AtomicU32, Ordering};

const WORD: usize = 4;

/// Host backend configuration.
#[derive(Clone, Debug)]
pub struct BackendConfig {
    /// Lanes per workgroup.
    pub workgroup_size: u32,
    /// Maximum workgroups per dispatch.
    pub max_workgroups_per_dispatch: u32,
    /// Worker threads; `None` lets rayon decide. Ignored without `rayon`.
    pub threads: Option<usize>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        let limits = DispatchLimits::default();
        Self {
            workgroup_size: limits.workgroup_size,
            max_workgroups_per_dispatch: limits.max_workgroups_per_dispatch,
            threads: None,
        }
    }
}

struct HostBuffer {
    usage: BufferUsage,
    words: Vec<AtomicU32>,
}

enum Command {
    Write {
        handle: BufferHandle,
        word_offset: usize,
        words: Vec<u32>,
    },
    Dispatch {
        kernel: KernelId,
        bindings: Vec<BufferHandle>,
        lanes: Range<u32>,
    },
}

/// Compute backend that runs kernels on the host.
pub struct HostBackend {
    limits: DispatchLimits,
    buffers: Vec<Option<HostBuffer>>,
    free: Vec<u32>,
    queue: Vec<Command>,
    #[cfg(feature = "rayon")]
    pool: rayon::ThreadPool,
}

impl HostBackend {
    /// Acquires a backend with the given configuration.
    ///
    /// Fails with [`BackendError::Unavailable`] if the configuration is
    /// unusable or the worker pool cannot be started.
    pub fn new(config: BackendConfig) -> BackendResult<Self> {
        if config.workgroup_size == 0 || config.max_workgroups_per_dispatch == 0 {
            return Err(BackendError::Unavailable {
                reason: "workgroup size and workgroup limit must be non-zero".to_string(),
            });
        }

        #[cfg(feature = "rayon")]
        let pool = {
            let mut builder = rayon::ThreadPoolBuilder::new();
            if let Some(threads) = config.threads {
                builder = builder.num_threads(threads);
            }
            builder
                .thread_name(|idx| format!("pixmorph-lane-{idx}"))
                .build()
                .map_err(|err| BackendError::Unavailable {
                    reason: err.to_string(),
                })?
        };

        Ok(Self {
            limits: DispatchLimits {
                workgroup_size: config.workgroup_size,
                max_workgroups_per_dispatch: config.max_workgroups_per_dispatch,
            },
            buffers: Vec::new(),
            free: Vec::new(),
            queue: Vec::new(),
            #[cfg(feature = "rayon")]
            pool,
        })
    }

    /// Number of live buffers.
    pub fn live_buffers(&self) -> usize {
        self.buffers.iter().filter(|b| b.is_some()).count()
    }

    fn buffer(&self, handle: BufferHandle) -> BackendResult<&HostBuffer> {
        self.buffers
            .get(handle.id() as usize)
            .and_then(Option::as_ref)
            .ok_or(BackendError::UnknownBuffer {
                handle: handle.id(),
            })
    }

    fn flush(&mut self) {
        let queue = std::mem::take(&mut self.queue);
        for command in queue {
            match command {
                Command::Write {
                    handle,
                    word_offset,
                    words,
                } => {
                    // Validated at issue time; a released handle drops the write.
                    if let Ok(buf) = self.buffer(handle) {
                        for (dst, src) in buf.words[word_offset..].iter().zip(words) {
                            dst.store(src, Ordering::Relaxed);
                        }
                    }
                }
                Command::Dispatch {
                    kernel,
                    bindings,
                    lanes,
                } => self.execute(kernel, &bindings, lanes),
            }
        }
    }

    fn execute(&self, kernel: KernelId, bindings: &[BufferHandle], lanes: Range<u32>) {
        let mut slices: Vec<&[AtomicU32]> = Vec::with_capacity(bindings.len());
        for &handle in bindings {
            match self.buffer(handle) {
                Ok(buf) => slices.push(&buf.words),
                Err(_) => return,
            }
        }
        trace_event!("dispatch", kernel = kernel.name(), lanes = lanes.len());

        #[cfg(feature = "rayon")]
        {
            use rayon::prelude::*;
            let slices = &slices;
            self.pool.install(|| {
                lanes
                    .into_par_iter()
                    .for_each(|lane| run_lane(kernel, slices, lane));
            });
        }

        #[cfg(not(feature = "rayon"))]
        for lane in lanes {
            run_lane(kernel, &slices, lane);
        }
    }
}

fn check_aligned(value: usize) -> BackendResult<()> {
    if value % WORD != 0 {
        return Err(BackendError::Misaligned { value });
    }
    Ok(())
}

impl ComputeBackend for HostBackend {
    fn name(&self) -> &str {
        if cfg!(feature = "rayon") {
            "host-rayon"
        } else {
            "host-serial"
        }
    }

    fn limits(&self) -> DispatchLimits {
        self.limits
    }

    fn create_buffer(
        &mut self,
        byte_size: usize,
        usage: BufferUsage,
        initial: Option<&[u8]>,
    ) -> BackendResult<BufferHandle> {
        check_aligned(byte_size)?;
        let mut words: Vec<AtomicU32> = (0..byte_size / WORD).map(|_| AtomicU32::new(0)).collect();
        if let Some(data) = initial {
            check_aligned(data.len())?;
            if data.len() > byte_size {
                return Err(BackendError::OutOfBounds {
                    offset: 0,
                    end: data.len(),
                    size: byte_size,
                });
            }
            let init: Vec<u32> = bytemuck::pod_collect_to_vec(data);
            for (dst, src) in words.iter_mut().zip(init) {
                *dst.get_mut() = src;
            }
        }
        let buffer = Some(HostBuffer { usage, words });

        // Released slots are reused so a long-lived backend stays bounded.
        if let Some(id) = self.free.pop() {
            self.buffers[id as usize] = buffer;
            return Ok(BufferHandle::new(id));
        }
        let id = u32::try_from(self.buffers.len()).map_err(|_| BackendError::Unavailable {
            reason: "buffer handle space exhausted".to_string(),
        })?;
        self.buffers.push(buffer);
        Ok(BufferHandle::new(id))
    }

    fn write_buffer(
        &mut self,
        handle: BufferHandle,
        byte_offset: usize,
        data: &[u8],
    ) -> BackendResult<()> {
        let buf = self.buffer(handle)?;
        if !buf.usage.contains(BufferUsage::COPY_DST) {
            return Err(BackendError::MissingUsage {
                handle: handle.id(),
                usage: "COPY_DST",
            });
        }
        check_aligned(byte_offset)?;
        check_aligned(data.len())?;
        let size = buf.words.len() * WORD;
        let end = byte_offset.saturating_add(data.len());
        if end > size {
            return Err(BackendError::OutOfBounds {
                offset: byte_offset,
                end,
                size,
            });
        }
        self.queue.push(Command::Write {
            handle,
            word_offset: byte_offset / WORD,
            words: bytemuck::pod_collect_to_vec(data),
        });
        Ok(())
    }

    fn dispatch(
        &mut self,
        kernel: KernelId,
        bindings: &[BufferHandle],
        lanes: Range<u32>,
    ) -> BackendResult<()> {
        let expected = kernel.bindings().len();
        if bindings.len() != expected {
            return Err(BackendError::BindingLayout {
                kernel: kernel.name(),
                expected,
                got: bindings.len(),
            });
        }
        for &handle in bindings {
            if !self.buffer(handle)?.usage.is_bindable() {
                return Err(BackendError::MissingUsage {
                    handle: handle.id(),
                    usage: "STORAGE",
                });
            }
        }
        let workgroups = self.limits.workgroups_for(lanes.len() as u32);
        if workgroups > self.limits.max_workgroups_per_dispatch {
            return Err(BackendError::DispatchTooLarge {
                workgroups,
                max: self.limits.max_workgroups_per_dispatch,
            });
        }
        self.queue.push(Command::Dispatch {
            kernel,
            bindings: bindings.to_vec(),
            lanes,
        });
        Ok(())
    }

    fn await_completion(&mut self) -> BackendResult<()> {
        self.flush();
        Ok(())
    }

    fn read_buffer(&mut self, handle: BufferHandle, byte_size: usize) -> BackendResult<Vec<u8>> {
        {
            let buf = self.buffer(handle)?;
            if !buf.usage.contains(BufferUsage::COPY_SRC) {
                return Err(BackendError::MissingUsage {
                    handle: handle.id(),
                    usage: "COPY_SRC",
                });
            }
            check_aligned(byte_size)?;
            let size = buf.words.len() * WORD;
            if byte_size > size {
                return Err(BackendError::OutOfBounds {
                    offset: 0,
                    end: byte_size,
                    size,
                });
            }
        }
        self.flush();
        let buf = self.buffer(handle)?;
        let words: Vec<u32> = buf.words[..byte_size / WORD]
            .iter()
            .map(|w| w.load(Ordering::Relaxed))
            .collect();
        Ok(bytemuck::cast_slice(&words).to_vec())
    }

    fn release_buffer(&mut self, handle: BufferHandle) -> BackendResult<()> {
        self.buffer(handle)?;
        self.flush();
        self.buffers[handle.id() as usize] = None;
        self.free.push(handle.id());
        Ok(())
    }
}
