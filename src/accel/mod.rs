//! Accelerator Probe: deteksi compute accelerator sekali saat startup
//!
//! Pure query - probe tidak pernah memutasi state bus. Bus memakai
//! hasilnya bersama `prefer_accelerator` dan threshold ukuran payload
//! untuk memutuskan staging.
//!
//! Path accelerator adalah optimisasi, bukan requirement fungsional:
//! error apapun di jalur ini fail over diam-diam ke path standar.
//! Dukungan GPU di-gate feature `gpu` (wgpu); tanpa feature, probe
//! selalu melaporkan tidak tersedia.

use std::sync::OnceLock;

/// Payload di bawah ini tidak pernah di-stage; overhead transfer lebih
/// mahal dari copy biasa.
pub const STAGING_THRESHOLD: usize = 16 * 1024;

/// Deskriptor kemampuan accelerator yang terdeteksi.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcceleratorCaps {
    pub available: bool,
    /// Batas memori buffer accelerator dalam bytes.
    pub memory_size: u64,
    /// Kelas kemampuan compute (0 = tidak ada, makin besar makin mampu).
    pub compute_capability: u32,
    /// Jumlah unit paralel maksimum per dispatch.
    pub max_parallel_units: u32,
}

impl AcceleratorCaps {
    pub const fn none() -> Self {
        Self {
            available: false,
            memory_size: 0,
            compute_capability: 0,
            max_parallel_units: 0,
        }
    }
}

/// Probe accelerator. Deteksi jalan sekali dan hasilnya di-cache
/// selama proses hidup.
pub fn probe() -> AcceleratorCaps {
    static CAPS: OnceLock<AcceleratorCaps> = OnceLock::new();
    *CAPS.get_or_init(detect)
}

/// Stage payload ke memori accelerator sebelum insersi ring.
///
/// Returns `true` kalau staging sukses. `false` berarti caller harus
/// lanjut lewat path standar - tidak pernah error ke caller.
pub fn stage_payload(payload: &[u8]) -> bool {
    if payload.len() < STAGING_THRESHOLD {
        return false;
    }
    backend::stage(payload)
}

fn detect() -> AcceleratorCaps {
    backend::detect()
}

#[cfg(feature = "gpu")]
mod backend {
    use super::AcceleratorCaps;
    use std::sync::OnceLock;

    struct Stager {
        queue: wgpu::Queue,
        buffer: wgpu::Buffer,
        _device: wgpu::Device,
    }

    static STAGER: OnceLock<Option<Stager>> = OnceLock::new();

    fn stager() -> Option<&'static Stager> {
        STAGER.get_or_init(init_stager).as_ref()
    }

    fn init_stager() -> Option<Stager> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
        let adapter = instance
            .enumerate_adapters(wgpu::Backends::all())
            .into_iter()
            .find(|a| a.get_info().device_type != wgpu::DeviceType::Cpu)?;

        let (device, queue) = pollster::block_on(
            adapter.request_device(&wgpu::DeviceDescriptor::default(), None),
        )
        .ok()?;

        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("iris-staging"),
            size: crate::protocol::MAX_PAYLOAD_SIZE as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::STORAGE,
            mapped_at_creation: false,
        });

        Some(Stager {
            queue,
            buffer,
            _device: device,
        })
    }

    pub(super) fn detect() -> AcceleratorCaps {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
        let adapter = instance
            .enumerate_adapters(wgpu::Backends::all())
            .into_iter()
            .find(|a| a.get_info().device_type != wgpu::DeviceType::Cpu);

        match adapter {
            Some(adapter) => {
                let info = adapter.get_info();
                let limits = adapter.limits();
                AcceleratorCaps {
                    available: true,
                    memory_size: limits.max_buffer_size,
                    compute_capability: backend_class(info.backend),
                    max_parallel_units: limits.max_compute_invocations_per_workgroup,
                }
            }
            None => AcceleratorCaps::none(),
        }
    }

    /// Kelas kasar per backend; pengganti CUDA compute capability yang
    /// vendor-spesifik.
    fn backend_class(backend: wgpu::Backend) -> u32 {
        match backend {
            wgpu::Backend::Vulkan => 30,
            wgpu::Backend::Metal | wgpu::Backend::Dx12 => 20,
            wgpu::Backend::Gl | wgpu::Backend::BrowserWebGpu => 10,
            _ => 1,
        }
    }

    pub(super) fn stage(payload: &[u8]) -> bool {
        match stager() {
            Some(stager) => {
                stager.queue.write_buffer(&stager.buffer, 0, payload);
                stager.queue.submit(std::iter::empty());
                true
            }
            None => false,
        }
    }
}

#[cfg(not(feature = "gpu"))]
mod backend {
    use super::AcceleratorCaps;

    pub(super) fn detect() -> AcceleratorCaps {
        AcceleratorCaps::none()
    }

    pub(super) fn stage(_payload: &[u8]) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_is_stable() {
        // Hasil probe di-cache: dua panggilan identik
        assert_eq!(probe(), probe());
    }

    #[test]
    fn test_small_payload_never_staged() {
        assert!(!stage_payload(&[0u8; 64]));
    }

    #[cfg(not(feature = "gpu"))]
    #[test]
    fn test_unavailable_without_gpu_feature() {
        let caps = probe();
        assert!(!caps.available);
        assert_eq!(caps, AcceleratorCaps::none());
        assert!(!stage_payload(&[0u8; STAGING_THRESHOLD]));
    }
}
