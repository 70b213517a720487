//! Device acquisition and small helpers around wgpu's asynchronous calls

use crate::error::GpuError;

/// Headless adapter suitable for compute work.
pub async fn request_adapter(instance: &wgpu::Instance) -> Result<wgpu::Adapter, GpuError> {
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        })
        .await?;
    Ok(adapter)
}

/// Device and queue for the simulator. Fails if the adapter cannot run compute shaders.
pub async fn request_device(
    adapter: &wgpu::Adapter,
) -> Result<(wgpu::Device, wgpu::Queue), GpuError> {
    let capabilities = adapter.get_downlevel_capabilities();
    if !capabilities
        .flags
        .contains(wgpu::DownlevelFlags::COMPUTE_SHADERS)
    {
        return Err(GpuError::ComputeUnsupported);
    }

    log::info!("Using GPU: {}", adapter.get_info().name);

    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: Some("Sparkle Device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::downlevel_defaults().using_resolution(adapter.limits()),
            memory_hints: wgpu::MemoryHints::default(),
            experimental_features: wgpu::ExperimentalFeatures::default(),
            trace: wgpu::Trace::Off,
        })
        .await?;
    Ok((device, queue))
}

/// Run `f` inside a validation error scope and turn a captured error into [`GpuError::Validation`].
///
/// Errors returned by `f` itself take precedence over anything the scope caught.
pub fn validation_scope<T, E>(
    device: &wgpu::Device,
    context: &'static str,
    f: impl FnOnce() -> Result<T, E>,
) -> Result<T, E>
where
    E: From<GpuError>,
{
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let result = f();
    let error = pollster::block_on(device.pop_error_scope());
    let value = result?;
    match error {
        Some(error) => Err(GpuError::Validation {
            context,
            message: error.to_string(),
        }
        .into()),
        None => Ok(value),
    }
}

/// Map `buffer`, wait for the mapping, and hand the mapped bytes to `f`.
fn with_mapping<R>(
    device: &wgpu::Device,
    buffer: &wgpu::Buffer,
    mode: wgpu::MapMode,
    f: impl FnOnce(&wgpu::BufferSlice<'_>) -> R,
) -> Result<R, GpuError> {
    let slice = buffer.slice(..);
    let (sender, receiver) = crossbeam_channel::bounded(1);
    slice.map_async(mode, move |result| {
        let _ = sender.send(result);
    });

    // A buffer no in-flight work touches maps on the first poll; otherwise block until it does.
    device.poll(wgpu::PollType::Poll)?;
    let result = match receiver.try_recv() {
        Ok(result) => result,
        Err(_) => {
            device.poll(wgpu::PollType::Wait {
                submission_index: None,
                timeout: None,
            })?;
            receiver.recv().map_err(|_| GpuError::MappingAborted)?
        }
    };
    result?;

    let value = f(&slice);
    buffer.unmap();
    Ok(value)
}

/// Write `bytes` to the start of a `MAP_WRITE` buffer.
pub fn write_mapped(
    device: &wgpu::Device,
    buffer: &wgpu::Buffer,
    bytes: &[u8],
) -> Result<(), GpuError> {
    with_mapping(device, buffer, wgpu::MapMode::Write, |slice| {
        slice.get_mapped_range_mut()[..bytes.len()].copy_from_slice(bytes);
    })
}

/// Read the whole contents of a `MAP_READ` buffer.
pub fn read_mapped(device: &wgpu::Device, buffer: &wgpu::Buffer) -> Result<Vec<u8>, GpuError> {
    with_mapping(device, buffer, wgpu::MapMode::Read, |slice| {
        slice.get_mapped_range().to_vec()
    })
}
