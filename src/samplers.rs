//! Fixed sampler set: the 4 filter/address-mode combinations every
//! texture binding uses, plus the MAX-reduction sampler the depth
//! pyramid's downsample pass requires.

/// The 4 standard sampler variants: {linear, nearest} x {clamp, repeat}.
pub struct Samplers {
    pub linear_clamp: wgpu::Sampler,
    pub linear_repeat: wgpu::Sampler,
    pub nearest_clamp: wgpu::Sampler,
    pub nearest_repeat: wgpu::Sampler,
}

impl Samplers {
    #[must_use]
    pub fn new(device: &wgpu::Device) -> Self {
        let make = |filter: wgpu::FilterMode, address: wgpu::AddressMode, label: &str| {
            device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some(label),
                address_mode_u: address,
                address_mode_v: address,
                address_mode_w: address,
                mag_filter: filter,
                min_filter: filter,
                mipmap_filter: filter,
                ..Default::default()
            })
        };

        Self {
            linear_clamp: make(wgpu::FilterMode::Linear, wgpu::AddressMode::ClampToEdge, "linear_clamp"),
            linear_repeat: make(wgpu::FilterMode::Linear, wgpu::AddressMode::Repeat, "linear_repeat"),
            nearest_clamp: make(wgpu::FilterMode::Nearest, wgpu::AddressMode::ClampToEdge, "nearest_clamp"),
            nearest_repeat: make(wgpu::FilterMode::Nearest, wgpu::AddressMode::Repeat, "nearest_repeat"),
        }
    }
}

/// A linear-min/mag, nearest-mip sampler with MAX reduction mode, used
/// for the depth pyramid's 2x2 downsample so that a forward-Z buffer's
/// farthest depth within each texel survives reduction (conservative
/// for occlusion rejection).
#[must_use]
pub fn depth_reduce_sampler(device: &wgpu::Device) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("depth_reduce_max"),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::FilterMode::Nearest,
        reduction_mode: wgpu::SamplerReductionMode::Max,
        ..Default::default()
    })
}
