//! Bindless storage buffers: a device buffer plus a descriptor-set
//! (`wgpu::BindGroup`) binding, indexed by shaders via a stable slot.
//!
//! Three write disciplines, matching the three shapes the spec
//! describes:
//!
//! - [`Bindless<T>`] — one buffer, one bind group. Writes are visible to
//!   every in-flight frame; the caller owns the no-read-during-write
//!   discipline.
//! - [`PerFrameBindless<T, F>`] — `F` buffers and bind groups, selected
//!   by frame index. A write to frame `f` never touches frame `g != f`.
//! - [`Immutable<T>`] — one device-local buffer, written exactly once
//!   during resource creation.

use std::marker::PhantomData;
use wgpu::util::DeviceExt;

use crate::errors::{MjolnirError, Result};

fn buffer_label(kind: &str) -> Option<&str> {
    Some(kind)
}

/// One device buffer bound at a fixed binding index, host-writable via
/// `queue.write_buffer`.
pub struct Bindless<T> {
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    capacity: u32,
    _marker: PhantomData<T>,
}

impl<T: bytemuck::Pod> Bindless<T> {
    /// Allocate a zero-initialized buffer with room for `capacity`
    /// elements of `T`, and bind it at `binding` in a bind group built
    /// from `layout`.
    pub fn new(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        binding: u32,
        capacity: u32,
        usage: wgpu::BufferUsages,
        label: &str,
    ) -> Result<Self> {
        let size = (capacity as u64) * std::mem::size_of::<T>() as u64;
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: buffer_label(label),
            size: size.max(std::mem::size_of::<T>() as u64),
            usage: usage | wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: buffer_label(label),
            layout,
            entries: &[wgpu::BindGroupEntry { binding, resource: buffer.as_entire_binding() }],
        });
        Ok(Self { buffer, bind_group, capacity, _marker: PhantomData })
    }

    /// Write `value` at `slot`. Visible to every frame that has not yet
    /// completed since this write — the caller arranges that no such
    /// frame is still reading `slot`.
    pub fn write(&self, queue: &wgpu::Queue, slot: u32, value: &T) -> Result<()> {
        if slot >= self.capacity {
            log::error!("bindless write slot {slot} out of range (capacity {})", self.capacity);
            return Err(MjolnirError::CapacityExhausted { resource: "Bindless::write" });
        }
        let offset = u64::from(slot) * std::mem::size_of::<T>() as u64;
        queue.write_buffer(&self.buffer, offset, bytemuck::bytes_of(value));
        Ok(())
    }

    #[must_use]
    pub fn capacity(&self) -> u32 {
        self.capacity
    }
}

/// `F` device buffers and bind groups, one per frame in flight.
pub struct PerFrameBindless<T, const F: usize> {
    pub buffers: [wgpu::Buffer; F],
    pub bind_groups: [wgpu::BindGroup; F],
    capacity: u32,
    _marker: PhantomData<T>,
}

impl<T: bytemuck::Pod, const F: usize> PerFrameBindless<T, F> {
    pub fn new(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        binding: u32,
        capacity: u32,
        usage: wgpu::BufferUsages,
        label: &str,
    ) -> Result<Self> {
        let size = (capacity as u64) * std::mem::size_of::<T>() as u64;
        let mut buffers: Vec<wgpu::Buffer> = Vec::with_capacity(F);
        let mut bind_groups: Vec<wgpu::BindGroup> = Vec::with_capacity(F);
        for frame in 0..F {
            let buffer = device.create_buffer(&wgpu::BufferDescriptor {
                label: buffer_label(label),
                size: size.max(std::mem::size_of::<T>() as u64),
                usage: usage | wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: buffer_label(label),
                layout,
                entries: &[wgpu::BindGroupEntry { binding, resource: buffer.as_entire_binding() }],
            });
            buffers.push(buffer);
            bind_groups.push(bind_group);
            let _ = frame;
        }
        Ok(Self {
            buffers: buffers.try_into().unwrap_or_else(|_| unreachable!()),
            bind_groups: bind_groups.try_into().unwrap_or_else(|_| unreachable!()),
            capacity,
            _marker: PhantomData,
        })
    }

    /// Write `value` at `slot` in frame `frame`'s buffer only.
    pub fn write(&self, queue: &wgpu::Queue, frame: usize, slot: u32, value: &T) -> Result<()> {
        if slot >= self.capacity {
            return Err(MjolnirError::CapacityExhausted { resource: "PerFrameBindless::write" });
        }
        let offset = u64::from(slot) * std::mem::size_of::<T>() as u64;
        queue.write_buffer(&self.buffers[frame % F], offset, bytemuck::bytes_of(value));
        Ok(())
    }

    #[must_use]
    pub fn capacity(&self) -> u32 {
        self.capacity
    }
}

/// A device-local buffer written exactly once, at creation.
pub struct Immutable<T> {
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    _marker: PhantomData<T>,
}

impl<T: bytemuck::Pod> Immutable<T> {
    /// Stage `data` into a device-local buffer via `create_buffer_init`,
    /// and bind it at `binding` in a bind group built from `layout`.
    pub fn new(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        binding: u32,
        data: &[T],
        usage: wgpu::BufferUsages,
        label: &str,
    ) -> Self {
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: buffer_label(label),
            contents: bytemuck::cast_slice(data),
            usage: usage | wgpu::BufferUsages::STORAGE,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: buffer_label(label),
            layout,
            entries: &[wgpu::BindGroupEntry { binding, resource: buffer.as_entire_binding() }],
        });
        Self { buffer, bind_group, _marker: PhantomData }
    }
}
