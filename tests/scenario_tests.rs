//! Device-backed scenario tests (core spec §8) that need a real
//! `wgpu::Device`/`Queue`, unlike `tests/lifecycle_tests.rs`:
//! - S3: point-light lifecycle — `create_light`/`destroy_light` owns
//!   and releases a spherical shadow camera.
//! - S6: per-frame isolation — a `PerFrameBindless<T, F>` write to
//!   frame `f` never touches frame `g != f`.
//!
//! Skipped (not failed) when the environment has no adapter at all,
//! which is the common case for a headless CI runner without a GPU or
//! a software Vulkan/Metal/DX12 implementation installed.

use std::sync::{mpsc, Arc};

use glam::Vec3;
use mjolnir::{LightType, Manager, ManagerConfig, PerFrameBindless, ShadowCamera};

fn request_device() -> Option<(Arc<wgpu::Device>, Arc<wgpu::Queue>)> {
    let _ = env_logger::try_init();
    pollster::block_on(async {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::LowPower,
                force_fallback_adapter: true,
                compatible_surface: None,
            })
            .await
            .ok()?;
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("mjolnir_scenario_tests"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults(),
                ..Default::default()
            })
            .await
            .ok()?;
        Some((Arc::new(device), Arc::new(queue)))
    })
}

/// Shrink every capacity so init is cheap under a fallback adapter —
/// these tests only ever allocate one or two of anything.
fn small_config() -> ManagerConfig {
    ManagerConfig {
        max_meshes: 4,
        max_materials: 4,
        max_textures: 4,
        max_cube_textures: 2,
        max_nodes: 4,
        max_cameras: 2,
        max_lights: 2,
        max_emitters: 1,
        max_force_fields: 1,
        max_sprites: 1,
        shadow_map_size: 32,
        max_draws_per_camera: 16,
        max_draws_per_shadow: 16,
        ..ManagerConfig::default()
    }
}

fn read_u32_via_staging(device: &wgpu::Device, queue: &wgpu::Queue, buffer: &wgpu::Buffer) -> u32 {
    let staging = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("scenario_test_staging"),
        size: 4,
        usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });
    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
    encoder.copy_buffer_to_buffer(buffer, 0, &staging, 0, 4);
    queue.submit(Some(encoder.finish()));

    let slice = staging.slice(..);
    let (sender, receiver) = mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = sender.send(result);
    });
    device.poll(wgpu::MaintainBase::Wait).panic_on_timeout();
    receiver.recv().unwrap().unwrap();
    let data = slice.get_mapped_range();
    let value = u32::from_ne_bytes(data[..4].try_into().unwrap());
    drop(data);
    staging.unmap();
    value
}

#[test]
fn s3_point_light_lifecycle_owns_and_releases_a_spherical_shadow_camera() {
    let Some((device, queue)) = request_device() else {
        eprintln!("skipping s3: no wgpu adapter available in this environment");
        return;
    };
    let mut manager = Manager::new(device, queue, small_config()).expect("manager init should succeed");

    let handle = manager
        .create_light(LightType::Point, 0, Vec3::ONE, 1.0, 5.0, 0.0, 0.0, true)
        .expect("shadow-casting point light should allocate a spherical camera");

    let light = manager.light(handle).expect("light must exist right after creation");
    assert!(
        matches!(light.shadow_camera, ShadowCamera::Spherical(_)),
        "POINT light with cast_shadow must own a spherical shadow camera"
    );

    manager.destroy_light(handle);
    assert!(manager.light(handle).is_none(), "destroy_light must free the light's own pool slot");
    // The owned spherical camera and its cube-depth images are released
    // inside destroy_light; there is no public accessor to assert on
    // the now-private spherical-camera pool directly, matching the core
    // spec's own wording that the light, not its shadow camera, is the
    // resource callers name.
}

#[test]
fn s6_per_frame_bindless_write_to_one_frame_does_not_touch_the_other() {
    let Some((device, queue)) = request_device() else {
        eprintln!("skipping s6: no wgpu adapter available in this environment");
        return;
    };

    let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("scenario_test_storage_layout"),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only: false },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
    });

    let per_frame: PerFrameBindless<u32, 2> =
        PerFrameBindless::new(&device, &layout, 0, 4, wgpu::BufferUsages::empty(), "scenario_test_per_frame")
            .expect("per-frame buffer alloc should succeed");

    per_frame.write(&queue, 0, 0, &111u32).unwrap();
    per_frame.write(&queue, 1, 0, &222u32).unwrap();

    let frame0 = read_u32_via_staging(&device, &queue, &per_frame.buffers[0]);
    let frame1 = read_u32_via_staging(&device, &queue, &per_frame.buffers[1]);

    assert_eq!(frame0, 111, "frame 0's write must not be overwritten by frame 1's");
    assert_eq!(frame1, 222, "frame 1's write must not be overwritten by frame 0's");
}
