//! Staging-buffer round trips on real hardware.
//!
//! Run with `cargo test -p ngine_core -- --ignored` on a machine with a
//! discrete Vulkan 1.2 adapter.

use ash::vk;
use ngine_core::config::GraphicsSettings;
use ngine_core::render::vulkan::{VulkanBackend, VulkanError};
use ngine_core::render::{GraphicsBackend, Vertex};

fn headless() -> VulkanBackend {
    ngine_core::foundation::logging::init();
    VulkanBackend::new_headless(&GraphicsSettings::default()).expect("headless graphics core")
}

#[allow(clippy::cast_precision_loss)]
fn vertices(count: usize) -> Vec<Vertex> {
    (0..count)
        .map(|i| {
            let f = i as f32;
            Vertex::new([f, -f, f * 0.5], [0.25, 0.5, 0.75], [f / 10.0, 1.0 - f / 10.0])
        })
        .collect()
}

fn round_trip(data: &[Vertex]) -> Result<Vec<u8>, VulkanError> {
    let core = headless();
    let buffer = core
        .resources()
        .upload_device_local(data, vk::BufferUsageFlags::VERTEX_BUFFER, "vertex")?;
    core.resources().read_back_buffer(&buffer)
}

#[test]
#[ignore = "needs a Vulkan device"]
fn single_vertex_round_trips() {
    let data = vertices(1);
    let bytes = round_trip(&data).unwrap();
    assert_eq!(bytes, bytemuck::cast_slice::<Vertex, u8>(&data));
}

#[test]
#[ignore = "needs a Vulkan device"]
fn ten_thousand_vertices_round_trip() {
    let data = vertices(10_000);
    let bytes = round_trip(&data).unwrap();
    assert_eq!(bytes.len(), 10_000 * std::mem::size_of::<Vertex>());
    assert_eq!(bytes, bytemuck::cast_slice::<Vertex, u8>(&data));
}

#[test]
#[ignore = "needs a Vulkan device"]
fn empty_upload_is_rejected() {
    let result = round_trip(&[]);
    assert!(matches!(result, Err(VulkanError::EmptyUpload("vertex"))));
}

#[test]
#[ignore = "needs a Vulkan device"]
fn destroyed_model_handle_becomes_unknown() {
    let mut core = headless();
    let quad = [
        Vertex::new([-0.5, -0.5, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0]),
        Vertex::new([0.5, -0.5, 0.0], [0.0, 1.0, 0.0], [1.0, 0.0]),
        Vertex::new([0.5, 0.5, 0.0], [0.0, 0.0, 1.0], [1.0, 1.0]),
    ];
    let model = core.create_model_from_vertex_list(&quad, &[0, 1, 2]).unwrap();
    assert_eq!(core.resources().model(model).unwrap().meshes()[0].index_count(), 3);

    core.destroy_model(model).unwrap();
    assert!(matches!(
        core.destroy_model(model),
        Err(VulkanError::UnknownModel(handle)) if handle == model
    ));
}
