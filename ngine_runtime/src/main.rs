//! Ngine runtime
//!
//! Opens a window, loads the MVP shader, a vertex-list quad and an OBJ cube,
//! and flies a camera around them with WASD/QE and the arrow keys.

use std::collections::HashSet;
use std::error::Error;
use std::path::Path;
use std::time::Instant;

use ngine_core::prelude::*;

const CONFIG_PATH: &str = "resources/ngine.toml";
const SHADER_DIR: &str = env!("NGINE_SHADER_DIR");
const RESOURCE_DIR: &str = env!("NGINE_RESOURCE_DIR");

/// Units per second
const MOVE_SPEED: f32 = 2.5;
/// Degrees per second
const TURN_SPEED: f32 = 90.0;

const QUAD_VERTICES: [Vertex; 4] = [
    Vertex::new([-0.5, -0.5, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0]),
    Vertex::new([0.5, -0.5, 0.0], [0.0, 1.0, 0.0], [1.0, 0.0]),
    Vertex::new([0.5, 0.5, 0.0], [0.0, 0.0, 1.0], [1.0, 1.0]),
    Vertex::new([-0.5, 0.5, 0.0], [1.0, 1.0, 1.0], [0.0, 1.0]),
];
const QUAD_INDICES: [u32; 6] = [0, 1, 2, 2, 3, 0];

#[allow(clippy::cast_precision_loss)]
fn aspect_ratio(width: u32, height: u32) -> f32 {
    if height == 0 {
        1.0
    } else {
        width as f32 / height as f32
    }
}

fn fly_camera(camera: &mut Camera, held: &HashSet<Key>, dt: f32) {
    let mut movement = Vec3::zeros();
    for (key, direction) in [
        (Key::W, camera.forward()),
        (Key::S, camera.back()),
        (Key::D, camera.right()),
        (Key::A, camera.left()),
        (Key::E, Vec3::y()),
        (Key::Q, -Vec3::y()),
    ] {
        if held.contains(&key) {
            movement += direction;
        }
    }
    if movement != Vec3::zeros() {
        camera.adjust_position(movement.normalize() * MOVE_SPEED * dt);
    }

    let mut turn = Vec3::zeros();
    for (key, delta) in [
        (Key::Left, Vec3::new(0.0, 1.0, 0.0)),
        (Key::Right, Vec3::new(0.0, -1.0, 0.0)),
        (Key::Up, Vec3::new(1.0, 0.0, 0.0)),
        (Key::Down, Vec3::new(-1.0, 0.0, 0.0)),
    ] {
        if held.contains(&key) {
            turn += delta;
        }
    }
    if turn != Vec3::zeros() {
        camera.adjust_rotation(turn * TURN_SPEED * dt);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let config_path = Path::new(RESOURCE_DIR).join("ngine.toml");
    let config = if Path::new(CONFIG_PATH).exists() {
        StartupConfig::load_or_default(CONFIG_PATH)?
    } else {
        StartupConfig::load_or_default(&config_path)?
    };
    log::info!(
        "Starting {}x{} ({})",
        config.window.width,
        config.window.height,
        if config.window.fullscreen { "fullscreen" } else { "windowed" }
    );

    let mut window = Window::new("Ngine Runtime", &config.window)?;
    let mut core = GraphicsCore::new(&mut window, &config)?;
    log::info!("Rendering on {}", core.adapter_name());

    let shader_dir = Path::new(SHADER_DIR);
    let shader = core.load_shader(&shader_dir.join("mvp.vert.spv"), &shader_dir.join("mvp.frag.spv"))?;
    let quad = core.create_model_from_vertex_list(&QUAD_VERTICES, &QUAD_INDICES)?;
    let cube = core.load_model_from_file(&Path::new(RESOURCE_DIR).join("models/cube.obj"))?;

    core.add_game_object_to_draw_list(
        GameObject::new(shader, quad).with_translation(Vec3::new(-1.0, 0.0, 0.0)),
    )?;
    let spinning = core.add_game_object_to_draw_list(
        GameObject::new(shader, cube)
            .with_translation(Vec3::new(1.0, 0.0, 0.0))
            .with_scale(Vec3::new(0.75, 0.75, 0.75)),
    )?;

    let (width, height) = window.framebuffer_size();
    let mut camera = Camera::new(60.0, aspect_ratio(width, height), 0.01, 1000.0);
    camera.set_position(Vec3::new(0.0, 0.0, 4.0));

    let mut events = EventQueue::new();
    let mut held = HashSet::new();
    let mut last_tick = Instant::now();

    while window.update(&mut events) {
        for event in events.drain() {
            match event {
                Event::KeyAction { key: Key::Escape, pressed: true } => window.set_should_close(true),
                Event::KeyAction { key, pressed: true } => {
                    held.insert(key);
                }
                Event::KeyAction { key, pressed: false } => {
                    held.remove(&key);
                }
                Event::WindowResize { width, height } => {
                    log::debug!("Window resized to {}x{}", width, height);
                    if width > 0 && height > 0 {
                        camera.set_projection_values(60.0, aspect_ratio(width, height), 0.01, 1000.0);
                    }
                }
                Event::CursorMove { .. } => {}
            }
        }

        let now = Instant::now();
        let dt = now.duration_since(last_tick).as_secs_f32();
        last_tick = now;

        fly_camera(&mut camera, &held, dt);
        if let Some(mut object) = core.game_object_mut(spinning) {
            object.adjust_rotation(Vec3::new(0.0, 45.0 * dt, 0.0));
        }

        core.set_camera(&camera);
        core.draw_frame(&mut window)?;
    }

    core.wait_idle()?;
    log::info!("Shutting down");
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    ngine_core::foundation::logging::init();

    run().map_err(|err| {
        log::error!("Fatal: {}", err);
        err
    })
}
