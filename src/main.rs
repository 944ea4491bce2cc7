use std::error::Error;
use std::ffi::c_void;
use std::fmt::Display;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Instant;

use clap::Parser;
use glam::Vec2;
use sdl2::event::{Event, WindowEvent};
use sdl2::keyboard::{Keycode, Scancode};
use sdl2::video::GLProfile;
use simple_logger::SimpleLogger;

use lit_scene::camera::{Camera, InputState};
use lit_scene::config::Config;
use lit_scene::renderer::{GlBackend, Gpu, Renderer};

#[derive(Parser, Debug)]
#[clap(name = "lit-scene", version, about = "Phong-lit OpenGL scene viewer")]
struct Args {
    /// glTF or GLB file to show instead of the cubes
    #[clap(long)]
    model: Option<PathBuf>,
    #[clap(long)]
    width: Option<u32>,
    #[clap(long)]
    height: Option<u32>,
    /// Directory containing `shaders/` and `resources/`
    #[clap(long, default_value = ".")]
    assets: PathBuf,
}

impl Args {
    fn into_config(self) -> Config {
        let mut config = Config::with_assets(&self.assets);
        config.model = self.model;
        if let Some(width) = self.width {
            config.width = width;
        }
        if let Some(height) = self.height {
            config.height = height;
        }
        config
    }
}

fn main() {
    if SimpleLogger::new()
        .with_level(log::LevelFilter::Info)
        .env()
        .init()
        .is_err()
    {
        eprintln!("Failed to init logger");
    }

    let config = Args::parse().into_config();
    if let Err(err) = run(&config) {
        log::error!("{err:#}");
        std::process::exit(-1);
    }
}

fn run(config: &Config) -> anyhow::Result<()> {
    let sdl_context = sdl2::init().map_err(SdlErr)?;
    let video_subsystem = sdl_context.video().map_err(SdlErr)?;
    let gl_attr = video_subsystem.gl_attr();
    gl_attr.set_context_profile(GLProfile::Core);
    gl_attr.set_context_version(3, 3);
    let window = video_subsystem
        .window(&config.title, config.width, config.height)
        .resizable()
        .opengl()
        .build()?;
    let _gl_context = window.gl_create_context().map_err(SdlErr)?;
    if let Err(err) = video_subsystem.gl_set_swap_interval(1) {
        log::warn!("could not enable vsync: {err}");
    }
    let backend =
        GlBackend::load(|s| video_subsystem.gl_get_proc_address(s) as *const c_void)?;
    sdl_context
        .mouse()
        .set_relative_mouse_mode(config.capture_mouse);
    let mut event_pump = sdl_context.event_pump().map_err(SdlErr)?;

    let gpu: Gpu = Rc::new(backend);
    let mut renderer = Renderer::new(gpu, config);
    let (width, height) = window.drawable_size();
    renderer.resize(width as i32, height as i32);

    let mut camera = Camera::default();
    let mut last_frame = Instant::now();
    'running: loop {
        let now = Instant::now();
        let dt = (now - last_frame).as_secs_f32();
        last_frame = now;

        let mut input = InputState::default();
        for event in event_pump.poll_iter() {
            match event {
                Event::Quit { .. }
                | Event::KeyDown {
                    keycode: Some(Keycode::Escape),
                    ..
                } => break 'running,
                Event::Window {
                    win_event: WindowEvent::Resized(..) | WindowEvent::SizeChanged(..),
                    ..
                } => {
                    let (width, height) = window.drawable_size();
                    renderer.resize(width as i32, height as i32);
                }
                Event::MouseMotion { xrel, yrel, .. } => {
                    input.mouse_delta += Vec2::new(xrel as f32, yrel as f32);
                }
                Event::MouseWheel { y, .. } => input.scroll += y as f32,
                _ => {}
            }
        }
        let keyboard = event_pump.keyboard_state();
        input.forward = keyboard.is_scancode_pressed(Scancode::W);
        input.backward = keyboard.is_scancode_pressed(Scancode::S);
        input.left = keyboard.is_scancode_pressed(Scancode::A);
        input.right = keyboard.is_scancode_pressed(Scancode::D);

        camera = camera.update(&input, dt);
        renderer.render(&camera);
        window.gl_swap_window();
    }

    log::info!("shutting down");
    Ok(())
}

#[derive(Debug)]
pub struct SdlErr(String);
impl Display for SdlErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sdl error: {}", self.0)
    }
}
impl Error for SdlErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        None
    }
}
