use anyhow::Context;
use log::{error, info};
use murmuration::emitter::EmitterSet;
use murmuration::fps_estimator::FpsEstimator;
use murmuration::particle_system::{PointCloudRenderer, SimulationScheduler};
use murmuration::scene::MarkerRig;
use murmuration::shape_sampler;
use murmuration::sim_params::SimParams;
use murmuration::simulation::SimState;
use murmuration::state_texture::StateTexture;
use std::sync::Arc;
use winit::event::{ElementState, Event, KeyEvent, WindowEvent};
use winit::event_loop::EventLoop;
use winit::keyboard::{Key, NamedKey};
use winit::window::WindowBuilder;

gflags::define! {
    --config: &str = "sim_config.toml"
}
gflags::define! {
    /// Seed particle positions from this image's dark silhouette instead of
    /// the default sphere.
    --silhouette: &str = ""
}
gflags::define! {
    --log_filter: &str = "warn,murmuration=info"
}
gflags::define! {
    -h, --help = false
}

fn get_sim_config() -> SimParams {
    match std::fs::read_to_string(CONFIG.flag) {
        Ok(serialized) => match serialized.parse::<SimParams>() {
            Ok(params) => params,
            Err(e) => {
                error!("Failed to parse {}: {}", CONFIG.flag, e);
                SimParams::default()
            }
        },
        Err(e) => {
            error!("Failed to read {}: {}", CONFIG.flag, e);
            SimParams::default()
        }
    }
}

fn build_seed(params: &SimParams) -> anyhow::Result<StateTexture> {
    let mut rng = rand::thread_rng();
    if SILHOUETTE.is_present() {
        let image = image::open(SILHOUETTE.flag)
            .with_context(|| format!("loading silhouette image {}", SILHOUETTE.flag))?;
        info!("Seeding from silhouette {}", SILHOUETTE.flag);
        Ok(shape_sampler::silhouette(
            &image,
            params.particle_grid_size,
            &params.sampler,
            &mut rng,
        )?)
    } else {
        Ok(shape_sampler::sphere(params.particle_grid_size, &mut rng))
    }
}

fn main() -> anyhow::Result<()> {
    gflags::parse();
    if HELP.flag {
        gflags::print_help_and_exit(0);
    }
    scrub_log::init_with_filter_string(LOG_FILTER.flag).unwrap();

    let params = get_sim_config();
    info!("Simulation params: {:?}", params);
    let seed = build_seed(&params)?;

    let event_loop = EventLoop::new()?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title("Murmuration")
            .with_inner_size(winit::dpi::LogicalSize::new(1280.0, 720.0))
            .build(&event_loop)?,
    );

    let instance = wgpu::Instance::default();
    let surface = instance.create_surface(window.clone())?;
    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::default(),
        compatible_surface: Some(&surface),
        force_fallback_adapter: false,
    }))
    .context("no compatible adapter")?;
    info!("Adapter: {:?}", adapter.get_info());
    let (device, queue) = pollster::block_on(adapter.request_device(
        &wgpu::DeviceDescriptor {
            label: None,
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
        },
        None,
    ))?;

    let size = window.inner_size();
    let capabilities = surface.get_capabilities(&adapter);
    let mut config = wgpu::SurfaceConfiguration {
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        format: capabilities.formats[0],
        width: size.width.max(1),
        height: size.height.max(1),
        present_mode: wgpu::PresentMode::Fifo,
        alpha_mode: capabilities.alpha_modes[0],
        view_formats: vec![],
        desired_maximum_frame_latency: 2,
    };
    surface.configure(&device, &config);

    let mut scheduler = SimulationScheduler::new(&adapter, &device, &queue, &seed, &params)?;
    let renderer = PointCloudRenderer::new(&device, &scheduler, config.format, &params);

    let rig = MarkerRig::demo();
    let mut emitters = EmitterSet::new();
    for (marker, position) in rig.emitter_markers().zip(rig.emitter_positions(0.0)) {
        emitters.register(&marker.label, position);
    }

    let mut sim_state = SimState::from_params(&params);
    let mut fps = FpsEstimator::new(params.fps);
    let mut rng = rand::thread_rng();
    let mut clock = 0.0f32;

    event_loop.run(move |event, elwt| match event {
        Event::WindowEvent { event, .. } => match event {
            WindowEvent::CloseRequested => elwt.exit(),
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        logical_key: Key::Named(NamedKey::Escape),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => elwt.exit(),
            WindowEvent::Resized(new_size) => {
                config.width = new_size.width.max(1);
                config.height = new_size.height.max(1);
                surface.configure(&device, &config);
            }
            WindowEvent::RedrawRequested => {
                let dt = fps.tick().as_secs_f32();
                clock += dt;

                let positions = rig.emitter_positions(clock);
                let samples = emitters.track(&positions, &mut rng);
                let plan = sim_state.plan_frame(dt, &samples);

                let frame = match surface.get_current_texture() {
                    Ok(frame) => frame,
                    Err(e) => {
                        // Skip this frame; the previous one stays on screen.
                        error!("Dropped a frame: {:?}", e);
                        surface.configure(&device, &config);
                        return;
                    }
                };
                let view = frame
                    .texture
                    .create_view(&wgpu::TextureViewDescriptor::default());
                let mut encoder =
                    device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
                scheduler.execute(&queue, &mut encoder, &plan, params.progress);
                renderer.update_view(&queue, config.width as f32 / config.height as f32, clock);
                renderer.render(&mut encoder, &view, scheduler.active_index());
                queue.submit(Some(encoder.finish()));
                frame.present();
            }
            _ => {}
        },
        Event::AboutToWait => window.request_redraw(),
        _ => {}
    })?;
    Ok(())
}
