pub mod cpu_simulator;
pub mod emitter;
pub mod fps_estimator;
pub mod kernels;
pub mod particle_system;
pub mod scene;
pub mod shader_util;
pub mod shape_sampler;
pub mod sim_params;
pub mod simulation;
pub mod state_texture;
