pub mod app;
pub mod camera;
pub mod renderer;
pub mod settings;
pub mod world;
