pub mod camera;
pub mod cloud;
pub mod config;
pub mod fusion;
pub mod io;
pub mod registration;
pub mod system;
pub mod viz;
