pub mod app_settings;
pub mod app_state;
pub mod audio;
pub mod commentary;
pub mod messages;
pub mod movement;
pub mod network;
pub mod projection;
pub mod relay;
pub mod rotation;
pub mod sync;
pub mod view;
