pub mod items;
pub mod playback;
pub mod playstate;
pub mod system;
