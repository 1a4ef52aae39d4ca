pub mod color_transform;
pub mod frame;
pub mod frame_slot;
pub mod pixel;
pub mod selector_control;
pub mod transform_registry;
pub mod utils;
