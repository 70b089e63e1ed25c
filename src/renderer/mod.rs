pub mod egui_pass;
pub mod gpu;
pub mod plot;
