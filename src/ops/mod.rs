pub mod brush;
pub mod fill;
pub mod raster;
pub mod scripting;
pub mod shapes;
