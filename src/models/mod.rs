pub mod grid_row;
pub mod image_descriptor;
pub mod site_content;
pub mod work;
pub mod work_store;

pub use grid_row::*;
pub use image_descriptor::*;
pub use site_content::*;
pub use work::*;
pub use work_store::*;
