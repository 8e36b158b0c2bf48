pub mod canvas;
pub mod heatmap;

#[cfg(feature = "viewer")]
pub mod cmviz_vis2d;
#[cfg(feature = "viewer")]
pub mod cmviz_vis3d;
