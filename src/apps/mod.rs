pub mod kinematics;
pub mod deformation;
pub mod density;
pub mod mean_free_path;
pub mod euler_lagrange;
pub mod meniscus;
