pub mod bottom;
pub mod central;
