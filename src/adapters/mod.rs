pub mod insights;
pub mod kasa_cloud;
