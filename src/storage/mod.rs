//! 本地图片记录模块

pub mod recorder;
pub mod store;

pub use recorder::UploadRecorder;
pub use store::{ImageRecord, ImageStore, NewImage};
