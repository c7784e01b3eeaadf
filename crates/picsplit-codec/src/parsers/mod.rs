//! 码流解析器.
//!
//! - [`h263`]: H.263 / H.263+ 图像分割与图像头解析
//! - [`units`]: H.264 / HEVC 单元分割接口

pub mod h263;
pub mod units;
