//! # picsplit-core
//!
//! picsplit 核心库, 提供基础类型定义、错误处理和比特流工具.
//!
//! 上层的图像分割与图像头解析 (`picsplit-codec`) 都建立在本 crate 之上.

pub mod bitreader;
pub mod bitwriter;
pub mod error;
pub mod rational;

// 重导出常用类型
pub use bitreader::BitReader;
pub use error::{PicError, PicResult};
pub use rational::Rational;
