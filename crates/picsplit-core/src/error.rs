//! 统一错误类型定义.
//!
//! 所有 picsplit crate 共用的错误类型, 支持跨模块传播.

use thiserror::Error;

/// picsplit 统一错误类型
#[derive(Debug, Error)]
pub enum PicError {
    /// 无效参数 (如边界偏移超过输入块长度)
    #[error("无效参数: {0}")]
    InvalidArgument(String),

    /// 不支持的编码特性
    #[error("不支持的特性: {0}")]
    UnsupportedFeature(String),

    /// 图像头格式错误 (起始码、标记位、保留值等)
    #[error("图像头格式错误: {0}")]
    MalformedHeader(String),

    /// 读取越过缓冲区末尾
    #[error("数据不足, 读取越过缓冲区末尾")]
    InsufficientData,

    /// 无效数据 (损坏的码流等)
    #[error("无效数据: {0}")]
    InvalidData(String),

    /// 内存分配失败
    #[error("内存分配失败: {0}")]
    ResourceExhausted(String),
}

impl PicError {
    /// 转换为稳定的负整数错误码
    ///
    /// 供需要整数返回值的调用方使用, 不同错误类型的取值互不相同.
    pub fn code(&self) -> i32 {
        match self {
            Self::InvalidArgument(_) => -22,
            Self::ResourceExhausted(_) => -12,
            Self::InvalidData(_) => -1_094_995_529,
            Self::MalformedHeader(_) => -1_094_995_530,
            Self::UnsupportedFeature(_) => -1_163_346_256,
            Self::InsufficientData => -1_094_995_531,
        }
    }
}

/// picsplit 统一 Result 类型
pub type PicResult<T> = Result<T, PicError>;
