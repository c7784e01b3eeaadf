//! 分割出的图像数据包.
//!
//! 数据借用自解析会话的累积缓冲区, 只在下一次调用解析器之前有效;
//! 需要长期保存时用 [`H263Packet::to_bytes`] 复制一份.

use bytes::Bytes;
use picsplit_core::{PicError, PicResult};

use crate::parsers::h263::PictureHeader;

/// 一幅完整图像及其图像头解析结果
#[derive(Debug)]
pub struct H263Packet<'a> {
    /// 图像字节 (含起始码)
    pub data: &'a [u8],
    /// 图像头, 解析失败时为错误
    pub header: PicResult<PictureHeader>,
}

impl<'a> H263Packet<'a> {
    /// 是否得到了可用的图像头
    pub fn got_picture(&self) -> bool {
        self.header.is_ok()
    }

    /// 图像头 (解析失败时为 `None`)
    pub fn picture(&self) -> Option<&PictureHeader> {
        self.header.as_ref().ok()
    }

    /// 图像头解析错误
    pub fn error(&self) -> Option<&PicError> {
        self.header.as_ref().err()
    }

    /// 数据大小 (字节)
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// 是否为空包
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// 复制图像字节, 脱离解析会话的生命周期
    pub fn to_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(self.data)
    }
}
