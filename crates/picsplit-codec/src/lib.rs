//! # picsplit-codec
//!
//! H.263 / H.263+ 码流分割与图像头解析.
//!
//! 输入任意切分的字节块, 输出逐幅图像的字节与图像头 (尺寸、图像类型、
//! 编码模式、时序). 宏块层解码不在本 crate 范围内.
//!
//! ## 使用示例
//!
//! ```rust
//! use picsplit_codec::{H263Parser, ParserConfig};
//!
//! let mut parser = H263Parser::with_config(ParserConfig::default().with_codec_tag(*b"H263"));
//! let out = parser.split_and_parse(&[0x00, 0x00, 0x80, 0x02]).unwrap();
//! assert_eq!(out.consumed, 4);
//! assert!(out.packet.is_none());
//! ```

pub mod packet;
pub mod parsers;
pub mod picture_type;

// 重导出常用类型
pub use packet::H263Packet;
pub use parsers::h263::{
    H263Parser, ParserConfig, PictureFlags, PictureHeader, PictureHeaderDecoder, SplitOutput,
};
pub use parsers::units::{CodedUnit, NalFormat, NalSplitter, UnitSplitter};
pub use picture_type::PictureType;
