//! # picsplit
//!
//! H.263 / H.263+ 码流图像分割与图像头解析.
//!
//! - **分割**: 任意切分的字节块 → 逐幅完整图像, 与切分方式无关
//! - **图像头**: 尺寸、图像类型、编码模式标志、时序
//! - **单元分割接口**: H.264 / HEVC NAL 单元分割
//!
//! # 快速开始
//!
//! ```rust
//! use picsplit::codec::H263Parser;
//!
//! let stream: &[u8] = &[];
//! let mut parser = H263Parser::new();
//! let mut rest = stream;
//! while !rest.is_empty() {
//!     let out = parser.split_and_parse(rest).unwrap();
//!     if let Some(pkt) = &out.packet {
//!         if let Some(hdr) = pkt.picture() {
//!             println!("{}x{} {}", hdr.width, hdr.height, hdr.picture_type);
//!         }
//!     }
//!     rest = &rest[out.consumed..];
//! }
//! let eos = parser.split_and_parse(&[]).unwrap();
//! assert!(eos.end_of_stream);
//! ```
//!
//! # Crate 结构
//!
//! | Crate | 功能 |
//! |-------|------|
//! | `picsplit-core` | 比特流读写、错误类型、有理数 |
//! | `picsplit-codec` | 图像分割、图像头解析、单元分割 |

/// 核心类型与工具
pub use picsplit_core as core;

/// 码流分割与图像头解析
pub use picsplit_codec as codec;

/// 获取版本号
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
