//! H.263 / H.263+ 码流分割与图像头解析.
//!
//! 入口为 [`H263Parser::split_and_parse`]: 调用方按任意大小送入字节块,
//! 每完成一幅图像就返回一个 [`H263Packet`].
//!
//! # 调用约定
//! - 返回的 `consumed` 小于输入长度时, 调用方从 `chunk[consumed..]` 重新送入
//! - 送入空块表示流结束, 交付剩余数据
//!
//! ```
//! use picsplit_codec::parsers::h263::H263Parser;
//!
//! let stream: Vec<u8> = Vec::new();
//! let mut parser = H263Parser::new();
//! let mut pos = 0;
//! while pos < stream.len() {
//!     let out = parser.split_and_parse(&stream[pos..]).unwrap();
//!     pos += out.consumed;
//! }
//! let out = parser.split_and_parse(&[]).unwrap();
//! assert!(out.end_of_stream);
//! assert!(out.packet.is_none());
//! ```

pub mod assembler;
pub mod header;
mod tables;

pub use assembler::{
    Accumulator, Assembled, Combined, FrameAssembler, FrameEnd, Overread, PADDING_SIZE, ScanState,
};
pub use header::{
    ChromaQscaleTable, DcScaleTable, HeaderWarning, PictureFlags, PictureHeader,
    PictureHeaderDecoder, PictureTiming, SliceStart,
};

use log::debug;
use picsplit_core::PicResult;

use crate::packet::H263Packet;

/// 解析器配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserConfig {
    /// 容器 FourCC (如 `ZYGO`)
    pub codec_tag: Option<[u8; 4]>,
    /// 累积缓冲区允许增长到的最大字节数
    pub max_buffer_size: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            codec_tag: None,
            max_buffer_size: usize::MAX / 2,
        }
    }
}

impl ParserConfig {
    /// 设置容器 FourCC
    pub fn with_codec_tag(mut self, tag: [u8; 4]) -> Self {
        self.codec_tag = Some(tag);
        self
    }

    /// 设置累积缓冲区上限
    pub fn with_max_buffer_size(mut self, size: usize) -> Self {
        self.max_buffer_size = size;
        self
    }
}

/// 单次分割调用的结果
#[derive(Debug)]
pub struct SplitOutput<'a> {
    /// 消耗的输入字节数
    pub consumed: usize,
    /// 完成的图像, `None` 表示需要更多数据
    pub packet: Option<H263Packet<'a>>,
    /// 本次调用是否为流结束 (空输入块)
    pub end_of_stream: bool,
}

/// H.263 分割解析会话
///
/// 持有累积缓冲区与跨调用的扫描/时序状态, 不可在多个码流间共享.
#[derive(Debug)]
pub struct H263Parser {
    assembler: FrameAssembler,
    decoder: PictureHeaderDecoder,
    config: ParserConfig,
}

impl Default for H263Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl H263Parser {
    /// 使用默认配置创建
    pub fn new() -> Self {
        Self::with_config(ParserConfig::default())
    }

    /// 使用指定配置创建
    pub fn with_config(config: ParserConfig) -> Self {
        Self {
            assembler: FrameAssembler::new(config.max_buffer_size),
            decoder: PictureHeaderDecoder::new(config.codec_tag),
            config,
        }
    }

    /// 当前配置
    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// 分片重组器状态
    pub fn assembler(&self) -> &FrameAssembler {
        &self.assembler
    }

    /// 图像头解码器状态
    pub fn decoder(&self) -> &PictureHeaderDecoder {
        &self.decoder
    }

    /// 送入一个字节块, 完成一幅图像时解析其图像头
    ///
    /// 图像头解析失败不作为调用错误返回, 而是放在 [`H263Packet::header`] 中;
    /// 只有缓冲区增长失败与非法参数会返回 `Err`, 此时整个输入块被丢弃.
    pub fn split_and_parse(&mut self, chunk: &[u8]) -> PicResult<SplitOutput<'_>> {
        if chunk.is_empty() {
            debug!("H.263: 刷新码流");
            let len = self.assembler.flush()?;
            let packet = if len > 0 {
                Some(self.parse_frame(len))
            } else {
                None
            };
            return Ok(SplitOutput {
                consumed: 0,
                packet,
                end_of_stream: true,
            });
        }

        let Assembled { consumed, combined } = self.assembler.assemble(chunk)?;
        let packet = match combined {
            Combined::NeedMoreData => None,
            Combined::Ready { len } => Some(self.parse_frame(len)),
        };
        Ok(SplitOutput {
            consumed,
            packet,
            end_of_stream: false,
        })
    }

    fn parse_frame(&mut self, len: usize) -> H263Packet<'_> {
        let data = self.assembler.frame(len);
        let header = self.decoder.decode(data);
        if let Err(e) = &header {
            debug!("H.263: 图像头解析失败 ({} 字节): {}", len, e);
        }
        H263Packet { data, header }
    }
}
