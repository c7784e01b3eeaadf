//! 通用码流单元分割接口.
//!
//! 参数集解码器只需要 "把缓冲区切成带类型标签的单元, 每个单元给一个
//! 定位在载荷起点的比特读取器", 这里用 [`UnitSplitter`] 表达该约定.
//! [`NalSplitter`] 实现 H.264 / HEVC 两种 NAL 格式:
//!
//! - Annex B: `00 00 01` 或 `00 00 00 01` 起始码分隔
//! - 长度前缀: 每个单元前有 1~4 字节大端长度
//!
//! NAL 头部:
//! ```text
//! H.264 (1 字节): forbidden(1) | ref_idc(2) | type(5)
//! HEVC  (2 字节): forbidden(1) | type(6) | layer_id(6) | tid_plus1(3)
//! ```

use log::debug;
use picsplit_core::{BitReader, PicError, PicResult};

/// NAL 格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NalFormat {
    /// H.264 / AVC
    H264,
    /// H.265 / HEVC
    Hevc,
}

impl NalFormat {
    /// NAL 头部字节数
    pub fn header_len(self) -> usize {
        match self {
            Self::H264 => 1,
            Self::Hevc => 2,
        }
    }

    /// 从 NAL 头首字节取类型
    pub fn unit_type(self, first: u8) -> u8 {
        match self {
            Self::H264 => first & 0x1F,
            Self::Hevc => (first >> 1) & 0x3F,
        }
    }
}

/// 分割出的单元
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodedUnit {
    /// 单元类型标签
    pub type_tag: u8,
    /// 去除防竞争字节后的载荷 (不含单元头)
    pub payload: Vec<u8>,
}

impl CodedUnit {
    /// 定位在载荷起点的比特读取器
    pub fn reader(&self) -> BitReader<'_> {
        BitReader::new(&self.payload)
    }
}

/// 码流单元分割器
pub trait UnitSplitter {
    /// 分割缓冲区
    ///
    /// `is_length_prefixed` 为 true 时每个单元前有 `length_size` 字节大端长度,
    /// 否则按 Annex B 起始码分割.
    fn split(
        &self,
        data: &[u8],
        is_length_prefixed: bool,
        length_size: usize,
    ) -> PicResult<Vec<CodedUnit>>;
}

/// H.264 / HEVC NAL 单元分割器
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NalSplitter {
    format: NalFormat,
}

impl NalSplitter {
    /// 创建指定格式的分割器
    pub fn new(format: NalFormat) -> Self {
        Self { format }
    }

    /// NAL 格式
    pub fn format(&self) -> NalFormat {
        self.format
    }

    /// 解析单个 NAL (含头部), 头部非法时返回 `None`
    fn parse_unit(&self, nal: &[u8]) -> Option<CodedUnit> {
        let header_len = self.format.header_len();
        if nal.len() < header_len {
            debug!("{:?}: NAL 单元过短, len={}", self.format, nal.len());
            return None;
        }
        if nal[0] & 0x80 != 0 {
            debug!("{:?}: forbidden_zero_bit 非法, 跳过单元", self.format);
            return None;
        }
        Some(CodedUnit {
            type_tag: self.format.unit_type(nal[0]),
            payload: unescape_rbsp(&nal[header_len..]),
        })
    }

    fn split_annex_b(&self, data: &[u8]) -> Vec<CodedUnit> {
        let spans = start_code_spans(data);
        let mut units = Vec::new();

        for (k, &(_, start)) in spans.iter().enumerate() {
            let end = spans.get(k + 1).map_or(data.len(), |&(prefix, _)| prefix);
            let body = &data[start..end];
            // 尾部 0 字节 (trailing_zero_8bits) 不属于单元
            let len = body.iter().rposition(|&b| b != 0x00).map_or(0, |p| p + 1);
            if len > 0 {
                units.extend(self.parse_unit(&body[..len]));
            }
        }

        units
    }

    fn split_length_prefixed(&self, data: &[u8], length_size: usize) -> PicResult<Vec<CodedUnit>> {
        if !(1..=4).contains(&length_size) {
            return Err(PicError::InvalidArgument(format!(
                "长度前缀字节数非法: {}",
                length_size
            )));
        }

        let prefix_bits = length_size * 8;
        let mut br = BitReader::new(data);
        let mut units = Vec::new();
        while br.bits_left() >= prefix_bits {
            let nal_len = br.read_bits(prefix_bits as u32)? as usize;
            let remaining = br.bits_left() / 8;
            if nal_len > remaining {
                return Err(PicError::InvalidData(format!(
                    "{:?}: NAL 长度 {} 超出剩余数据 {}",
                    self.format, nal_len, remaining
                )));
            }
            units.extend(self.parse_unit(br.read_bytes(nal_len)?));
        }
        if br.bits_left() > 0 {
            debug!(
                "{:?}: 忽略末尾 {} 字节 (不足一个长度前缀)",
                self.format,
                br.bits_left() / 8
            );
        }

        Ok(units)
    }
}

impl UnitSplitter for NalSplitter {
    fn split(
        &self,
        data: &[u8],
        is_length_prefixed: bool,
        length_size: usize,
    ) -> PicResult<Vec<CodedUnit>> {
        if is_length_prefixed {
            self.split_length_prefixed(data, length_size)
        } else {
            Ok(self.split_annex_b(data))
        }
    }
}

/// 扫描 Annex B 起始码, 返回每个起始码的 (前缀起点, 载荷起点)
///
/// 前缀最多算 3 个 0 字节, 更早的 0 留给上一个单元的尾部裁剪.
fn start_code_spans(data: &[u8]) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut zeros = 0usize;
    for (i, &b) in data.iter().enumerate() {
        match b {
            0x00 => zeros += 1,
            0x01 if zeros >= 2 => {
                spans.push((i - zeros.min(3), i + 1));
                zeros = 0;
            }
            _ => zeros = 0,
        }
    }
    spans
}

/// 还原 RBSP: 连续两个 0 之后的 `03` 是防竞争字节, 丢弃
fn unescape_rbsp(data: &[u8]) -> Vec<u8> {
    let mut rbsp = Vec::with_capacity(data.len());
    let mut zeros = 0usize;
    for &b in data {
        if zeros >= 2 && b == 0x03 {
            zeros = 0;
            continue;
        }
        zeros = if b == 0x00 { zeros + 1 } else { 0 };
        rbsp.push(b);
    }
    rbsp
}
