//! 按块送入码流并收集每幅图像的探测记录.

use log::{info, warn};
use serde::Serialize;

use picsplit_codec::{H263Packet, H263Parser, ParserConfig};

/// 完整探测结果
#[derive(Debug, Serialize)]
pub struct ProbeReport {
    pub filename: String,
    pub chunk_size: usize,
    pub pictures: Vec<PictureRecord>,
    pub summary: Summary,
}

/// 单幅图像记录
#[derive(Debug, Serialize)]
pub struct PictureRecord {
    pub index: usize,
    pub size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picture_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qscale: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temporal_reference: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_rate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_aspect_ratio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub h263_plus: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<i64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// 统计信息
#[derive(Debug, Default, Serialize)]
pub struct Summary {
    pub total_packets: usize,
    pub total_pictures: usize,
    pub failed_headers: usize,
    pub dropped_chunks: usize,
    pub total_bytes: u64,
}

impl PictureRecord {
    fn from_packet(index: usize, pkt: &H263Packet<'_>) -> Self {
        let mut record = Self {
            index,
            size: pkt.size(),
            width: None,
            height: None,
            picture_type: None,
            qscale: None,
            temporal_reference: None,
            frame_rate: None,
            sample_aspect_ratio: None,
            h263_plus: None,
            time: None,
            warnings: Vec::new(),
            error: None,
        };

        match &pkt.header {
            Ok(hdr) => {
                record.width = Some(hdr.width);
                record.height = Some(hdr.height);
                record.picture_type = Some(hdr.picture_type.to_string());
                record.qscale = Some(hdr.qscale);
                record.temporal_reference = Some(hdr.temporal_reference);
                record.frame_rate = Some(hdr.frame_rate.to_string());
                if hdr.sample_aspect_ratio.num != 0 {
                    record.sample_aspect_ratio = Some(hdr.sample_aspect_ratio.to_string());
                }
                record.h263_plus = Some(hdr.is_h263_plus());
                record.time = Some(hdr.timing.time);
                record.warnings = hdr.warnings.iter().map(|w| w.to_string()).collect();
            }
            Err(e) => record.error = Some(format!("{e} (code {})", e.code())),
        }

        record
    }

    /// 文本输出行
    pub fn text_line(&self) -> String {
        match (&self.error, self.width, self.height) {
            (None, Some(w), Some(h)) => format!(
                "pkt size:{} x {} type={} qp={} bytes={}",
                w,
                h,
                self.picture_type.as_deref().unwrap_or("?"),
                self.qscale.unwrap_or(0),
                self.size
            ),
            (Some(e), _, _) => format!("pkt bytes={} header error: {}", self.size, e),
            _ => format!("pkt bytes={}", self.size),
        }
    }
}

/// 按 `chunk_size` 切块送入解析器, 最后送入空块刷新
///
/// 找到边界时按 `consumed` 重新送入剩余字节. 调用级错误 (缓冲区增长失败)
/// 只丢弃当前块并继续.
pub fn split_stream(data: &[u8], chunk_size: usize, config: ParserConfig) -> SplitResult {
    let mut parser = H263Parser::with_config(config);
    let mut pictures = Vec::new();
    let mut summary = Summary {
        total_bytes: data.len() as u64,
        ..Summary::default()
    };

    for chunk in data.chunks(chunk_size.max(1)) {
        let mut rest = chunk;
        while !rest.is_empty() {
            let (consumed, got_packet) = match parser.split_and_parse(rest) {
                Ok(out) => {
                    let got = match &out.packet {
                        Some(pkt) => {
                            pictures.push(PictureRecord::from_packet(pictures.len(), pkt));
                            true
                        }
                        None => false,
                    };
                    (out.consumed, got)
                }
                Err(e) => {
                    warn!("丢弃输入块 ({} 字节): {}", rest.len(), e);
                    summary.dropped_chunks += 1;
                    break;
                }
            };
            if consumed == 0 && !got_packet {
                break;
            }
            rest = &rest[consumed..];
        }
    }

    match parser.split_and_parse(&[]) {
        Ok(out) => {
            if let Some(pkt) = &out.packet {
                pictures.push(PictureRecord::from_packet(pictures.len(), pkt));
            }
        }
        Err(e) => warn!("刷新码流失败: {}", e),
    }

    summary.total_packets = pictures.len();
    summary.failed_headers = pictures.iter().filter(|p| p.error.is_some()).count();
    summary.total_pictures = summary.total_packets - summary.failed_headers;
    info!(
        "分割完成: {} 个数据包, {} 幅图像, {} 个图像头错误",
        summary.total_packets, summary.total_pictures, summary.failed_headers
    );

    SplitResult { pictures, summary }
}

/// [`split_stream`] 的结果
#[derive(Debug)]
pub struct SplitResult {
    pub pictures: Vec<PictureRecord>,
    pub summary: Summary,
}
