//! H.263 / H.263+ 图像头解析.
//!
//! 输入是 [`FrameAssembler`](super::assembler::FrameAssembler) 重组出的一幅完整图像,
//! 按固定顺序读取比特字段, 分 H.263v1 与 H.263+ (PLUSPTYPE) 两条路径.
//!
//! 错误策略:
//! - v1 路径的 SAC 位为致命错误 ([`PicError::UnsupportedFeature`])
//! - OPPTYPE 中的 SAC / RPS / ISD 与分片模式位只告警, 记录在 [`PictureHeader::warnings`]
//! - 读越界为 [`PicError::InsufficientData`], 扩展位不终止与面积检查为 [`PicError::InvalidData`]
//!
//! 解码器在成功解析后才提交时序状态与 OPPTYPE 状态.

use std::fmt;

use bitflags::bitflags;
use log::{debug, trace, warn};
use picsplit_core::{BitReader, PicError, PicResult, Rational};

use super::tables::{
    AIC_DC_SCALE, ASPECT_EXTENDED, CUSTOM_CLOCK_BASE, DEFAULT_FRAME_RATE, DEFAULT_PLUS_ASPECT,
    H263_FORMATS, MBA_LENGTH, MBA_MAX, MODIFIED_CHROMA_QSCALE, MPEG1_DC_SCALE, PIXEL_ASPECT,
};
use crate::picture_type::PictureType;

/// 图像起始码 (PSC) 的 22 位取值
const PICTURE_START_CODE: u32 = 0x20;

/// 自定义图像格式 (CPFMT) 的源格式选择值
const FORMAT_CUSTOM: u32 = 6;

/// 扩展 PTYPE (PLUSPTYPE) 的格式值
const FORMAT_EXTENDED: u32 = 7;

/// ZYGO 私有尾部的位数
const ZYGO_TRAILER_BITS: usize = 85 + 13 * 3 * 16 + 50;

bitflags! {
    /// 图像编码模式标志
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PictureFlags: u32 {
        /// 长运动矢量 (Annex D, v1)
        const LONG_VECTORS     = 1 << 0;
        /// 重叠块运动补偿 / 高级预测 (Annex F)
        const OBMC             = 1 << 1;
        /// 无限制运动矢量
        const UNRESTRICTED_MV  = 1 << 2;
        /// H.263+ (PLUSPTYPE) 码流
        const H263_PLUS        = 1 << 3;
        /// H.263+ 无限制运动矢量 (Annex D, UMV+)
        const UMV_PLUS         = 1 << 4;
        /// 高级帧内编码 (Annex I)
        const ADVANCED_INTRA   = 1 << 5;
        /// 去块滤波 (Annex J)
        const LOOP_FILTER      = 1 << 6;
        /// 分片结构 (Annex K)
        const SLICE_STRUCTURED = 1 << 7;
        /// 替代帧间 VLC (Annex S)
        const ALT_INTER_VLC    = 1 << 8;
        /// 修正量化 (Annex T)
        const MODIFIED_QUANT   = 1 << 9;
        /// 自定义图像时钟频率 (CPCFC)
        const CUSTOM_PCF       = 1 << 10;
        /// 自定义图像格式 (CPFMT)
        const CUSTOM_FORMAT    = 1 << 11;
        /// 取整类型 (RTYPE) 为 1
        const NO_ROUNDING      = 1 << 12;
    }
}

/// OPPTYPE 中随序列持久化的模式位
const OPPTYPE_FLAGS: PictureFlags = PictureFlags::UNRESTRICTED_MV
    .union(PictureFlags::UMV_PLUS)
    .union(PictureFlags::OBMC)
    .union(PictureFlags::ADVANCED_INTRA)
    .union(PictureFlags::LOOP_FILTER)
    .union(PictureFlags::SLICE_STRUCTURED)
    .union(PictureFlags::ALT_INTER_VLC)
    .union(PictureFlags::MODIFIED_QUANT)
    .union(PictureFlags::CUSTOM_PCF)
    .union(PictureFlags::CUSTOM_FORMAT);

/// 只告警不报错的码流特性
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeaderWarning {
    /// 起始处疑似 RTP 头 (前两位为 `10`)
    RtpHeaderSuspected,
    /// OPPTYPE 中的语法算术编码 (Annex E)
    SyntaxArithmeticCoding,
    /// 参考图像选择 (Annex N)
    ReferencePictureSelection,
    /// 独立分段解码 (Annex R)
    IndependentSegmentDecoding,
    /// 矩形分片
    RectangularSlices,
    /// 无序分片
    UnorderedSlices,
    /// 自定义尺寸中的标记位缺失
    DimensionMarkerMissing,
}

impl fmt::Display for HeaderWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::RtpHeaderSuspected => "疑似 RTP 头, 可能误用了 RTP 载荷",
            Self::SyntaxArithmeticCoding => "不支持语法算术编码 (SAC)",
            Self::ReferencePictureSelection => "不支持参考图像选择",
            Self::IndependentSegmentDecoding => "不支持独立分段解码",
            Self::RectangularSlices => "不支持矩形分片",
            Self::UnorderedSlices => "不支持无序分片",
            Self::DimensionMarkerMissing => "自定义尺寸标记位缺失",
        };
        f.write_str(s)
    }
}

/// 色度量化参数映射表
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChromaQscaleTable {
    /// 色度 QP 与亮度相同
    #[default]
    Identity,
    /// 修正量化模式 (Annex T) 映射
    ModifiedQuant,
}

impl ChromaQscaleTable {
    /// 由亮度 QP 得到色度 QP
    pub fn map(self, qscale: u8) -> u8 {
        match self {
            Self::Identity => qscale,
            Self::ModifiedQuant => MODIFIED_CHROMA_QSCALE[usize::from(qscale & 31)],
        }
    }
}

/// 帧内 DC 缩放表
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DcScaleTable {
    /// MPEG-1 风格, 恒为 8
    #[default]
    Mpeg1,
    /// 高级帧内编码 (Annex I), 2 * QP
    AdvancedIntra,
}

impl DcScaleTable {
    /// 给定 QP 的 DC 缩放值
    pub fn dc_scale(self, qscale: u8) -> u8 {
        match self {
            Self::Mpeg1 => MPEG1_DC_SCALE,
            Self::AdvancedIntra => AIC_DC_SCALE[usize::from(qscale & 31)],
        }
    }
}

/// 图像时序信息 (以图像计数为单位)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PictureTiming {
    /// 当前图像时间
    pub time: i64,
    /// 前后两个参考图像的间隔
    pub pp_time: i64,
    /// 前一参考图像到当前 B 图像的间隔
    pub pb_time: i64,
    /// 最近一个非 B 图像的时间
    pub last_non_b_time: i64,
    /// 图像计数 (每输出一个图像头加 1)
    pub picture_number: i64,
}

/// 分片起始宏块位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliceStart {
    /// 宏块地址
    pub mb_pos: u32,
    /// 宏块列
    pub mb_x: u32,
    /// 宏块行
    pub mb_y: u32,
}

/// 解析出的图像头
#[derive(Debug, Clone, PartialEq)]
pub struct PictureHeader {
    /// 时间参考 (TR)
    pub temporal_reference: u8,
    /// 图像类型
    pub picture_type: PictureType,
    /// 宽度 (像素)
    pub width: u32,
    /// 高度 (像素)
    pub height: u32,
    /// 宏块列数
    pub mb_width: u32,
    /// 宏块行数
    pub mb_height: u32,
    /// 宏块总数
    pub mb_num: u32,
    /// 量化参数
    pub qscale: u8,
    /// 色度量化参数
    pub chroma_qscale: u8,
    /// 像素宽高比, 0/1 表示未知
    pub sample_aspect_ratio: Rational,
    /// 帧率
    pub frame_rate: Rational,
    /// 模式标志
    pub flags: PictureFlags,
    /// PB 帧模式 (0 关闭, 1 PB 帧, 3 改进 PB 帧)
    pub pb_frame: u8,
    /// UFEP 取值, v1 码流为 0
    pub ufep: u8,
    /// 时序信息
    pub timing: PictureTiming,
    /// 分片起始位置, 仅分片结构模式
    pub slice_start: Option<SliceStart>,
    /// 色度 QP 映射表
    pub chroma_qscale_table: ChromaQscaleTable,
    /// DC 缩放表
    pub dc_scale_table: DcScaleTable,
    /// 图像数据总位数
    pub size_in_bits: usize,
    /// 解析过程中的告警
    pub warnings: Vec<HeaderWarning>,
}

impl PictureHeader {
    /// 是否为 H.263+ 码流
    pub fn is_h263_plus(&self) -> bool {
        self.flags.contains(PictureFlags::H263_PLUS)
    }

    /// 是否设置了取整类型位
    pub fn no_rounding(&self) -> bool {
        self.flags.contains(PictureFlags::NO_ROUNDING)
    }
}

impl fmt::Display for PictureHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = |flag: PictureFlags, tag: &'static str| {
            if self.flags.contains(flag) { tag } else { "" }
        };
        write!(
            f,
            "qp:{} {} size:{} rnd:{}{}{}{}{}{}{}{}{}{} {}/{}",
            self.qscale,
            self.picture_type.as_char(),
            self.size_in_bits,
            u8::from(!self.no_rounding()),
            mode(PictureFlags::OBMC, " AP"),
            mode(PictureFlags::UMV_PLUS, " UMV"),
            mode(PictureFlags::LONG_VECTORS, " LONG"),
            mode(PictureFlags::H263_PLUS, " +"),
            mode(PictureFlags::ADVANCED_INTRA, " AIC"),
            mode(PictureFlags::ALT_INTER_VLC, " AIV"),
            mode(PictureFlags::MODIFIED_QUANT, " MQ"),
            mode(PictureFlags::LOOP_FILTER, " LOOP"),
            mode(PictureFlags::SLICE_STRUCTURED, " SS"),
            self.frame_rate.num,
            self.frame_rate.den,
        )
    }
}

/// 最近一次 UFEP=1 图像头确定的序列级参数
#[derive(Debug, Clone, Copy, PartialEq)]
struct PlusSequence {
    /// OPPTYPE 中持久化的模式位
    flags: PictureFlags,
    width: u32,
    height: u32,
    sample_aspect_ratio: Rational,
    frame_rate: Rational,
}

/// 图像头解码器
///
/// 跨图像保存时序 (`pp_time` 等) 与 H.263+ 序列参数, 一个码流使用一个实例.
#[derive(Debug, Clone, Default)]
pub struct PictureHeaderDecoder {
    /// 容器 FourCC, 为 `ZYGO` 时解析私有尾部
    codec_tag: Option<[u8; 4]>,
    timing: PictureTiming,
    plus: Option<PlusSequence>,
}

impl PictureHeaderDecoder {
    /// 创建解码器
    pub fn new(codec_tag: Option<[u8; 4]>) -> Self {
        Self {
            codec_tag,
            ..Self::default()
        }
    }

    /// 当前时序状态
    pub fn timing(&self) -> PictureTiming {
        self.timing
    }

    /// 已输出的图像头数量
    pub fn picture_number(&self) -> i64 {
        self.timing.picture_number
    }

    /// 解析一幅完整图像的图像头
    pub fn decode(&mut self, data: &[u8]) -> PicResult<PictureHeader> {
        let mut br = BitReader::new(data);
        let mut warnings = Vec::new();
        let mut flags = PictureFlags::empty();
        let mut pb_frame = 0u8;
        let mut ufep = 0u32;

        br.byte_align();
        if br.bits_left() >= 2 && br.peek_bits(2)? == 2 {
            warn!("H.263: 图像头前两位为 10, 疑似 RTP 头");
            warnings.push(HeaderWarning::RtpHeaderSuspected);
        }

        // PSC: 22 位起始码
        let mut startcode = br.read_bits(22 - 8)?;
        while br.bits_left() > 24 {
            startcode = ((startcode << 8) | br.read_bits(8)?) & 0x003F_FFFF;
            if startcode == PICTURE_START_CODE {
                break;
            }
        }
        if startcode != PICTURE_START_CODE {
            return Err(PicError::MalformedHeader("图像起始码错误".into()));
        }

        let temporal_reference = br.read_bits(8)? as u8;

        // PTYPE
        br.check_marker("PTYPE")?;
        if br.read_bit()? != 0 {
            return Err(PicError::MalformedHeader("H.263 标识位错误".into()));
        }
        br.skip_bits(3)?; // 分屏 / 文档摄像 / 冻结释放

        let format = br.read_bits(3)?;
        let picture_type;
        let qscale;
        let width;
        let height;
        let sample_aspect_ratio;
        let frame_rate;
        let mut plus_update = None;

        if format != FORMAT_CUSTOM && format != FORMAT_EXTENDED {
            // H.263v1
            let (w, h) = H263_FORMATS[format as usize];
            if w == 0 {
                return Err(PicError::MalformedHeader(format!(
                    "H.263 源格式非法: {}",
                    format
                )));
            }

            picture_type = if br.read_flag()? {
                PictureType::P
            } else {
                PictureType::I
            };
            flags.set(PictureFlags::LONG_VECTORS, br.read_flag()?);
            if br.read_flag()? {
                return Err(PicError::UnsupportedFeature("H.263 SAC".into()));
            }
            flags.set(PictureFlags::OBMC, br.read_flag()?);
            if flags.intersects(PictureFlags::LONG_VECTORS | PictureFlags::OBMC) {
                flags |= PictureFlags::UNRESTRICTED_MV;
            }
            pb_frame = br.read_bit()? as u8;
            qscale = br.read_bits(5)? as u8;
            br.skip_bits(1)?; // CPM

            width = w;
            height = h;
            sample_aspect_ratio = Rational::ZERO;
            frame_rate = DEFAULT_FRAME_RATE;
        } else {
            // H.263+
            flags |= PictureFlags::H263_PLUS;
            ufep = br.read_bits(3)?;

            let mut source_format = 0;
            let opptype = match ufep {
                1 => {
                    source_format = br.read_bits(3)?;
                    let mut opp = PictureFlags::empty();
                    opp.set(PictureFlags::CUSTOM_FORMAT, source_format == FORMAT_CUSTOM);
                    opp.set(PictureFlags::CUSTOM_PCF, br.read_flag()?);
                    opp.set(PictureFlags::UMV_PLUS, br.read_flag()?);
                    if br.read_flag()? {
                        warn!("H.263+: 不支持语法算术编码 (SAC)");
                        warnings.push(HeaderWarning::SyntaxArithmeticCoding);
                    }
                    opp.set(PictureFlags::OBMC, br.read_flag()?);
                    opp.set(PictureFlags::ADVANCED_INTRA, br.read_flag()?);
                    opp.set(PictureFlags::LOOP_FILTER, br.read_flag()?);
                    if opp.intersects(
                        PictureFlags::UMV_PLUS | PictureFlags::OBMC | PictureFlags::LOOP_FILTER,
                    ) {
                        opp |= PictureFlags::UNRESTRICTED_MV;
                    }
                    opp.set(PictureFlags::SLICE_STRUCTURED, br.read_flag()?);
                    if br.read_flag()? {
                        warn!("H.263+: 不支持参考图像选择");
                        warnings.push(HeaderWarning::ReferencePictureSelection);
                    }
                    if br.read_flag()? {
                        warn!("H.263+: 不支持独立分段解码");
                        warnings.push(HeaderWarning::IndependentSegmentDecoding);
                    }
                    opp.set(PictureFlags::ALT_INTER_VLC, br.read_flag()?);
                    opp.set(PictureFlags::MODIFIED_QUANT, br.read_flag()?);
                    br.skip_bits(1)?; // 防起始码仿真
                    br.skip_bits(3)?; // 保留
                    opp
                }
                0 => match &self.plus {
                    Some(seq) => seq.flags,
                    None => {
                        return Err(PicError::MalformedHeader(
                            "UFEP=0 但此前没有完整的 OPPTYPE".into(),
                        ));
                    }
                },
                _ => {
                    return Err(PicError::MalformedHeader(format!(
                        "UFEP 取值非法: {}",
                        ufep
                    )));
                }
            };
            flags |= opptype;

            // MPPTYPE
            picture_type = match br.read_bits(3)? {
                0 => PictureType::I,
                1 => PictureType::P,
                2 => {
                    pb_frame = 3;
                    PictureType::P
                }
                3 => PictureType::B,
                // ZYGO
                7 => PictureType::I,
                code => {
                    return Err(PicError::MalformedHeader(format!(
                        "H.263+ 图像类型非法: {}",
                        code
                    )));
                }
            };
            br.skip_bits(2)?;
            flags.set(PictureFlags::NO_ROUNDING, br.read_flag()?);
            br.skip_bits(4)?;

            if ufep == 1 {
                let (w, h, sar) = if source_format == FORMAT_CUSTOM {
                    // CPFMT
                    let aspect = br.read_bits(4)?;
                    let w = (br.read_bits(9)? + 1) * 4;
                    if br.read_bit()? != 1 {
                        warn!("H.263+: 自定义尺寸标记位缺失");
                        warnings.push(HeaderWarning::DimensionMarkerMissing);
                    }
                    let h = br.read_bits(9)? * 4;
                    let sar = if aspect == ASPECT_EXTENDED {
                        let num = br.read_bits(8)? as i32;
                        let den = br.read_bits(8)? as i32;
                        Rational::new(num, den)
                    } else {
                        PIXEL_ASPECT[aspect as usize]
                    };
                    (w, h, sar)
                } else {
                    let (w, h) = H263_FORMATS[source_format as usize];
                    (w, h, DEFAULT_PLUS_ASPECT)
                };
                if w == 0 || h == 0 {
                    return Err(PicError::MalformedHeader(format!(
                        "H.263+ 图像尺寸非法: {}x{}",
                        w, h
                    )));
                }

                let rate = if flags.contains(PictureFlags::CUSTOM_PCF) {
                    let den = (1000 + br.read_bit()?) * br.read_bits(7)?;
                    if den == 0 {
                        return Err(PicError::MalformedHeader("自定义帧率分母为 0".into()));
                    }
                    Rational::new(CUSTOM_CLOCK_BASE, den as i32).reduce()
                } else {
                    DEFAULT_FRAME_RATE
                };

                width = w;
                height = h;
                sample_aspect_ratio = sar;
                frame_rate = rate;
                plus_update = Some(PlusSequence {
                    flags: opptype & OPPTYPE_FLAGS,
                    width,
                    height,
                    sample_aspect_ratio,
                    frame_rate,
                });
            } else {
                let Some(seq) = &self.plus else {
                    return Err(PicError::MalformedHeader("UFEP=0 但图像尺寸未知".into()));
                };
                width = seq.width;
                height = seq.height;
                sample_aspect_ratio = seq.sample_aspect_ratio;
                frame_rate = seq.frame_rate;
            }

            if flags.contains(PictureFlags::CUSTOM_PCF) {
                br.skip_bits(2)?; // ETR
            }

            if ufep == 1 {
                if flags.contains(PictureFlags::UMV_PLUS) && br.read_bit()? == 0 {
                    br.skip_bits(1)?; // UUI
                }
                if flags.contains(PictureFlags::SLICE_STRUCTURED) {
                    if br.read_flag()? {
                        warn!("H.263+: 不支持矩形分片");
                        warnings.push(HeaderWarning::RectangularSlices);
                    }
                    if br.read_flag()? {
                        warn!("H.263+: 不支持无序分片");
                        warnings.push(HeaderWarning::UnorderedSlices);
                    }
                }
                if picture_type == PictureType::B {
                    br.skip_bits(4)?; // ELNUM
                    br.skip_bits(4)?; // RLNUM
                }
            }

            qscale = br.read_bits(5)? as u8;
        }

        if (width as usize * height as usize / 256 / 8) > br.bits_left() {
            return Err(PicError::InvalidData(format!(
                "图像数据过短: {}x{} 仅剩 {} 位",
                width,
                height,
                br.bits_left()
            )));
        }

        let mb_width = width.div_ceil(16);
        let mb_height = height.div_ceil(16);
        let mb_num = mb_width * mb_height;

        if pb_frame != 0 {
            br.skip_bits(3)?; // TRB
            if flags.contains(PictureFlags::CUSTOM_PCF) {
                br.skip_bits(2)?; // ETR
            }
            br.skip_bits(2)?; // DBQUANT
        }

        let mut timing = self.timing;
        timing.time = timing.picture_number;
        if picture_type != PictureType::B {
            timing.pp_time = timing.time - timing.last_non_b_time;
            timing.last_non_b_time = timing.time;
        } else {
            timing.pb_time = timing.pp_time - (timing.last_non_b_time - timing.time);
            if timing.pp_time <= timing.pb_time
                || timing.pp_time <= timing.pp_time - timing.pb_time
                || timing.pp_time <= 0
            {
                timing.pp_time = 2;
                timing.pb_time = 1;
            }
        }

        // PEI / PSUPP
        br.skip_extension_bits()?;

        let slice_start = if flags.contains(PictureFlags::SLICE_STRUCTURED) {
            br.check_marker("SEPB1")?;
            let start = decode_mba(&mut br, mb_num, mb_width)?;
            br.check_marker("SEPB2")?;
            Some(start)
        } else {
            None
        };

        let chroma_qscale_table = if flags.contains(PictureFlags::MODIFIED_QUANT) {
            ChromaQscaleTable::ModifiedQuant
        } else {
            ChromaQscaleTable::Identity
        };
        let dc_scale_table = if flags.contains(PictureFlags::ADVANCED_INTRA) {
            DcScaleTable::AdvancedIntra
        } else {
            DcScaleTable::Mpeg1
        };

        let header = PictureHeader {
            temporal_reference,
            picture_type,
            width,
            height,
            mb_width,
            mb_height,
            mb_num,
            qscale,
            chroma_qscale: chroma_qscale_table.map(qscale),
            sample_aspect_ratio,
            frame_rate,
            flags,
            pb_frame,
            ufep: ufep as u8,
            timing,
            slice_start,
            chroma_qscale_table,
            dc_scale_table,
            size_in_bits: br.size_in_bits(),
            warnings,
        };
        debug!("{}", header);

        if picture_type == PictureType::I
            && self.codec_tag == Some(*b"ZYGO")
            && br.bits_left() >= ZYGO_TRAILER_BITS
        {
            dump_zygo_trailer(&mut br)?;
        }

        timing.picture_number += 1;
        self.timing = timing;
        if plus_update.is_some() {
            self.plus = plus_update;
        }

        Ok(header)
    }
}

/// 解析分片起始宏块地址 (MBA)
///
/// 字段宽度由宏块总数决定.
fn decode_mba(br: &mut BitReader<'_>, mb_num: u32, mb_width: u32) -> PicResult<SliceStart> {
    let i = MBA_MAX
        .iter()
        .position(|&max| mb_num.saturating_sub(1) <= max)
        .unwrap_or(MBA_MAX.len());
    let mb_pos = br.read_bits(MBA_LENGTH[i])?;
    Ok(SliceStart {
        mb_pos,
        mb_x: mb_pos % mb_width,
        mb_y: mb_pos / mb_width,
    })
}

/// 输出 ZYGO 私有尾部 (仅诊断)
fn dump_zygo_trailer(br: &mut BitReader<'_>) -> PicResult<()> {
    let mut head = String::with_capacity(85);
    for _ in 0..85 {
        head.push(if br.read_flag()? { '1' } else { '0' });
    }
    trace!("ZYGO: {}", head);

    for _ in 0..13 {
        let mut row = String::new();
        for _ in 0..3 {
            let lo = br.read_bits(8)? as i32;
            let hi = br.read_bits_signed(8)?;
            row.push_str(&format!(" {:5}", lo | (hi << 8)));
        }
        trace!("ZYGO:{}", row);
    }

    let mut tail = String::with_capacity(50);
    for _ in 0..50 {
        tail.push(if br.read_flag()? { '1' } else { '0' });
    }
    trace!("ZYGO: {}", tail);
    Ok(())
}
