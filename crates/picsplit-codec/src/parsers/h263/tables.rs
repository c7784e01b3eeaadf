//! H.263 图像头解析使用的固定表.

use picsplit_core::Rational;

/// 源格式 (PTYPE bit 6-8) 对应的分辨率, 0 表示禁止/保留
pub(crate) const H263_FORMATS: [(u32, u32); 8] = [
    (0, 0),       // 禁止
    (128, 96),    // Sub-QCIF
    (176, 144),   // QCIF
    (352, 288),   // CIF
    (704, 576),   // 4CIF
    (1408, 1152), // 16CIF
    (0, 0),       // 保留 (H.263+ 自定义格式)
    (0, 0),       // 扩展 PTYPE (PLUSPTYPE)
];

/// 扩展像素宽高比代码 (后跟显式 8 位分子/分母)
pub(crate) const ASPECT_EXTENDED: u32 = 15;

/// 像素宽高比代码 (CPFMT PAR) 对应的宽高比
///
/// 0 禁止, 1 为 1:1, 2 为 12:11, 3 为 10:11, 4 为 16:11, 5 为 40:33, 其余保留.
pub(crate) const PIXEL_ASPECT: [Rational; 16] = [
    Rational::new(0, 1),
    Rational::new(1, 1),
    Rational::new(12, 11),
    Rational::new(10, 11),
    Rational::new(16, 11),
    Rational::new(40, 33),
    Rational::new(0, 1),
    Rational::new(0, 1),
    Rational::new(0, 1),
    Rational::new(0, 1),
    Rational::new(0, 1),
    Rational::new(0, 1),
    Rational::new(0, 1),
    Rational::new(0, 1),
    Rational::new(0, 1),
    Rational::new(0, 1),
];

/// 标准格式下 H.263+ 使用的像素宽高比
pub(crate) const DEFAULT_PLUS_ASPECT: Rational = Rational::new(12, 11);

/// 默认帧率 (CIF 时钟 29.97Hz)
pub(crate) const DEFAULT_FRAME_RATE: Rational = Rational::new(30000, 1001);

/// 自定义图像时钟 (CPCFC) 的基准频率
pub(crate) const CUSTOM_CLOCK_BASE: i32 = 1_800_000;

/// 宏块地址 (MBA) 各宽度对应的最大 `mb_num - 1`
pub(crate) const MBA_MAX: [u32; 6] = [47, 98, 395, 1583, 6335, 9215];

/// 宏块地址 (MBA) 字段宽度, 最后一项用于超出 [`MBA_MAX`] 的情况
pub(crate) const MBA_LENGTH: [u32; 7] = [6, 7, 9, 11, 13, 14, 14];

/// 修正量化模式 (Annex T) 下的色度 QP 映射
pub(crate) const MODIFIED_CHROMA_QSCALE: [u8; 32] = [
    0, 1, 2, 3, 4, 5, 6, 6, 7, 8, 9, 9, 10, 10, 11, 11, 12, 12, 12, 13, 13, 13, 14, 14, 14, 14,
    14, 15, 15, 15, 15, 15,
];

/// 高级帧内编码 (Annex I) 的 DC 缩放表
pub(crate) const AIC_DC_SCALE: [u8; 32] = [
    0, 2, 4, 6, 8, 10, 12, 14, 16, 18, 20, 22, 24, 26, 28, 30, 32, 34, 36, 38, 40, 42, 44, 46, 48,
    50, 52, 54, 56, 58, 60, 62,
];

/// 普通帧内 DC 缩放 (MPEG-1 风格, 恒为 8)
pub(crate) const MPEG1_DC_SCALE: u8 = 8;
