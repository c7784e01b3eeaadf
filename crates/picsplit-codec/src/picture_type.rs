//! 图像类型.

use std::fmt;

/// 图像类型 (I/P/B 等)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PictureType {
    /// 未指定
    #[default]
    None,
    /// I 帧 (帧内编码)
    I,
    /// P 帧 (前向预测)
    P,
    /// B 帧 (双向预测)
    B,
    /// S 帧 (GMC Sprite)
    S,
    /// SI 帧 (切换 I 帧)
    Si,
    /// SP 帧 (切换 P 帧)
    Sp,
    /// BI 帧
    Bi,
}

impl PictureType {
    /// 单字符表示, 与常见码流分析工具的输出一致
    pub fn as_char(self) -> char {
        match self {
            Self::None => '?',
            Self::I => 'I',
            Self::P => 'P',
            Self::B => 'B',
            Self::S => 'S',
            Self::Si => 'i',
            Self::Sp => 'p',
            Self::Bi => 'b',
        }
    }

    /// 是否为帧内编码图像
    pub fn is_intra(self) -> bool {
        matches!(self, Self::I | Self::Si)
    }
}

impl fmt::Display for PictureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}
