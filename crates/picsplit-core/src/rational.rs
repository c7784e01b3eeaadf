//! 有理数类型, 用于帧率、像素宽高比等场景.

use std::fmt;

/// 有理数, 由分子和分母组成
///
/// 例如: 帧率 30000/1001 表示 29.97fps, 像素宽高比 12/11 表示 CIF 4:3.
/// 像素宽高比未知时取 [`Rational::ZERO`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rational {
    /// 分子
    pub num: i32,
    /// 分母
    pub den: i32,
}

impl Rational {
    /// 零值 (0/1)
    pub const ZERO: Self = Self { num: 0, den: 1 };

    /// 创建新的有理数 (不约分)
    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    /// 约分并保证分母为正
    ///
    /// 分母为 0 时原样返回; 分子为 0 时结果为 0/1.
    pub fn reduce(self) -> Self {
        if self.den == 0 {
            return self;
        }
        let g = gcd(self.num.unsigned_abs(), self.den.unsigned_abs()) as i32;
        let (num, den) = (self.num / g, self.den / g);
        if den < 0 {
            Self::new(-num, -den)
        } else {
            Self::new(num, den)
        }
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

/// 最大公约数
fn gcd(a: u32, b: u32) -> u32 {
    if b == 0 { a } else { gcd(b, a % b) }
}
