//! 比特流读取器.
//!
//! 提供从字节缓冲区中按位读取数据的能力, 是图像头解析与单元分割的基础设施.
//!
//! 按大端位序读取 (MSB first). 读取位置是单一的位游标, 每次读取前先经
//! [`BitReader::ensure`] 检查剩余位数, 越界返回 [`PicError::InsufficientData`]
//! 且游标不动, 不会访问逻辑长度之外的内存.

use crate::{PicError, PicResult};

/// 比特流读取器
///
/// # 示例
/// ```
/// use picsplit_core::bitreader::BitReader;
///
/// let data = [0b10110001, 0b01010101];
/// let mut br = BitReader::new(&data);
/// assert_eq!(br.read_bits(4).unwrap(), 0b1011);
/// assert_eq!(br.read_bits(4).unwrap(), 0b0001);
/// assert_eq!(br.read_bits(8).unwrap(), 0b01010101);
/// ```
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    /// 源数据
    data: &'a [u8],
    /// 位游标 (从缓冲区首位起算)
    pos: usize,
}

impl<'a> BitReader<'a> {
    /// 创建新的比特流读取器
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// 获取已读取的总位数
    pub fn bits_read(&self) -> usize {
        self.pos
    }

    /// 获取剩余可读位数
    pub fn bits_left(&self) -> usize {
        self.size_in_bits().saturating_sub(self.pos)
    }

    /// 缓冲区总位数
    pub fn size_in_bits(&self) -> usize {
        self.data.len() * 8
    }

    /// 确认还剩至少 `n` 位
    fn ensure(&self, n: usize) -> PicResult<()> {
        if n > self.bits_left() {
            return Err(PicError::InsufficientData);
        }
        Ok(())
    }

    /// 取出从游标起最多 8 位且不跨字节的位段, 返回 (值, 位数)
    fn take_within_byte(&mut self, max: usize) -> (u32, usize) {
        let offset = self.pos % 8;
        let count = (8 - offset).min(max);
        let byte = u32::from(self.data[self.pos / 8]);
        let value = (byte >> (8 - offset - count)) & ((1 << count) - 1);
        self.pos += count;
        (value, count)
    }

    /// 读取 1 个位
    pub fn read_bit(&mut self) -> PicResult<u32> {
        self.ensure(1)?;
        Ok(self.take_within_byte(1).0)
    }

    /// 读取 1 个位并转换为布尔值
    pub fn read_flag(&mut self) -> PicResult<bool> {
        Ok(self.read_bit()? != 0)
    }

    /// 读取 N 个位 (最多 32 位)
    ///
    /// 按大端位序读取, 返回值的低 N 位有效; `n == 0` 返回 0.
    pub fn read_bits(&mut self, n: u32) -> PicResult<u32> {
        if n > 32 {
            return Err(PicError::InvalidArgument(format!(
                "read_bits: n={} 超过 32 位",
                n
            )));
        }
        let mut left = n as usize;
        self.ensure(left)?;

        let mut value = 0u64;
        while left > 0 {
            let (bits, count) = self.take_within_byte(left);
            value = (value << count) | u64::from(bits);
            left -= count;
        }
        Ok(value as u32)
    }

    /// 读取有符号整数 (二进制补码)
    pub fn read_bits_signed(&mut self, n: u32) -> PicResult<i32> {
        let raw = self.read_bits(n)?;
        if n == 0 {
            return Ok(0);
        }
        let unused = 32 - n;
        Ok(((raw << unused) as i32) >> unused)
    }

    /// 窥视 N 个位 (不移动游标)
    pub fn peek_bits(&self, n: u32) -> PicResult<u32> {
        self.clone().read_bits(n)
    }

    /// 跳过 N 个位
    pub fn skip_bits(&mut self, n: u32) -> PicResult<()> {
        self.ensure(n as usize)?;
        self.pos += n as usize;
        Ok(())
    }

    /// 对齐到下一个字节边界, 已对齐时不动
    pub fn byte_align(&mut self) {
        self.pos = self.pos.next_multiple_of(8);
    }

    /// 读取 1 个标记位, 必须为 1
    ///
    /// `context` 描述标记位所在的语法位置, 写入错误信息.
    pub fn check_marker(&mut self, context: &str) -> PicResult<()> {
        let at = self.pos;
        if self.read_bit()? != 1 {
            return Err(PicError::MalformedHeader(format!(
                "标记位缺失: {}, bit_pos={}",
                context, at
            )));
        }
        Ok(())
    }

    /// 跳过 "1 位停止 + 8 位数据" 形式的扩展字段 (如 H.263 的 PEI/PSUPP)
    ///
    /// 停止位为 1 时后跟 8 位数据并继续, 为 0 时结束.
    /// 在读到终止位之前数据耗尽则返回 [`PicError::InvalidData`].
    pub fn skip_extension_bits(&mut self) -> PicResult<()> {
        loop {
            if self.bits_left() == 0 {
                return Err(PicError::InvalidData("扩展位字段缺少终止位".into()));
            }
            if self.read_bit()? == 0 {
                return Ok(());
            }
            if self.ensure(8).is_err() {
                return Err(PicError::InvalidData("扩展位数据截断".into()));
            }
            self.pos += 8;
        }
    }

    /// 从当前位置读取 `n` 个原始字节
    ///
    /// 仅在字节对齐时可用.
    pub fn read_bytes(&mut self, n: usize) -> PicResult<&'a [u8]> {
        if self.pos % 8 != 0 {
            return Err(PicError::InvalidArgument("read_bytes 需要字节对齐".into()));
        }
        self.ensure(n.checked_mul(8).ok_or(PicError::InsufficientData)?)?;

        let start = self.pos / 8;
        self.pos += n * 8;
        Ok(&self.data[start..start + n])
    }
}
