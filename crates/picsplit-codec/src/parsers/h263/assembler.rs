//! H.263 图像边界检测与分片重组.
//!
//! 输入是调用方任意切分的字节块, 输出是完整的单幅图像字节.
//! 三部分状态分开管理:
//! - [`ScanState`]: 32 位移位寄存器 + "已进入帧" 标志, 跨调用保存起始码搜索进度
//! - [`Accumulator`]: 可增长的字节缓冲区与写入游标
//! - [`Overread`]: 扫描时已越过当前帧末尾、属于下一帧的字节记录
//!
//! 边界搜索只依赖移位寄存器中的历史字节, 因此任意切分方式都会得到相同的帧序列.

use log::{debug, trace};
use picsplit_core::{PicError, PicResult};

/// 缓冲区末尾保留的填充字节数
pub const PADDING_SIZE: usize = 64;

/// 图像起始码 (PSC) 的 22 位取值
const PICTURE_START_CODE: u32 = 0x20;

/// 寄存器高 22 位是否为图像起始码
#[inline]
fn is_picture_start(state: u32) -> bool {
    state >> (32 - 22) == PICTURE_START_CODE
}

/// 帧结束位置搜索结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameEnd {
    /// 找到帧结束位置 (相对当前输入块的字节偏移)
    ///
    /// 偏移为负表示下一帧的起始码开始于此前已累积的字节中.
    Found(isize),
    /// 当前输入块中没有帧结束位置, 需要更多数据
    NeedMoreData,
}

/// 跨调用保存的起始码扫描状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanState {
    /// 最近输入的字节, 高位在前
    state: u32,
    /// 是否已找到当前帧的起始码
    frame_start_found: bool,
}

impl Default for ScanState {
    fn default() -> Self {
        Self {
            state: u32::MAX,
            frame_start_found: false,
        }
    }
}

impl ScanState {
    /// 创建初始扫描状态
    pub fn new() -> Self {
        Self::default()
    }

    /// 移位寄存器当前值
    pub fn register(&self) -> u32 {
        self.state
    }

    /// 是否处于帧内 (已找到起始码, 正在寻找下一个)
    pub fn inside_frame(&self) -> bool {
        self.frame_start_found
    }

    /// 回到 "寻找起始码" 状态并清空寄存器
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// 将字节移入寄存器, 不做起始码匹配
    pub fn feed(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.state = (self.state << 8) | u32::from(b);
        }
    }

    /// 在输入块中搜索当前帧的结束位置
    ///
    /// 第一次匹配到起始码表示帧开始, 在同一块内继续搜索;
    /// 帧内再次匹配时返回该起始码首字节的偏移 (匹配字节位置减 3),
    /// 并把状态复位为 "寻找起始码". 未找到时保存寄存器与帧内标志.
    pub fn find_frame_end(&mut self, chunk: &[u8]) -> FrameEnd {
        let mut state = self.state;
        let mut vop_found = self.frame_start_found;
        let mut i = 0;

        if !vop_found {
            while i < chunk.len() {
                state = (state << 8) | u32::from(chunk[i]);
                i += 1;
                if is_picture_start(state) {
                    vop_found = true;
                    break;
                }
            }
        }

        if vop_found {
            while i < chunk.len() {
                state = (state << 8) | u32::from(chunk[i]);
                if is_picture_start(state) {
                    self.reset();
                    return FrameEnd::Found(i as isize - 3);
                }
                i += 1;
            }
        }

        self.frame_start_found = vop_found;
        self.state = state;
        FrameEnd::NeedMoreData
    }
}

/// 越读字节记录
///
/// 帧结束偏移为负时, 起始码的前几个字节已被写入上一帧的缓冲区.
/// 这些字节在下一次调用时搬回缓冲区开头, 作为新帧的开始.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Overread {
    /// 越读字节数
    pub count: usize,
    /// 越读字节在缓冲区中的起始位置
    pub index: usize,
}

/// 图像字节累积缓冲区
///
/// 逻辑内容为 `buffer[..index]`, 其后至少保留 [`PADDING_SIZE`] 字节填充.
/// 缓冲区只增长不收缩.
#[derive(Debug)]
pub struct Accumulator {
    /// 底层存储, 长度即当前容量 (含填充)
    buffer: Vec<u8>,
    /// 写入游标
    index: usize,
    /// 上一次合并前的写入游标
    last_index: usize,
    /// 允许的最大容量 (字节)
    max_size: usize,
}

impl Accumulator {
    /// 创建空缓冲区, `max_size` 为允许增长到的最大容量
    pub fn new(max_size: usize) -> Self {
        Self {
            buffer: Vec::new(),
            index: 0,
            last_index: 0,
            max_size,
        }
    }

    /// 当前写入游标
    pub fn index(&self) -> usize {
        self.index
    }

    /// 上一次合并前的写入游标
    pub fn last_index(&self) -> usize {
        self.last_index
    }

    /// 当前容量 (含填充)
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// 获取缓冲区前 `len` 字节
    pub fn bytes(&self, len: usize) -> &[u8] {
        &self.buffer[..len.min(self.buffer.len())]
    }

    /// 确保容量至少为 `index + additional + PADDING_SIZE`
    fn reserve(&mut self, additional: usize) -> PicResult<()> {
        let required = self
            .index
            .checked_add(additional)
            .and_then(|n| n.checked_add(PADDING_SIZE))
            .ok_or_else(|| PicError::ResourceExhausted("缓冲区大小溢出".into()))?;
        if self.buffer.len() >= required {
            return Ok(());
        }
        if required > self.max_size {
            return Err(PicError::ResourceExhausted(format!(
                "缓冲区重新分配失败: 需要 {} 字节, 上限 {} 字节",
                required, self.max_size
            )));
        }
        self.buffer
            .try_reserve_exact(required - self.buffer.len())
            .map_err(|e| {
                PicError::ResourceExhausted(format!(
                    "缓冲区重新分配失败: 需要 {} 字节, {}",
                    required, e
                ))
            })?;
        self.buffer.resize(required, 0);
        Ok(())
    }

    /// 追加字节, 必要时增长缓冲区
    fn append(&mut self, bytes: &[u8]) -> PicResult<()> {
        self.reserve(bytes.len())?;
        self.buffer[self.index..self.index + bytes.len()].copy_from_slice(bytes);
        self.index += bytes.len();
        Ok(())
    }
}

/// 合并结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combined {
    /// 输入块已全部累积, 帧尚未结束
    NeedMoreData,
    /// 一帧完整, 数据为缓冲区前 `len` 字节
    Ready {
        /// 完整帧长度
        len: usize,
    },
}

/// 分片重组器
///
/// 组合 [`ScanState`], [`Accumulator`] 与 [`Overread`], 每次调用最多交付一帧.
#[derive(Debug)]
pub struct FrameAssembler {
    scan: ScanState,
    accumulator: Accumulator,
    overread: Overread,
}

/// 单次 [`FrameAssembler::assemble`] 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assembled {
    /// 消耗的输入字节数, 调用方应从该位置重新送入剩余字节
    pub consumed: usize,
    /// 合并结果
    pub combined: Combined,
}

impl FrameAssembler {
    /// 创建分片重组器
    pub fn new(max_buffer_size: usize) -> Self {
        Self {
            scan: ScanState::new(),
            accumulator: Accumulator::new(max_buffer_size),
            overread: Overread::default(),
        }
    }

    /// 扫描状态
    pub fn scan_state(&self) -> &ScanState {
        &self.scan
    }

    /// 累积缓冲区
    pub fn accumulator(&self) -> &Accumulator {
        &self.accumulator
    }

    /// 越读记录
    pub fn overread(&self) -> Overread {
        self.overread
    }

    /// 获取已完成帧的字节, `len` 来自 [`Combined::Ready`]
    pub fn frame(&self, len: usize) -> &[u8] {
        self.accumulator.bytes(len)
    }

    /// 在输入块中搜索帧结束位置
    pub fn find_frame_end(&mut self, chunk: &[u8]) -> FrameEnd {
        self.scan.find_frame_end(chunk)
    }

    /// 把输入块按帧结束位置合并进缓冲区
    ///
    /// 1. 先把上次记录的越读字节搬回写入位置
    /// 2. 结束偏移超过输入块长度返回 [`PicError::InvalidArgument`]
    /// 3. 空输入块且未找到边界视为流结束, 交付已累积内容
    /// 4. 未找到边界: 追加整个输入块
    /// 5. 找到边界: 只追加前 `end` 字节, 交付完整帧并把写入游标复位
    ///
    /// 缓冲区增长失败时丢弃当前累积 (`index` 复位为 0) 并返回
    /// [`PicError::ResourceExhausted`].
    pub fn combine(&mut self, end: FrameEnd, chunk: &[u8]) -> PicResult<Combined> {
        if self.overread.count > 0 {
            debug!(
                "H.263 越读回放: count={}, state={:08X}, index={}, o_index={}",
                self.overread.count,
                self.scan.register(),
                self.accumulator.index,
                self.overread.index
            );
            let Overread { count, index } = self.overread;
            let dst = self.accumulator.index;
            self.accumulator.buffer.copy_within(index..index + count, dst);
            self.accumulator.index += count;
            self.overread = Overread::default();
        }

        let next = match end {
            FrameEnd::Found(next) if next > chunk.len() as isize => {
                return Err(PicError::InvalidArgument(format!(
                    "帧结束偏移 {} 超过输入块长度 {}",
                    next,
                    chunk.len()
                )));
            }
            FrameEnd::Found(next) => Some(next),
            // 空输入且没有边界: 流结束, 交付剩余数据
            FrameEnd::NeedMoreData if chunk.is_empty() => Some(0),
            FrameEnd::NeedMoreData => None,
        };

        self.accumulator.last_index = self.accumulator.index;

        let Some(next) = next else {
            if let Err(e) = self.accumulator.append(chunk) {
                self.drop_accumulation();
                return Err(e);
            }
            return Ok(Combined::NeedMoreData);
        };

        if next >= 0 {
            let next = next as usize;
            if let Err(e) = self.accumulator.append(&chunk[..next]) {
                self.drop_accumulation();
                return Err(e);
            }
            let len = self.accumulator.index;
            self.overread = Overread {
                count: 0,
                index: len,
            };
            self.accumulator.index = 0;
            return Ok(Combined::Ready { len });
        }

        // 起始码开头已在缓冲区中: 截掉并记为越读
        let back = next.unsigned_abs();
        if back > self.accumulator.index {
            return Err(PicError::InvalidArgument(format!(
                "帧结束偏移 {} 超出已累积数据 {} 字节",
                next, self.accumulator.index
            )));
        }
        let len = self.accumulator.index - back;
        self.overread = Overread {
            count: back,
            index: len,
        };
        self.accumulator.index = 0;
        trace!("H.263 起始码跨块: 越读 {} 字节", back);
        Ok(Combined::Ready { len })
    }

    /// 搜索边界并合并一个输入块
    ///
    /// 找到边界时 `consumed` 为边界偏移 (负偏移时为 0), 剩余字节需要重新送入;
    /// 越读字节会同时移入扫描寄存器, 使下一次调用能识别跨块的起始码.
    pub fn assemble(&mut self, chunk: &[u8]) -> PicResult<Assembled> {
        let end = self.scan.find_frame_end(chunk);
        let combined = self.combine(end, chunk)?;

        let consumed = match (end, combined) {
            (FrameEnd::Found(next), Combined::Ready { .. }) => {
                if self.overread.count > 0 {
                    let Overread { count, index } = self.overread;
                    let head = &self.accumulator.buffer[index..index + count];
                    self.scan.feed(head);
                }
                next.max(0) as usize
            }
            _ => chunk.len(),
        };

        Ok(Assembled { consumed, combined })
    }

    /// 交付剩余数据 (流结束)
    pub fn flush(&mut self) -> PicResult<usize> {
        match self.combine(FrameEnd::NeedMoreData, &[])? {
            Combined::Ready { len } => {
                self.scan.reset();
                Ok(len)
            }
            Combined::NeedMoreData => Ok(0),
        }
    }

    /// 丢弃当前累积并回到初始扫描状态
    fn drop_accumulation(&mut self) {
        self.accumulator.index = 0;
        self.overread = Overread::default();
        self.scan.reset();
    }
}
