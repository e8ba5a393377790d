/// 分块的边长 (像素)。
/// 最后一列/一行的分块会被裁剪到剩余的宽度/高度。
pub const BLOCK_SIZE: u32 = 16;

/// 位深的下限。输入 0 会被提升到这个值。
pub const MIN_BITS: u8 = 1;

/// 位深的上限。
/// 8 位会把载体图像完全替换掉，因此不允许。
pub const MAX_BITS: u8 = 7;

/// 输出图像的 alpha 通道始终为完全不透明。
pub const OPAQUE: u8 = 255;
