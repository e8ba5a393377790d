//! # 像素变换模块
//!
//! 逐像素的纯函数：
//! * 嵌入 (Embed)：保留载体每个通道的高 `8 - bits` 位，用隐藏图像的最高 `bits` 位替换低位。
//! * 揭示 (Reveal)：取出每个通道的低 `bits` 位，并线性放大回 `[0, 255]`。
//!
//! 两种变换都把 alpha 通道写成 [`OPAQUE`]。

use crate::constants::{MAX_BITS, MIN_BITS, OPAQUE};
use image::Rgba;

/// 每个颜色通道用于承载隐藏数据的低位数量，始终位于 `[1, 7]`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BitDepth(u8);

impl BitDepth {
    /// 将任意输入规整到 `[1, 7]`：0 提升为 1，大于 7 的值截断为 7。
    pub fn normalize(raw: u32) -> Self {
        let bits = raw.clamp(u32::from(MIN_BITS), u32::from(MAX_BITS));
        Self(bits as u8)
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// 保留低 `bits` 位的掩码。
    pub fn low_mask(self) -> u8 {
        0xFF >> (8 - self.0)
    }

    /// 保留高 `8 - bits` 位的掩码。
    pub fn high_mask(self) -> u8 {
        !self.low_mask()
    }

    /// `2^bits - 1`，即低位能表示的最大值。
    pub fn divisor(self) -> u32 {
        (1u32 << self.0) - 1
    }
}

/// 将隐藏通道的最高 `bits` 位写入载体通道的低 `bits` 位。
pub fn embed_channel(carrier: u8, hidden: u8, depth: BitDepth) -> u8 {
    (carrier & depth.high_mask()) | ((hidden >> (8 - depth.get())) & depth.low_mask())
}

/// 把通道的低 `bits` 位按 `round(255 * v / (2^bits - 1))` 放大回完整的 8 位范围。
pub fn reveal_channel(value: u8, depth: BitDepth) -> u8 {
    let low = u32::from(value & depth.low_mask());
    let divisor = depth.divisor();
    // low <= divisor，结果不会超过 255
    ((255 * low + divisor / 2) / divisor) as u8
}

pub fn embed_pixel(carrier: Rgba<u8>, hidden: Rgba<u8>, depth: BitDepth) -> Rgba<u8> {
    let [cr, cg, cb, _] = carrier.0;
    let [hr, hg, hb, _] = hidden.0;
    Rgba([
        embed_channel(cr, hr, depth),
        embed_channel(cg, hg, depth),
        embed_channel(cb, hb, depth),
        OPAQUE,
    ])
}

pub fn reveal_pixel(pixel: Rgba<u8>, depth: BitDepth) -> Rgba<u8> {
    let [r, g, b, _] = pixel.0;
    Rgba([
        reveal_channel(r, depth),
        reveal_channel(g, depth),
        reveal_channel(b, depth),
        OPAQUE,
    ])
}

/// 运行模式：由是否提供了隐藏图像决定，每次运行只选择一次。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Embed,
    Reveal,
}
