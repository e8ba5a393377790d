//! # 命令行接口模块
//!
//! 使用 `clap` 定义了程序的命令行结构。
//! 运行模式由位置参数的数量决定：三个路径为嵌入，两个路径为揭示。

use crate::steganography::{BitDepth, Mode};
use clap::Parser;
use std::num::IntErrorKind;
use std::path::PathBuf;

/// 解析位深参数：只接受十进制数字，超出 `u32` 范围的值饱和为 `u32::MAX`，随后再被截断为 7。
fn parse_bits(raw: &str) -> Result<u32, String> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("'{raw}' is not a non-negative integer"));
    }

    match raw.parse::<u32>() {
        Ok(bits) => Ok(bits),
        Err(e) if *e.kind() == IntErrorKind::PosOverflow => Ok(u32::MAX),
        Err(e) => Err(e.to_string()),
    }
}

/// 把一张图像藏进另一张图像的低位，或把低位放大以揭示被隐藏的图像。
#[derive(Parser, Debug)]
#[command(
    version,
    about,
    long_about = "把一张图像藏进另一张图像的低位，或把低位放大以揭示被隐藏的图像。\n\n\
                  嵌入: lsb_mix <BITS> <CARRIER> <HIDDEN> <OUTPUT>\n\
                  揭示: lsb_mix <BITS> <INPUT> <OUTPUT>"
)]
pub struct Cli {
    /// 每个颜色通道使用的低位数量。0 视为 1，大于 7 视为 7。
    #[arg(value_name = "BITS", value_parser = parse_bits)]
    pub bits: u32,

    /// 嵌入时依次为载体、隐藏图像、输出；揭示时依次为输入、输出。
    #[arg(value_name = "IMAGES", num_args = 2..=3, required = true)]
    pub paths: Vec<PathBuf>,

    /// 工作线程数量，0 表示使用全部硬件线程。
    #[arg(short = 'j', long, default_value_t = 0)]
    pub threads: usize,

    /// 输出文件已存在时直接覆盖。
    #[arg(short, long)]
    pub force: bool,

    /// 不打印结果摘要和耗时。
    #[arg(short, long)]
    pub quiet: bool,
}

/// 规整后的一次运行请求。
#[derive(Debug, Clone)]
pub struct Invocation {
    pub depth: BitDepth,
    pub mode: Mode,
    pub carrier: PathBuf,
    pub hidden: Option<PathBuf>,
    pub output: PathBuf,
    pub threads: usize,
    pub force: bool,
    pub quiet: bool,
}

impl TryFrom<Cli> for Invocation {
    type Error = anyhow::Error;

    fn try_from(cli: Cli) -> anyhow::Result<Self> {
        let depth = BitDepth::normalize(cli.bits);
        let mut paths = cli.paths.into_iter();

        let (mode, carrier, hidden, output) = match (
            paths.next(),
            paths.next(),
            paths.next(),
            paths.next(),
        ) {
            (Some(carrier), Some(hidden), Some(output), None) => {
                (Mode::Embed, carrier, Some(hidden), output)
            }
            (Some(input), Some(output), None, None) => (Mode::Reveal, input, None, output),
            _ => anyhow::bail!(
                "Expected <BITS> <CARRIER> <HIDDEN> <OUTPUT> or <BITS> <INPUT> <OUTPUT>"
            ),
        };

        Ok(Self {
            depth,
            mode,
            carrier,
            hidden,
            output,
            threads: cli.threads,
            force: cli.force,
            quiet: cli.quiet,
        })
    }
}
