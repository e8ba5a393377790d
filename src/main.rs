use clap::Parser;
use env_logger::{Builder, Env};

use lsb_mix::{
    cli::{Cli, Invocation},
    handler::handle,
};

/// 程序的主入口点
///
/// 负责初始化日志、解析命令行参数，并把规整后的请求交给处理函数
fn main() -> anyhow::Result<()> {
    // 默认只输出警告，可通过 RUST_LOG 调整
    Builder::from_env(Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    handle(Invocation::try_from(cli)?)
}
