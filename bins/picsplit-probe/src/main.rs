//! picsplit-probe - H.263 码流图像分割探测工具
//!
//! 按块读取原始 H.263 / H.263+ 码流, 逐幅输出图像尺寸、图像类型与量化参数.

mod logging;
mod report;

use anyhow::{Context, Result, bail};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process;

use picsplit_codec::ParserConfig;
use report::{ProbeReport, split_stream};

/// H.263 码流图像分割探测工具
#[derive(Parser, Debug)]
#[command(name = "picsplit-probe", version, about = "H.263 码流图像分割探测工具")]
struct Cli {
    /// 输入文件路径 (原始 H.263 码流)
    input: Option<PathBuf>,

    /// 每次送入解析器的字节数
    #[arg(long, default_value_t = 4096)]
    chunk_size: usize,

    /// 容器 FourCC (如 ZYGO)
    #[arg(long)]
    codec_tag: Option<String>,

    /// 累积缓冲区上限 (字节)
    #[arg(long = "max-buffer")]
    max_buffer: Option<usize>,

    /// 输出 JSON 格式
    #[arg(long)]
    json: bool,

    /// 静默模式 (只输出探测结果)
    #[arg(short, long)]
    quiet: bool,

    /// 日志级别 (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// 日志目录
    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,
}

fn main() {
    let cli = Cli::parse();

    let Some(input) = cli.input.as_deref() else {
        print_banner();
        return;
    };

    if let Err(e) = logging::init(&cli.log_dir, "picsplit-probe", cli.verbose, cli.quiet) {
        eprintln!("警告: 日志初始化失败: {e:#}");
    }

    if let Err(e) = run(&cli, input) {
        eprintln!("错误: {e:#}");
        process::exit(1);
    }
}

fn run(cli: &Cli, input: &Path) -> Result<()> {
    if !cli.quiet {
        eprintln!(
            "picsplit-probe 版本 {} -- H.263 码流图像分割探测工具",
            env!("CARGO_PKG_VERSION")
        );
        eprintln!("输入文件: {}", input.display());
    }

    let config = build_config(cli.codec_tag.as_deref(), cli.max_buffer)?;
    let report = probe_file(input, cli.chunk_size, config)?;

    if cli.json {
        let json = serde_json::to_string_pretty(&report).context("序列化 JSON 失败")?;
        println!("{json}");
    } else {
        print_report_text(&report);
    }
    Ok(())
}

/// 由命令行参数构建解析器配置
fn build_config(codec_tag: Option<&str>, max_buffer: Option<usize>) -> Result<ParserConfig> {
    let mut config = ParserConfig::default();
    if let Some(tag) = codec_tag {
        let bytes = tag.as_bytes();
        if bytes.len() != 4 || !bytes.is_ascii() {
            bail!("codec tag 必须为 4 个 ASCII 字符: {tag:?}");
        }
        config = config.with_codec_tag([bytes[0], bytes[1], bytes[2], bytes[3]]);
    }
    if let Some(size) = max_buffer {
        config = config.with_max_buffer_size(size);
    }
    Ok(config)
}

/// 读取文件并分割
fn probe_file(path: &Path, chunk_size: usize, config: ParserConfig) -> Result<ProbeReport> {
    if chunk_size == 0 {
        bail!("chunk-size 必须大于 0");
    }
    let data =
        std::fs::read(path).with_context(|| format!("无法打开文件 '{}'", path.display()))?;
    let result = split_stream(&data, chunk_size, config);
    Ok(ProbeReport {
        filename: path.display().to_string(),
        chunk_size,
        pictures: result.pictures,
        summary: result.summary,
    })
}

/// 文本输出
fn print_report_text(report: &ProbeReport) {
    for picture in &report.pictures {
        println!("{}", picture.text_line());
        for warning in &picture.warnings {
            println!("  warning: {warning}");
        }
    }
    println!("---stream eos---");
    println!();
    println!("[SUMMARY]");
    println!("  数据包总数   : {}", report.summary.total_packets);
    println!("  图像数       : {}", report.summary.total_pictures);
    println!("  图像头错误   : {}", report.summary.failed_headers);
    println!("  丢弃块数     : {}", report.summary.dropped_chunks);
    println!(
        "  数据总量     : {} 字节 ({:.2} KB)",
        report.summary.total_bytes,
        report.summary.total_bytes as f64 / 1024.0
    );
    println!("[/SUMMARY]");
}

/// 打印版本横幅
fn print_banner() {
    println!(
        "picsplit-probe 版本 {} -- H.263 码流图像分割探测工具",
        env!("CARGO_PKG_VERSION")
    );
    println!();
    println!("用法: picsplit-probe [选项] <输入文件>");
    println!();
    println!("选项:");
    println!("  --chunk-size N    每次送入的字节数 (默认 4096)");
    println!("  --codec-tag TAG   容器 FourCC (如 ZYGO)");
    println!("  --max-buffer N    累积缓冲区上限 (字节)");
    println!("  --json            以 JSON 格式输出");
    println!("  -q, --quiet       静默模式");
    println!("  -v, -vv, -vvv     日志级别");
    println!();
    println!("使用 --help 查看完整用法.");
}
