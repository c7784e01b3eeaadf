//! 日志初始化模块.
//!
//! 双输出 (统一级别):
//! - console: 彩色, 输出到 stderr (stdout 留给探测结果)
//! - file: 无色, 无 target
//!
//! 级别体系 (优先级: PICSPLIT_LOG 环境变量 > 命令行 > 默认):
//! - 默认:   info
//! - `-v`:   debug (每幅图像的图像头摘要)
//! - `-vv`:  trace (仅 picsplit crate, 含 ZYGO 私有尾部)
//! - `-vvv`: trace (全局)
//! - `-q`:   console 只输出 warn 及以上
//!
//! 日志文件输出到 `{log_dir}/{prefix}.{date}.log`

use anyhow::{Context, Result};
use chrono::{Datelike, Local, Timelike};
use std::path::Path;
use std::sync::OnceLock;
use tracing_subscriber::{
    EnvFilter, Registry,
    fmt::{self, FormatEvent, FormatFields, format::Writer},
    layer::{Layer, SubscriberExt},
    registry::LookupSpan,
    util::SubscriberInitExt,
};

static LOG_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

/// 日志级别环境变量
const LOG_ENV: &str = "PICSPLIT_LOG";

/// 本项目 crate 的 target 前缀 (用于 -vv 级别的定向 trace)
const PICSPLIT_CRATE_TARGETS: &[&str] = &[
    "picsplit",
    "picsplit_core",
    "picsplit_codec",
    "picsplit_probe",
];

/// 构建 -vv 级别的 EnvFilter: picsplit crate trace, 其余 info
fn build_picsplit_trace_filter() -> EnvFilter {
    let mut directives = PICSPLIT_CRATE_TARGETS
        .iter()
        .map(|t| format!("{t}=trace"))
        .collect::<Vec<_>>();
    directives.push("info".to_string());
    EnvFilter::new(directives.join(","))
}

/// 根据 verbosity 构建 EnvFilter
pub(crate) fn build_filter(verbosity: u8) -> EnvFilter {
    match verbosity {
        0 => EnvFilter::new("info"),
        1 => EnvFilter::new("debug"),
        2 => build_picsplit_trace_filter(),
        _ => EnvFilter::new("trace"),
    }
}

/// 初始化日志系统
///
/// - `log_dir`: 日志目录
/// - `file_prefix`: 日志文件前缀
/// - `verbosity`: 0=info, 1=debug, 2=trace(picsplit), 3+=trace(all)
/// - `quiet`: console 只保留告警
pub fn init(log_dir: &Path, file_prefix: &str, verbosity: u8, quiet: bool) -> Result<()> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("创建日志目录失败: {}", log_dir.display()))?;

    let file_appender = tracing_appender::rolling::RollingFileAppender::builder()
        .rotation(tracing_appender::rolling::Rotation::DAILY)
        .filename_prefix(file_prefix)
        .filename_suffix("log")
        .build(log_dir)
        .context("创建日志文件失败")?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    LOG_GUARD.set(guard).ok();

    let console_filter = if quiet {
        EnvFilter::new("warn")
    } else {
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| build_filter(verbosity))
    };
    let file_filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| build_filter(verbosity));

    let console_layer = fmt::Layer::default()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .event_format(ConsoleFormatter)
        .with_filter(console_filter);

    let file_layer = fmt::Layer::default()
        .with_writer(non_blocking)
        .with_ansi(false)
        .event_format(FileFormatter)
        .with_filter(file_filter);

    // log 宏的记录经由 tracing-log 桥接进来
    Registry::default()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("日志系统已初始化")?;
    Ok(())
}

/// 写入 `[MM-DD HH:MM:SS.mmm]` 时间戳
fn write_timestamp(writer: &mut Writer<'_>) -> std::fmt::Result {
    let now = Local::now();
    write!(
        writer,
        "[{:02}-{:02} {:02}:{:02}:{:02}.{:03}]",
        now.month(),
        now.day(),
        now.hour(),
        now.minute(),
        now.second(),
        now.timestamp_subsec_millis(),
    )
}

/// Console 格式: 彩色级别
struct ConsoleFormatter;

impl<S, N> FormatEvent<S, N> for ConsoleFormatter
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &fmt::FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let meta = event.metadata();
        let color = match *meta.level() {
            tracing::Level::ERROR => "\x1b[31m",
            tracing::Level::WARN => "\x1b[33m",
            tracing::Level::INFO => "\x1b[32m",
            _ => "\x1b[34m",
        };
        write_timestamp(&mut writer)?;
        write!(writer, " {}{:5}\x1b[0m > ", color, meta.level())?;
        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// File 格式: 无色, 无 target, 时间戳 + 级别 + 消息
struct FileFormatter;

impl<S, N> FormatEvent<S, N> for FileFormatter
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &fmt::FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        write_timestamp(&mut writer)?;
        write!(writer, " {:5} > ", event.metadata().level())?;
        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}
