//! page-translator 命令行入口
//!
//! 读取一个 HTML 文档（文件、标准输入或 http(s) URL），运行一次手动翻译周期，
//! 把翻译后的文档写到文件或标准输出。日志写到标准错误。

use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use page_translator::env::{core::LogLevel, EnvVar};
use page_translator::parsers::html::metadata::charset_from_content_type;
use page_translator::parsers::html::{get_charset, get_title, html_to_dom, serialize_document};
use page_translator::translation::{
    translate_document, ConfigManager, CycleOutcome, TranslationConfig, TranslationError,
    TranslationResult,
};

const DEFAULT_ENCODING: &str = "utf-8";

/// 就地翻译 HTML 页面
#[derive(Parser, Debug)]
#[command(name = "page-translator")]
#[command(about = "Translate the visible text of an HTML page in place")]
#[command(version)]
struct Cli {
    /// HTML 文件路径、"-"（标准输入）或 http(s) URL
    #[arg(required_unless_present = "print_example_config")]
    target: Option<String>,

    /// 输出文件，缺省写到标准输出
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// 配置文件路径
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 目标语言
    #[arg(short, long)]
    target_lang: Option<String>,

    /// 模型名称
    #[arg(short, long)]
    model: Option<String>,

    /// API 密钥
    #[arg(short = 'k', long)]
    api_key: Option<String>,

    /// 翻译端点
    #[arg(long)]
    api_url: Option<String>,

    /// 每批最多的文本单元数
    #[arg(long)]
    chunk_size: Option<usize>,

    /// 即使页面语言已是目标语言也进行翻译
    #[arg(long)]
    ignore_page_lang: bool,

    /// 打印示例配置后退出
    #[arg(long)]
    print_example_config: bool,

    /// 输出调试日志
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn apply_overrides(&self, config: &mut TranslationConfig) {
        if let Some(target_lang) = &self.target_lang {
            config.target_lang = target_lang.clone();
        }
        if let Some(model) = &self.model {
            config.model = model.clone();
        }
        if let Some(api_key) = &self.api_key {
            config.api_key = Some(api_key.clone());
        }
        if let Some(api_url) = &self.api_url {
            config.api_url = api_url.clone();
        }
        if let Some(chunk_size) = self.chunk_size {
            config.chunk_size = chunk_size;
        }
        if self.ignore_page_lang {
            config.respect_page_lang = false;
        }
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        "debug".to_string()
    } else {
        LogLevel::get_or_default("info".to_string())
    };
    let filter = EnvFilter::try_new(format!("page_translator={}", level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn load_config(cli: &Cli) -> TranslationResult<TranslationConfig> {
    let manager = match &cli.config {
        Some(path) => ConfigManager::from_file(path)?,
        None => ConfigManager::new()?,
    };
    if let Some(path) = manager.source_path() {
        tracing::debug!("使用配置文件: {}", path.display());
    }

    let mut config = manager.config()?;
    cli.apply_overrides(&mut config);
    config.validate()?;
    Ok(config)
}

/// 读取输入，返回内容与传输层声明的字符集
async fn read_input(target: &str) -> TranslationResult<(Vec<u8>, Option<String>)> {
    if target == "-" {
        let mut data = Vec::new();
        io::stdin().read_to_end(&mut data)?;
        return Ok((data, None));
    }

    if let Ok(url) = url::Url::parse(target) {
        if matches!(url.scheme(), "http" | "https") {
            let response = reqwest::get(url).await?;
            let status = response.status();
            let charset = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|value| value.to_str().ok())
                .and_then(charset_from_content_type);
            let body = response.bytes().await?;
            if !status.is_success() {
                return Err(TranslationError::TransportError {
                    status: status.as_u16(),
                    body: String::from_utf8_lossy(&body).into_owned(),
                });
            }
            return Ok((body.to_vec(), charset));
        }
    }

    Ok((fs::read(target)?, None))
}

fn write_output(path: Option<&PathBuf>, data: &[u8]) -> io::Result<()> {
    match path {
        Some(path) => fs::write(path, data),
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(data)?;
            stdout.flush()
        }
    }
}

async fn run(cli: Cli) -> TranslationResult<()> {
    if cli.print_example_config {
        print!("{}", ConfigManager::example_config()?);
        return Ok(());
    }

    let config = load_config(&cli)?;
    let target = cli.target.as_deref().unwrap_or("-");
    let (data, transport_charset) = read_input(target).await?;

    let mut encoding = transport_charset.unwrap_or_else(|| DEFAULT_ENCODING.to_string());
    let mut dom = html_to_dom(&data, &encoding);
    if let Some(charset) = get_charset(&dom.document) {
        if !charset.eq_ignore_ascii_case(&encoding)
            && encoding_rs::Encoding::for_label(charset.as_bytes()).is_some()
        {
            tracing::debug!("按文档声明的字符集 {} 重新解析", charset);
            encoding = charset;
            dom = html_to_dom(&data, &encoding);
        }
    }

    if let Some(title) = get_title(&dom.document) {
        tracing::debug!("页面标题: {}", title.trim());
    }

    let result = translate_document(&dom.document, &config).await;

    // 失败前已完成的批次同样写出
    let output = serialize_document(&dom, &encoding)?;
    write_output(cli.output.as_ref(), &output)?;

    let report = result?;
    match report.outcome {
        CycleOutcome::SkippedPageLang(lang) => {
            tracing::info!("页面语言为 {}，未做翻译", lang)
        }
        _ => tracing::info!(
            "完成: {} 个文本单元, {} 个批次, 改写 {} 个节点",
            report.units_collected,
            report.batches_total,
            report.changed
        ),
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
