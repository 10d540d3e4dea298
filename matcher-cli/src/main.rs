//! 论文匹配客户端命令行程序

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use matcher_admin::{init_logging, ConfigManager, MatcherConfig};
use matcher_client::{ApiSettings, HttpMatcherApi};
use matcher_core::{Profile, ProfileDraft, UploadFile};
use matcher_viewer::{RenderView, RendererSettings};
use matcher_workflow::{FormSettings, MatcherSession, SessionSettings};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// 命令行参数
#[derive(Parser, Debug)]
#[command(name = "paper-matcher")]
#[command(about = "Client for the medical paper matching service")]
struct Args {
    /// 配置文件路径
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 日志级别，覆盖配置文件
    #[arg(short, long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 检查服务状态
    Health,
    /// 一次请求上传多篇论文
    Upload {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// 论文管理
    Papers {
        #[command(subcommand)]
        command: PapersCommand,
    },
    /// 档案管理
    Profile {
        #[command(subcommand)]
        command: ProfileCommand,
    },
    /// 提交档案进行匹配
    Match {
        /// 档案JSON文件
        #[arg(short, long)]
        file: PathBuf,
    },
    /// 配置
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
enum PapersCommand {
    /// 列出全部论文
    List,
    /// 查看论文详情并导出PDF
    View {
        id: String,
        /// PDF输出路径，默认 `<id>.pdf`
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// 删除论文
    Delete {
        id: String,
        /// 跳过确认提示
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
enum ProfileCommand {
    /// 按用户名加载档案
    Load { username: String },
    /// 保存档案
    Save {
        username: String,
        /// 档案JSON文件
        #[arg(short, long)]
        file: PathBuf,
    },
    /// 删除档案
    Delete {
        username: String,
        /// 跳过确认提示
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// 显示生效配置，可指定点分路径
    Show { key: Option<String> },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let manager = ConfigManager::load(args.config.as_deref())?;
    let mut logging = manager.config().logging.clone();
    if let Some(level) = args.log_level {
        logging.level = level;
    }
    init_logging(&logging)?;

    if let Command::Config { command } = &args.command {
        return show_config(&manager, command);
    }

    let session = build_session(manager.config())?;
    let outcome = run(&session, args.command).await;
    session.shutdown().await;
    outcome
}

fn build_session(config: &MatcherConfig) -> Result<MatcherSession> {
    let api = HttpMatcherApi::new(ApiSettings {
        base_url: config.api.base_url.clone(),
        profiles_base_url: config.api.profiles_base_url.clone(),
        request_timeout: Duration::from_secs(config.api.request_timeout_secs),
        upload_field: config.api.upload_field.clone(),
        user_agent: config.api.user_agent.clone(),
    })?;
    info!("Using matcher service at {}", config.api.base_url);

    let settings = SessionSettings {
        form: FormSettings {
            match_errors: config.workflow.match_errors,
            profile_errors: config.workflow.profile_errors,
            numeric_policy: config.workflow.numeric_policy,
        },
        catalog_errors: config.workflow.catalog_errors,
        renderer: RendererSettings {
            max_payload_bytes: config.viewer.max_payload_bytes,
            require_pdf_signature: config.viewer.require_pdf_signature,
        },
    };
    Ok(MatcherSession::new(Arc::new(api), settings))
}

async fn run(session: &MatcherSession, command: Command) -> Result<()> {
    match command {
        Command::Health => {
            let status = session.health().await?;
            println!("{}", status.status);
            if !status.is_healthy() {
                bail!("service reported status {}", status.status);
            }
        }
        Command::Upload { files } => upload(session, &files).await?,
        Command::Papers { command } => papers(session, command).await?,
        Command::Profile { command } => profile(session, command).await?,
        Command::Match { file } => submit_match(session, &file).await?,
        Command::Config { .. } => {}
    }
    Ok(())
}

fn show_config(manager: &ConfigManager, command: &ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Show { key: Some(key) } => {
            let value = manager.get_value(key)?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        ConfigCommand::Show { key: None } => print!("{}", manager.to_toml()?),
    }
    Ok(())
}

async fn upload(session: &MatcherSession, paths: &[PathBuf]) -> Result<()> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        files.push(UploadFile::pdf(name, bytes));
    }

    let uploader = session.upload();
    uploader.select(files).await;
    let Some(results) = uploader.submit().await? else {
        return Ok(());
    };

    let mut failed = 0;
    for result in &results {
        match &result.paper_id {
            Some(id) if result.success => {
                println!("[ok]     {} ({}): {}", result.title, id, result.message)
            }
            _ => {
                failed += 1;
                println!("[failed] {}: {}", result.title, result.message);
            }
        }
    }
    if failed > 0 {
        bail!("{} of {} upload results failed", failed, results.len());
    }
    Ok(())
}

async fn papers(session: &MatcherSession, command: PapersCommand) -> Result<()> {
    let catalog = session.catalog();
    if let Err(e) = catalog.refresh().await {
        bail!("{}: {}", catalog.error().await.unwrap_or_default(), e);
    }

    match command {
        PapersCommand::List => {
            for paper in catalog.papers().await {
                println!("{}\t{}", paper.id, paper.title);
            }
        }
        PapersCommand::View { id, output } => {
            let document = catalog.view(&id).await?;
            if let Some(viewer) = catalog.viewer().await {
                println!("Title: {}", viewer.details.title);
                println!("\nSummary:\n{}", viewer.details.summary);
                println!("\nIdeal profile:\n{}", viewer.details.ideal_profile);
                println!("\nConditions:\n{}", viewer.details.conditions);
            }

            let outcome = match &document {
                RenderView::Ready(uri) => {
                    let output = output.unwrap_or_else(|| PathBuf::from(format!("{}.pdf", id)));
                    write_document(session, uri, &output).await
                }
                RenderView::Error(message) => Err(anyhow::anyhow!("{}", message)),
                RenderView::Empty | RenderView::Loading => {
                    Err(anyhow::anyhow!("no document available for paper {}", id))
                }
            };
            catalog.close_view().await;
            outcome?;
        }
        PapersCommand::Delete { id, yes } => {
            let deletion = catalog.request_delete(&id).await?;
            if confirm(&deletion.message(), yes)? {
                let result = catalog.confirm_delete(deletion).await;
                if let Err(e) = result {
                    bail!("{}: {}", catalog.error().await.unwrap_or_default(), e);
                }
                println!("Deleted paper {}", id);
            } else {
                catalog.cancel_delete(deletion);
                println!("Cancelled");
            }
        }
    }
    Ok(())
}

async fn write_document(session: &MatcherSession, uri: &str, output: &Path) -> Result<()> {
    let blob = session
        .registry()
        .resolve(uri)
        .with_context(|| format!("Resource {} is no longer available", uri))?;
    tokio::fs::write(output, &blob.bytes)
        .await
        .with_context(|| format!("Failed to write {}", output.display()))?;
    println!("\nSaved PDF ({} bytes) to {}", blob.len(), output.display());
    Ok(())
}

async fn profile(session: &MatcherSession, command: ProfileCommand) -> Result<()> {
    let form = session.form();
    match command {
        ProfileCommand::Load { username } => {
            if form.load(&username).await.is_err() {
                bail!("{}", form.banner().await.error.unwrap_or_default());
            }
            let profile = form.draft().await.coerce();
            println!("{}", serde_json::to_string_pretty(&profile)?);
        }
        ProfileCommand::Save { username, file } => {
            let profile = read_profile(&file).await?;
            form.replace_draft(ProfileDraft::from(&profile)).await;
            if form.save_as(&username).await.is_err() {
                bail!("{}", form.banner().await.error.unwrap_or_default());
            }
            println!("{}", form.banner().await.message.unwrap_or_default());
        }
        ProfileCommand::Delete { username, yes } => {
            let deletion = match form.request_delete(&username).await {
                Ok(deletion) => deletion,
                Err(_) => bail!("{}", form.banner().await.error.unwrap_or_default()),
            };
            if confirm(&deletion.message(), yes)? {
                if form.confirm_delete(deletion).await.is_err() {
                    bail!("{}", form.banner().await.error.unwrap_or_default());
                }
                println!("{}", form.banner().await.message.unwrap_or_default());
            } else {
                form.cancel_delete(deletion);
                println!("Cancelled");
            }
        }
    }
    Ok(())
}

async fn submit_match(session: &MatcherSession, file: &Path) -> Result<()> {
    let form = session.form();
    let profile = read_profile(file).await?;
    form.replace_draft(ProfileDraft::from(&profile)).await;

    let response = form.submit_match().await?;
    if response.matches.is_empty() {
        println!("No matching papers found");
    }
    for (rank, paper) in response.matches.iter().enumerate() {
        match paper.match_score {
            Some(score) => println!("{}. {} [{:.2}]", rank + 1, paper.title, score),
            None => println!("{}. {}", rank + 1, paper.title),
        }
        if !paper.summary.is_empty() {
            println!("   {}", paper.summary);
        }
        if let Some(url) = &paper.download_url {
            println!("   {}", url);
        }
    }
    Ok(())
}

async fn read_profile(path: &Path) -> Result<Profile> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let profile: Profile = serde_json::from_str(&text)
        .with_context(|| format!("Invalid profile in {}", path.display()))?;
    debug!("Read profile from {}", path.display());
    Ok(profile)
}

/// 在终端确认破坏性操作，`assume_yes` 直接作答
fn confirm(message: &str, assume_yes: bool) -> Result<bool> {
    if assume_yes {
        return Ok(true);
    }
    print!("{} [y/N] ", message);
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().read_line(&mut answer)?;
    Ok(matches!(
        answer.trim().to_ascii_lowercase().as_str(),
        "y" | "yes"
    ))
}
