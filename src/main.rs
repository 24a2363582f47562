use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use newsvote::{
    app::{router, workflow::execute_ingest_workflow, AppState},
    infra::db::setup_database,
    types::AppConfig,
};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "newsvote", version, about = "ニュース記事の投票・フィードAPI")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// HTTP APIサーバーを起動する
    Serve,
    /// ニュースAPIから記事を取り込む
    Ingest {
        /// 取り込むカテゴリ（省略時はNEWS_CATEGORIES）
        #[arg(short, long = "category")]
        categories: Vec<String>,
    },
    /// マイグレーションのみ実行する
    Migrate,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // 環境変数を読み込み（.envファイルがあれば使用）
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    let config = AppConfig::from_env().context("設定の読み込みに失敗")?;

    match cli.command {
        Command::Serve => serve(&config).await,
        Command::Ingest { categories } => ingest(&config, categories).await,
        Command::Migrate => {
            setup_database(&config.database).await?;
            info!("マイグレーション完了");
            Ok(())
        }
    }
}

async fn serve(config: &AppConfig) -> Result<()> {
    let state = AppState::from_config(config).await?;
    let app = router(state);

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("{}へのバインドに失敗", config.bind_addr))?;
    info!(addr = %config.bind_addr, "サーバーを起動しました");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("サーバーの実行に失敗")?;

    info!("サーバーを停止しました");
    Ok(())
}

async fn ingest(config: &AppConfig, categories: Vec<String>) -> Result<()> {
    let categories = if categories.is_empty() {
        config.news_api.categories.clone()
    } else {
        categories
    };

    let state = AppState::from_config(config).await?;
    let outcomes =
        execute_ingest_workflow(state.news_client.as_ref(), &state.pool, &categories).await;

    let failed: Vec<&str> = outcomes
        .iter()
        .filter(|o| !o.is_success())
        .map(|o| o.category.as_str())
        .collect();
    if !failed.is_empty() {
        anyhow::bail!("取り込みに失敗したカテゴリがあります: {}", failed.join(", "));
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "シグナルの待機に失敗しました");
        std::future::pending::<()>().await;
    }
    info!("終了シグナルを受信しました");
}
