use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use altlens_core_sdk::prelude::*;

/**
 * \brief CLI 程序入口：配置密钥、登记图片、生成替代文本与启动管理服务。
 */
#[derive(Parser, Debug)]
#[command(name = "altlens", version, about = "Generate image alt text with a vision model")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /**
     * \brief 保存 Gemini API Key。
     */
    Init {
        #[arg(long)]
        api_key: String,
        #[arg(long, default_value_t = false)]
        enable_telemetry: bool,
    },

    /**
     * \brief 登记一张已存储的图片；是图片时在后台生成替代文本，等待完成后退出。
     */
    Add {
        #[arg(long)]
        url: String,
        #[arg(long, default_value = "image/jpeg")]
        mime_type: String,
        #[arg(long)]
        alt_text: Option<String>,
    },

    /**
     * \brief 同步为单张图片生成替代文本。
     */
    Generate {
        #[arg(long)]
        id: i64,
    },

    /**
     * \brief 为所有缺少替代文本的图片生成，等待后台任务完成后退出。
     */
    Backfill,

    /**
     * \brief 列出图片记录。
     */
    List {
        #[arg(long, default_value_t = false)]
        missing: bool,
    },

    /**
     * \brief 启动本地管理 HTTP 服务。
     */
    Serve {
        #[arg(long, default_value = "127.0.0.1:8787")]
        addr: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::from_env();

    let store = SqliteStore::open(&config.db_path).context("open database failed")?;
    let file_logging = store.telemetry_enabled().unwrap_or(false);
    telemetry::init(file_logging, &config.log_dir);

    match cli.command {
        Commands::Init {
            api_key,
            enable_telemetry,
        } => {
            store.set_api_key(&api_key).context("save api key failed")?;
            store
                .set_telemetry_enabled(enable_telemetry)
                .context("save telemetry failed")?;
            println!(
                "Saved api key (file logging {})",
                if enable_telemetry { "on" } else { "off" }
            );
        }
        Commands::Add {
            url,
            mime_type,
            alt_text,
        } => {
            let services = Services::from_store(store, &config)?;
            let id = services
                .store_image(&url, &mime_type, alt_text.as_deref())
                .context("insert image failed")?;
            println!("Added image id={} ({} | {})", id, mime_type, url);
            services.pool.shutdown().await;
            if let Some(record) = services.store.get_image(id).context("read image failed")? {
                if let Some(alt) = record.alt_text {
                    println!("{}", alt);
                }
            }
        }
        Commands::Generate { id } => {
            let services = Services::from_store(store, &config)?;
            let resp = services.coordinator.generate_single(ImageId(id)).await;
            services.pool.shutdown().await;
            match (resp.success, resp.alt_text, resp.error) {
                (true, Some(alt), _) => println!("{}", alt),
                (_, _, Some(err)) => bail!("generation failed for image {}: {}", id, err),
                _ => bail!("generation failed for image {}", id),
            }
        }
        Commands::Backfill => {
            let services = Services::from_store(store, &config)?;
            let dispatched = services
                .coordinator
                .generate_missing()
                .context("dispatch backfill failed")?;
            println!("Alt text generation started for {} image(s)", dispatched);
            services.pool.shutdown().await;
            let remaining = services.store.list_images(true)?.len();
            println!("Done, {} image(s) still without alt text", remaining);
        }
        Commands::List { missing } => {
            for image in store.list_images(missing).context("list images failed")? {
                println!(
                    "{}\t{}\t{}\t{}",
                    image.id,
                    image.mime_type,
                    image.url,
                    image.alt_text.unwrap_or_default()
                );
            }
        }
        Commands::Serve { addr } => {
            let services = Services::from_store(store, &config)?;
            server::run(&addr, services).await?;
        }
    }

    Ok(())
}
