use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
mod config;
mod error;
mod events;
mod helper;
pub mod mappings;
mod services;
mod utils;

use config::Config;
use events::EngineCommand;
use services::{create_display_service, create_platform_bridge, CornerService, ServiceSettings, TomlPreferenceStore};

#[derive(Parser, Debug)]
#[command(name = "corner-taskview")]
#[command(about = "Горячий угол экрана: открывает переключатель задач, когда курсор упирается в угол")]
struct Args {
    /// Путь к файлу конфигурации
    #[arg(short, long, default_value = "corner.toml")]
    config: String,

    /// Режим сухого запуска (без реальных действий)
    #[arg(long)]
    dry_run: bool,

    /// Уровень логирования (по умолчанию из конфигурации)
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Role>,
}

#[derive(Subcommand, Debug)]
enum Role {
    /// Воркер-подпроцесс: TRIGGER / STATUS / EXIT на stdin
    Worker {
        /// Не нажимать клавиши и не опрашивать X11
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Загрузка конфигурации
    let config = Config::load(&args.config)?;
    let level = args.log_level.clone().unwrap_or_else(|| config.logging.level.clone());

    match args.command {
        Some(Role::Worker { dry_run }) => {
            // stdout занят протоколом
            init_tracing(&level, &config.logging.format, true)?;
            helper::run(&config, dry_run || args.dry_run).await?;
            Ok(())
        }
        None => {
            init_tracing(&level, &config.logging.format, false)?;
            run_engine(config, &args).await
        }
    }
}

async fn run_engine(config: Config, args: &Args) -> Result<()> {
    info!("Запуск Corner TaskView v{}", env!("CARGO_PKG_VERSION"));
    info!("Конфигурация загружена из: {}", args.config);

    if args.dry_run {
        warn!("Режим сухого запуска - реальные действия отключены");
    }

    // Инициализация компонентов
    let bridge = create_platform_bridge(&config, args.dry_run)?;
    let display = create_display_service(args.dry_run)?;
    let store = Arc::new(TomlPreferenceStore::new(config.preferences_path()));
    info!("Файл настроек: {:?}", store.path());

    let (service, handle) = CornerService::new(ServiceSettings::from(&config), bridge, display, store);

    let mut service_handle = tokio::spawn(async move {
        if let Err(e) = service.run().await {
            error!("Ошибка в CornerService: {}", e);
        }
    });

    info!("Все сервисы запущены");

    // Ожидание сигнала завершения или неожиданной остановки сервиса
    tokio::select! {
        result = signal::ctrl_c() => match result {
            Ok(()) => info!("Получен сигнал завершения (Ctrl+C)"),
            Err(err) => error!("Ошибка при ожидании сигнала завершения: {}", err),
        },
        _ = &mut service_handle => {
            warn!("Сервис угла остановился сам");
            return Ok(());
        }
    }

    info!("Завершение работы...");

    if let Err(e) = handle.send(EngineCommand::Shutdown).await {
        warn!("Не удалось отправить команду завершения: {}", e);
    }

    // Ожидаем завершения сервиса (с таймаутом)
    let shutdown_timeout = tokio::time::Duration::from_secs(5);
    match tokio::time::timeout(shutdown_timeout, &mut service_handle).await {
        Ok(_) => info!("Все сервисы завершили работу корректно"),
        Err(_) => {
            warn!("Таймаут при завершении сервисов");
            service_handle.abort();
        }
    }

    info!("Corner TaskView завершил работу");
    Ok(())
}

fn init_tracing(level: &str, format: &str, to_stderr: bool) -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;

    let layer = tracing_subscriber::fmt::layer().with_writer(move || -> Box<dyn std::io::Write> {
        if to_stderr {
            Box::new(std::io::stderr())
        } else {
            Box::new(std::io::stdout())
        }
    });

    match format {
        "full" => tracing_subscriber::registry().with(filter).with(layer).init(),
        _ => tracing_subscriber::registry().with(filter).with(layer.compact()).init(),
    }

    Ok(())
}
