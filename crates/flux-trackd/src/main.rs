mod ingest_task;
mod policy;
mod snapshot_task;

use anyhow::Context;
use clap::Parser;
use flux_config::ConfigLoader;
use flux_track::{DeviceSet, DeviceSweeper, Ingestor};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "FLUX device position cache")]
struct Args {
    /// 配置目录（读取 global.toml）
    #[arg(long, default_value = "./config")]
    config_dir: PathBuf,

    /// 覆盖配置中的快照文件
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// 不从标准输入读取上报记录
    #[arg(long)]
    no_stdin: bool,
}

/// 恢复快照；文件不存在时创建空集合
fn restore(path: &Path, device_class: &str) -> anyhow::Result<DeviceSet> {
    if !path.exists() {
        info!(path = %path.display(), "No snapshot found, starting empty");
        return Ok(DeviceSet::new(device_class));
    }

    let set = DeviceSet::load(path)
        .with_context(|| format!("Failed to load snapshot {}", path.display()))?;
    if set.device_class() != device_class {
        warn!(
            snapshot_class = %set.device_class(),
            configured_class = %device_class,
            "Snapshot device class differs from configuration"
        );
    }
    Ok(set)
}

/// 等待 SIGTERM 或 Ctrl+C
#[cfg(unix)]
async fn shutdown_signal() -> anyhow::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        _ = sigterm.recv() => info!("Received SIGTERM"),
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("Received Ctrl+C");
        }
    }
    Ok(())
}

#[cfg(not(unix))]
async fn shutdown_signal() -> anyhow::Result<()> {
    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl+C");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // 加载配置
    let config = ConfigLoader::new(&args.config_dir)
        .load_validated()
        .with_context(|| format!("Invalid configuration in {}", args.config_dir.display()))?;

    flux_logging::init(&config.logging)?;
    info!(
        name = %config.system.name,
        version = %config.system.version,
        device_class = %config.store.device_class,
        "Starting flux-trackd"
    );

    let snapshot_path = args
        .snapshot
        .clone()
        .unwrap_or_else(|| config.store.snapshot_path.clone());
    let set = Arc::new(restore(&snapshot_path, &config.store.device_class)?);

    // 超时扫描
    let sweeper = Arc::new(DeviceSweeper::new(
        set.clone(),
        policy::sweep_policy(&config.sweep),
        Duration::from_secs(config.sweep.interval_secs),
    ));
    sweeper.start().await;

    // 定时快照
    let snapshot_handle = (config.store.snapshot_interval_secs > 0).then(|| {
        snapshot_task::start_snapshot_task(
            set.clone(),
            snapshot_path.clone(),
            Duration::from_secs(config.store.snapshot_interval_secs),
        )
    });

    let ingestor = Ingestor::new(
        set.clone(),
        config.ingest.utc_offset_hours,
        config.ingest.min_move_distance,
    )?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    if args.no_stdin {
        shutdown_signal().await?;
    } else {
        let batch_size = config.ingest.batch_size;
        // 标准输入在独立线程读取，收到信号后进程可以直接退出
        let stdin = std::io::BufReader::new(std::io::stdin());
        let lines = ingest_task::spawn_line_reader(stdin, batch_size);
        let mut ingest = tokio::spawn(async move {
            ingest_task::ingest_lines(&ingestor, lines, batch_size, shutdown_rx).await
        });

        let result = tokio::select! {
            signal = shutdown_signal() => {
                signal?;
                let _ = shutdown_tx.send(true);
                ingest.await
            }
            result = &mut ingest => {
                info!("Report input closed");
                result
            }
        };
        if let Err(e) = result {
            error!(error = %e, "Report ingestion task panicked");
        }
    }

    // 收尾：停止后台任务并保存最终快照
    sweeper.stop().await;
    if let Some(handle) = snapshot_handle {
        handle.shutdown().await;
    }
    snapshot_task::save_snapshot(set.clone(), snapshot_path.clone())
        .await
        .with_context(|| format!("Failed to save snapshot {}", snapshot_path.display()))?;

    info!(devices = set.len(), "flux-trackd stopped");
    Ok(())
}
