use flux_track::DeviceSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// 定时快照任务句柄
pub struct SnapshotTaskHandle {
    shutdown_tx: watch::Sender<bool>,
    join_handle: JoinHandle<()>,
}

impl SnapshotTaskHandle {
    /// 停止任务并等待退出
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.join_handle.await;
    }
}

/// 在阻塞线程池中保存快照
pub async fn save_snapshot(set: Arc<DeviceSet>, path: PathBuf) -> anyhow::Result<()> {
    tokio::task::spawn_blocking(move || set.save(&path)).await??;
    Ok(())
}

/// 启动定时快照任务
pub fn start_snapshot_task(set: Arc<DeviceSet>, path: PathBuf, period: Duration) -> SnapshotTaskHandle {
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    let join_handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        // 第一次 tick 立即返回，跳过
        ticker.tick().await;
        info!(path = %path.display(), period = ?period, "Snapshot task started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = save_snapshot(set.clone(), path.clone()).await {
                        error!(path = %path.display(), error = %e, "Periodic snapshot failed");
                    }
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Snapshot task stopped");
    });

    SnapshotTaskHandle {
        shutdown_tx,
        join_handle,
    }
}
