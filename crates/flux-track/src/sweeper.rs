use crate::error::Result;
use crate::packed::DigitCode;
use crate::store::{DeviceSet, TierOutcome};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

/// 超时处理策略，所有时间单位为秒
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SweepPolicy {
    /// 超过该时间未上报则删除
    pub remove_after: Option<i64>,
    /// 超过该时间未移动则删除
    pub remove_after_motion: Option<i64>,
    /// 超过该时间未上报则染色
    pub tag_after: Option<(i64, DigitCode)>,
    /// 超过该时间未移动则染色
    pub tag_after_motion: Option<(i64, DigitCode)>,
    /// 分档染色（超时降序）
    pub tiers: Vec<(i64, DigitCode)>,
}

/// 一次扫描的结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SweepReport {
    /// 因未上报被删除的设备
    pub removed: Vec<String>,
    /// 因未移动被删除的设备
    pub removed_stationary: Vec<String>,
    /// 未上报染色个数
    pub tagged: usize,
    /// 未移动染色个数
    pub tagged_stationary: usize,
    /// 分档染色结果
    pub tiered: TierOutcome,
}

impl SweepReport {
    /// 本次扫描是否改动了集合
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty()
            && self.removed_stationary.is_empty()
            && self.tagged == 0
            && self.tagged_stationary == 0
            && self.tiered.count == 0
    }
}

/// 设备超时扫描器
///
/// 定时对 [`DeviceSet`] 执行删除与染色，集合本身不持有定时器。
pub struct DeviceSweeper {
    set: Arc<DeviceSet>,
    policy: SweepPolicy,
    period: Duration,
    running: Arc<RwLock<bool>>,
    task: Mutex<Option<JoinHandle<()>>>,
    sweeps: AtomicU64,
}

impl DeviceSweeper {
    /// 创建扫描器
    ///
    /// # 参数
    /// * `set` - 设备集合
    /// * `policy` - 超时策略
    /// * `period` - 扫描间隔
    pub fn new(set: Arc<DeviceSet>, policy: SweepPolicy, period: Duration) -> Self {
        Self {
            set,
            policy,
            period,
            running: Arc::new(RwLock::new(false)),
            task: Mutex::new(None),
            sweeps: AtomicU64::new(0),
        }
    }

    pub fn policy(&self) -> &SweepPolicy {
        &self.policy
    }

    /// 已完成的扫描次数
    pub fn sweep_count(&self) -> u64 {
        self.sweeps.load(Ordering::Relaxed)
    }

    /// 以 `now` 为当前时间执行一次扫描
    ///
    /// 顺序：按报文时间删除、按移动时间删除、按报文时间染色、按移动时间染色、分档染色。
    /// 全部步骤在同一写锁内完成。
    pub fn sweep_at(&self, now: i64) -> Result<SweepReport> {
        let policy = &self.policy;
        let (thresholds, colors): (Vec<i64>, Vec<DigitCode>) = policy.tiers.iter().copied().unzip();

        let report = self.set.batch(|table| -> Result<SweepReport> {
            let mut report = SweepReport::default();

            if let Some(timeout) = policy.remove_after {
                report.removed = table.remove_timeout_by_report_time(now, timeout).1;
            }
            if let Some(timeout) = policy.remove_after_motion {
                report.removed_stationary = table.remove_timeout_by_motion_time(now, timeout).1;
            }
            if let Some((timeout, color)) = policy.tag_after {
                report.tagged = table.tag_timeout_by_report_time(now, timeout, color).0;
            }
            if let Some((timeout, color)) = policy.tag_after_motion {
                report.tagged_stationary = table.tag_timeout_by_motion_time(now, timeout, color).0;
            }
            if !thresholds.is_empty() {
                report.tiered = table.tag_tiered_timeout(now, &thresholds, &colors)?;
            }
            Ok(report)
        })?;
        self.sweeps.fetch_add(1, Ordering::Relaxed);

        if report.is_empty() {
            debug!(now, "Sweep found nothing to do");
        } else {
            info!(
                now,
                removed = report.removed.len(),
                removed_stationary = report.removed_stationary.len(),
                tagged = report.tagged,
                tagged_stationary = report.tagged_stationary,
                tiered = report.tiered.count,
                "Device sweep applied"
            );
        }
        Ok(report)
    }

    /// 启动后台扫描任务
    pub async fn start(self: &Arc<Self>) {
        let mut task = self.task.lock().await;
        let mut running = self.running.write().await;
        if *running {
            warn!("Device sweeper is already running");
            return;
        }
        *running = true;
        drop(running);

        info!(period = ?self.period, policy = ?self.policy, "Device sweeper started");

        let sweeper = Arc::clone(self);
        *task = Some(tokio::spawn(async move {
            let mut ticker = interval(sweeper.period);

            loop {
                ticker.tick().await;

                if !*sweeper.running.read().await {
                    break;
                }

                let now = chrono::Utc::now().timestamp();
                if let Err(e) = sweeper.sweep_at(now) {
                    error!(error = %e, "Device sweep failed");
                }
            }
        }));
    }

    /// 停止后台扫描任务，返回时任务已退出
    pub async fn stop(&self) {
        let mut task = self.task.lock().await;
        *self.running.write().await = false;
        info!("Device sweeper stopping...");

        if let Some(handle) = task.take() {
            handle.abort();
            let _ = handle.await;
            info!("Device sweeper stopped");
        }
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Device;

    fn color(value: u32) -> DigitCode {
        DigitCode::from(value)
    }

    fn populated_set() -> Arc<DeviceSet> {
        let set = Arc::new(DeviceSet::new("truck"));
        let mut parked = Device::new("parked").with_time(990);
        parked.tm = 100;
        set.set_devices(
            vec![
                Device::new("gone").with_time(0),
                Device::new("late").with_time(850),
                Device::new("fresh").with_time(995),
                parked,
            ],
            false,
        )
        .unwrap();
        set.batch(|table| {
            for id in ["late", "fresh"] {
                let mut device = table.get_device(id).unwrap();
                device.tm = device.t;
                table.set_device(device, false).unwrap();
            }
        });
        set
    }

    #[test]
    fn test_sweep_runs_every_step() {
        let set = populated_set();
        let policy = SweepPolicy {
            remove_after: Some(600),
            remove_after_motion: None,
            tag_after: None,
            tag_after_motion: Some((300, color(9))),
            tiers: vec![(120, color(2)), (30, color(1))],
        };
        let sweeper = DeviceSweeper::new(set.clone(), policy, Duration::from_secs(10));

        let report = sweeper.sweep_at(1000).unwrap();
        assert_eq!(report.removed, vec!["gone".to_string()]);
        assert_eq!(report.tagged_stationary, 1);
        // parked 仍在上报，不进入分档；late 进入第一档
        assert_eq!(report.tiered.count, 1);
        assert_eq!(set.get_device("late").unwrap().color, color(2));
        assert_eq!(set.get_device("fresh").unwrap().color, DigitCode::ZERO);
        assert_eq!(set.get_device("parked").unwrap().color, color(9));
        assert!(!report.is_empty());
    }

    #[test]
    fn test_sweep_removes_stationary() {
        let set = populated_set();
        let policy = SweepPolicy {
            remove_after_motion: Some(500),
            ..Default::default()
        };
        let sweeper = DeviceSweeper::new(set.clone(), policy, Duration::from_secs(10));

        let report = sweeper.sweep_at(1000).unwrap();
        assert_eq!(
            report.removed_stationary,
            vec!["gone".to_string(), "parked".to_string()]
        );
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_empty_policy_is_noop() {
        let set = populated_set();
        let sweeper = DeviceSweeper::new(set.clone(), SweepPolicy::default(), Duration::from_secs(1));
        let report = sweeper.sweep_at(10_000).unwrap();
        assert!(report.is_empty());
        assert_eq!(set.len(), 4);
    }

    #[tokio::test]
    async fn test_sweeper_start_stop() {
        let set = Arc::new(DeviceSet::new("truck"));
        set.set_device(Device::new("ancient").with_time(0), false).unwrap();

        let policy = SweepPolicy {
            remove_after: Some(60),
            ..Default::default()
        };
        let sweeper = Arc::new(DeviceSweeper::new(set.clone(), policy, Duration::from_millis(20)));

        sweeper.start().await;
        assert!(sweeper.is_running().await);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(set.is_empty());

        sweeper.stop().await;
        assert!(!sweeper.is_running().await);
    }

    #[tokio::test]
    async fn test_sweeper_restart_keeps_single_loop() {
        let set = Arc::new(DeviceSet::new("truck"));
        let sweeper = Arc::new(DeviceSweeper::new(
            set,
            SweepPolicy::default(),
            Duration::from_millis(100),
        ));

        sweeper.start().await;
        sweeper.stop().await;
        let after_stop = sweeper.sweep_count();
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(sweeper.sweep_count(), after_stop);

        sweeper.stop().await;
        sweeper.start().await;
        sweeper.stop().await;
        sweeper.start().await;
        tokio::time::sleep(Duration::from_millis(450)).await;
        sweeper.stop().await;

        // 单个循环约 5 次扫描，两个并发循环会翻倍
        assert!(sweeper.sweep_count() - after_stop <= 7);
    }
}
