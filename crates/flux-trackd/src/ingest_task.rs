use flux_track::{IngestReport, Ingestor, ReportRecord};
use std::io::{BufRead, ErrorKind};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

/// 未满一批时的最长等待
const FLUSH_INTERVAL: Duration = Duration::from_millis(200);

/// 在独立线程上逐行读取，通过通道交给异步任务
///
/// 阻塞读取不占用运行时线程，进程退出时无需等待输入端关闭。
pub fn spawn_line_reader<R>(reader: R, capacity: usize) -> mpsc::Receiver<String>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::channel(capacity);

    std::thread::spawn(move || {
        for line in reader.lines() {
            match line {
                Ok(line) => {
                    if tx.blocking_send(line).is_err() {
                        break;
                    }
                }
                Err(e) if e.kind() == ErrorKind::InvalidData => {
                    warn!(error = %e, "Skipping report line with invalid UTF-8");
                }
                Err(e) => {
                    error!(error = %e, "Report input read failed");
                    break;
                }
            }
        }
    });

    rx
}

fn flush(ingestor: &Ingestor, batch: &mut Vec<ReportRecord>, total: &mut IngestReport) {
    if batch.is_empty() {
        return;
    }
    let report = ingestor.ingest(std::mem::take(batch));
    total.created += report.created;
    total.updated += report.updated;
    total.moved += report.moved;
    total.rejected += report.rejected;
}

/// 将 JSON 上报记录分批写入，直到输入结束或收到关闭通知
pub async fn ingest_lines(
    ingestor: &Ingestor,
    mut lines: mpsc::Receiver<String>,
    batch_size: usize,
    mut shutdown_rx: watch::Receiver<bool>,
) -> IngestReport {
    let mut batch = Vec::with_capacity(batch_size);
    let mut total = IngestReport::default();
    let mut ticker = tokio::time::interval(FLUSH_INTERVAL);

    loop {
        tokio::select! {
            line = lines.recv() => {
                let Some(line) = line else {
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                match ReportRecord::parse(line.as_bytes()) {
                    Ok(record) => batch.push(record),
                    Err(e) => {
                        warn!(error = %e, "Skipping malformed report line");
                        total.rejected += 1;
                    }
                }
                if batch.len() >= batch_size {
                    flush(ingestor, &mut batch, &mut total);
                }
            }
            _ = ticker.tick() => flush(ingestor, &mut batch, &mut total),
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }

    flush(ingestor, &mut batch, &mut total);
    info!(
        created = total.created,
        updated = total.updated,
        moved = total.moved,
        rejected = total.rejected,
        "Report ingestion finished"
    );
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use flux_track::DeviceSet;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_ingest_lines_until_eof() {
        let set = Arc::new(DeviceSet::new("bus"));
        let ingestor = Ingestor::new(set.clone(), 8, 0.0).unwrap();
        let input = concat!(
            "{\"id\":\"a\",\"x\":1.0,\"y\":1.0,\"t\":100}\n",
            "\n",
            "not json\n",
            "{\"id\":\"b\",\"x\":2.0,\"y\":2.0,\"t\":\"2024-01-01 08:00:00\"}\n",
            "{\"id\":\"a\",\"x\":1.0,\"y\":1.0,\"t\":130}\n",
        );
        let lines = spawn_line_reader(std::io::Cursor::new(input), 16);
        let (_tx, rx) = watch::channel(false);

        let total = ingest_lines(&ingestor, lines, 2, rx).await;
        assert_eq!(total.created, 2);
        assert_eq!(total.updated, 1);
        assert_eq!(total.moved, 2);
        assert_eq!(total.rejected, 1);

        let a = set.get_device("a").unwrap();
        assert_eq!((a.t, a.tm), (130, 100));
        assert_eq!(set.get_device("b").unwrap().t, 1_704_067_200);
    }

    #[tokio::test]
    async fn test_shutdown_while_input_stays_open() {
        let set = Arc::new(DeviceSet::new("bus"));
        let ingestor = Ingestor::new(set.clone(), 8, 0.0).unwrap();
        let (line_tx, lines) = mpsc::channel(16);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        line_tx
            .send("{\"id\":\"a\",\"x\":1.0,\"y\":1.0,\"t\":100}".to_string())
            .await
            .unwrap();

        let task = tokio::spawn(async move { ingest_lines(&ingestor, lines, 64, shutdown_rx).await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown_tx.send(true).unwrap();

        // 输入端仍然打开，关闭通知必须让任务结束
        let total = tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("ingestion should stop on shutdown")
            .unwrap();
        assert_eq!(total.created, 1);
        assert!(set.contains("a"));
        drop(line_tx);
    }
}
