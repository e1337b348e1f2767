use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;

use crate::hand::{HandDetector, HandObservation};

/// 手検出を専用スレッドで実行するワーカー
///
/// 同時に実行する検出ジョブは常に1つ。ジョブ実行中に届いたフレームは
/// キューに積まず破棄する（キュー深さ1のバックプレッシャー）。
/// 投入したジョブのキャンセルは無く、必ず完了まで走る。
pub struct DetectionWorker<F> {
    busy: Arc<AtomicBool>,
    frame_tx: mpsc::Sender<F>,
    result_rx: mpsc::Receiver<Vec<HandObservation>>,
    _handle: thread::JoinHandle<()>,
}

impl<F: Send + 'static> DetectionWorker<F> {
    pub fn spawn<D>(mut detector: D) -> Self
    where
        D: HandDetector<Frame = F> + Send + 'static,
    {
        let busy = Arc::new(AtomicBool::new(false));
        let busy_ref = busy.clone();
        let (frame_tx, frame_rx) = mpsc::channel::<F>();
        let (result_tx, result_rx) = mpsc::channel();

        let handle = thread::spawn(move || {
            for frame in frame_rx {
                // 検出失敗は「このフレームに手は無かった」として扱う
                let observations = detector.detect(frame).unwrap_or_default();
                let _ = result_tx.send(observations);
                busy_ref.store(false, Ordering::Release);
            }
        });

        Self {
            busy,
            frame_tx,
            result_rx,
            _handle: handle,
        }
    }

    /// 検出ジョブが走っていなければフレームを投入して true を返す
    ///
    /// 実行中の場合フレームは破棄され false が返る。
    pub fn try_submit(&self, frame: F) -> bool {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        if self.frame_tx.send(frame).is_err() {
            self.busy.store(false, Ordering::Release);
            return false;
        }
        true
    }

    /// 完了した検出結果を取り出す（ノンブロッキング）
    pub fn poll(&self) -> Option<Vec<HandObservation>> {
        self.result_rx.try_recv().ok()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hand::Handedness;
    use anyhow::Result;
    use std::time::Duration;

    /// gate から受信するまで完了しない検出器
    struct GatedDetector {
        gate: mpsc::Receiver<()>,
    }

    impl HandDetector for GatedDetector {
        type Frame = u32;

        fn detect(&mut self, _frame: u32) -> Result<Vec<HandObservation>> {
            self.gate.recv().ok();
            Ok(vec![HandObservation::empty(Handedness::Left)])
        }
    }

    #[test]
    fn test_backpressure_drops_frames_while_busy() {
        let (gate_tx, gate_rx) = mpsc::channel();
        let worker = DetectionWorker::spawn(GatedDetector { gate: gate_rx });

        assert!(worker.try_submit(1));
        // 実行中は新フレームを受け付けない
        assert!(!worker.try_submit(2));
        assert!(worker.is_busy());

        gate_tx.send(()).unwrap();
        let result = worker
            .result_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("detection completes");
        assert_eq!(result.len(), 1);

        // 完了後は次のフレームを受け付ける
        assert!(worker.try_submit(3));
        gate_tx.send(()).unwrap();
    }

    struct FailingDetector;

    impl HandDetector for FailingDetector {
        type Frame = ();

        fn detect(&mut self, _frame: ()) -> Result<Vec<HandObservation>> {
            anyhow::bail!("inference failed")
        }
    }

    #[test]
    fn test_detector_error_yields_empty_result() {
        let worker = DetectionWorker::spawn(FailingDetector);
        assert!(worker.try_submit(()));
        let result = worker
            .result_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("result arrives");
        assert!(result.is_empty());
    }
}
