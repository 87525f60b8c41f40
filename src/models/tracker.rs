//! ByteTrack 风格的多帧跟踪
//!
//! 1. 高分框（不低于置信度阈值）优先与已确认轨迹做 IoU 匹配
//! 2. 低分框救援未匹配的已确认轨迹
//! 3. 剩余高分框尝试确认上一帧新建的待确认轨迹
//! 4. 仍未匹配的高分框新建轨迹，首帧直接确认

use crate::config::TrackerConfig;
use crate::models::detector::{compute_iou, ObjectDetector, RawDetection};
use crate::Result;
use image::RgbImage;
use parking_lot::Mutex;
use std::sync::Arc;

/// 多帧跟踪能力
pub trait ObjectTracker: Send + Sync {
    /// `persist = false` 时丢弃已有轨迹状态后再处理当前帧
    fn track(
        &self,
        image: &RgbImage,
        confidence_threshold: f32,
        persist: bool,
    ) -> Result<Vec<RawDetection>>;
}

#[derive(Debug, Clone)]
struct Track {
    id: u32,
    bbox: [f32; 4],
    frames_lost: u32,
    activated: bool,
}

#[derive(Debug, Default)]
struct TrackerState {
    tracks: Vec<Track>,
    next_id: u32,
    frame_id: u64,
}

impl TrackerState {
    fn update(
        &mut self,
        detections: &[RawDetection],
        confidence_threshold: f32,
        config: &TrackerConfig,
    ) -> Vec<RawDetection> {
        self.frame_id += 1;

        let (high, low): (Vec<usize>, Vec<usize>) = (0..detections.len())
            .partition(|&idx| detections[idx].confidence >= confidence_threshold);

        let mut assigned: Vec<Option<u32>> = vec![None; detections.len()];
        let mut matched_track = vec![false; self.tracks.len()];

        // 第一轮: 高分检测 + 已确认轨迹
        let confirmed: Vec<usize> = (0..self.tracks.len())
            .filter(|&t| self.tracks[t].activated)
            .collect();
        let first = self.greedy_match(detections, &high, &confirmed, config.match_iou_threshold);
        self.apply(detections, &first, &mut assigned, &mut matched_track);

        // 第二轮: 低分检测救援剩余已确认轨迹
        let remaining: Vec<usize> = confirmed
            .iter()
            .copied()
            .filter(|&t| !matched_track[t])
            .collect();
        let second = self.greedy_match(detections, &low, &remaining, config.low_match_iou_threshold);
        self.apply(detections, &second, &mut assigned, &mut matched_track);

        // 第三轮: 剩余高分检测 + 待确认轨迹
        let unmatched_high: Vec<usize> = high
            .iter()
            .copied()
            .filter(|&d| !first.iter().any(|&(det, _)| det == d))
            .collect();
        let tentative: Vec<usize> = (0..self.tracks.len())
            .filter(|&t| !self.tracks[t].activated)
            .collect();
        let third = self.greedy_match(
            detections,
            &unmatched_high,
            &tentative,
            config.tentative_match_iou_threshold,
        );
        for &(_, t) in &third {
            self.tracks[t].activated = true;
        }
        self.apply(detections, &third, &mut assigned, &mut matched_track);

        // 未匹配轨迹: 待确认的直接删除，已确认的累计丢失帧数
        let mut kept = Vec::with_capacity(self.tracks.len());
        for (track, matched) in self.tracks.drain(..).zip(matched_track) {
            if matched {
                kept.push(track);
            } else if track.activated && track.frames_lost < config.max_lost_frames {
                kept.push(Track {
                    frames_lost: track.frames_lost + 1,
                    ..track
                });
            }
        }
        self.tracks = kept;

        // 未匹配的高分检测新建轨迹
        let first_frame = self.frame_id == 1;
        for &d in &high {
            if assigned[d].is_some() || third.iter().any(|&(det, _)| det == d) {
                continue;
            }
            self.next_id += 1;
            self.tracks.push(Track {
                id: self.next_id,
                bbox: detections[d].bbox,
                frames_lost: 0,
                activated: first_frame,
            });
            if first_frame {
                assigned[d] = Some(self.next_id);
            }
        }

        high.into_iter()
            .map(|d| RawDetection {
                track_id: assigned[d],
                ..detections[d].clone()
            })
            .collect()
    }

    fn apply(
        &mut self,
        detections: &[RawDetection],
        pairs: &[(usize, usize)],
        assigned: &mut [Option<u32>],
        matched_track: &mut [bool],
    ) {
        for &(d, t) in pairs {
            let track = &mut self.tracks[t];
            track.bbox = detections[d].bbox;
            track.frames_lost = 0;
            matched_track[t] = true;
            if track.activated {
                assigned[d] = Some(track.id);
            }
        }
    }

    /// 贪心 IoU 匹配，返回 (检测下标, 轨迹下标)
    fn greedy_match(
        &self,
        detections: &[RawDetection],
        det_indices: &[usize],
        track_indices: &[usize],
        iou_threshold: f32,
    ) -> Vec<(usize, usize)> {
        if det_indices.is_empty() || track_indices.is_empty() {
            return Vec::new();
        }

        let mut candidates = Vec::new();
        for &d in det_indices {
            for &t in track_indices {
                let iou = compute_iou(&detections[d].bbox, &self.tracks[t].bbox);
                if iou >= iou_threshold {
                    candidates.push((1.0 - iou, d, t));
                }
            }
        }
        candidates.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut used_det = Vec::new();
        let mut used_track = Vec::new();
        let mut pairs = Vec::new();
        for (_, d, t) in candidates {
            if !used_det.contains(&d) && !used_track.contains(&t) {
                used_det.push(d);
                used_track.push(t);
                pairs.push((d, t));
            }
        }
        pairs
    }
}

/// 在任意检测器之上做跟踪；状态锁覆盖整个检测+关联过程，跟踪请求串行执行
pub struct ByteTracker {
    detector: Arc<dyn ObjectDetector>,
    config: TrackerConfig,
    state: Mutex<TrackerState>,
}

impl ByteTracker {
    pub fn new(detector: Arc<dyn ObjectDetector>, config: TrackerConfig) -> Self {
        Self {
            detector,
            config,
            state: Mutex::new(TrackerState::default()),
        }
    }

    /// 当前存活的轨迹数
    pub fn active_tracks(&self) -> usize {
        self.state.lock().tracks.len()
    }
}

impl ObjectTracker for ByteTracker {
    fn track(
        &self,
        image: &RgbImage,
        confidence_threshold: f32,
        persist: bool,
    ) -> Result<Vec<RawDetection>> {
        let mut state = self.state.lock();
        if !persist {
            tracing::debug!("Discarding {} tracks", state.tracks.len());
            *state = TrackerState::default();
        }

        let floor = confidence_threshold.min(self.config.low_score_threshold);
        let detections = self.detector.infer(image, floor)?;

        Ok(state.update(&detections, confidence_threshold, &self.config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ClassNames;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// 按顺序逐帧返回预设检测结果
    struct ScriptedDetector {
        names: ClassNames,
        frames: Mutex<VecDeque<Vec<RawDetection>>>,
    }

    impl ScriptedDetector {
        fn new(frames: Vec<Vec<RawDetection>>) -> Arc<Self> {
            Arc::new(Self {
                names: ClassNames::from_labels(["10k", "20k"]),
                frames: Mutex::new(frames.into()),
            })
        }
    }

    impl ObjectDetector for ScriptedDetector {
        fn class_names(&self) -> &ClassNames {
            &self.names
        }

        fn infer(&self, _image: &RgbImage, threshold: f32) -> Result<Vec<RawDetection>> {
            let frame = self.frames.lock().pop_front().unwrap_or_default();
            Ok(frame.into_iter().filter(|d| d.confidence >= threshold).collect())
        }
    }

    fn det(x: f32, confidence: f32) -> RawDetection {
        RawDetection::new([x, 10.0, x + 50.0, 60.0], confidence, 0)
    }

    fn ids(dets: &[RawDetection]) -> Vec<Option<u32>> {
        dets.iter().map(|d| d.track_id).collect()
    }

    fn frame() -> RgbImage {
        RgbImage::new(8, 8)
    }

    #[test]
    fn keeps_identity_across_small_motion() {
        let detector = ScriptedDetector::new(vec![
            vec![det(0.0, 0.9)],
            vec![det(4.0, 0.92)],
            vec![det(8.0, 0.88)],
        ]);
        let tracker = ByteTracker::new(detector, TrackerConfig::default());

        for _ in 0..3 {
            let out = tracker.track(&frame(), 0.7, true).unwrap();
            assert_eq!(ids(&out), vec![Some(1)]);
        }
    }

    #[test]
    fn new_objects_after_first_frame_start_tentative() {
        let detector = ScriptedDetector::new(vec![
            vec![det(0.0, 0.9)],
            vec![det(0.0, 0.9), det(300.0, 0.8)],
            vec![det(0.0, 0.9), det(302.0, 0.8)],
        ]);
        let tracker = ByteTracker::new(detector, TrackerConfig::default());

        assert_eq!(ids(&tracker.track(&frame(), 0.7, true).unwrap()), vec![Some(1)]);
        assert_eq!(
            ids(&tracker.track(&frame(), 0.7, true).unwrap()),
            vec![Some(1), None]
        );
        assert_eq!(
            ids(&tracker.track(&frame(), 0.7, true).unwrap()),
            vec![Some(1), Some(2)]
        );
    }

    #[test]
    fn low_score_boxes_rescue_tracks_without_being_reported() {
        let detector = ScriptedDetector::new(vec![
            vec![det(0.0, 0.9)],
            vec![det(2.0, 0.3)],
            vec![det(4.0, 0.9)],
        ]);
        let tracker = ByteTracker::new(detector, TrackerConfig::default());

        assert_eq!(ids(&tracker.track(&frame(), 0.7, true).unwrap()), vec![Some(1)]);
        assert!(tracker.track(&frame(), 0.7, true).unwrap().is_empty());
        assert_eq!(ids(&tracker.track(&frame(), 0.7, true).unwrap()), vec![Some(1)]);
    }

    #[test]
    fn reset_restarts_numbering() {
        let detector = ScriptedDetector::new(vec![
            vec![det(0.0, 0.9), det(200.0, 0.9)],
            vec![],
            vec![det(200.0, 0.9)],
            vec![det(201.0, 0.9)],
        ]);
        let tracker = ByteTracker::new(detector, TrackerConfig::default());

        assert_eq!(
            ids(&tracker.track(&frame(), 0.7, true).unwrap()),
            vec![Some(1), Some(2)]
        );
        tracker.track(&frame(), 0.7, false).unwrap();
        assert_eq!(tracker.active_tracks(), 0);

        // 重置用的空白帧占用了首帧，之后的新目标需要再确认一次
        assert_eq!(ids(&tracker.track(&frame(), 0.7, true).unwrap()), vec![None]);
        assert_eq!(ids(&tracker.track(&frame(), 0.7, true).unwrap()), vec![Some(1)]);
    }

    /// 统计同时处于推理中的调用数
    struct CountingDetector {
        names: ClassNames,
        inside: AtomicUsize,
        max_inside: AtomicUsize,
    }

    impl ObjectDetector for CountingDetector {
        fn class_names(&self) -> &ClassNames {
            &self.names
        }

        fn infer(&self, _image: &RgbImage, _threshold: f32) -> Result<Vec<RawDetection>> {
            let now = self.inside.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_inside.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(2));
            self.inside.fetch_sub(1, Ordering::SeqCst);
            Ok(vec![det(0.0, 0.9)])
        }
    }

    #[test]
    fn concurrent_calls_are_serialized() {
        let detector = Arc::new(CountingDetector {
            names: ClassNames::from_labels(["10k"]),
            inside: AtomicUsize::new(0),
            max_inside: AtomicUsize::new(0),
        });
        let tracker = ByteTracker::new(detector.clone(), TrackerConfig::default());

        let outputs: Vec<Vec<Option<u32>>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    scope.spawn(|| {
                        (0..5)
                            .flat_map(|_| ids(&tracker.track(&frame(), 0.7, true).unwrap()))
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(detector.max_inside.load(Ordering::SeqCst), 1);
        for track_ids in outputs {
            assert_eq!(track_ids, vec![Some(1); 5]);
        }
        assert_eq!(tracker.active_tracks(), 1);
    }

    #[test]
    fn lost_tracks_expire() {
        let config = TrackerConfig {
            max_lost_frames: 2,
            ..TrackerConfig::default()
        };
        let mut frames = vec![vec![det(0.0, 0.9)]];
        frames.extend(std::iter::repeat(Vec::new()).take(3));
        let tracker = ByteTracker::new(ScriptedDetector::new(frames), config);

        tracker.track(&frame(), 0.7, true).unwrap();
        tracker.track(&frame(), 0.7, true).unwrap();
        tracker.track(&frame(), 0.7, true).unwrap();
        assert_eq!(tracker.active_tracks(), 1);
        tracker.track(&frame(), 0.7, true).unwrap();
        assert_eq!(tracker.active_tracks(), 0);
    }
}
