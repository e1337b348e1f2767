use std::collections::HashMap;

use nalgebra::Vector3;

use crate::constraint::ConstraintSet;
use crate::geometry::{residual, triangulate};
use crate::hand::{Handedness, Joint};
use crate::render::TrackHandle;

/// 互換性スコア: 候補の制約と既存トラックの制約の手首レイを合わせて
/// 三角測量した際の残差
///
/// 割り当て判定専用の純関数。どちらかの手首レイが欠けている場合は
/// 判定不能として無限大を返す。
pub fn compatibility_score(candidate: &ConstraintSet, reference: &ConstraintSet) -> f32 {
    let (Some(a), Some(b)) = (candidate.ray(Joint::Wrist), reference.ray(Joint::Wrist)) else {
        return f32::INFINITY;
    };
    let rays = [a, b];
    let p = triangulate(&rays);
    residual(&rays, &p)
}

/// 測定ログの平均
pub fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f32>() / values.len() as f32
}

/// 測定ログの不偏標準偏差
pub fn std_dev(values: &[f32]) -> f32 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m) * (v - m)).sum::<f32>() / (values.len() - 1) as f32;
    var.sqrt()
}

/// 物理的な1つの手の追跡状態
///
/// 各関節の現在の3D推定値、ピアごとの最新制約、タイムアウトカウンタ、
/// 診断用の測定ログを所有する。制約が変わるたびに `recompute` で
/// 全関節を更新してから公開する（部分更新を読ませない）。
pub struct HandTrack {
    handle: TrackHandle,
    handedness: Handedness,
    joint_positions: [Vector3<f32>; Joint::COUNT],
    peer_constraints: HashMap<String, ConstraintSet>,
    timeout: u32,
    measurements: Vec<f32>,
}

impl HandTrack {
    pub fn new(handle: TrackHandle, handedness: Handedness, timeout_frames: u32) -> Self {
        Self {
            handle,
            handedness,
            joint_positions: [Vector3::zeros(); Joint::COUNT],
            peer_constraints: HashMap::new(),
            timeout: timeout_frames,
            measurements: Vec::new(),
        }
    }

    pub fn handle(&self) -> TrackHandle {
        self.handle
    }

    pub fn handedness(&self) -> Handedness {
        self.handedness
    }

    pub fn joint_positions(&self) -> &[Vector3<f32>; Joint::COUNT] {
        &self.joint_positions
    }

    pub fn position(&self, joint: Joint) -> Vector3<f32> {
        self.joint_positions[joint as usize]
    }

    /// ピアの制約を追加または上書きする。挿入順は意味を持たない
    pub fn add_constraints(&mut self, peer_id: &str, constraints: ConstraintSet) {
        self.peer_constraints.insert(peer_id.to_string(), constraints);
    }

    pub fn remove_peer(&mut self, peer_id: &str) -> bool {
        self.peer_constraints.remove(peer_id).is_some()
    }

    pub fn self_constraints(&self) -> Option<&ConstraintSet> {
        self.peer_constraints.get(crate::constraint::SELF_PEER_ID)
    }

    pub fn observer_count(&self) -> usize {
        self.peer_constraints.len()
    }

    /// 候補の制約がこのトラックの自己観測とどれだけ整合するか
    pub fn compatibility(&self, candidate: &ConstraintSet) -> f32 {
        match self.self_constraints() {
            Some(reference) => compatibility_score(candidate, reference),
            None => f32::INFINITY,
        }
    }

    /// 保持している全制約から各関節の3D推定値を再計算する
    ///
    /// 関節ごとにゼロ方向を除いたレイを集め:
    /// - レイ0本: 前回値を保持（明示的な unknown 状態は持たない）
    /// - レイ1本: 深度は観測不能なので origin + direction·assumed_depth
    /// - レイ2本以上: 最小二乗三角測量
    ///
    /// 複数観測者モードのときだけ薬指先端〜親指先端の距離を測定ログへ
    /// 追記する（キャリブレーション診断用）。
    pub fn recompute(&mut self, assumed_depth: f32) {
        if self.peer_constraints.is_empty() {
            return;
        }

        let mut next = self.joint_positions;
        let mut rays = Vec::with_capacity(self.peer_constraints.len());

        for index in 0..Joint::COUNT {
            rays.clear();
            for constraints in self.peer_constraints.values() {
                if let Some(ray) = constraints.ray_at(index) {
                    rays.push(ray);
                }
            }
            match rays.len() {
                0 => {}
                1 => next[index] = rays[0].origin + rays[0].direction * assumed_depth,
                _ => next[index] = triangulate(&rays),
            }
        }

        // 全関節の計算が終わってから一括で公開する
        self.joint_positions = next;

        if self.peer_constraints.len() >= 2 {
            let dist = (self.position(Joint::RingTip) - self.position(Joint::ThumbTip)).norm();
            self.measurements.push(dist);
        }
    }

    pub fn measurements(&self) -> &[f32] {
        &self.measurements
    }

    /// 新しいローカル観測を受けたときにカウントダウンを巻き戻す
    pub fn reset_timeout(&mut self, timeout_frames: u32) {
        self.timeout = timeout_frames;
    }

    /// ローカル観測が無かったフレームで呼ぶ。0に達したら true（破棄）
    pub fn tick(&mut self) -> bool {
        self.timeout = self.timeout.saturating_sub(1);
        self.timeout == 0
    }

    pub fn timeout(&self) -> u32 {
        self.timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::{LocalConstraints, SELF_PEER_ID};
    use crate::hand::HandObservation;
    use nalgebra::{Matrix4, Vector3};

    fn constraints_toward(origin: Vector3<f32>, target: Vector3<f32>) -> ConstraintSet {
        let mut directions = [Vector3::zeros(); Joint::COUNT];
        let dir = target - origin;
        for d in directions.iter_mut() {
            *d = dir;
        }
        LocalConstraints::new(directions)
            .to_world(&Matrix4::new_translation(&origin))
    }

    fn wrist_only_toward(origin: Vector3<f32>, target: Vector3<f32>) -> ConstraintSet {
        let mut directions = [Vector3::zeros(); Joint::COUNT];
        directions[Joint::Wrist as usize] = target - origin;
        LocalConstraints::new(directions).to_world(&Matrix4::new_translation(&origin))
    }

    #[test]
    fn test_single_observer_fallback() {
        // 単独観測では深度0.5を仮定した固定距離投影になる
        let mut obs = HandObservation::empty(Handedness::Right);
        obs.set(Joint::Wrist, 0.5, 0.5);
        let (full, _) = ConstraintSet::from_detection(&obs, &Matrix4::identity(), 1.0);
        let expected = full.ray(Joint::Wrist).unwrap();

        let mut track = HandTrack::new(1, Handedness::Right, 100);
        track.add_constraints(SELF_PEER_ID, full.clone());
        track.recompute(0.5);

        let p = track.position(Joint::Wrist);
        let want = expected.origin + expected.direction * 0.5;
        assert!((p - want).norm() < 1e-6);
        // 単独観測モードでは測定ログは増えない
        assert!(track.measurements().is_empty());
    }

    #[test]
    fn test_multi_observer_triangulation() {
        let target = Vector3::new(0.5, 0.0, -5.0);
        let mut track = HandTrack::new(1, Handedness::Left, 100);
        track.add_constraints(SELF_PEER_ID, constraints_toward(Vector3::zeros(), target));
        track.add_constraints("peer-1", constraints_toward(Vector3::new(1.0, 0.0, 0.0), target));
        track.recompute(0.5);

        assert!((track.position(Joint::Wrist) - target).norm() < 1e-3);
        // 複数観測者モードで測定ログが1件増える
        assert_eq!(track.measurements().len(), 1);
    }

    #[test]
    fn test_undetected_joint_holds_previous_value() {
        let target = Vector3::new(0.0, 0.0, -2.0);
        let mut track = HandTrack::new(1, Handedness::Left, 100);
        track.add_constraints(SELF_PEER_ID, constraints_toward(Vector3::zeros(), target));
        track.recompute(0.5);
        let before = track.position(Joint::MiddleTip);

        // 手首しか見えない制約で上書きしても他の関節は前回値のまま
        track.add_constraints(SELF_PEER_ID, wrist_only_toward(Vector3::zeros(), target));
        track.recompute(0.5);
        assert_eq!(track.position(Joint::MiddleTip), before);
    }

    #[test]
    fn test_compatibility_prefers_collinear_wrist() {
        // 候補レイとほぼ交差する手首を持つトラックのスコアが低い
        let target = Vector3::new(0.5, 0.0, -5.0);
        let candidate = wrist_only_toward(Vector3::new(1.0, 0.0, 0.0), target);

        let mut near = HandTrack::new(1, Handedness::Left, 100);
        near.add_constraints(SELF_PEER_ID, wrist_only_toward(Vector3::zeros(), target));

        let mut far = HandTrack::new(2, Handedness::Right, 100);
        far.add_constraints(
            SELF_PEER_ID,
            wrist_only_toward(Vector3::zeros(), Vector3::new(-2.0, 1.0, -3.0)),
        );

        assert!(near.compatibility(&candidate) < far.compatibility(&candidate));
    }

    #[test]
    fn test_compatibility_without_self_constraints() {
        let track = HandTrack::new(1, Handedness::Left, 100);
        let candidate = wrist_only_toward(Vector3::zeros(), Vector3::new(0.0, 0.0, -1.0));
        assert_eq!(track.compatibility(&candidate), f32::INFINITY);
    }

    #[test]
    fn test_timeout_countdown() {
        let mut track = HandTrack::new(1, Handedness::Left, 3);
        assert!(!track.tick());
        assert!(!track.tick());
        assert!(track.tick());
        track.reset_timeout(3);
        assert_eq!(track.timeout(), 3);
    }

    #[test]
    fn test_mean_std_dev() {
        let values = [1.0f32, 2.0, 3.0, 4.0];
        assert!((mean(&values) - 2.5).abs() < 1e-6);
        // 不偏分散 = ((1.5^2 + 0.5^2) * 2) / 3
        let expected = ((2.25f32 + 0.25) * 2.0 / 3.0).sqrt();
        assert!((std_dev(&values) - expected).abs() < 1e-6);
        assert_eq!(std_dev(&[1.0]), 0.0);
        assert_eq!(mean(&[]), 0.0);
    }
}
