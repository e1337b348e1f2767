use nalgebra::Matrix4;

use crate::config::Config;
use crate::constraint::{ConstraintSet, LocalConstraints, SELF_PEER_ID};
use crate::hand::{HandObservation, Handedness};
use crate::render::{HandRenderer, TrackHandle};
use crate::tracker::track::HandTrack;

/// 左右の手スロットを所有し、トラックの生成・破棄と
/// 帰属不明データの割り当てを行う
///
/// 状態遷移はスロットごとに Absent → Tracked → Absent。
/// 生成・破棄の副作用は `HandRenderer` 境界への attach/detach のみ。
pub struct TrackManager {
    left: Option<HandTrack>,
    right: Option<HandTrack>,
    timeout_frames: u32,
    assumed_depth: f32,
    aspect_ratio: f32,
    next_handle: TrackHandle,
}

impl TrackManager {
    pub fn new(timeout_frames: u32, assumed_depth: f32, aspect_ratio: f32) -> Self {
        Self {
            left: None,
            right: None,
            timeout_frames,
            assumed_depth,
            aspect_ratio,
            next_handle: 1,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.session.timeout_frames,
            config.session.assumed_depth,
            config.camera.aspect_ratio,
        )
    }

    pub fn track(&self, handedness: Handedness) -> Option<&HandTrack> {
        match handedness {
            Handedness::Left => self.left.as_ref(),
            Handedness::Right => self.right.as_ref(),
            Handedness::Unknown => None,
        }
    }

    pub fn track_count(&self) -> usize {
        self.left.is_some() as usize + self.right.is_some() as usize
    }

    /// 1フレーム分のローカル検出結果を適用する
    ///
    /// 左右が判明している観測は対応するスロットへ、Unknown の観測は
    /// 帰属不明データとして既存トラックへ振り分ける。観測が無かった
    /// スロットはカウントダウンし、0に達したトラックを破棄する。
    /// 戻り値はピアへ送信すべきローカル制約（更新した手の分だけ）。
    pub fn process_frame(
        &mut self,
        observations: &[HandObservation],
        camera_transform: &Matrix4<f32>,
        renderer: &mut dyn HandRenderer,
    ) -> Vec<LocalConstraints> {
        let mut outgoing = Vec::new();

        let left_obs = observations.iter().find(|o| o.handedness == Handedness::Left);
        let right_obs = observations.iter().find(|o| o.handedness == Handedness::Right);

        Self::update_slot(
            &mut self.left,
            Handedness::Left,
            left_obs,
            camera_transform,
            (self.timeout_frames, self.assumed_depth, self.aspect_ratio),
            &mut self.next_handle,
            renderer,
            &mut outgoing,
        );
        Self::update_slot(
            &mut self.right,
            Handedness::Right,
            right_obs,
            camera_transform,
            (self.timeout_frames, self.assumed_depth, self.aspect_ratio),
            &mut self.next_handle,
            renderer,
            &mut outgoing,
        );

        let (timeout_frames, assumed_depth) = (self.timeout_frames, self.assumed_depth);
        for observation in observations.iter().filter(|o| o.handedness == Handedness::Unknown) {
            let (full, local) = ConstraintSet::from_detection(
                observation,
                camera_transform,
                self.aspect_ratio,
            );
            let Some(slot) = self.resolve_slot(&full) else {
                // トラックが1つも無ければ帰属先が無いので破棄
                continue;
            };
            let track = slot.as_mut().expect("resolved slot is occupied");
            track.add_constraints(SELF_PEER_ID, full);
            track.recompute(assumed_depth);
            track.reset_timeout(timeout_frames);
            renderer.update(track.handle(), track.joint_positions());
            outgoing.push(local);
        }

        outgoing
    }

    #[allow(clippy::too_many_arguments)]
    fn update_slot(
        slot: &mut Option<HandTrack>,
        handedness: Handedness,
        observation: Option<&HandObservation>,
        camera_transform: &Matrix4<f32>,
        (timeout_frames, assumed_depth, aspect_ratio): (u32, f32, f32),
        next_handle: &mut TrackHandle,
        renderer: &mut dyn HandRenderer,
        outgoing: &mut Vec<LocalConstraints>,
    ) {
        if let Some(observation) = observation {
            if slot.is_none() {
                let handle = *next_handle;
                *next_handle += 1;
                renderer.attach(handle, handedness);
                *slot = Some(HandTrack::new(handle, handedness, timeout_frames));
            }
            let track = slot.as_mut().expect("slot was just filled");
            let (full, local) =
                ConstraintSet::from_detection(observation, camera_transform, aspect_ratio);
            track.add_constraints(SELF_PEER_ID, full);
            track.recompute(assumed_depth);
            track.reset_timeout(timeout_frames);
            renderer.update(track.handle(), track.joint_positions());
            outgoing.push(local);
        } else {
            let expired = slot.as_mut().map_or(false, |track| track.tick());
            if expired {
                if let Some(track) = slot.take() {
                    renderer.detach(track.handle());
                }
            }
        }
    }

    /// 帰属不明の制約を受け入れるスロットを選ぶ
    ///
    /// トラックが1つだけなら無条件にそれ、両方あれば手首残差の小さい方
    /// （同点は左）、どちらも無ければ None。
    fn resolve_slot(&mut self, candidate: &ConstraintSet) -> Option<&mut Option<HandTrack>> {
        match (&self.left, &self.right) {
            (Some(left), Some(right)) => {
                if left.compatibility(candidate) <= right.compatibility(candidate) {
                    Some(&mut self.left)
                } else {
                    Some(&mut self.right)
                }
            }
            (Some(_), None) => Some(&mut self.left),
            (None, Some(_)) => Some(&mut self.right),
            (None, None) => None,
        }
    }

    /// 左右の判らないリモート観測を共有アンカー経由で取り込む
    ///
    /// リモートデータはタイムアウトを巻き戻さない（トラックの寿命は
    /// ローカル観測だけが延ばす）。
    pub fn add_remote(
        &mut self,
        peer_id: &str,
        constraints: &LocalConstraints,
        anchor: &Matrix4<f32>,
        renderer: &mut dyn HandRenderer,
    ) {
        let full = constraints.to_world(anchor);
        let assumed_depth = self.assumed_depth;
        let Some(slot) = self.resolve_slot(&full) else {
            return;
        };
        let track = slot.as_mut().expect("resolved slot is occupied");
        track.add_constraints(peer_id, full);
        track.recompute(assumed_depth);
        renderer.update(track.handle(), track.joint_positions());
    }

    /// 左右が明示されたリモート観測。スコアリングを飛ばして直接格納する
    pub fn add_remote_labeled(
        &mut self,
        peer_id: &str,
        handedness: Handedness,
        constraints: &LocalConstraints,
        anchor: &Matrix4<f32>,
        renderer: &mut dyn HandRenderer,
    ) {
        let assumed_depth = self.assumed_depth;
        let slot = match handedness {
            Handedness::Left => &mut self.left,
            Handedness::Right => &mut self.right,
            Handedness::Unknown => {
                self.add_remote(peer_id, constraints, anchor, renderer);
                return;
            }
        };
        let Some(track) = slot.as_mut() else {
            return;
        };
        track.add_constraints(peer_id, constraints.to_world(anchor));
        track.recompute(assumed_depth);
        renderer.update(track.handle(), track.joint_positions());
    }

    /// 離脱したピアの制約を両トラックから取り除き、推定値を再計算する
    pub fn remove_peer(&mut self, peer_id: &str, renderer: &mut dyn HandRenderer) {
        let assumed_depth = self.assumed_depth;
        for slot in [&mut self.left, &mut self.right] {
            if let Some(track) = slot.as_mut() {
                if track.remove_peer(peer_id) {
                    track.recompute(assumed_depth);
                    renderer.update(track.handle(), track.joint_positions());
                }
            }
        }
    }
}
