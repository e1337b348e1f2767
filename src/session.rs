use std::collections::HashMap;

use anyhow::Result;
use nalgebra::Matrix4;
use uuid::Uuid;

use crate::config::Config;
use crate::hand::HandObservation;
use crate::protocol::{self, Inbound};
use crate::render::HandRenderer;
use crate::tracker::TrackManager;

/// ピアへデータを送る外部トランスポートの境界
///
/// ピアIDはトランスポート層の不透明な識別子で、トラック内部の
/// 論理ピアIDとは別物。
pub trait Transport {
    fn send_to_all(&mut self, data: &[u8], reliable: bool) -> Result<()>;
    fn send_to(&mut self, peers: &[String], data: &[u8], reliable: bool) -> Result<()>;
}

/// 共有ARセッション
///
/// ピアごとのセッションIDとアンカー変換を管理し、ローカル検出の適用と
/// 受信データの振り分けの入口になる。トラック本体は `TrackManager` が
/// 所有し、寿命はこのセッションに閉じる。
pub struct CollabSession {
    session_id: String,
    manager: TrackManager,
    /// トランスポートピアID → そのピアのセッションID
    peer_session_ids: HashMap<String, String>,
    /// トランスポートピアID → 共有アンカー変換（ピアローカル→ワールド）
    anchors: HashMap<String, Matrix4<f32>>,
}

impl CollabSession {
    pub fn new(config: &Config) -> Self {
        Self::with_session_id(config, Uuid::new_v4().to_string())
    }

    pub fn with_session_id(config: &Config, session_id: String) -> Self {
        Self {
            session_id,
            manager: TrackManager::from_config(config),
            peer_session_ids: HashMap::new(),
            anchors: HashMap::new(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn manager(&self) -> &TrackManager {
        &self.manager
    }

    /// ローカル検出結果を1フレーム分適用し、更新した手の観測データを
    /// 全ピアへブロードキャストする
    pub fn apply_detections(
        &mut self,
        observations: &[HandObservation],
        camera_transform: &Matrix4<f32>,
        renderer: &mut dyn HandRenderer,
        transport: &mut dyn Transport,
    ) -> Result<()> {
        let outgoing = self
            .manager
            .process_frame(observations, camera_transform, renderer);
        for constraints in &outgoing {
            transport.send_to_all(&protocol::encode_hand(constraints), true)?;
        }
        Ok(())
    }

    /// 受信データの振り分け
    ///
    /// アンカー → 手の制約 → セッションIDコマンドの順に解釈を試み、
    /// どれでもないペイロードは黙って無視する。
    pub fn received_data(&mut self, peer: &str, data: &[u8], renderer: &mut dyn HandRenderer) {
        match protocol::classify(data) {
            Inbound::Anchor(transform) => {
                self.anchors.insert(peer.to_string(), transform);
            }
            Inbound::Hand(constraints) => {
                // アンカー未確立のピアとは座標系を共有できないため破棄
                let Some(anchor) = self.anchors.get(peer) else {
                    return;
                };
                self.manager.add_remote(peer, &constraints, anchor, renderer);
            }
            Inbound::SessionId(session_id) => {
                // セッションIDが変わったピアの古いアンカーは無効
                let changed = self
                    .peer_session_ids
                    .get(peer)
                    .is_some_and(|old| *old != session_id);
                if changed {
                    self.anchors.remove(peer);
                }
                self.peer_session_ids.insert(peer.to_string(), session_id);
            }
            Inbound::Unknown => {}
        }
    }

    /// 新しく参加したピアへ自分のセッションIDを通知する
    pub fn peer_joined(&mut self, peer: &str, transport: &mut dyn Transport) -> Result<()> {
        transport.send_to(
            &[peer.to_string()],
            &protocol::encode_session_command(&self.session_id),
            true,
        )
    }

    /// 離脱したピアの状態をすべて取り除く
    pub fn peer_left(&mut self, peer: &str, renderer: &mut dyn HandRenderer) {
        self.anchors.remove(peer);
        self.peer_session_ids.remove(peer);
        self.manager.remove_peer(peer, renderer);
    }

    /// 発見したピアを受け入れるか
    pub fn peer_discovered(&mut self, _peer: &str) -> bool {
        true
    }

    pub fn peer_anchor(&self, peer: &str) -> Option<&Matrix4<f32>> {
        self.anchors.get(peer)
    }

    pub fn peer_session_id(&self, peer: &str) -> Option<&str> {
        self.peer_session_ids.get(peer).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hand::{Handedness, Joint};
    use crate::render::NullRenderer;
    use nalgebra::Vector3;

    #[derive(Default)]
    struct MemoryTransport {
        broadcasts: Vec<Vec<u8>>,
        directed: Vec<(Vec<String>, Vec<u8>)>,
    }

    impl Transport for MemoryTransport {
        fn send_to_all(&mut self, data: &[u8], _reliable: bool) -> Result<()> {
            self.broadcasts.push(data.to_vec());
            Ok(())
        }

        fn send_to(&mut self, peers: &[String], data: &[u8], _reliable: bool) -> Result<()> {
            self.directed.push((peers.to_vec(), data.to_vec()));
            Ok(())
        }
    }

    fn config() -> Config {
        Config::default()
    }

    fn observation_toward(handedness: Handedness, u: f32, v: f32) -> HandObservation {
        let mut obs = HandObservation::empty(handedness);
        obs.set(Joint::Wrist, u, v);
        obs.confidence = 0.9;
        obs
    }

    #[test]
    fn test_local_detection_is_broadcast() {
        let cfg = config();
        let mut session = CollabSession::new(&cfg);
        let mut transport = MemoryTransport::default();

        session
            .apply_detections(
                &[observation_toward(Handedness::Right, 0.5, 0.5)],
                &Matrix4::identity(),
                &mut NullRenderer,
                &mut transport,
            )
            .unwrap();

        assert_eq!(transport.broadcasts.len(), 1);
        // 送った物は受信側で手の制約として解釈できる
        assert!(matches!(
            protocol::classify(&transport.broadcasts[0]),
            Inbound::Hand(_)
        ));
    }

    #[test]
    fn test_peer_joined_sends_session_id() {
        let cfg = config();
        let mut session = CollabSession::with_session_id(&cfg, "abc-123".to_string());
        let mut transport = MemoryTransport::default();

        session.peer_joined("peer-1", &mut transport).unwrap();

        let (peers, data) = &transport.directed[0];
        assert_eq!(peers, &["peer-1".to_string()]);
        assert_eq!(
            protocol::decode_session_command(data).as_deref(),
            Some("abc-123")
        );
    }

    #[test]
    fn test_hand_data_before_anchor_is_dropped() {
        let cfg = config();
        let mut session = CollabSession::new(&cfg);
        let mut renderer = NullRenderer;
        let mut transport = MemoryTransport::default();

        session
            .apply_detections(
                &[observation_toward(Handedness::Left, 0.5, 0.5)],
                &Matrix4::identity(),
                &mut renderer,
                &mut transport,
            )
            .unwrap();

        let mut directions = [Vector3::zeros(); Joint::COUNT];
        directions[Joint::Wrist as usize] = Vector3::new(0.0, 0.0, -1.0);
        let payload =
            protocol::encode_hand(&crate::constraint::LocalConstraints::new(directions));
        session.received_data("peer-1", &payload, &mut renderer);

        // アンカーが無いので取り込まれない
        assert_eq!(
            session.manager().track(Handedness::Left).unwrap().observer_count(),
            1
        );
    }

    #[test]
    fn test_session_id_change_invalidates_anchor() {
        let cfg = config();
        let mut session = CollabSession::new(&cfg);
        let mut renderer = NullRenderer;

        let anchor = Matrix4::new_translation(&Vector3::new(1.0, 0.0, 0.0));
        session.received_data("peer-1", &protocol::encode_anchor(&anchor), &mut renderer);
        session.received_data(
            "peer-1",
            &protocol::encode_session_command("first"),
            &mut renderer,
        );
        assert!(session.peer_anchor("peer-1").is_some());

        // 同じIDの再通知ではアンカーは残る
        session.received_data(
            "peer-1",
            &protocol::encode_session_command("first"),
            &mut renderer,
        );
        assert!(session.peer_anchor("peer-1").is_some());

        session.received_data(
            "peer-1",
            &protocol::encode_session_command("second"),
            &mut renderer,
        );
        assert!(session.peer_anchor("peer-1").is_none());
        assert_eq!(session.peer_session_id("peer-1"), Some("second"));
    }

    #[test]
    fn test_unknown_payload_is_ignored() {
        let cfg = config();
        let mut session = CollabSession::new(&cfg);
        session.received_data("peer-1", b"garbage", &mut NullRenderer);
        assert!(session.peer_anchor("peer-1").is_none());
    }

    #[test]
    fn test_peer_left_removes_state() {
        let cfg = config();
        let mut session = CollabSession::new(&cfg);
        let mut renderer = NullRenderer;
        let mut transport = MemoryTransport::default();

        session
            .apply_detections(
                &[observation_toward(Handedness::Left, 0.5, 0.5)],
                &Matrix4::identity(),
                &mut renderer,
                &mut transport,
            )
            .unwrap();

        let anchor = Matrix4::new_translation(&Vector3::new(1.0, 0.0, 0.0));
        session.received_data("peer-1", &protocol::encode_anchor(&anchor), &mut renderer);

        let mut directions = [Vector3::zeros(); Joint::COUNT];
        directions[Joint::Wrist as usize] = Vector3::new(-0.1, 0.0, -1.0);
        let payload =
            protocol::encode_hand(&crate::constraint::LocalConstraints::new(directions));
        session.received_data("peer-1", &payload, &mut renderer);
        assert_eq!(
            session.manager().track(Handedness::Left).unwrap().observer_count(),
            2
        );

        session.peer_left("peer-1", &mut renderer);
        assert!(session.peer_anchor("peer-1").is_none());
        assert_eq!(
            session.manager().track(Handedness::Left).unwrap().observer_count(),
            1
        );
    }

    #[test]
    fn test_two_observers_triangulate_shared_point() {
        // (0,0,0) と (1,0,0) の2観測者がどちらも (0.5, 0, -5) を指す
        // 手首レイを持つシナリオ
        let cfg = config();
        let mut session = CollabSession::new(&cfg);
        let mut renderer = NullRenderer;
        let mut transport = MemoryTransport::default();

        // ローカル観測: アスペクト比 4/3 で (0.1, 0, -1) 方向になる v を選ぶ
        let aspect = cfg.camera.aspect_ratio;
        let v = 0.5 + 0.1 / aspect;
        session
            .apply_detections(
                &[observation_toward(Handedness::Right, 0.5, v)],
                &Matrix4::identity(),
                &mut renderer,
                &mut transport,
            )
            .unwrap();

        // ピアのアンカーは (1,0,0) への平行移動
        let anchor = Matrix4::new_translation(&Vector3::new(1.0, 0.0, 0.0));
        session.received_data("peer-1", &protocol::encode_anchor(&anchor), &mut renderer);

        // ピアのローカルレイは (0.5,0,-5) - (1,0,0) = (-0.5, 0, -5) 方向
        let mut directions = [Vector3::zeros(); Joint::COUNT];
        directions[Joint::Wrist as usize] = Vector3::new(-0.5, 0.0, -5.0);
        let payload =
            protocol::encode_hand(&crate::constraint::LocalConstraints::new(directions));
        session.received_data("peer-1", &payload, &mut renderer);

        let track = session.manager().track(Handedness::Right).unwrap();
        let wrist = track.position(Joint::Wrist);
        assert!(
            (wrist - Vector3::new(0.5, 0.0, -5.0)).norm() < 1e-2,
            "wrist = {:?}",
            wrist
        );
    }
}
