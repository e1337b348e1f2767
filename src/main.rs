use anyhow::Result;
use nalgebra::{Matrix4, Vector3};

use collab_hand_tracker::config::Config;
use collab_hand_tracker::hand::{HandObservation, Handedness, Joint};
use collab_hand_tracker::protocol;
use collab_hand_tracker::render::{HandRenderer, TrackHandle};
use collab_hand_tracker::session::{CollabSession, Transport};
use collab_hand_tracker::tracker::{mean, std_dev};

const CONFIG_PATH: &str = "config.toml";

/// attach/detach をコンソールに流すだけのレンダラー
struct ConsoleRenderer;

impl HandRenderer for ConsoleRenderer {
    fn attach(&mut self, handle: TrackHandle, handedness: Handedness) {
        println!("  [render] トラック{} ({:?}) を表示に追加", handle, handedness);
    }

    fn detach(&mut self, handle: TrackHandle) {
        println!("  [render] トラック{} を表示から削除", handle);
    }

    fn update(&mut self, _handle: TrackHandle, _positions: &[Vector3<f32>; Joint::COUNT]) {}
}

/// 送信バイト数を数えるだけのトランスポート
#[derive(Default)]
struct CountingTransport {
    sent_bytes: usize,
    sent_messages: usize,
}

impl Transport for CountingTransport {
    fn send_to_all(&mut self, data: &[u8], _reliable: bool) -> Result<()> {
        self.sent_bytes += data.len();
        self.sent_messages += 1;
        Ok(())
    }

    fn send_to(&mut self, _peers: &[String], data: &[u8], _reliable: bool) -> Result<()> {
        self.sent_bytes += data.len();
        self.sent_messages += 1;
        Ok(())
    }
}

/// ワールド点 target を恒等カメラの正規化画像座標 (u, v) へ逆投影する
fn project(target: Vector3<f32>, aspect_ratio: f32) -> (f32, f32) {
    let depth = -target.z;
    let u = 0.5 - target.y / depth;
    let v = 0.5 + (target.x / depth) / aspect_ratio;
    (u, v)
}

fn observation_at(targets: &[(Joint, Vector3<f32>)], aspect_ratio: f32) -> HandObservation {
    let mut obs = HandObservation::empty(Handedness::Right);
    obs.confidence = 0.9;
    for (joint, target) in targets {
        let (u, v) = project(*target, aspect_ratio);
        obs.set(*joint, u, v);
    }
    obs
}

fn main() -> Result<()> {
    println!("=== Collab Hand Tracker Demo ({}) ===", env!("GIT_VERSION"));
    let config = Config::load_or_default(CONFIG_PATH);
    println!(
        "timeout: {} frames, assumed depth: {} m, aspect: {:.3}",
        config.session.timeout_frames, config.session.assumed_depth, config.camera.aspect_ratio
    );
    println!();

    let aspect = config.camera.aspect_ratio;
    let mut session = CollabSession::new(&config);
    let mut renderer = ConsoleRenderer;
    let mut transport = CountingTransport::default();
    println!("SessionID: {}", session.session_id());

    // 実際の手のワールド座標（カメラA原点から見て前方0.5m近辺）
    let wrist = Vector3::new(0.5, 0.0, -5.0);
    let thumb_tip = Vector3::new(0.45, 0.05, -5.0);
    let ring_tip = Vector3::new(0.55, 0.04, -5.0);
    let targets = [
        (Joint::Wrist, wrist),
        (Joint::ThumbTip, thumb_tip),
        (Joint::RingTip, ring_tip),
    ];

    // --- フレーム1: 単独観測（深度は仮定値） ---
    let camera_a = Matrix4::identity();
    let obs = observation_at(&targets, aspect);
    session.apply_detections(&[obs.clone()], &camera_a, &mut renderer, &mut transport)?;
    let track = session.manager().track(Handedness::Right).unwrap();
    println!(
        "単独観測の手首推定: {:?} (深度は {} m 固定)",
        track.position(Joint::Wrist),
        config.session.assumed_depth
    );

    // --- ピア参加: アンカーと手のデータが届く ---
    session.peer_joined("peer-1", &mut transport)?;
    let peer_origin = Vector3::new(1.0, 0.0, 0.0);
    let anchor = Matrix4::new_translation(&peer_origin);
    session.received_data("peer-1", &protocol::encode_anchor(&anchor), &mut renderer);

    let mut directions = [Vector3::zeros(); Joint::COUNT];
    for (joint, target) in &targets {
        directions[*joint as usize] = target - peer_origin;
    }
    let payload =
        protocol::encode_hand(&collab_hand_tracker::constraint::LocalConstraints::new(directions));
    session.received_data("peer-1", &payload, &mut renderer);

    // --- フレーム2: 2観測者で三角測量 ---
    session.apply_detections(&[obs], &camera_a, &mut renderer, &mut transport)?;
    let track = session.manager().track(Handedness::Right).unwrap();
    println!("2観測者の手首推定: {:?} (真値 {:?})", track.position(Joint::Wrist), wrist);
    let measurements = track.measurements();
    println!(
        "測定ログ: mean={:.4} std={:.4} count={}",
        mean(measurements),
        std_dev(measurements),
        measurements.len()
    );

    // --- 観測が途絶えてタイムアウトで破棄されるまで回す ---
    let mut frames = 0u32;
    while session.manager().track(Handedness::Right).is_some() {
        session.apply_detections(&[], &camera_a, &mut renderer, &mut transport)?;
        frames += 1;
    }
    println!("ローカル観測の途絶から {} フレームでトラック破棄", frames);
    println!();
    println!(
        "送信: {} メッセージ / {} バイト",
        transport.sent_messages, transport.sent_bytes
    );

    Ok(())
}
