use crate::hand::Joint;

/// 手骨格の接続定義 (開始関節, 終了関節)
pub const HAND_CONNECTIONS: [(Joint, Joint); 20] = [
    // 親指
    (Joint::Wrist, Joint::ThumbCmc),
    (Joint::ThumbCmc, Joint::ThumbMp),
    (Joint::ThumbMp, Joint::ThumbIp),
    (Joint::ThumbIp, Joint::ThumbTip),
    // 人差し指
    (Joint::Wrist, Joint::IndexMcp),
    (Joint::IndexMcp, Joint::IndexPip),
    (Joint::IndexPip, Joint::IndexDip),
    (Joint::IndexDip, Joint::IndexTip),
    // 中指
    (Joint::Wrist, Joint::MiddleMcp),
    (Joint::MiddleMcp, Joint::MiddlePip),
    (Joint::MiddlePip, Joint::MiddleDip),
    (Joint::MiddleDip, Joint::MiddleTip),
    // 薬指
    (Joint::Wrist, Joint::RingMcp),
    (Joint::RingMcp, Joint::RingPip),
    (Joint::RingPip, Joint::RingDip),
    (Joint::RingDip, Joint::RingTip),
    // 小指
    (Joint::Wrist, Joint::LittleMcp),
    (Joint::LittleMcp, Joint::LittlePip),
    (Joint::LittlePip, Joint::LittleDip),
    (Joint::LittleDip, Joint::LittleTip),
];

/// 左手ノードの色 (RGB)
pub const LEFT_HAND_COLOR: u32 = 0x0000FF; // 青

/// 右手ノードの色 (RGB)
pub const RIGHT_HAND_COLOR: u32 = 0x00FF00; // 緑

/// 関節球の半径（メートル）
pub const JOINT_SPHERE_RADIUS: f32 = 0.005;
