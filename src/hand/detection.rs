use anyhow::Result;

use super::joint::Joint;

/// 手の左右。検出器が判別できない場合は Unknown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Handedness {
    Left,
    Right,
    Unknown,
}

/// 1フレーム・1つの手の2D検出結果
///
/// 座標は正規化画像座標 (u, v)、いずれも 0.0〜1.0。
/// 検出されなかった関節は None。
#[derive(Debug, Clone)]
pub struct HandObservation {
    pub handedness: Handedness,
    pub joints: [Option<[f32; 2]>; Joint::COUNT],
    /// 検出全体の信頼度スコア (0.0〜1.0)
    pub confidence: f32,
}

impl HandObservation {
    /// 関節が1つも検出されていない観測を作る
    pub fn empty(handedness: Handedness) -> Self {
        Self {
            handedness,
            joints: [None; Joint::COUNT],
            confidence: 0.0,
        }
    }

    pub fn set(&mut self, joint: Joint, u: f32, v: f32) {
        self.joints[joint as usize] = Some([u, v]);
    }

    pub fn get(&self, joint: Joint) -> Option<[f32; 2]> {
        self.joints[joint as usize]
    }

    /// 検出された関節の数
    pub fn detected_count(&self) -> usize {
        self.joints.iter().filter(|j| j.is_some()).count()
    }
}

/// 外部の手検出器の境界
///
/// フレームの中身はこのクレートの関知しない型。1フレームにつき
/// 0〜2個の手の観測を返す。
pub trait HandDetector {
    type Frame;

    fn detect(&mut self, frame: Self::Frame) -> Result<Vec<HandObservation>>;
}
