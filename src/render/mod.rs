pub mod skeleton;

use nalgebra::Vector3;

use crate::hand::{Handedness, Joint};

/// トラックを識別する不透明ハンドル
///
/// コアは描画リソースへの参照を一切持たず、このハンドルだけで
/// 描画側とやり取りする。
pub type TrackHandle = u32;

/// 描画側の境界
///
/// トラックの生成・破棄・推定値更新に合わせてコアから呼ばれる。
/// コアが描画側から読み戻すことは無い。
pub trait HandRenderer {
    fn attach(&mut self, handle: TrackHandle, handedness: Handedness);
    fn detach(&mut self, handle: TrackHandle);
    fn update(&mut self, handle: TrackHandle, positions: &[Vector3<f32>; Joint::COUNT]);
}

/// 何もしないレンダラー（ヘッドレス実行・テスト用）
pub struct NullRenderer;

impl HandRenderer for NullRenderer {
    fn attach(&mut self, _handle: TrackHandle, _handedness: Handedness) {}

    fn detach(&mut self, _handle: TrackHandle) {}

    fn update(&mut self, _handle: TrackHandle, _positions: &[Vector3<f32>; Joint::COUNT]) {}
}
