use nalgebra::{Matrix4, Vector3};

use crate::geometry::{self, Ray};
use crate::hand::{HandObservation, Joint};

/// 自分自身の観測を指す予約ピアID
pub const SELF_PEER_ID: &str = "";

/// 1観測者・1つの手・1フレーム分の観測レイ集合（ワールド座標系）
///
/// 未検出の関節の方向はゼロベクトル。ゼロ方向は単位長でないため、
/// 三角測量に混ぜると A/b を壊す。必ず除外すること（`ray_at` は
/// ゼロ方向に対して None を返す）。
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintSet {
    /// 観測者の基準点（カメラ位置、ワールド座標）
    pub origin: Vector3<f32>,
    directions: [Vector3<f32>; Joint::COUNT],
}

impl ConstraintSet {
    /// 2D検出結果からワールド座標の制約と送信用ローカル制約を同時に構築
    pub fn from_detection(
        observation: &HandObservation,
        camera_transform: &Matrix4<f32>,
        aspect_ratio: f32,
    ) -> (Self, LocalConstraints) {
        let origin = geometry::transform_point(camera_transform, &Vector3::zeros());
        let mut directions = [Vector3::zeros(); Joint::COUNT];
        let mut local = [Vector3::zeros(); Joint::COUNT];

        for index in 0..Joint::COUNT {
            if let Some([u, v]) = observation.joints[index] {
                let ray = geometry::build_ray(u, v, aspect_ratio, camera_transform);
                directions[index] = ray.direction;
                // ローカル側は正規化せずそのまま送る（受信側が回転後に正規化する）
                local[index] = geometry::camera_direction(u, v, aspect_ratio);
            }
        }

        (Self { origin, directions }, LocalConstraints::new(local))
    }

    /// 指定関節の観測レイ。未検出（ゼロ方向）なら None
    pub fn ray(&self, joint: Joint) -> Option<Ray> {
        self.ray_at(joint as usize)
    }

    pub fn ray_at(&self, index: usize) -> Option<Ray> {
        let direction = self.directions[index];
        if direction == Vector3::zeros() {
            return None;
        }
        Some(Ray {
            origin: self.origin,
            direction,
        })
    }
}

/// 観測者ローカル座標系のままの方向集合（ワイヤ送信用）
///
/// 原点は持たない。受信側が共有アンカーの変換から原点と
/// ワールド座標系の方向を復元する。
#[derive(Debug, Clone, PartialEq)]
pub struct LocalConstraints {
    directions: [Vector3<f32>; Joint::COUNT],
}

impl LocalConstraints {
    pub fn new(directions: [Vector3<f32>; Joint::COUNT]) -> Self {
        Self { directions }
    }

    pub fn directions(&self) -> &[Vector3<f32>; Joint::COUNT] {
        &self.directions
    }

    /// 共有アンカーの変換でワールド座標系の制約に再投影する
    ///
    /// 方向は w=0 で回転して再正規化、原点は変換のローカル原点 (w=1)。
    /// ゼロ方向（未検出）はゼロのまま保たれる。
    pub fn to_world(&self, transform: &Matrix4<f32>) -> ConstraintSet {
        let origin = geometry::transform_point(transform, &Vector3::zeros());
        let mut directions = [Vector3::zeros(); Joint::COUNT];

        for (index, local) in self.directions.iter().enumerate() {
            if *local == Vector3::zeros() {
                continue;
            }
            directions[index] = geometry::transform_direction(transform, local).normalize();
        }

        ConstraintSet { origin, directions }
    }
}
