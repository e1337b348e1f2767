use nalgebra::{Matrix3, Matrix4, Vector3, Vector4};

/// 観測レイ: 原点と単位方向ベクトル
///
/// 「真の3D関節位置はこの原点からこの方向のどこかにある」を表す。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vector3<f32>,
    pub direction: Vector3<f32>,
}

/// 点を同次座標 w=1 で変換する
pub fn transform_point(m: &Matrix4<f32>, p: &Vector3<f32>) -> Vector3<f32> {
    let h = m * Vector4::new(p.x, p.y, p.z, 1.0);
    Vector3::new(h.x, h.y, h.z)
}

/// 方向を同次座標 w=0 で変換する（平行移動は落ちる）
pub fn transform_direction(m: &Matrix4<f32>, d: &Vector3<f32>) -> Vector3<f32> {
    let h = m * Vector4::new(d.x, d.y, d.z, 0.0);
    Vector3::new(h.x, h.y, h.z)
}

/// 正規化画像座標からワールド空間の観測レイを構築
///
/// - (u, v): 正規化画像座標 [0,1]×[0,1]
/// - aspect_ratio: 画像の横縦比（幅/高さ）
/// - camera_transform: カメラローカル→ワールドの4×4変換
///
/// カメラ空間の方向は (aspect·(v-0.5), -(u-0.5), -1)。方向は w=0 で
/// 回転のみ適用し単位長に正規化、原点はカメラローカル原点を w=1 で変換。
pub fn build_ray(u: f32, v: f32, aspect_ratio: f32, camera_transform: &Matrix4<f32>) -> Ray {
    let origin = transform_point(camera_transform, &Vector3::zeros());
    let local = camera_direction(u, v, aspect_ratio);
    let direction = transform_direction(camera_transform, &local).normalize();
    Ray { origin, direction }
}

/// 2D検出点に対応するカメラ空間の（未正規化）視線方向
pub fn camera_direction(u: f32, v: f32, aspect_ratio: f32) -> Vector3<f32> {
    Vector3::new(aspect_ratio * (v - 0.5), -(u - 0.5), -1.0)
}

/// レイの垂直平面への射影行列 I - n·nᵀ
fn perp_projector(n: &Vector3<f32>) -> Matrix3<f32> {
    Matrix3::identity() - n * n.transpose()
}

/// 複数レイの最小二乗三角測量
///
/// 各レイについて A += I - n·nᵀ, b += (I - n·nᵀ)·origin を蓄積し、
/// 全レイへの垂直距離二乗和を最小化する点 A·p = b を解く。
///
/// 前提条件: レイ1本以上・方向は正規化済み。レイ1本では A が特異
/// （ランク2）になるため、単独観測のフォールバックは呼び出し側の責務。
///
/// A は対称半正定値なので直接 Cholesky で解き、特異な場合のみ
/// 正規方程式 AᵀA·p = Aᵀb にフォールバックする。
pub fn triangulate(rays: &[Ray]) -> Vector3<f32> {
    debug_assert!(!rays.is_empty());

    let mut a = Matrix3::zeros();
    let mut b = Vector3::zeros();
    for ray in rays {
        let proj = perp_projector(&ray.direction);
        a += proj;
        b += proj * ray.origin;
    }

    if let Some(chol) = a.cholesky() {
        return chol.solve(&b);
    }

    // ほぼ平行なレイ等で特異になった場合。条件数は悪化するが解は返す
    let ata = a.transpose() * a;
    let atb = a.transpose() * b;
    ata.lu().solve(&atb).unwrap_or_else(Vector3::zeros)
}

/// フィット誤差: Σ‖(I - n·nᵀ)(p - origin)‖
///
/// 真の幾何距離ではないが、レイ同士の整合性に対して単調。
/// 互換性スコアラーの割り当て判定にのみ使う。
pub fn residual(rays: &[Ray], p: &Vector3<f32>) -> f32 {
    rays.iter()
        .map(|ray| {
            let proj = perp_projector(&ray.direction);
            (proj * (p - ray.origin)).norm()
        })
        .sum()
}
